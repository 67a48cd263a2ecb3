// src/aggregator.rs
//! Fan-out over (city, source) pairs, then dedup and distance filtering.
//!
//! Pairs run concurrently, bounded by a semaphore. Each task owns its own
//! buffer; results are merged at the join barrier in pair order, so output
//! order never depends on which fetch finished first. A failing pair
//! contributes nothing and is reported; it never fails the run.

use anyhow::bail;
use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinError;

use crate::dedup::dedupe;
use crate::geo::GeoResolver;
use crate::ingest::config::AppConfig;
use crate::ingest::types::{NormalizedEvent, SourceAdapter, SourceError};
use crate::ingest::{ensure_metrics_described, source_listed};

pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityTarget {
    pub city: String,
    #[serde(default)]
    pub state: String,
    /// Gated sources to query for this city.
    #[serde(default)]
    pub enabled_sources: Vec<String>,
}

impl CityTarget {
    pub fn new(city: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            state: state.into(),
            enabled_sources: Vec::new(),
        }
    }

    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enabled_sources = sources.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferencePoint {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default, alias = "city_targets")]
    pub cities: Vec<CityTarget>,
    pub max_distance_miles: f64,
    #[serde(default)]
    pub reference_point: Option<ReferencePoint>,
}

impl SearchRequest {
    /// Reference point must be a real location; radius finite and non-negative.
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(p) = self.reference_point {
            if !p.lat.is_finite() || p.lat.abs() > 90.0 {
                bail!("reference latitude {} is not in [-90, 90]", p.lat);
            }
            if !p.lon.is_finite() || p.lon.abs() > 180.0 {
                bail!("reference longitude {} is not in [-180, 180]", p.lon);
            }
        }
        if !self.max_distance_miles.is_finite() || self.max_distance_miles < 0.0 {
            bail!(
                "max distance {} must be a finite, non-negative number of miles",
                self.max_distance_miles
            );
        }
        Ok(())
    }
}

/// One (source, city) fetch that produced nothing.
#[derive(Debug)]
pub struct SourceFailure {
    pub source: String,
    pub city: String,
    pub state: String,
    pub error: SourceError,
}

#[derive(Debug, Default)]
pub struct RunReport {
    /// Final ordered events.
    pub events: Vec<NormalizedEvent>,
    pub failures: Vec<SourceFailure>,
    /// Records gathered from sources before dedup.
    pub collected: usize,
}

impl RunReport {
    pub fn into_events(self) -> Vec<NormalizedEvent> {
        self.events
    }
}

pub struct Aggregator {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    resolver: GeoResolver,
    gated_sources: Vec<String>,
    max_concurrency: usize,
    run_timeout: Option<Duration>,
}

impl Aggregator {
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>, resolver: GeoResolver) -> Self {
        Self {
            adapters,
            resolver,
            gated_sources: Vec::new(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            run_timeout: None,
        }
    }

    pub fn from_config(
        cfg: &AppConfig,
        adapters: Vec<Arc<dyn SourceAdapter>>,
        resolver: GeoResolver,
    ) -> Self {
        Self::new(adapters, resolver)
            .with_gated_sources(cfg.gated_sources.clone())
            .with_max_concurrency(cfg.max_concurrency)
            .with_run_timeout(cfg.run_timeout())
    }

    pub fn with_gated_sources(mut self, gated: Vec<String>) -> Self {
        self.gated_sources = gated;
        self
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    pub fn with_run_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.run_timeout = timeout;
        self
    }

    /// Gated sources run only where the target opts in; the rest run everywhere.
    pub fn applies_to(&self, adapter: &dyn SourceAdapter, target: &CityTarget) -> bool {
        !source_listed(adapter.id(), &self.gated_sources)
            || source_listed(adapter.id(), &target.enabled_sources)
    }

    pub async fn run(&self, req: &SearchRequest) -> RunReport {
        ensure_metrics_described();

        // 1) Enumerate pairs in request order, adapters in registration order.
        let mut pairs: Vec<(CityTarget, Arc<dyn SourceAdapter>)> = Vec::new();
        for target in &req.cities {
            if target.city.trim().is_empty() {
                continue;
            }
            for adapter in &self.adapters {
                if self.applies_to(adapter.as_ref(), target) {
                    pairs.push((target.clone(), Arc::clone(adapter)));
                }
            }
        }

        tracing::info!(
            cities = req.cities.len(),
            pairs = pairs.len(),
            concurrency = self.max_concurrency,
            "aggregation started"
        );
        counter!("aggregate_pairs_total").increment(pairs.len() as u64);

        // 2) Fan out, each task with a private buffer.
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let deadline = self.run_timeout.map(|d| tokio::time::Instant::now() + d);

        let handles: Vec<_> = pairs
            .into_iter()
            .map(|(target, adapter)| {
                let sem = Arc::clone(&semaphore);
                let source = adapter.id();
                let (city, state) = (target.city.clone(), target.state.clone());
                let handle = tokio::spawn(async move {
                    let _permit = match sem.acquire_owned().await {
                        Ok(p) => p,
                        Err(e) => return Err(SourceError::Task(e.to_string())),
                    };
                    adapter.scrape(&city, &state).await
                });
                (source, target, handle)
            })
            .collect();

        // 3) Barrier: wait for every pair, merge in pair order.
        let mut report = RunReport::default();
        let mut merged: Vec<NormalizedEvent> = Vec::new();

        for (source, target, mut handle) in handles {
            let outcome = match deadline {
                Some(d) => {
                    let waited = tokio::time::timeout_at(d, &mut handle).await;
                    match waited {
                        Ok(joined) => flatten(joined),
                        Err(_) => {
                            handle.abort();
                            Err(SourceError::Timeout)
                        }
                    }
                }
                None => flatten(handle.await),
            };

            match outcome {
                Ok(mut evs) => {
                    tracing::debug!(source, city = %target.city, events = evs.len(), "source done");
                    merged.append(&mut evs);
                }
                Err(e) => {
                    tracing::warn!(
                        source,
                        city = %target.city,
                        state = %target.state,
                        kind = e.kind(),
                        error = %e,
                        "source failed; continuing without it"
                    );
                    counter!("aggregate_source_errors_total").increment(1);
                    report.failures.push(SourceFailure {
                        source: source.to_string(),
                        city: target.city,
                        state: target.state,
                        error: e,
                    });
                }
            }
        }

        report.collected = merged.len();
        counter!("aggregate_events_total").increment(merged.len() as u64);

        // 4) Dedup, then (only with a reference point) place, filter, sort.
        let unique = dedupe(merged);
        report.events = match req.reference_point {
            Some(p) => self
                .resolver
                .resolve(unique, p.lat, p.lon, req.max_distance_miles),
            None => unique,
        };

        gauge!("aggregate_last_run_ts").set(chrono::Utc::now().timestamp().max(0) as f64);
        tracing::info!(
            collected = report.collected,
            kept = report.events.len(),
            failures = report.failures.len(),
            "aggregation finished"
        );

        report
    }
}

fn flatten(
    joined: Result<Result<Vec<NormalizedEvent>, SourceError>, JoinError>,
) -> Result<Vec<NormalizedEvent>, SourceError> {
    joined.unwrap_or_else(|e| Err(SourceError::Task(e.to_string())))
}
