//! `openmic`: find open mic events near a home location.
//!
//! Loads config and the city table, queries every applicable source for each
//! city, then prints the deduplicated, distance-filtered list.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use openmic_aggregator::{
    render_json, render_text, Aggregator, AppConfig, CityCoordinateTable, CityTarget,
    EventbriteAdapter, GeoResolver, GroupMode, HttpFetcher, OpenMicUsAdapter, ReferencePoint,
    RunReport, SourceAdapter,
};

/// Find open mic events from multiple sources
///
/// Examples:
///   # Search with the default config
///   openmic
///
///   # Search within 50 miles
///   openmic --radius 50
///
///   # One city, grouped by distance
///   openmic --city Tallahassee --state FL --group distance
#[derive(Parser, Debug)]
#[command(name = "openmic")]
#[command(version, about, long_about = None)]
struct Args {
    /// Search radius in miles (default: from config or 100)
    #[arg(short = 'r', long)]
    radius: Option<f64>,

    /// City to search (repeatable)
    #[arg(short = 'c', long = "city")]
    cities: Vec<String>,

    /// State for the city at the same position (repeatable)
    #[arg(short = 's', long = "state")]
    states: Vec<String>,

    /// How to group results
    #[arg(short = 'g', long, value_enum, default_value_t = GroupMode::ByDay)]
    group: GroupMode,

    /// Path to config file (TOML or JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Reference latitude (use with --lon)
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Reference longitude (use with --lat)
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,

    /// Debug logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

impl Args {
    /// Pair `--city` with `--state` by position; a missing state is empty.
    fn city_targets(&self) -> Option<Vec<CityTarget>> {
        if self.cities.is_empty() {
            return None;
        }
        Some(
            self.cities
                .iter()
                .enumerate()
                .map(|(i, city)| {
                    let state = self.states.get(i).cloned().unwrap_or_default();
                    CityTarget::new(city.clone(), state)
                })
                .collect(),
        )
    }

    fn reference_point(&self) -> Option<ReferencePoint> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(ReferencePoint { lat, lon }),
            _ => None,
        }
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose {
        "openmic_aggregator=debug,openmic=debug,warn"
    } else {
        "openmic_aggregator=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

fn build_adapters(cfg: &AppConfig) -> Result<Vec<Arc<dyn SourceAdapter>>> {
    let timeout = cfg.request_timeout();

    let plain = Arc::new(HttpFetcher::new(timeout, None)?);
    let cookie = cfg
        .eventbrite
        .session_token
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .map(|t| format!("SS={}", t.trim()));
    let eventbrite = Arc::new(
        HttpFetcher::new(timeout, cookie.as_deref()).context("eventbrite http client")?,
    );

    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(OpenMicUsAdapter::new(plain, cfg.openmic_us.clone())),
        Arc::new(EventbriteAdapter::new(eventbrite)),
    ];
    Ok(adapters)
}

fn print_summary(report: &RunReport) {
    eprintln!(
        "\n{} events ({} collected before dedup)",
        report.events.len(),
        report.collected
    );
    if !report.failures.is_empty() {
        eprintln!("Warnings:");
        for f in &report.failures {
            eprintln!("  - {} [{}, {}]: {}", f.source, f.city, f.state, f.error);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_tracing(args.verbose);

    let cfg = match &args.config {
        Some(p) => AppConfig::load_from(p)?,
        None => AppConfig::load_default()?,
    };
    let table = CityCoordinateTable::load_default(cfg.city_coords_path.as_deref())?;
    tracing::info!(cities = table.len(), "city table loaded");

    let request = cfg.search_request(args.city_targets(), args.radius, args.reference_point())?;
    if request.reference_point.is_none() {
        tracing::warn!("no reference location; distances will not be computed");
    }

    let aggregator = Aggregator::from_config(
        &cfg,
        build_adapters(&cfg)?,
        GeoResolver::new(Arc::new(table)),
    );
    let report = aggregator.run(&request).await;

    if args.json {
        println!("{}", render_json(&report.events)?);
    } else {
        print!("{}", render_text(&report.events, args.group));
    }
    print_summary(&report);

    Ok(())
}
