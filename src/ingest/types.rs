// src/ingest/types.rs
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::geo::valid_point;

/// Distance of an event from the reference point.
///
/// `Unresolved` is the state every event is born in. The geo stage moves it to
/// either `Miles` or `Unknown`, and both of those are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Distance {
    #[default]
    Unresolved,
    Unknown,
    Miles(f64),
}

impl Distance {
    pub fn miles(&self) -> Option<f64> {
        match self {
            Distance::Miles(m) => Some(*m),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Distance::Unknown)
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, Distance::Unresolved)
    }
}

// Both non-numeric states render as `null` in the flat output record.
fn serialize_distance<S: Serializer>(d: &Distance, s: S) -> Result<S::Ok, S::Error> {
    d.miles().serialize(s)
}

/// One listing, normalized across sources. Field order is the output order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedEvent {
    pub venue_name: String,
    pub event_name: Option<String>,
    pub city: String,
    pub state: String,
    pub address: Option<String>,
    pub day_of_week: Option<String>,
    pub time: Option<String>,
    pub phone: Option<String>,
    pub genre: Option<String>,
    pub details: Option<String>,
    pub url: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    #[serde(rename = "distance_miles", serialize_with = "serialize_distance")]
    pub distance: Distance,
    pub source: String, // e.g., "openmic.us", "eventbrite"
    #[serde(skip)]
    pub event_date: Option<NaiveDate>,
}

impl NormalizedEvent {
    pub fn new(
        venue_name: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            venue_name: venue_name.into(),
            event_name: None,
            city: city.into(),
            state: state.into(),
            address: None,
            day_of_week: None,
            time: None,
            phone: None,
            genre: None,
            details: None,
            url: None,
            lat: None,
            lon: None,
            distance: Distance::Unresolved,
            source: source.into(),
            event_date: None,
        }
    }

    pub fn with_event_name(mut self, name: impl Into<String>) -> Self {
        self.event_name = Some(name.into());
        self
    }

    pub fn with_address(mut self, address: Option<String>) -> Self {
        self.address = address;
        self
    }

    pub fn with_day(mut self, day: Option<String>) -> Self {
        self.day_of_week = day;
        self
    }

    pub fn with_time(mut self, time: Option<String>) -> Self {
        self.time = time;
        self
    }

    pub fn with_phone(mut self, phone: Option<String>) -> Self {
        self.phone = phone;
        self
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
    }

    pub fn with_event_date(mut self, date: Option<NaiveDate>) -> Self {
        self.event_date = date;
        self
    }

    /// Coordinates reported by the source itself (structured geo data).
    pub fn with_coords(mut self, lat: Option<f64>, lon: Option<f64>) -> Self {
        self.lat = lat;
        self.lon = lon;
        self
    }

    /// Coordinates carried by the record, only when both halves are present and valid.
    pub fn coords(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) if valid_point(lat, lon) => Some((lat, lon)),
            _ => None,
        }
    }

    /// Consume the record and return the geo-enriched copy. An unplaced record
    /// drops any partial or invalid source coordinates.
    pub(crate) fn into_located(mut self, coords: Option<(f64, f64)>, distance: Distance) -> Self {
        self.lat = coords.map(|(lat, _)| lat);
        self.lon = coords.map(|(_, lon)| lon);
        self.distance = distance;
        self
    }
}

/// Recoverable failure of a single (source, city) fetch.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("parse failed: {0}")]
    Parse(String),

    #[error("timed out before the run deadline")]
    Timeout,

    #[error("worker task failed: {0}")]
    Task(String),
}

impl SourceError {
    pub fn fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        SourceError::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::Fetch { .. } => "fetch",
            SourceError::Parse(_) => "parse",
            SourceError::Timeout => "timeout",
            SourceError::Task(_) => "task",
        }
    }
}

/// A listing source. Implementations keep every fetch/parse failure inside
/// the returned `Result`; they must not panic on bad input.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable source identifier, used for provenance and per-city gating.
    fn id(&self) -> &'static str;

    async fn scrape(&self, city: &str, state: &str) -> Result<Vec<NormalizedEvent>, SourceError>;
}
