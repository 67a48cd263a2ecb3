// src/lib.rs
// Public library surface for the `openmic` binary and integration tests.

pub mod aggregator;
pub mod dedup;
pub mod geo;
pub mod ingest;
pub mod present;

// ---- Re-exports for stable public API ----
pub use crate::aggregator::{
    Aggregator, CityTarget, ReferencePoint, RunReport, SearchRequest, SourceFailure,
};
pub use crate::dedup::{dedupe, DedupKey};
pub use crate::geo::{haversine_miles, CityCoordinateTable, GeoResolver};
pub use crate::ingest::config::AppConfig;
pub use crate::ingest::providers::{EventbriteAdapter, HttpFetcher, OpenMicUsAdapter, PageFetcher, StaticPages};
pub use crate::ingest::types::{Distance, NormalizedEvent, SourceAdapter, SourceError};
pub use crate::present::{render_json, render_text, GroupMode};
