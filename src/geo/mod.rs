// src/geo/mod.rs
//! Location resolution and distance filtering.
//!
//! Coordinates are taken from the best available source, first match wins:
//! the record itself, the (city, state) table, then a "City, ST" fragment of
//! the free-text address. Records that cannot be placed are kept with an
//! unknown distance and sorted after every placed record.

pub mod table;

use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use std::cmp::Ordering;
use std::sync::Arc;

use crate::ingest::types::{Distance, NormalizedEvent};

pub use table::{CityCoordinateTable, CityEntry};

pub const EARTH_RADIUS_MILES: f64 = 3959.0;

/// Great-circle distance in miles (haversine).
pub fn haversine_miles(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_MILES * c
}

/// Finite latitude in [-90, 90] and longitude in [-180, 180].
pub fn valid_point(lat: f64, lon: f64) -> bool {
    lat.is_finite() && lon.is_finite() && lat.abs() <= 90.0 && lon.abs() <= 180.0
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Pull a ("City", "ST") pair out of free text like "12 Oak St, Albany, GA 31701".
pub fn extract_city_state(address: &str) -> Option<(String, String)> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| Regex::new(r"([A-Za-z\s]+),\s*([A-Z]{2})\s*\d*").unwrap());
    let caps = re.captures(address)?;
    let city = caps[1].trim();
    if city.is_empty() {
        return None;
    }
    Some((city.to_string(), caps[2].to_string()))
}

#[derive(Debug, Clone)]
pub struct GeoResolver {
    table: Arc<CityCoordinateTable>,
}

impl GeoResolver {
    pub fn new(table: Arc<CityCoordinateTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &CityCoordinateTable {
        &self.table
    }

    /// Best available coordinates for an event, or `None` if it cannot be placed.
    pub fn locate(&self, event: &NormalizedEvent) -> Option<(f64, f64)> {
        event
            .coords()
            .or_else(|| self.table.lookup(&event.city, &event.state))
            .or_else(|| {
                let (city, state) = extract_city_state(event.address.as_deref()?)?;
                self.table.lookup(&city, &state)
            })
    }

    /// Place every event relative to (ref_lat, ref_lon), drop known distances
    /// beyond `max_miles`, and sort nearest first with unknowns last.
    pub fn resolve(
        &self,
        events: Vec<NormalizedEvent>,
        ref_lat: f64,
        ref_lon: f64,
        max_miles: f64,
    ) -> Vec<NormalizedEvent> {
        let mut kept = Vec::with_capacity(events.len());
        let mut filtered = 0u64;
        let mut unknown = 0u64;

        for ev in events {
            match self.locate(&ev) {
                Some((lat, lon)) => {
                    let miles = haversine_miles(ref_lat, ref_lon, lat, lon);
                    if !miles.is_finite() {
                        unknown += 1;
                        kept.push(ev.into_located(None, Distance::Unknown));
                    } else if miles <= max_miles {
                        kept.push(ev.into_located(Some((lat, lon)), Distance::Miles(round1(miles))));
                    } else {
                        filtered += 1;
                    }
                }
                None => {
                    unknown += 1;
                    kept.push(ev.into_located(None, Distance::Unknown));
                }
            }
        }

        // Stable: ties and the unknown tail keep input order.
        kept.sort_by(|a, b| match (a.distance.miles(), b.distance.miles()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });

        counter!("aggregate_filtered_total").increment(filtered);
        counter!("aggregate_unknown_distance_total").increment(unknown);
        tracing::debug!(kept = kept.len(), filtered, unknown, max_miles, "distance filter applied");

        kept
    }
}
