// src/geo/table.rs
//! Static (city, state) → coordinates table, loaded once from TOML or JSON.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CITY_COORDS_PATH: &str = "OPENMIC_CITY_COORDS_PATH";

#[derive(Debug, Clone, Deserialize)]
pub struct CityEntry {
    pub city: String,
    pub state: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Deserialize)]
struct TableFile {
    #[serde(default)]
    cities: Vec<CityEntry>,
}

/// Read-only after construction; lookups are case-insensitive and trimmed.
#[derive(Debug, Clone, Default)]
pub struct CityCoordinateTable {
    entries: HashMap<(String, String), (f64, f64)>,
}

fn key(city: &str, state: &str) -> (String, String) {
    (city.trim().to_lowercase(), state.trim().to_lowercase())
}

impl CityCoordinateTable {
    pub fn from_entries<I: IntoIterator<Item = CityEntry>>(entries: I) -> Self {
        let entries = entries
            .into_iter()
            .filter(|e| {
                let ok = super::valid_point(e.lat, e.lon);
                if !ok {
                    tracing::warn!(city = %e.city, state = %e.state, "skipping city with invalid coordinates");
                }
                ok
            })
            .map(|e| (key(&e.city, &e.state), (e.lat, e.lon)))
            .collect();
        Self { entries }
    }

    pub fn lookup(&self, city: &str, state: &str) -> Option<(f64, f64)> {
        self.entries.get(&key(city, state)).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load from an explicit path (`.toml`, `.json`, or sniffed).
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading city table from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let entries = parse_table(&content, &ext)
            .with_context(|| format!("parsing city table {}", path.display()))?;
        Ok(Self::from_entries(entries))
    }

    /// Resolution order:
    /// 1) `explicit` (from config)
    /// 2) $OPENMIC_CITY_COORDS_PATH
    /// 3) config/city_coords.toml
    /// 4) config/city_coords.json
    ///
    /// Nothing found → empty table (only source-provided coordinates will resolve).
    pub fn load_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(p) = explicit {
            return Self::load_from(p);
        }
        if let Ok(p) = std::env::var(ENV_CITY_COORDS_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            } else {
                return Err(anyhow!("{ENV_CITY_COORDS_PATH} points to non-existent path"));
            }
        }
        for p in ["config/city_coords.toml", "config/city_coords.json"] {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        tracing::warn!("no city coordinate table found; distances rely on source coordinates");
        Ok(Self::default())
    }
}

fn parse_table(s: &str, hint_ext: &str) -> Result<Vec<CityEntry>> {
    let is_json = hint_ext == "json" || (hint_ext != "toml" && s.trim_start().starts_with(['{', '[']));
    if !is_json {
        let t: TableFile = toml::from_str(s)?;
        return Ok(t.cities);
    }
    // JSON: either {"cities": [...]} or a bare array.
    if s.trim_start().starts_with('[') {
        Ok(serde_json::from_str(s)?)
    } else {
        let t: TableFile = serde_json::from_str(s)?;
        Ok(t.cities)
    }
}
