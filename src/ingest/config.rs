// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::aggregator::{CityTarget, ReferencePoint, SearchRequest};

pub const ENV_CONFIG_PATH: &str = "OPENMIC_CONFIG_PATH";

fn default_max_distance() -> f64 {
    100.0
}
fn default_gated_sources() -> Vec<String> {
    vec!["openmic.us".to_string()]
}
fn default_max_concurrency() -> usize {
    4
}
fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct HomeLocation {
    #[serde(default = "default_home_city")]
    pub city: String,
    #[serde(default)]
    pub state: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

fn default_home_city() -> String {
    "home".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    pub url: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    #[default]
    None,
    AreaCode,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct OpenMicUsConfig {
    /// Keyed by city lowercased with spaces removed, e.g. "panamacity".
    #[serde(default)]
    pub sites: HashMap<String, SiteConfig>,
    #[serde(default)]
    pub filter_mode: FilterMode,
    #[serde(default)]
    pub local_area_codes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct EventbriteConfig {
    #[serde(default)]
    pub session_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub home_location: Option<HomeLocation>,
    #[serde(default = "default_max_distance")]
    pub max_distance_miles: f64,
    #[serde(default)]
    pub search_cities: Vec<CityTarget>,
    /// Sources queried only for cities whose `enabled_sources` names them.
    #[serde(default = "default_gated_sources")]
    pub gated_sources: Vec<String>,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub run_timeout_secs: Option<u64>,
    #[serde(default)]
    pub city_coords_path: Option<PathBuf>,
    #[serde(default)]
    pub openmic_us: OpenMicUsConfig,
    #[serde(default)]
    pub eventbrite: EventbriteConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            home_location: None,
            max_distance_miles: default_max_distance(),
            search_cities: Vec::new(),
            gated_sources: default_gated_sources(),
            max_concurrency: default_max_concurrency(),
            request_timeout_secs: default_request_timeout_secs(),
            run_timeout_secs: None,
            city_coords_path: None,
            openmic_us: OpenMicUsConfig::default(),
            eventbrite: EventbriteConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_config(&content, ext.as_str())
            .with_context(|| format!("parsing config {}", path.display()))
    }

    /// Load using env var + fallbacks:
    /// 1) $OPENMIC_CONFIG_PATH
    /// 2) config/openmic.toml
    /// 3) config/openmic.json
    /// 4) <user config dir>/openmic/config.toml
    ///
    /// Nothing found → built-in defaults.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            } else {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
        }
        for p in fallback_paths() {
            if p.exists() {
                return Self::load_from(&p);
            }
        }
        Ok(Self::default())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }

    /// Configured reference point, when the home location carries coordinates.
    pub fn home_point(&self) -> Option<ReferencePoint> {
        let home = self.home_location.as_ref()?;
        match (home.lat, home.lon) {
            (Some(lat), Some(lon)) => Some(ReferencePoint { lat, lon }),
            _ => None,
        }
    }

    /// Build a request, overlaying caller overrides on configured values.
    /// Fails on an invalid reference point or radius.
    pub fn search_request(
        &self,
        cities: Option<Vec<CityTarget>>,
        max_distance_miles: Option<f64>,
        reference_point: Option<ReferencePoint>,
    ) -> Result<SearchRequest> {
        let req = SearchRequest {
            cities: cities.unwrap_or_else(|| self.search_cities.clone()),
            max_distance_miles: max_distance_miles.unwrap_or(self.max_distance_miles),
            reference_point: reference_point.or_else(|| self.home_point()),
        };
        req.validate().context("invalid search request")?;
        Ok(req)
    }
}

fn fallback_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("config/openmic.toml"),
        PathBuf::from("config/openmic.json"),
    ];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("openmic").join("config.toml"));
    }
    paths
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AppConfig> {
    match hint_ext {
        "toml" => Ok(toml::from_str(s)?),
        "json" => Ok(serde_json::from_str(s)?),
        // Unknown extension: JSON documents start with '{'.
        _ if s.trim_start().starts_with('{') => Ok(serde_json::from_str(s)?),
        _ => Ok(toml::from_str(s)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let cfg = parse_config("", "toml").unwrap();
        assert_eq!(cfg.max_distance_miles, 100.0);
        assert_eq!(cfg.gated_sources, vec!["openmic.us".to_string()]);
        assert_eq!(cfg.max_concurrency, 4);
        assert!(cfg.home_point().is_none());
    }

    #[test]
    fn toml_and_json_agree() {
        let toml = r#"
max_distance_miles = 50
[home_location]
city = "Bainbridge"
state = "GA"
lat = 30.9038
lon = -84.5755
[[search_cities]]
city = "Tallahassee"
state = "FL"
enabled_sources = ["openmic.us"]
[openmic_us]
filter_mode = "area_code"
local_area_codes = ["229", "850"]
[openmic_us.sites.tallahassee]
url = "https://www.openmictallahassee.com"
state = "FL"
"#;
        let json = r#"{
  "max_distance_miles": 50,
  "home_location": {"city": "Bainbridge", "state": "GA", "lat": 30.9038, "lon": -84.5755},
  "search_cities": [{"city": "Tallahassee", "state": "FL", "enabled_sources": ["openmic.us"]}],
  "openmic_us": {
    "filter_mode": "area_code",
    "local_area_codes": ["229", "850"],
    "sites": {"tallahassee": {"url": "https://www.openmictallahassee.com", "state": "FL"}}
  }
}"#;
        for cfg in [parse_config(toml, "toml").unwrap(), parse_config(json, "").unwrap()] {
            assert_eq!(cfg.max_distance_miles, 50.0);
            assert_eq!(cfg.search_cities.len(), 1);
            assert_eq!(cfg.openmic_us.filter_mode, FilterMode::AreaCode);
            assert_eq!(cfg.openmic_us.sites["tallahassee"].state, "FL");
            let home = cfg.home_point().unwrap();
            assert!((home.lat - 30.9038).abs() < 1e-9);
        }
    }

    #[test]
    fn overrides_win_over_config() {
        let mut cfg = AppConfig::default();
        cfg.home_location = Some(HomeLocation {
            city: "Bainbridge".into(),
            state: "GA".into(),
            lat: Some(30.9),
            lon: Some(-84.5),
        });
        let req = cfg
            .search_request(Some(vec![CityTarget::new("Austin", "TX")]), Some(10.0), None)
            .unwrap();
        assert_eq!(req.cities.len(), 1);
        assert_eq!(req.max_distance_miles, 10.0);
        assert_eq!(req.reference_point.unwrap().lat, 30.9);
    }

    #[test]
    fn bad_reference_or_radius_is_rejected() {
        let cfg = AppConfig::default();
        let point = |lat, lon| Some(ReferencePoint { lat, lon });

        assert!(cfg.search_request(None, Some(25.0), point(30.9, -84.5)).is_ok());
        assert!(cfg.search_request(None, Some(0.0), None).is_ok());

        for bad in [point(f64::NAN, -84.5), point(200.0, -84.5), point(30.9, 181.0), point(30.9, f64::INFINITY)] {
            assert!(cfg.search_request(None, Some(25.0), bad).is_err(), "{bad:?}");
        }
        for radius in [f64::NAN, -1.0, f64::INFINITY] {
            assert!(cfg.search_request(None, Some(radius), None).is_err(), "{radius}");
        }
    }

    #[test]
    fn nan_home_location_in_toml_is_rejected() {
        let cfg = parse_config(
            "[home_location]\ncity = \"Bainbridge\"\nlat = nan\nlon = -84.5755\n",
            "toml",
        )
        .unwrap();
        let err = cfg.search_request(None, None, None).unwrap_err();
        assert!(format!("{err:#}").contains("latitude"));

        let far = parse_config("max_distance_miles = -5\n", "toml").unwrap();
        assert!(far.search_request(None, None, None).is_err());
    }

    #[test]
    fn malformed_config_is_an_error() {
        assert!(parse_config("max_distance_miles = \"far\"", "toml").is_err());
    }
}
