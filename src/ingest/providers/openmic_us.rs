// src/ingest/providers/openmic_us.rs
//! openmic.us network: one site per city, seven per-weekday listing fragments.

use async_trait::async_trait;
use metrics::histogram;
use once_cell::sync::OnceCell;
use scraper::{Html, Selector};
use std::sync::Arc;

use super::{element_text, PageFetcher};
use crate::ingest::config::{FilterMode, OpenMicUsConfig};
use crate::ingest::text::{area_code, parse_address, parse_phone, re_time};
use crate::ingest::types::{NormalizedEvent, SourceAdapter, SourceError};

pub const SOURCE_ID: &str = "openmic.us";

/// (endpoint day number, container id, weekday)
const DAYS: [(u8, &str, &str); 7] = [
    (1, "mondiv", "Monday"),
    (2, "tuediv", "Tuesday"),
    (3, "weddiv", "Wednesday"),
    (4, "thudiv", "Thursday"),
    (5, "fridiv", "Friday"),
    (6, "satdiv", "Saturday"),
    (7, "sundiv", "Sunday"),
];

// Navigation/junk items that look like listings.
const SKIP_NAMES: &[&str] = &[
    "home",
    "austin",
    "open mic austin",
    "beatbuddy",
    "albuquerque",
    "alaska",
    "auckland, new zealand",
    "related links:",
    "traveling?",
    "open mics by u.s. cities:",
    "open mics by u.s. states:",
    "open mics by international cities:",
    "paid gigs for party bands",
    "corporate event bands, solo musicians, and djs",
];

fn sel(cell: &'static OnceCell<Selector>, css: &str) -> &'static Selector {
    cell.get_or_init(|| Selector::parse(css).unwrap())
}

pub struct OpenMicUsAdapter {
    fetcher: Arc<dyn PageFetcher>,
    cfg: OpenMicUsConfig,
}

impl OpenMicUsAdapter {
    pub fn new(fetcher: Arc<dyn PageFetcher>, cfg: OpenMicUsConfig) -> Self {
        Self { fetcher, cfg }
    }

    /// Base URL and state for a city: configured site, else the `openmic<city>.com` convention.
    pub fn site_for(&self, city: &str) -> (String, String) {
        let key = site_key(city);
        match self.cfg.sites.get(&key) {
            Some(site) => (site.url.trim_end_matches('/').to_string(), site.state.clone()),
            None => (format!("https://www.openmic{key}.com"), String::new()),
        }
    }

    pub fn day_url(base: &str, day_num: u8, day_div: &str) -> String {
        format!("{base}/events/frontlisting/{day_num}/{day_div}/1-2-3")
    }

    /// Parse one weekday fragment into events. Venue names are unique per fragment.
    pub fn parse_listings(&self, html: &str, city: &str, state: &str, day: &str) -> Vec<NormalizedEvent> {
        static CONTAINERS: OnceCell<Selector> = OnceCell::new();
        static BOLD: OnceCell<Selector> = OnceCell::new();
        static LINK: OnceCell<Selector> = OnceCell::new();

        let doc = Html::parse_document(html);
        let mut out: Vec<NormalizedEvent> = Vec::new();

        for container in doc.select(sel(&CONTAINERS, "div, tr, td")) {
            let text = element_text(&container);

            // A listing always carries a time.
            let Some(time) = re_time().find(&text).map(|m| m.as_str().to_string()) else {
                continue;
            };

            let mut venue = container
                .select(sel(&BOLD, "strong, b"))
                .next()
                .map(|el| element_text(&el))
                .unwrap_or_default();
            if venue.is_empty() {
                venue = container
                    .select(sel(&LINK, "a"))
                    .next()
                    .map(|el| element_text(&el))
                    .unwrap_or_default();
            }
            if venue.chars().count() < 3 {
                continue;
            }

            let lowered = venue.to_lowercase();
            if SKIP_NAMES.contains(&lowered.as_str()) || self.cfg.sites.contains_key(&lowered) {
                continue;
            }

            if out.iter().any(|e| e.venue_name == venue) {
                continue;
            }

            out.push(
                NormalizedEvent::new(venue, city, state, SOURCE_ID)
                    .with_address(parse_address(&text))
                    .with_day(Some(day.to_string()))
                    .with_time(Some(time))
                    .with_phone(parse_phone(&text)),
            );
        }

        out
    }

    fn is_local(&self, phone: Option<&str>) -> bool {
        if self.cfg.filter_mode != FilterMode::AreaCode || self.cfg.local_area_codes.is_empty() {
            return true;
        }
        phone
            .and_then(area_code)
            .is_some_and(|code| self.cfg.local_area_codes.iter().any(|c| c.trim() == code))
    }
}

#[async_trait]
impl SourceAdapter for OpenMicUsAdapter {
    fn id(&self) -> &'static str {
        SOURCE_ID
    }

    async fn scrape(&self, city: &str, state: &str) -> Result<Vec<NormalizedEvent>, SourceError> {
        let (base, site_state) = self.site_for(city);
        let state = if site_state.is_empty() { state } else { site_state.as_str() };
        let city_name = title_case(city);

        tracing::info!(source = SOURCE_ID, city = %city_name, %base, "scraping");

        let mut events = Vec::new();
        let mut first_err: Option<SourceError> = None;
        let mut pages_ok = 0usize;

        for (day_num, day_div, day_name) in DAYS {
            let url = Self::day_url(&base, day_num, day_div);
            let body = match self.fetcher.fetch(&url).await {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(source = SOURCE_ID, %url, error = %e, "day listing unavailable");
                    first_err.get_or_insert(e);
                    continue;
                }
            };
            pages_ok += 1;

            let t0 = std::time::Instant::now();
            events.extend(self.parse_listings(&body, &city_name, state, day_name));
            histogram!("scrape_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        }

        if pages_ok == 0 {
            if let Some(e) = first_err {
                return Err(e);
            }
        }

        let before = events.len();
        events.retain(|e| self.is_local(e.phone.as_deref()));
        let dropped = before - events.len();
        if dropped > 0 {
            tracing::debug!(source = SOURCE_ID, dropped, "filtered non-local area codes");
        }

        Ok(events)
    }
}

fn site_key(city: &str) -> String {
    city.to_lowercase().replace(' ', "")
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|w| {
            let mut cs = w.chars();
            match cs.next() {
                Some(f) => f.to_uppercase().chain(cs.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
