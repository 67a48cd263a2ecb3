// src/ingest/providers/eventbrite.rs
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use metrics::histogram;
use once_cell::sync::OnceCell;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::sync::Arc;

use super::{class_matches, element_text, PageFetcher};
use crate::ingest::clean_text;
use crate::ingest::text::parse_time;
use crate::ingest::types::{NormalizedEvent, SourceAdapter, SourceError};

pub const SOURCE_ID: &str = "eventbrite";
pub const BASE_URL: &str = "https://www.eventbrite.com";

/// Event names containing one of these count as open mic style events.
const OPEN_MIC_KEYWORDS: &[&str] = &[
    "open mic",
    "open-mic",
    "openmic",
    "poetry slam",
    "spoken word",
    "comedy night",
    "songwriter night",
    "acoustic night",
    "jam session",
    "karaoke",
    "talent show",
    "open stage",
];

pub fn is_open_mic_event(name: &str) -> bool {
    let lower = name.to_lowercase();
    OPEN_MIC_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

fn cached_selector(cell: &'static OnceCell<Selector>, css: &str) -> &'static Selector {
    cell.get_or_init(|| Selector::parse(css).unwrap())
}

fn cached_regex(cell: &'static OnceCell<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).unwrap())
}

pub struct EventbriteAdapter {
    fetcher: Arc<dyn PageFetcher>,
}

impl EventbriteAdapter {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    /// `/d/<state>--<city-with-dashes>/<query>/`
    pub fn search_url(city: &str, state: &str) -> String {
        format!(
            "{BASE_URL}/d/{}--{}/open-mic/",
            state.to_lowercase(),
            city.to_lowercase().replace(' ', "-")
        )
    }

    /// Cards and JSON-LD, concatenated; the bare link scan only when both came up empty.
    pub fn parse_search_page(html: &str, city: &str, state: &str) -> Vec<NormalizedEvent> {
        static DIVS: OnceCell<Selector> = OnceCell::new();
        static LD_JSON: OnceCell<Selector> = OnceCell::new();
        static CARD_CLASS: OnceCell<Regex> = OnceCell::new();

        let doc = Html::parse_document(html);
        let card_re = cached_regex(&CARD_CLASS, r"(?i)event-card|search-event-card");

        let mut events: Vec<NormalizedEvent> = doc
            .select(cached_selector(&DIVS, "div"))
            .filter(|d| class_matches(d, card_re))
            .filter_map(|card| parse_event_card(&card, city, state))
            .collect();

        for script in doc.select(cached_selector(&LD_JSON, r#"script[type="application/ld+json"]"#)) {
            let raw: String = script.text().collect();
            let data: Value = match serde_json::from_str(&raw) {
                Ok(v) => v,
                Err(e) => {
                    tracing::debug!(source = SOURCE_ID, error = %e, "skipping malformed json-ld");
                    continue;
                }
            };
            match data {
                Value::Array(items) => events.extend(
                    items
                        .iter()
                        .filter_map(|it| parse_jsonld_event(it, city, state)),
                ),
                other => events.extend(parse_jsonld_event(&other, city, state)),
            }
        }

        if events.is_empty() {
            events = parse_event_links(&doc, city, state);
        }
        events
    }
}

#[async_trait]
impl SourceAdapter for EventbriteAdapter {
    fn id(&self) -> &'static str {
        SOURCE_ID
    }

    async fn scrape(&self, city: &str, state: &str) -> Result<Vec<NormalizedEvent>, SourceError> {
        let url = Self::search_url(city, state);
        tracing::info!(source = SOURCE_ID, city, state, %url, "searching");

        let body = self.fetcher.fetch(&url).await?;

        let t0 = std::time::Instant::now();
        let events = Self::parse_search_page(&body, city, state);
        histogram!("scrape_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(events)
    }
}

/// First descendant of `el` (any tag) with a class matching `re`.
fn find_by_class<'a>(el: &ElementRef<'a>, re: &Regex) -> Option<ElementRef<'a>> {
    static ANY: OnceCell<Selector> = OnceCell::new();
    el.select(cached_selector(&ANY, "*")).find(|d| class_matches(d, re))
}

fn absolute_url(href: &str) -> Option<String> {
    if href.starts_with('/') {
        Some(format!("{BASE_URL}{href}"))
    } else if href.starts_with("http") {
        Some(href.to_string())
    } else {
        None
    }
}

fn weekday_from_abbrev(text: &str) -> Option<String> {
    static DAY: OnceCell<Regex> = OnceCell::new();
    let caps = cached_regex(&DAY, r"(?i)(Mon|Tue|Wed|Thu|Fri|Sat|Sun)").captures(text)?;
    let day = match caps[1].to_lowercase().as_str() {
        "mon" => "Monday",
        "tue" => "Tuesday",
        "wed" => "Wednesday",
        "thu" => "Thursday",
        "fri" => "Friday",
        "sat" => "Saturday",
        "sun" => "Sunday",
        _ => return None,
    };
    Some(day.to_string())
}

fn parse_event_card(card: &ElementRef<'_>, city: &str, state: &str) -> Option<NormalizedEvent> {
    static HEADINGS_OR_LINKS: OnceCell<Selector> = OnceCell::new();
    static HEADINGS: OnceCell<Selector> = OnceCell::new();
    static HREF: OnceCell<Selector> = OnceCell::new();
    static TITLE_CLASS: OnceCell<Regex> = OnceCell::new();
    static VENUE_CLASS: OnceCell<Regex> = OnceCell::new();
    static DATE_CLASS: OnceCell<Regex> = OnceCell::new();
    static ADDRESS_CLASS: OnceCell<Regex> = OnceCell::new();

    let title_re = cached_regex(&TITLE_CLASS, r"(?i)event-title|card-title");
    let name_el = card
        .select(cached_selector(&HEADINGS_OR_LINKS, "h2, h3, a"))
        .find(|el| class_matches(el, title_re))
        .or_else(|| card.select(cached_selector(&HEADINGS, "h2, h3")).next())?;

    let event_name = element_text(&name_el);
    if event_name.chars().count() < 3 || !is_open_mic_event(&event_name) {
        return None;
    }

    let url = card
        .select(cached_selector(&HREF, "a[href]"))
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(absolute_url);

    let venue_name = find_by_class(card, cached_regex(&VENUE_CLASS, r"(?i)venue|location"))
        .map(|el| element_text(&el))
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| event_name.clone());

    let (time, day) = match find_by_class(card, cached_regex(&DATE_CLASS, r"(?i)date|time|when")) {
        Some(el) => {
            let text = element_text(&el);
            (parse_time(&text), weekday_from_abbrev(&text))
        }
        None => (None, None),
    };

    let address = find_by_class(card, cached_regex(&ADDRESS_CLASS, r"(?i)address|location-address"))
        .map(|el| element_text(&el))
        .filter(|a| !a.is_empty());

    Some(
        NormalizedEvent::new(venue_name, city, state, SOURCE_ID)
            .with_event_name(event_name)
            .with_day(day)
            .with_time(time)
            .with_address(address)
            .with_url(url),
    )
}

/// Start time parsed from `startDate`: wall-clock time ("7:00 PM"), weekday, date.
pub fn parse_start_date(raw: &str) -> Option<(String, String, NaiveDate)> {
    let naive = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_local())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .or_else(|_| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
        })
        .ok()?;

    let time = naive.format("%I:%M %p").to_string();
    let time = time.trim_start_matches('0').to_string();
    let day = naive.format("%A").to_string();
    Some((time, day, naive.date()))
}

/// Finite number within `limit` degrees; "NaN" and "inf" strings are rejected.
fn coordinate(v: Option<&Value>, limit: f64) -> Option<f64> {
    let x = match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    Some(x).filter(|x| x.is_finite() && x.abs() <= limit)
}

fn parse_jsonld_event(data: &Value, city: &str, state: &str) -> Option<NormalizedEvent> {
    if data.get("@type").and_then(Value::as_str) != Some("Event") {
        return None;
    }
    // JSON-LD strings often carry HTML entities.
    let event_name = clean_text(data.get("name").and_then(Value::as_str).unwrap_or_default());
    if event_name.is_empty() || !is_open_mic_event(&event_name) {
        return None;
    }

    let location = data.get("location");
    let venue_name = location
        .and_then(|l| l.get("name"))
        .and_then(Value::as_str)
        .map(clean_text)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| event_name.clone());

    let address = match location.and_then(|l| l.get("address")) {
        Some(Value::Object(parts)) => {
            let joined = ["streetAddress", "addressLocality", "addressRegion", "postalCode"]
                .iter()
                .filter_map(|k| parts.get(*k).and_then(Value::as_str))
                .filter(|p| !p.is_empty())
                .collect::<Vec<_>>()
                .join(", ");
            Some(joined).filter(|a| !a.is_empty())
        }
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    };

    let geo = location.and_then(|l| l.get("geo"));
    let lat = coordinate(geo.and_then(|g| g.get("latitude")), 90.0);
    let lon = coordinate(geo.and_then(|g| g.get("longitude")), 180.0);

    let (time, day, date) = match data
        .get("startDate")
        .and_then(Value::as_str)
        .and_then(parse_start_date)
    {
        Some((t, d, dt)) => (Some(t), Some(d), Some(dt)),
        None => (None, None, None),
    };

    let url = data.get("url").and_then(Value::as_str).map(str::to_string);

    Some(
        NormalizedEvent::new(venue_name, city, state, SOURCE_ID)
            .with_event_name(event_name)
            .with_address(address)
            .with_day(day)
            .with_time(time)
            .with_event_date(date)
            .with_url(url)
            .with_coords(lat, lon),
    )
}

fn parse_event_links(doc: &Html, city: &str, state: &str) -> Vec<NormalizedEvent> {
    static LINKS: OnceCell<Selector> = OnceCell::new();
    static EVENT_PATH: OnceCell<Regex> = OnceCell::new();
    let path_re = cached_regex(&EVENT_PATH, r"(?i)/e/");

    let mut out = Vec::new();
    for link in doc.select(cached_selector(&LINKS, "a[href]")) {
        let href = link.value().attr("href").unwrap_or_default();
        if !path_re.is_match(href) {
            continue;
        }
        let event_name = element_text(&link);
        if event_name.chars().count() < 5 || !is_open_mic_event(&event_name) {
            continue;
        }

        let url = if href.starts_with("http") {
            href.to_string()
        } else {
            format!("{BASE_URL}{href}")
        };

        let time = link
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| matches!(el.value().name(), "div" | "li" | "article"))
            .and_then(|parent| parse_time(&element_text(&parent)));

        out.push(
            NormalizedEvent::new(event_name.clone(), city, state, SOURCE_ID)
                .with_event_name(event_name)
                .with_time(time)
                .with_url(Some(url)),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_url_shape() {
        assert_eq!(
            EventbriteAdapter::search_url("Panama City", "FL"),
            "https://www.eventbrite.com/d/fl--panama-city/open-mic/"
        );
    }

    #[test]
    fn keyword_gate() {
        assert!(is_open_mic_event("Tuesday OPEN MIC at the Bowery"));
        assert!(is_open_mic_event("Karaoke & Wings"));
        assert!(!is_open_mic_event("Wine tasting"));
    }

    #[test]
    fn start_date_variants() {
        let (t, d, date) = parse_start_date("2025-05-02T19:00:00-04:00").unwrap();
        assert_eq!(t, "7:00 PM");
        assert_eq!(d, "Friday");
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 5, 2).unwrap());

        let (t, d, _) = parse_start_date("2025-05-03T20:30:00").unwrap();
        assert_eq!((t.as_str(), d.as_str()), ("8:30 PM", "Saturday"));

        assert!(parse_start_date("next friday").is_none());
    }

    #[test]
    fn jsonld_coordinates_accept_strings() {
        let v: Value = serde_json::json!({
            "@type": "Event",
            "name": "Open Mic Night",
            "location": {
                "name": "Bark Bar",
                "address": {"streetAddress": "1 Elm St", "addressLocality": "Tallahassee", "addressRegion": "FL"},
                "geo": {"latitude": "30.44", "longitude": -84.28}
            }
        });
        let e = parse_jsonld_event(&v, "Tallahassee", "FL").unwrap();
        assert_eq!(e.venue_name, "Bark Bar");
        assert_eq!(e.address.as_deref(), Some("1 Elm St, Tallahassee, FL"));
        assert_eq!(e.coords(), Some((30.44, -84.28)));
    }

    #[test]
    fn jsonld_non_finite_or_out_of_range_coordinates_ignored() {
        for (lat, lon) in [("NaN", "-84.28"), ("30.44", "inf"), ("95.0", "-84.28")] {
            let v = serde_json::json!({
                "@type": "Event",
                "name": "Open Mic Night",
                "location": {"name": "Bark Bar", "geo": {"latitude": lat, "longitude": lon}}
            });
            let e = parse_jsonld_event(&v, "Tallahassee", "FL").unwrap();
            assert_eq!(e.coords(), None, "{lat}, {lon}");
        }
    }

    #[test]
    fn jsonld_entities_are_decoded() {
        let v = serde_json::json!({
            "@type": "Event",
            "name": "Open Mic &amp; Poetry",
            "location": {"name": "Joe&#39;s Bar"}
        });
        let e = parse_jsonld_event(&v, "X", "YY").unwrap();
        assert_eq!(e.event_name.as_deref(), Some("Open Mic & Poetry"));
        assert_eq!(e.venue_name, "Joe's Bar");
    }

    #[test]
    fn jsonld_other_types_ignored() {
        let v = serde_json::json!({"@type": "Organization", "name": "Open Mic Co"});
        assert!(parse_jsonld_event(&v, "X", "YY").is_none());
    }
}
