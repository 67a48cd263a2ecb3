// src/ingest/mod.rs
pub mod config;
pub mod providers;
pub mod text;
pub mod types;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

pub use types::{Distance, NormalizedEvent, SourceAdapter, SourceError};

/// One-time metrics registration (so series carry descriptions once a recorder exists).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "aggregate_pairs_total",
            "(source, city) fetches started by the aggregator."
        );
        describe_counter!(
            "aggregate_source_errors_total",
            "Source fetch/parse/timeout failures."
        );
        describe_counter!(
            "aggregate_events_total",
            "Events collected from sources before dedup."
        );
        describe_counter!("aggregate_dedup_total", "Events dropped as duplicates.");
        describe_counter!(
            "aggregate_filtered_total",
            "Events dropped by the distance filter."
        );
        describe_counter!(
            "aggregate_unknown_distance_total",
            "Events whose location could not be resolved."
        );
        describe_histogram!("scrape_parse_ms", "Listing parse time in milliseconds.");
        describe_gauge!(
            "aggregate_last_run_ts",
            "Unix ts when the aggregator last finished a run."
        );
    });
}

/// Normalize scraped text: decode entities, strip tags, collapse whitespace, trim.
pub fn clean_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip stray HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Collapse whitespace (incl. the nbsp produced by step 1)
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"[\s\u{00A0}]+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();

    out.trim().to_string()
}

/// Case-insensitive membership of a source id in a configured list.
pub fn source_listed<S: AsRef<str>>(source: S, list: &[String]) -> bool {
    let s = source.as_ref();
    list.iter().any(|w| w.trim().eq_ignore_ascii_case(s))
}
