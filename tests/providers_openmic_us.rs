// tests/providers_openmic_us.rs
use openmic_aggregator::ingest::config::{FilterMode, OpenMicUsConfig, SiteConfig};
use openmic_aggregator::ingest::providers::openmic_us::SOURCE_ID;
use openmic_aggregator::{OpenMicUsAdapter, SourceAdapter, StaticPages};
use std::sync::Arc;

const BASE: &str = "https://www.openmictallahassee.com";

fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{name}")).expect("fixture")
}

fn tallahassee_cfg() -> OpenMicUsConfig {
    let mut cfg = OpenMicUsConfig::default();
    cfg.sites.insert(
        "tallahassee".into(),
        SiteConfig {
            url: BASE.into(),
            state: "FL".into(),
        },
    );
    cfg
}

fn pages() -> StaticPages {
    StaticPages::new()
        .with_page(
            OpenMicUsAdapter::day_url(BASE, 1, "mondiv"),
            fixture("openmic_us_monday.html"),
        )
        .with_page(
            OpenMicUsAdapter::day_url(BASE, 5, "fridiv"),
            fixture("openmic_us_friday.html"),
        )
}

#[test]
fn day_urls_follow_frontlisting_layout() {
    assert_eq!(
        OpenMicUsAdapter::day_url(BASE, 3, "weddiv"),
        "https://www.openmictallahassee.com/events/frontlisting/3/weddiv/1-2-3"
    );
}

#[tokio::test]
async fn missing_days_are_skipped() {
    let a = OpenMicUsAdapter::new(Arc::new(pages()), tallahassee_cfg());
    let evs = a.scrape("tallahassee", "").await.unwrap();

    let got: Vec<(&str, &str)> = evs
        .iter()
        .map(|e| (e.venue_name.as_str(), e.day_of_week.as_deref().unwrap_or("")))
        .collect();
    assert_eq!(
        got,
        vec![
            ("Blue Tavern", "Monday"),
            ("Wells Brothers", "Monday"),
            ("Blue Tavern", "Friday"),
        ]
    );

    for e in &evs {
        assert_eq!(e.city, "Tallahassee");
        assert_eq!(e.state, "FL");
        assert_eq!(e.source, SOURCE_ID);
    }
    assert_eq!(
        evs[0].address.as_deref(),
        Some("1206 N Monroe St, Tallahassee, FL 32303")
    );
    assert_eq!(evs[1].time.as_deref(), Some("7pm"));
    assert_eq!(evs[1].phone.as_deref(), Some("229-555-0199"));
}

#[tokio::test]
async fn area_code_filter_drops_non_local() {
    let mut cfg = tallahassee_cfg();
    cfg.filter_mode = FilterMode::AreaCode;
    cfg.local_area_codes = vec!["229".into()];

    let a = OpenMicUsAdapter::new(Arc::new(pages()), cfg);
    let evs = a.scrape("Tallahassee", "FL").await.unwrap();
    assert_eq!(evs.len(), 1);
    assert_eq!(evs[0].venue_name, "Wells Brothers");
}

#[tokio::test]
async fn every_day_failing_is_an_error() {
    let a = OpenMicUsAdapter::new(Arc::new(StaticPages::new()), tallahassee_cfg());
    let err = a.scrape("Tallahassee", "FL").await.unwrap_err();
    assert_eq!(err.kind(), "fetch");
}

#[tokio::test]
async fn unconfigured_city_uses_requested_state() {
    let base = "https://www.openmicaustin.com";
    let pages = StaticPages::new().with_page(
        OpenMicUsAdapter::day_url(base, 5, "fridiv"),
        fixture("openmic_us_friday.html"),
    );
    let a = OpenMicUsAdapter::new(Arc::new(pages), OpenMicUsConfig::default());
    let evs = a.scrape("austin", "TX").await.unwrap();
    assert_eq!(evs.len(), 1);
    assert_eq!(evs[0].city, "Austin");
    assert_eq!(evs[0].state, "TX");
}
