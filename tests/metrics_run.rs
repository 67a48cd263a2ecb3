// tests/metrics_run.rs
#![cfg(feature = "strict-metrics")]
use metrics_exporter_prometheus::PrometheusBuilder;
use openmic_aggregator::{
    Aggregator, CityCoordinateTable, CityTarget, EventbriteAdapter, GeoResolver, ReferencePoint,
    SearchRequest, StaticPages,
};
use std::sync::Arc;

#[tokio::test]
async fn metrics_exposed_after_run() {
    // Install a local recorder for the test
    let handle = PrometheusBuilder::new().install_recorder().expect("recorder");

    let html = std::fs::read_to_string("tests/fixtures/eventbrite_search.html").expect("fixture");
    let pages = StaticPages::new().with_page(EventbriteAdapter::search_url("Tallahassee", "FL"), html);
    let table = CityCoordinateTable::load_from(std::path::Path::new("config/city_coords.toml"))
        .expect("city table");

    let a = Aggregator::new(
        vec![Arc::new(EventbriteAdapter::new(Arc::new(pages)))],
        GeoResolver::new(Arc::new(table)),
    );
    let req = SearchRequest {
        cities: vec![CityTarget::new("Tallahassee", "FL"), CityTarget::new("Austin", "TX")],
        max_distance_miles: 100.0,
        reference_point: Some(ReferencePoint {
            lat: 30.9038,
            lon: -84.5755,
        }),
    };
    let report = a.run(&req).await;
    assert_eq!(report.failures.len(), 1);

    // Scrape metrics text and check series presence by substring
    let out = handle.render();
    for name in [
        "aggregate_pairs_total",
        "aggregate_source_errors_total",
        "aggregate_events_total",
        "aggregate_dedup_total",
        "aggregate_filtered_total",
        "aggregate_unknown_distance_total",
        "aggregate_last_run_ts",
        "scrape_parse_ms",
    ] {
        assert!(out.contains(name), "missing {name}");
    }
}
