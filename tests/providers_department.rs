// tests/providers_department.rs
use fire_incident_monitor::ingest::providers::department_rss::DepartmentFeedAdapter;
use fire_incident_monitor::ingest::types::{AdapterKind, FetchQuery, SourceAdapter};
use std::fs;

fn lafd() -> DepartmentFeedAdapter {
    let xml = fs::read_to_string("tests/fixtures/lafd_rss.xml").expect("fixture");
    DepartmentFeedAdapter::from_fixture("Los Angeles", &xml)
}

#[tokio::test]
async fn parses_lafd_fixture() {
    let a = lafd();
    assert_eq!(a.kind(), AdapterKind::Department);
    assert_eq!(a.name(), "Los Angeles Fire Department");

    let recs = a.fetch(&FetchQuery::fire("Los Angeles")).await.expect("ok");
    assert_eq!(recs.len(), 3);
    assert!(recs.iter().all(|r| r.source_name == "Los Angeles Fire Department"));
    assert!(recs.iter().all(|r| r.origin_location == "Los Angeles"));
    assert!(recs.iter().all(|r| r.link.starts_with("https://www.lafd.org/alert/")));

    let first = &recs[0];
    assert_eq!(first.title, "Major Emergency Structure Fire - Boyle Heights");
    assert_eq!(first.published_at.to_rfc3339(), "2025-01-08T14:30:00+00:00");
    // escaped markup in the description is stripped
    assert!(first.raw_text.starts_with("Multiple alarm response"));
    assert!(!first.raw_text.contains('<'));
}

#[tokio::test]
async fn undated_items_are_stamped_at_fetch_time() {
    let before = chrono::Utc::now();
    let recs = lafd().fetch(&FetchQuery::fire("Los Angeles")).await.expect("ok");
    let van_nuys = recs
        .iter()
        .find(|r| r.title == "Vehicle Fire - Van Nuys")
        .expect("third item");
    assert!(van_nuys.published_at >= before);
}

#[tokio::test]
async fn other_cities_get_nothing() {
    let recs = lafd().fetch(&FetchQuery::fire("Pasadena")).await.expect("ok");
    assert!(recs.is_empty());
}
