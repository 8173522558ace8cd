//! End-to-end tests for feed refresh: relay fallback, parsing, normalization
//! and storing the result.
//!
//! Every relay is a local wiremock server, so no test touches the network.

use job_sources::feed::{FeedRefresher, RelayConfig, RelayFetcher, ERROR_TITLE};
use job_sources::store::SourceStore;
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TARGET: &str = "https://jobs.example.com/feed.xml";

fn refresher(relays: Vec<RelayConfig>) -> FeedRefresher {
    FeedRefresher::new(RelayFetcher::new(reqwest::Client::new(), relays))
}

/// RSS document whose items are dated on the given January 2024 days, in that order.
fn rss_with_days(days: &[u32]) -> String {
    let items: String = days
        .iter()
        .map(|day| {
            format!(
                "<item><title>Job {day}</title><link>https://jobs.example.com/{day}</link>\
                 <pubDate>2024-01-{day:02}T09:00:00Z</pubDate>\
                 <description>Opening number {day}</description></item>"
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Example Jobs</title>{items}</channel></rss>"#
    )
}

const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Rustacean Station</title>
  <entry>
    <title>Senior Rust Engineer</title>
    <link href="https://jobs.example.com/rust"/>
    <updated>2024-03-01T12:00:00Z</updated>
    <summary>Work on async Rust services</summary>
  </entry>
</feed>"#;

// ============================================================================
// Success path
// ============================================================================

#[tokio::test]
async fn test_fifteen_items_come_back_newest_ten() {
    let server = MockServer::start().await;
    let days = [3, 14, 1, 9, 15, 7, 2, 11, 5, 13, 4, 8, 12, 6, 10];
    Mock::given(method("GET"))
        .and(path("/raw"))
        .and(query_param("url", TARGET))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss_with_days(&days)))
        .expect(1)
        .mount(&server)
        .await;

    let refresher = refresher(vec![RelayConfig::raw_text(format!(
        "{}/raw?url=",
        server.uri()
    ))]);
    let result = refresher.refresh("src-1", TARGET).await;

    assert!(!result.is_error());
    assert_eq!(result.source_id, "src-1");
    assert_eq!(result.title, "Example Jobs");
    let titles: Vec<&str> = result.items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["Job 15", "Job 14", "Job 13", "Job 12", "Job 11", "Job 10", "Job 9", "Job 8", "Job 7", "Job 6"]
    );
    assert_eq!(result.items[0].published_at, "2024-01-15T09:00:00Z");
    assert_eq!(result.items[0].summary, "Opening number 15");
    assert!(!refresher.is_loading("src-1"));
}

#[tokio::test]
async fn test_broken_wrapped_relay_falls_back_to_raw_relay() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": {} })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/proxy"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ATOM))
        .expect(1)
        .mount(&server)
        .await;

    let refresher = refresher(vec![
        RelayConfig::wrapped_json(format!("{}/get?url=", server.uri())),
        RelayConfig::raw_text(format!("{}/proxy?quest=", server.uri())),
    ]);
    let result = refresher.refresh("atom", TARGET).await;

    assert_eq!(result.title, "Rustacean Station");
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].link, "https://jobs.example.com/rust");
    assert_eq!(result.items[0].published_at, "2024-03-01T12:00:00Z");
    assert_eq!(result.items[0].summary, "Work on async Rust services");
}

#[tokio::test]
async fn test_wrapped_relay_success_skips_later_relays() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/get"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "contents": rss_with_days(&[1, 2]) })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/proxy"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ATOM))
        .expect(0)
        .mount(&server)
        .await;

    let refresher = refresher(vec![
        RelayConfig::wrapped_json(format!("{}/get?url=", server.uri())),
        RelayConfig::raw_text(format!("{}/proxy?quest=", server.uri())),
    ]);
    let result = refresher.refresh("rss", TARGET).await;

    assert_eq!(result.title, "Example Jobs");
    assert_eq!(result.items.len(), 2);
}

// ============================================================================
// Failure path
// ============================================================================

#[tokio::test]
async fn test_every_relay_failing_reports_last_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/first"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/second"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let refresher = refresher(vec![
        RelayConfig::raw_text(format!("{}/first?url=", server.uri())),
        RelayConfig::raw_text(format!("{}/second?url=", server.uri())),
    ]);
    let result = refresher.refresh("down", TARGET).await;

    assert!(result.is_error());
    assert_eq!(result.title, ERROR_TITLE);
    assert!(result.items.is_empty());
    assert_eq!(result.error_message.as_deref(), Some("HTTP 404"));
    assert!(!refresher.is_loading("down"));
}

#[tokio::test]
async fn test_html_page_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html><body><p>Careers<br></body></html>"),
        )
        .mount(&server)
        .await;

    let refresher = refresher(vec![RelayConfig::raw_text(format!("{}/raw?url=", server.uri()))]);
    let result = refresher.refresh("html", TARGET).await;

    assert_eq!(result.title, ERROR_TITLE);
    assert_eq!(result.error_message.as_deref(), Some("Invalid RSS feed"));
}

// ============================================================================
// Storing results
// ============================================================================

#[tokio::test]
async fn test_refresh_all_results_persist_in_store() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("url", "https://good.example/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss_with_days(&[4, 20])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("url", "https://bad.example/feed"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = std::env::temp_dir().join("job_sources_it_refresh_store");
    let _ = std::fs::remove_dir_all(&dir);
    let data_path = dir.join("sources.json");
    let mut store = SourceStore::open(&data_path).unwrap();
    let good = store
        .add_source("https://good.example/feed", true)
        .unwrap()
        .id
        .clone();
    let bad = store
        .add_source("https://bad.example/feed", true)
        .unwrap()
        .id
        .clone();

    let refresher = refresher(vec![RelayConfig::raw_text(format!("{}/raw?url=", server.uri()))]);
    let targets: Vec<(String, String)> = store
        .sources()
        .iter()
        .map(|s| (s.id.clone(), s.url.clone()))
        .collect();
    let results = refresher
        .refresh_all(targets.iter().map(|(id, url)| (id.as_str(), url.as_str())))
        .await;
    assert_eq!(results.len(), 2);
    for result in results {
        store.set_feed(result);
    }
    store.save().unwrap();

    let reopened = SourceStore::open(&data_path).unwrap();
    let good_feed = reopened.feed(&good).unwrap();
    assert_eq!(good_feed.items.len(), 2);
    assert_eq!(good_feed.items[0].title, "Job 20");
    let bad_feed = reopened.feed(&bad).unwrap();
    assert_eq!(bad_feed.error_message.as_deref(), Some("HTTP 503"));

    let snapshot = refresher.loading_snapshot();
    assert_eq!(snapshot.get(&good), Some(&false));
    assert_eq!(snapshot.get(&bad), Some(&false));

    std::fs::remove_dir_all(&dir).ok();
}
