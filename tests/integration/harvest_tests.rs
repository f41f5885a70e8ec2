//! Integration tests for the harvester
//!
//! These tests use wiremock to serve a small catalog (listing pages, detail
//! pages, robots.txt) and an S3-compatible endpoint, and run the full
//! harvest end-to-end over real HTTP.

use catalog_harvest::config::{parse_config, Config};
use catalog_harvest::crawler::{Harvester, StopReason};
use catalog_harvest::extract::ExtractionMode;
use catalog_harvest::output::read_table;
use catalog_harvest::{HarvestError, RunOutcome};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{header_exists, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a configuration pointing at the mock server
fn create_test_config(base_url: &str, work: &Path, sink: &str) -> Config {
    let content = format!(
        r#"
[catalog]
base-url = "{base_url}"
listing-path = "/players"
detail-marker = "/player/"
max-pages = 10

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[fetch]
timeout-secs = 5
max-retries = 0
retry-delay-ms = 10

[extract]
mode = "pricing"

[output]
directory = '{work}'
artifact-prefix = "players"

{sink}
"#,
        work = work.display()
    );
    parse_config(&content).expect("test config should be valid")
}

fn local_sink(archive: &Path) -> String {
    format!("[sink]\nkind = \"local\"\ndirectory = '{}'", archive.display())
}

fn listing_body(ids: &[u32]) -> String {
    let anchors: String = ids
        .iter()
        .map(|id| format!(r#"<li><a href="/player/p{id}/{id}">Player {id}</a></li>"#))
        .collect();
    format!(
        r#"<html><body><ul>{anchors}</ul><a href="/players?page=99">Next</a></body></html>"#
    )
}

fn detail_body(id: u32) -> String {
    format!(
        r#"<html><body>
        <div class="playername">Player {id}</div>
        <div class="price-num">{id}50</div>
        </body></html>"#
    )
}

/// Mounts listing pages 0..n followed by one empty page
async fn mount_listing(server: &MockServer, pages: &[&[u32]]) {
    for (index, ids) in pages.iter().enumerate() {
        Mock::given(method("GET"))
            .and(path("/players"))
            .and(query_param("page", index.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing_body(ids)))
            .mount(server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/players"))
        .and(query_param("page", pages.len().to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
        .mount(server)
        .await;
}

async fn mount_details(server: &MockServer, ids: impl IntoIterator<Item = u32>) {
    for id in ids {
        Mock::given(method("GET"))
            .and(path(format!("/player/p{id}/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(detail_body(id)))
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn test_full_harvest_to_local_sink() {
    let server = MockServer::start().await;
    let work = TempDir::new().unwrap();
    let archive = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
        .mount(&server)
        .await;

    mount_listing(&server, &[&[1, 2, 3, 4, 5], &[6, 7, 8, 9, 10]]).await;
    mount_details(&server, 1..=10).await;

    // Enumeration must stop at the empty page 2
    Mock::given(method("GET"))
        .and(path("/players"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_body(&[11, 12])))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), work.path(), &local_sink(archive.path()));
    let report = Harvester::from_config(config)
        .unwrap()
        .with_config_hash("test-hash")
        .run()
        .await
        .unwrap();

    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.stop, StopReason::Exhausted { page: 2 });
    assert_eq!(report.links_unique, 10);
    assert_eq!(report.records, 10);
    assert_eq!(report.outcome(), RunOutcome::Complete);

    let stored = archive.path().join(&report.artifact_key);
    let table = read_table(&stored, ExtractionMode::Pricing.schema()).unwrap();
    assert_eq!(table.len(), 10);
    assert_eq!(table.records()[0].get("name"), Some("Player 1"));
    assert_eq!(table.records()[0].get("price"), Some("150"));
    assert_eq!(table.records()[9].get("id"), Some("10"));

    // The local artifact and the stored copy are identical
    let local = std::fs::read(&report.artifact_path).unwrap();
    assert_eq!(local, std::fs::read(&stored).unwrap());
}

#[tokio::test]
async fn test_server_error_skips_item() {
    let server = MockServer::start().await;
    let work = TempDir::new().unwrap();
    let archive = TempDir::new().unwrap();

    // No robots.txt mock: the 404 means allow-all
    mount_listing(&server, &[&[1, 2, 3, 4, 5]]).await;
    mount_details(&server, [1, 2, 4, 5]).await;

    Mock::given(method("GET"))
        .and(path("/player/p3/3"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), work.path(), &local_sink(archive.path()));
    let report = Harvester::from_config(config).unwrap().run().await.unwrap();

    assert_eq!(report.records, 4);
    assert_eq!(report.transport_failures, 1);
    assert_eq!(report.extraction_failures, 0);
    assert_eq!(report.outcome(), RunOutcome::Partial);
    assert_eq!(report.outcome().exit_code(), 2);
}

#[tokio::test]
async fn test_layout_change_counts_extraction_failures() {
    let server = MockServer::start().await;
    let work = TempDir::new().unwrap();
    let archive = TempDir::new().unwrap();

    mount_listing(&server, &[&[1, 2, 3]]).await;
    mount_details(&server, [1]).await;
    for id in [2, 3] {
        Mock::given(method("GET"))
            .and(path(format!("/player/p{id}/{id}")))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<html><body><h1>Redesigned</h1></body></html>"),
            )
            .mount(&server)
            .await;
    }

    let config = create_test_config(&server.uri(), work.path(), &local_sink(archive.path()));
    let report = Harvester::from_config(config).unwrap().run().await.unwrap();

    assert_eq!(report.records, 1);
    assert_eq!(report.extraction_failures, 2);
    assert!(!report.drift_suspected);
}

#[tokio::test]
async fn test_robots_disallow_filters_detail_links() {
    let server = MockServer::start().await;
    let work = TempDir::new().unwrap();
    let archive = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /player/p2/\n"),
        )
        .mount(&server)
        .await;
    mount_listing(&server, &[&[1, 2, 3]]).await;
    mount_details(&server, [1, 3]).await;

    Mock::given(method("GET"))
        .and(path("/player/p2/2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_body(2)))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), work.path(), &local_sink(archive.path()));
    let report = Harvester::from_config(config).unwrap().run().await.unwrap();

    assert_eq!(report.robots_skipped, 1);
    assert_eq!(report.records, 2);
    assert_eq!(report.outcome(), RunOutcome::Partial);
}

fn write_credentials(dir: &Path) -> String {
    let path = dir.join("aws_s3.toml");
    std::fs::write(
        &path,
        "region_name = \"us-east-1\"\naws_access_key_id = \"AKIDTEST\"\naws_secret_access_key = \"secret\"\n",
    )
    .unwrap();
    path.display().to_string()
}

fn s3_sink(endpoint: &str, credentials_path: &str) -> String {
    format!(
        "[sink]\nkind = \"s3\"\nbucket = \"harvest-bucket\"\nendpoint = \"{}\"\ncredentials-path = '{}'",
        endpoint, credentials_path
    )
}

#[tokio::test]
async fn test_artifact_uploaded_to_object_store() {
    let server = MockServer::start().await;
    let store = MockServer::start().await;
    let work = TempDir::new().unwrap();
    let secrets = TempDir::new().unwrap();

    mount_listing(&server, &[&[1, 2]]).await;
    mount_details(&server, [1, 2]).await;

    Mock::given(method("PUT"))
        .and(path_regex(r"^/harvest-bucket/players_pricing_[0-9_-]+\.csv$"))
        .and(header_exists("authorization"))
        .and(header_exists("x-amz-date"))
        .and(header_exists("x-amz-content-sha256"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&store)
        .await;

    let credentials = write_credentials(secrets.path());
    let config = create_test_config(
        &server.uri(),
        work.path(),
        &s3_sink(&store.uri(), &credentials),
    );
    let report = Harvester::from_config(config).unwrap().run().await.unwrap();

    assert_eq!(report.records, 2);
    assert_eq!(report.outcome(), RunOutcome::Complete);

    let requests = store.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].url.path().ends_with(&report.artifact_key));
    assert_eq!(requests[0].body, std::fs::read(&report.artifact_path).unwrap());
}

#[tokio::test]
async fn test_object_store_rejection_is_fatal() {
    let server = MockServer::start().await;
    let store = MockServer::start().await;
    let work = TempDir::new().unwrap();
    let secrets = TempDir::new().unwrap();

    mount_listing(&server, &[&[1, 2]]).await;
    mount_details(&server, [1, 2]).await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(403).set_body_string("<Error>AccessDenied</Error>"))
        .mount(&store)
        .await;

    let credentials = write_credentials(secrets.path());
    let config = create_test_config(
        &server.uri(),
        work.path(),
        &s3_sink(&store.uri(), &credentials),
    );
    let err = Harvester::from_config(config).unwrap().run().await.unwrap_err();

    assert!(matches!(err, HarvestError::Persistence(_)));
    assert_eq!(RunOutcome::from_error(&err).exit_code(), 3);

    // The artifact stays on disk for a retry
    let kept: Vec<_> = std::fs::read_dir(work.path()).unwrap().collect();
    assert_eq!(kept.len(), 1);
}
