//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full harvest cycle end-to-end.

use gov_harvest::config::{Config, EmissionMode, OutputConfig, OutputFormat};
use gov_harvest::output::{
    open_sinks, ChunkRow, CrawlRecord, CrawlSummary, FileHit, MemorySink, SourceType,
    StopReason, FILE_HIT_COLUMNS,
};
use gov_harvest::{harvest, HarvestError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration seeded at the mock server root
fn create_test_config(server: &MockServer, mode: EmissionMode) -> Config {
    let mut config = Config::default();
    config.scope.seeds = vec![format!("{}/", server.uri())];
    config.crawler.mode = mode;
    config.crawler.per_host_delay_ms = 0;
    config.crawler.request_timeout_secs = 5;
    config.crawler.concurrency = 3;
    config
}

async fn mount_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/plain"))
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, route: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html, "text/html"))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_file_head(server: &MockServer, route: &str, mime: &str) {
    Mock::given(method("HEAD"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", mime))
        .mount(server)
        .await;
}

async fn mount_never(server: &MockServer, verb: &str, route: &str) {
    Mock::given(method(verb))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>no</p>", "text/html"))
        .expect(0)
        .mount(server)
        .await;
}

async fn run(config: Config) -> (gov_harvest::Result<CrawlSummary>, Vec<CrawlRecord>) {
    let sink = MemorySink::new();
    let result = harvest(config, Box::new(sink.clone())).await;
    (result, sink.records())
}

fn file_hits(records: &[CrawlRecord]) -> Vec<&FileHit> {
    records.iter().filter_map(CrawlRecord::as_file).collect()
}

fn chunk_rows(records: &[CrawlRecord]) -> Vec<&ChunkRow> {
    records.iter().filter_map(CrawlRecord::as_chunk).collect()
}

#[tokio::test]
async fn test_catalog_crawl_records_files_with_page_context() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /").await;

    mount_page(
        &server,
        "/",
        r#"<html><head>
            <title>Labour Force, Australia</title>
            <meta name="description" content="Monthly employment estimates">
            <meta name="keywords" content="labour, employment">
        </head><body>
            <h1>Labour Force</h1>
            <a href="/data/lf.csv">Download <b>CSV</b></a>
            <a href="/sub">Earlier releases</a>
        </body></html>"#,
    )
    .await;
    mount_page(
        &server,
        "/sub",
        r#"<html><head><title>Earlier releases</title></head><body>
            <a href="/data/lf-2023.xlsx">2023 tables</a>
        </body></html>"#,
    )
    .await;
    mount_file_head(&server, "/data/lf.csv", "text/csv; charset=utf-8").await;
    mount_file_head(
        &server,
        "/data/lf-2023.xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    )
    .await;
    // Data files are probed, never downloaded
    mount_never(&server, "GET", "/data/lf.csv").await;

    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("catalog").to_string_lossy().into_owned();
    let output = OutputConfig {
        path: prefix.clone(),
        format: OutputFormat::Both,
    };

    let config = create_test_config(&server, EmissionMode::ResourceCatalog);
    let memory = MemorySink::new();
    let mut sink = open_sinks(&output, config.crawler.mode).unwrap();
    sink.push(Box::new(memory.clone()));

    let summary = harvest(config, Box::new(sink)).await.unwrap();
    assert_eq!(summary.pages_processed, 2);
    assert_eq!(summary.files_recorded, 2);
    assert_eq!(summary.stop_reason, StopReason::FrontierExhausted);

    let records = memory.records();
    let hits = file_hits(&records);
    assert_eq!(hits.len(), 2);

    let csv_hit = hits.iter().find(|h| h.file_ext == ".csv").unwrap();
    assert_eq!(csv_hit.file_url, format!("{}/data/lf.csv", server.uri()));
    assert_eq!(csv_hit.page_url, format!("{}/", server.uri()));
    assert_eq!(csv_hit.page_title, "Labour Force, Australia");
    assert_eq!(csv_hit.page_description, "Monthly employment estimates");
    assert_eq!(csv_hit.anchor_text, "Download CSV");
    assert_eq!(csv_hit.content_type, "text/csv");

    let xlsx_hit = hits.iter().find(|h| h.file_ext == ".xlsx").unwrap();
    assert_eq!(xlsx_hit.page_title, "Earlier releases");
    assert_eq!(xlsx_hit.anchor_text, "2023 tables");

    let csv = std::fs::read_to_string(format!("{}.csv", prefix)).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next().unwrap(), FILE_HIT_COLUMNS.join(","));
    assert_eq!(lines.count(), 2);

    let jsonl = std::fs::read_to_string(format!("{}.jsonl", prefix)).unwrap();
    assert_eq!(jsonl.lines().count(), 2);
    for line in jsonl.lines() {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(value["file_url"].is_string());
        assert!(value["page_tags"].is_array());
    }
}

#[tokio::test]
async fn test_robots_disallow_prevents_request() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nDisallow: /private/").await;

    mount_page(
        &server,
        "/",
        r#"<a href="/private/page">Private</a><a href="/public">Public</a>"#,
    )
    .await;
    mount_page(&server, "/public", "<p>Open</p>").await;
    mount_never(&server, "GET", "/private/page").await;

    let (result, _) = run(create_test_config(&server, EmissionMode::ResourceCatalog)).await;
    let summary = result.unwrap();

    assert_eq!(summary.pages_processed, 2);
    assert_eq!(summary.robots_blocked, 1);
}

#[tokio::test]
async fn test_missing_robots_allows_everything() {
    let server = MockServer::start().await;
    // No robots.txt mock: the server answers 404

    mount_page(&server, "/", r#"<a href="/next">Next</a>"#).await;
    mount_page(&server, "/next", "<p>Reached</p>").await;

    let (result, _) = run(create_test_config(&server, EmissionMode::ResourceCatalog)).await;
    assert_eq!(result.unwrap().pages_processed, 2);
}

#[tokio::test]
async fn test_depth_limit() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /").await;

    mount_page(&server, "/", r#"<a href="/a">A</a>"#).await;
    mount_page(&server, "/a", r#"<a href="/b">B</a>"#).await;
    mount_never(&server, "GET", "/b").await;

    let mut config = create_test_config(&server, EmissionMode::ResourceCatalog);
    config.crawler.max_depth = 1;

    let (result, _) = run(config).await;
    assert_eq!(result.unwrap().pages_processed, 2);
}

#[tokio::test]
async fn test_shared_link_fetched_once() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /").await;

    mount_page(&server, "/", r#"<a href="/a">A</a><a href="/b">B</a>"#).await;
    mount_page(&server, "/a", r#"<a href="/c">C</a><a href="/">Home</a>"#).await;
    mount_page(&server, "/b", r#"<a href="/c?utm_source=nav#top">C</a>"#).await;
    mount_page(&server, "/c", "<p>Shared</p>").await;

    let (result, _) = run(create_test_config(&server, EmissionMode::ResourceCatalog)).await;
    assert_eq!(result.unwrap().pages_processed, 4);
}

#[tokio::test]
async fn test_out_of_scope_host_not_requested() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /").await;

    let port = server.address().port();
    mount_page(
        &server,
        "/",
        &format!(r#"<a href="http://localhost:{}/outside">Elsewhere</a>"#, port),
    )
    .await;
    mount_never(&server, "GET", "/outside").await;

    let (result, _) = run(create_test_config(&server, EmissionMode::ResourceCatalog)).await;
    assert_eq!(result.unwrap().pages_processed, 1);
}

#[tokio::test]
async fn test_file_cap_stops_harvest() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /").await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<a href="/1.csv">One</a><a href="/2.csv">Two</a><a href="/3.csv">Three</a>
               <a href="/more">More</a>"#,
            "text/html",
        ))
        .mount(&server)
        .await;
    for file in ["/1.csv", "/2.csv", "/3.csv"] {
        mount_file_head(&server, file, "text/csv").await;
    }
    mount_never(&server, "GET", "/more").await;

    let mut config = create_test_config(&server, EmissionMode::ResourceCatalog);
    config.crawler.max_files = 1;

    let (result, records) = run(config).await;
    let summary = result.unwrap();

    assert_eq!(file_hits(&records).len(), 1);
    assert_eq!(summary.files_recorded, 1);
    assert_eq!(summary.stop_reason, StopReason::FileCapReached);
}

#[tokio::test]
async fn test_rag_chunks() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /").await;

    let paragraph = "Employment rose by twenty thousand people in the month. ".repeat(6);
    mount_page(
        &server,
        "/",
        &format!(
            r#"<html><head><title>Labour Force</title></head><body>
               <p>{}</p><p>{}</p>
               <a href="/empty">Empty</a>
               <a href="/tables.xlsx">Tables</a>
            </body></html>"#,
            paragraph, paragraph
        ),
    )
    .await;
    mount_page(&server, "/empty", "<html><body><div>layout only</div></body></html>").await;
    mount_never(&server, "GET", "/tables.xlsx").await;
    mount_never(&server, "HEAD", "/tables.xlsx").await;

    let mut config = create_test_config(&server, EmissionMode::RagChunks);
    config.chunking.chunk_size = 200;
    config.chunking.chunk_overlap = 40;

    let (result, records) = run(config).await;
    let summary = result.unwrap();
    let rows = chunk_rows(&records);

    let home_url = format!("{}/", server.uri());
    let home: Vec<_> = rows.iter().filter(|r| r.url == home_url).collect();
    assert!(home.len() > 1);
    for (i, row) in home.iter().enumerate() {
        assert_eq!(row.chunk_index, Some(i));
        assert_eq!(row.chunk_count, Some(home.len()));
        assert_eq!(row.source_type, SourceType::Html);
        assert_eq!(row.title, "Labour Force");
        assert!(!row.chunk_text.is_empty());
        assert!(row.chunk_text.chars().count() <= 200);
    }

    let empty_url = format!("{}/empty", server.uri());
    let empty: Vec<_> = rows.iter().filter(|r| r.url == empty_url).collect();
    assert_eq!(empty.len(), 1);
    assert_eq!(empty[0].chunk_count, Some(0));
    assert_eq!(empty[0].chunk_text, "");

    let binary = rows
        .iter()
        .find(|r| r.source_type == SourceType::Binary)
        .unwrap();
    assert_eq!(binary.url, format!("{}/tables.xlsx", server.uri()));
    assert_eq!(binary.depth, 1);

    assert_eq!(summary.pages_processed, 2);
}

#[tokio::test]
async fn test_unreachable_seeds_fail_the_run() {
    let mut config = Config::default();
    config.scope.seeds = vec!["http://127.0.0.1:9/".to_string()];
    config.crawler.per_host_delay_ms = 0;
    config.crawler.request_timeout_secs = 2;

    let (result, records) = run(config).await;
    assert!(matches!(result, Err(HarvestError::SeedsUnreachable { .. })));
    assert!(records.is_empty());
}
