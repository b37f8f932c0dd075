//! Integration tests for the discovery loop
//!
//! These tests use wiremock to stand in for the search endpoint and a
//! recording sleeper so that pacing and retry delays cost no time.

use async_trait::async_trait;
use flate2::read::GzDecoder;
use search_disco::crawler::{
    build_http_client, run_discovery, DiscoveryPolicy, FetchFault, PageFetcher, PageRange,
    RangeDiscoverer, Sleeper, DEFAULT_USER_AGENT,
};
use search_disco::{DiscoError, RecordSink};
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Sleeper that records requested durations and returns immediately
#[derive(Default)]
struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    fn durations(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

fn page_path(term: &str, offset: u64) -> String {
    format!("/index-s=%2A{}%2A&stype=0&start={}.html", term, offset)
}

fn discoverer(
    server: &MockServer,
    sleeper: Arc<RecordingSleeper>,
    start: u64,
    end: u64,
    term: &str,
) -> RangeDiscoverer {
    let client = build_http_client(DEFAULT_USER_AGENT).expect("Failed to build client");
    let fetcher = PageFetcher::new(client, &server.uri(), DiscoveryPolicy::default(), sleeper)
        .expect("Failed to build fetcher");
    let range = PageRange::new(start, end).expect("Invalid range");
    RangeDiscoverer::new(fetcher, range, term).expect("Failed to build discoverer")
}

async fn mount_page(server: &MockServer, term: &str, offset: u64, body: &str) {
    Mock::given(method("GET"))
        .and(path(page_path(term, offset)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_status(server: &MockServer, term: &str, offset: u64, status: u16) {
    Mock::given(method("GET"))
        .and(path(page_path(term, offset)))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

async fn collect_records(discoverer: &mut RangeDiscoverer) -> Result<Vec<String>, DiscoError> {
    let mut records = Vec::new();
    while let Some(record) = discoverer.next_record().await? {
        records.push(record.to_string());
    }
    Ok(records)
}

async fn requests_for(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == request_path)
        .count()
}

fn decode_gzip_file(file: &Path) -> String {
    let bytes = std::fs::read(file).expect("Failed to read output");
    let mut decoder = GzDecoder::new(&bytes[..]);
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match decoder.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(_) => break,
        }
    }
    String::from_utf8(out).expect("Output is not UTF-8")
}

#[tokio::test]
async fn test_page_then_missing_page() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "term",
        0,
        r#"<html><body><a href="/x:y:z">file</a></body></html>"#,
    )
    .await;
    mount_status(&server, "term", 1, 404).await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let mut discoverer = discoverer(&server, sleeper, 0, 1, "term");

    let records = collect_records(&mut discoverer).await.unwrap();
    assert_eq!(records, vec!["page:term:0", "/x:y:z"]);
}

#[tokio::test]
async fn test_markers_only_for_existing_pages_in_order() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "aa",
        3,
        r#"<a href="/f:1:a.zip">a</a><a href="/f:2:b.zip">b</a>"#,
    )
    .await;
    mount_status(&server, "aa", 4, 404).await;
    mount_page(&server, "aa", 5, "<html><body>no files here</body></html>").await;
    mount_page(&server, "aa", 6, r#"<a href="/f:3:c.zip">c</a>"#).await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let mut discoverer = discoverer(&server, sleeper, 3, 6, "aa");

    let mut offsets = Vec::new();
    let mut records = Vec::new();
    while let Some(page) = discoverer.next_page().await.unwrap() {
        offsets.push(page.offset);
        records.extend(page.records.iter().map(|r| r.to_string()));
    }

    assert_eq!(offsets, vec![3, 4, 5, 6]);
    assert_eq!(
        records,
        vec![
            "page:aa:3",
            "/f:1:a.zip",
            "/f:2:b.zip",
            "page:aa:5",
            "page:aa:6",
            "/f:3:c.zip"
        ]
    );

    // Exhausted discoverers stay exhausted
    assert!(discoverer.next_page().await.unwrap().is_none());
}

#[tokio::test]
async fn test_quote_bearing_match_is_dropped() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "q",
        0,
        r#"<a href="/ok:1:good.zip">g</a> <a href="/bad" title="x:y:z">b</a>"#,
    )
    .await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let mut discoverer = discoverer(&server, sleeper, 0, 0, "q");

    let records = collect_records(&mut discoverer).await.unwrap();
    assert_eq!(records, vec!["page:q:0", "/ok:1:good.zip"]);
}

#[tokio::test]
async fn test_sends_fixed_user_agent_and_paces_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(page_path("ua", 0)))
        .and(header("user-agent", DEFAULT_USER_AGENT))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(1)
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let mut discoverer = discoverer(&server, sleeper.clone(), 0, 0, "ua");

    let records = collect_records(&mut discoverer).await.unwrap();
    assert_eq!(records, vec!["page:ua:0"]);

    let slept = sleeper.durations();
    assert_eq!(slept.len(), 1);
    assert!((30..=70).contains(&slept[0].as_secs()));
}

#[tokio::test]
async fn test_three_failures_abort_the_run() {
    let server = MockServer::start().await;
    mount_status(&server, "t", 0, 500).await;
    mount_page(&server, "t", 1, r#"<a href="/never:seen:here">x</a>"#).await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let mut discoverer = discoverer(&server, sleeper.clone(), 0, 1, "t");

    let result = collect_records(&mut discoverer).await;
    match result {
        Err(DiscoError::AttemptsExhausted {
            offset,
            attempts,
            last_fault,
        }) => {
            assert_eq!(offset, 0);
            assert_eq!(attempts, 3);
            assert_eq!(last_fault, FetchFault::UnexpectedStatus(500));
        }
        other => panic!("expected AttemptsExhausted, got {:?}", other),
    }

    assert_eq!(requests_for(&server, &page_path("t", 0)).await, 3);
    assert_eq!(requests_for(&server, &page_path("t", 1)).await, 0);

    // Three pre-request pauses and a fixed pause between attempts
    let slept = sleeper.durations();
    let pauses: Vec<_> = slept
        .iter()
        .filter(|d| **d == Duration::from_secs(10))
        .collect();
    assert_eq!(slept.len(), 5);
    assert_eq!(pauses.len(), 2);

    // Nothing more comes out after the abort
    assert!(discoverer.next_record().await.unwrap().is_none());
}

#[tokio::test]
async fn test_empty_body_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(page_path("e", 0)))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(&server, "e", 0, r#"<a href="/e:1:f.zip">f</a>"#).await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let mut discoverer = discoverer(&server, sleeper, 0, 0, "e");

    let records = collect_records(&mut discoverer).await.unwrap();
    assert_eq!(records, vec!["page:e:0", "/e:1:f.zip"]);
    assert_eq!(requests_for(&server, &page_path("e", 0)).await, 2);
}

#[tokio::test]
async fn test_ban_response_triggers_cooldown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(page_path("b", 0)))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(&server, "b", 0, r#"<a href="/b:1:g.zip">g</a>"#).await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let mut discoverer = discoverer(&server, sleeper.clone(), 0, 0, "b");

    let records = collect_records(&mut discoverer).await.unwrap();
    assert_eq!(records, vec!["page:b:0", "/b:1:g.zip"]);

    let slept = sleeper.durations();
    assert!(slept.contains(&Duration::from_secs(3000)));
    assert!(slept.contains(&Duration::from_secs(10)));
}

#[tokio::test]
async fn test_repeated_bans_exhaust_attempts() {
    let server = MockServer::start().await;
    mount_status(&server, "ban", 0, 503).await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let mut discoverer = discoverer(&server, sleeper.clone(), 0, 0, "ban");

    let result = collect_records(&mut discoverer).await;
    assert!(matches!(
        result,
        Err(DiscoError::AttemptsExhausted {
            last_fault: FetchFault::Banned,
            ..
        })
    ));

    let cooldowns = sleeper
        .durations()
        .into_iter()
        .filter(|d| *d == Duration::from_secs(3000))
        .count();
    assert_eq!(cooldowns, 3);
}

#[tokio::test]
async fn test_same_backend_same_records() {
    let server = MockServer::start().await;
    mount_page(&server, "d", 0, r#"<a href="/d:1:a">a</a><a href="/d:1:a">a</a>"#).await;
    mount_status(&server, "d", 1, 404).await;
    mount_page(&server, "d", 2, r#"<a href="/d:2:b">b</a>"#).await;

    let first = collect_records(&mut discoverer(
        &server,
        Arc::new(RecordingSleeper::default()),
        0,
        2,
        "d",
    ))
    .await
    .unwrap();
    let second = collect_records(&mut discoverer(
        &server,
        Arc::new(RecordingSleeper::default()),
        0,
        2,
        "d",
    ))
    .await
    .unwrap();

    assert_eq!(first, second);
    assert_eq!(first, vec!["page:d:0", "/d:1:a", "/d:1:a", "page:d:2", "/d:2:b"]);
}

#[tokio::test]
async fn test_run_discovery_writes_gzip_file() {
    let server = MockServer::start().await;
    mount_page(&server, "w", 0, r#"<a href="/w:1:a.zip">a</a>"#).await;
    mount_status(&server, "w", 1, 404).await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.txt.gz");

    let mut discoverer = discoverer(&server, Arc::new(RecordingSleeper::default()), 0, 1, "w");
    let sink = RecordSink::create(&output).unwrap();
    let summary = run_discovery(&mut discoverer, sink).await.unwrap();

    assert_eq!(summary.pages_found, 1);
    assert_eq!(summary.pages_absent, 1);
    assert_eq!(summary.file_refs, 1);
    assert_eq!(decode_gzip_file(&output), "page:w:0\n/w:1:a.zip\n");
}

#[tokio::test]
async fn test_abort_keeps_completed_pages_readable() {
    let server = MockServer::start().await;
    mount_page(&server, "x", 0, r#"<a href="/x:1:a.zip">a</a>"#).await;
    mount_status(&server, "x", 1, 502).await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.txt.gz");

    let mut discoverer = discoverer(&server, Arc::new(RecordingSleeper::default()), 0, 2, "x");
    let sink = RecordSink::create(&output).unwrap();
    let result = run_discovery(&mut discoverer, sink).await;

    assert!(matches!(
        result,
        Err(DiscoError::AttemptsExhausted { offset: 1, .. })
    ));
    assert_eq!(requests_for(&server, &page_path("x", 2)).await, 0);

    // The sink is finished on abort, so a strict decoder reads it fully
    let bytes = std::fs::read(&output).unwrap();
    let mut text = String::new();
    GzDecoder::new(&bytes[..]).read_to_string(&mut text).unwrap();
    assert_eq!(text, "page:x:0\n/x:1:a.zip\n");
}

#[tokio::test]
async fn test_write_failure_still_closes_output() {
    let server = MockServer::start().await;
    mount_page(&server, "n", 0, r#"<a href="/n:1:a.zip">a</a>"#).await;
    mount_page(&server, "n", 1, "<a href=\"/n:2:broken\nname.zip\">b</a>").await;
    mount_page(&server, "n", 2, r#"<a href="/n:3:c.zip">c</a>"#).await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.txt.gz");

    let mut discoverer = discoverer(&server, Arc::new(RecordingSleeper::default()), 0, 2, "n");
    let sink = RecordSink::create(&output).unwrap();
    let result = run_discovery(&mut discoverer, sink).await;

    assert!(matches!(result, Err(DiscoError::Io(_))));
    assert_eq!(requests_for(&server, &page_path("n", 2)).await, 0);

    // Strict decoding only succeeds if the gzip trailer was written
    let bytes = std::fs::read(&output).unwrap();
    let mut text = String::new();
    GzDecoder::new(&bytes[..]).read_to_string(&mut text).unwrap();
    assert!(text.starts_with("page:n:0\n/n:1:a.zip\n"), "{:?}", text);
    assert!(!text.contains("broken"));
}

#[test]
fn test_reversed_range_is_rejected() {
    assert!(matches!(
        PageRange::new(5, 3),
        Err(DiscoError::Precondition(_))
    ));
}

#[tokio::test]
async fn test_non_ascii_term_is_rejected() {
    let server = MockServer::start().await;
    let client = build_http_client(DEFAULT_USER_AGENT).unwrap();
    let fetcher = PageFetcher::new(
        client,
        &server.uri(),
        DiscoveryPolicy::default(),
        Arc::new(RecordingSleeper::default()),
    )
    .unwrap();

    let result = RangeDiscoverer::new(fetcher, PageRange::new(0, 0).unwrap(), "日本");
    assert!(matches!(result, Err(DiscoError::Precondition(_))));
}

#[tokio::test]
async fn test_cli_rejects_reversed_range_before_any_io() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.txt.gz");

    let status = tokio::process::Command::new(env!("CARGO_BIN_EXE_discover"))
        .args(["--base-url", &server.uri(), "-q", "--", "5", "3", "aa"])
        .arg(&output)
        .status()
        .await
        .unwrap();

    assert!(!status.success());
    assert!(!output.exists());
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_cli_rejects_reversed_delays_before_any_io() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.txt.gz");

    let status = tokio::process::Command::new(env!("CARGO_BIN_EXE_discover"))
        .args([
            "--base-url",
            &server.uri(),
            "--min-delay",
            "80",
            "--max-delay",
            "70",
            "-q",
            "--",
            "0",
            "0",
            "aa",
        ])
        .arg(&output)
        .status()
        .await
        .unwrap();

    assert!(!status.success());
    assert!(!output.exists());
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_cli_end_to_end() {
    let server = MockServer::start().await;
    mount_page(&server, "cli", 0, r#"<a href="/c:1:one.zip">1</a>"#).await;
    mount_status(&server, "cli", 1, 404).await;
    mount_page(&server, "cli", 2, r#"<a href="/c:2:two.zip">2</a>"#).await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.txt.gz");

    let status = tokio::process::Command::new(env!("CARGO_BIN_EXE_discover"))
        .args([
            "--base-url",
            &server.uri(),
            "--min-delay",
            "0",
            "--max-delay",
            "0",
            "--retry-pause",
            "0",
            "-q",
            "--",
            "0",
            "2",
            "cli",
        ])
        .arg(&output)
        .status()
        .await
        .unwrap();

    assert!(status.success());
    assert_eq!(
        decode_gzip_file(&output),
        "page:cli:0\n/c:1:one.zip\npage:cli:2\n/c:2:two.zip\n"
    );
}

#[tokio::test]
async fn test_cli_exits_non_zero_on_exhausted_attempts() {
    let server = MockServer::start().await;
    mount_status(&server, "fail", 0, 500).await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.txt.gz");

    let status = tokio::process::Command::new(env!("CARGO_BIN_EXE_discover"))
        .args([
            "--base-url",
            &server.uri(),
            "--min-delay",
            "0",
            "--max-delay",
            "0",
            "--retry-pause",
            "0",
            "-q",
            "--",
            "0",
            "0",
            "fail",
        ])
        .arg(&output)
        .status()
        .await
        .unwrap();

    assert!(!status.success());
    assert_eq!(requests_for(&server, &page_path("fail", 0)).await, 3);
}
