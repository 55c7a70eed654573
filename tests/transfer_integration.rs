//! Integration tests for the transfer controller.
//!
//! These tests drive whole runs (probe, attempts, retries, outcome) against a
//! mock HTTP server and a temporary sink file.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wurl_core::transfer::TransferRequestBuilder;
use wurl_core::{
    BackoffStrategy, RetryPolicy, Sink, TransferController, TransferError, TransferOutcome,
    TransferRequest, TransferStatus,
};

mod support;
use support::socket_guard::{
    should_skip_socket_bound_test, socket_skip_return, start_mock_server_or_skip,
};

macro_rules! require_mock_server {
    () => {{
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return socket_skip_return();
        };
        mock_server
    }};
}

const FILE_LEN: usize = 5120;
const PREFIX_LEN: usize = 1024;
const CUT_AT: usize = 2000;

// ==================== Helper Functions ====================

/// Deterministic body so any misplaced byte shows up in comparisons.
fn file_body() -> Vec<u8> {
    (0..FILE_LEN).map(|i| (i % 251) as u8).collect()
}

fn request_for(server: &MockServer, route: &str, sink: &Path) -> TransferRequestBuilder {
    TransferRequest::builder(format!("{}{route}", server.uri())).sink(Sink::File(sink.to_path_buf()))
}

/// Runs with a short fixed delay so retry tests stay fast.
async fn run_fast(request: TransferRequest, budget: u32) -> TransferOutcome {
    TransferController::new(request)
        .expect("client builds")
        .with_retry_policy(
            RetryPolicy::from_budget(budget)
                .with_backoff(BackoffStrategy::Fixed(Duration::from_millis(10))),
        )
        .run()
        .await
}

async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or_default()
}

fn partial_response(body: &[u8], start: usize) -> ResponseTemplate {
    ResponseTemplate::new(206)
        .insert_header(
            "Content-Range",
            format!("bytes {start}-{}/{FILE_LEN}", FILE_LEN - 1).as_str(),
        )
        .set_body_bytes(body[start..].to_vec())
}

/// Reads one HTTP/1.1 request head from a raw socket, lowercased.
async fn read_request_head(stream: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        head.extend_from_slice(&buf[..n]);
    }
    String::from_utf8_lossy(&head).to_lowercase()
}

// ==================== Basic Transfers ====================

#[tokio::test]
async fn test_fresh_download_writes_whole_body() {
    let mock_server = require_mock_server!();
    let body = file_body();
    Mock::given(method("GET"))
        .and(path("/f.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = dir.path().join("f.bin");
    let request = request_for(&mock_server, "/f.bin", &sink).build().unwrap();

    let outcome = run_fast(request, 3).await;

    assert_eq!(outcome.status, TransferStatus::Success);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.total_bytes, FILE_LEN as u64);
    assert!(outcome.reason.is_none());
    assert_eq!(std::fs::read(&sink).unwrap(), body);
}

#[tokio::test]
async fn test_fresh_download_truncates_existing_file() {
    let mock_server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/small"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".to_vec()))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = dir.path().join("small");
    std::fs::write(&sink, b"old contents that are longer").unwrap();
    let request = request_for(&mock_server, "/small", &sink).build().unwrap();

    let outcome = run_fast(request, 0).await;

    assert!(outcome.is_success());
    assert_eq!(std::fs::read(&sink).unwrap(), b"new");
}

// ==================== Resume ====================

#[tokio::test]
async fn test_resume_requests_range_and_appends() {
    let mock_server = require_mock_server!();
    let body = file_body();
    Mock::given(method("GET"))
        .and(path("/f.bin"))
        .and(header("Range", "bytes=1024-"))
        .respond_with(partial_response(&body, PREFIX_LEN))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = dir.path().join("f.bin");
    std::fs::write(&sink, &body[..PREFIX_LEN]).unwrap();
    let request = request_for(&mock_server, "/f.bin", &sink)
        .resume(true)
        .build()
        .unwrap();

    let outcome = run_fast(request, 3).await;

    assert_eq!(outcome.status, TransferStatus::Success);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.total_bytes, FILE_LEN as u64);
    assert_eq!(std::fs::read(&sink).unwrap(), body);
}

#[tokio::test]
async fn test_resume_server_ignores_range_rewrites_from_zero() {
    let mock_server = require_mock_server!();
    let body = file_body();
    Mock::given(method("GET"))
        .and(path("/f.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = dir.path().join("f.bin");
    std::fs::write(&sink, vec![0xAA; PREFIX_LEN]).unwrap();
    let request = request_for(&mock_server, "/f.bin", &sink)
        .resume(true)
        .build()
        .unwrap();

    let outcome = run_fast(request, 3).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.total_bytes, FILE_LEN as u64);
    assert_eq!(std::fs::read(&sink).unwrap(), body);
}

#[tokio::test]
async fn test_resume_missing_file_starts_fresh() {
    let mock_server = require_mock_server!();
    let body = file_body();
    Mock::given(method("GET"))
        .and(path("/f.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = dir.path().join("f.bin");
    let request = request_for(&mock_server, "/f.bin", &sink)
        .resume(true)
        .build()
        .unwrap();

    let outcome = run_fast(request, 3).await;

    assert!(outcome.is_success());
    assert_eq!(std::fs::read(&sink).unwrap(), body);
    let received = mock_server.received_requests().await.unwrap();
    assert!(received[0].headers.get("range").is_none());
}

#[tokio::test]
async fn test_range_not_satisfiable_on_complete_file_is_success() {
    let mock_server = require_mock_server!();
    let body = file_body();
    Mock::given(method("GET"))
        .and(path("/f.bin"))
        .and(header("Range", "bytes=5120-"))
        .respond_with(ResponseTemplate::new(416).set_body_string("range not satisfiable"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = dir.path().join("f.bin");
    std::fs::write(&sink, &body).unwrap();
    let request = request_for(&mock_server, "/f.bin", &sink)
        .resume(true)
        .build()
        .unwrap();

    let outcome = run_fast(request, 3).await;

    assert_eq!(outcome.status, TransferStatus::Success);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.total_bytes, FILE_LEN as u64);
    assert_eq!(std::fs::read(&sink).unwrap(), body);
}

#[tokio::test]
async fn test_mismatched_content_range_is_fatal() {
    let mock_server = require_mock_server!();
    let body = file_body();
    Mock::given(method("GET"))
        .and(path("/f.bin"))
        .respond_with(partial_response(&body, 2048))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = dir.path().join("f.bin");
    std::fs::write(&sink, &body[..PREFIX_LEN]).unwrap();
    let request = request_for(&mock_server, "/f.bin", &sink)
        .resume(true)
        .build()
        .unwrap();

    let outcome = run_fast(request, 5).await;

    assert_eq!(outcome.status, TransferStatus::FatalAbort);
    assert!(matches!(
        outcome.reason,
        Some(TransferError::RangeMismatch {
            expected: 1024,
            actual: 2048,
            ..
        })
    ));
    assert_eq!(std::fs::read(&sink).unwrap(), &body[..PREFIX_LEN]);
}

// ==================== Redirects ====================

#[tokio::test]
async fn test_redirect_on_resume_keeps_partial_file() {
    let mock_server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", "/new")
                .set_body_string("moved"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = dir.path().join("out");
    std::fs::write(&sink, vec![0xAA; PREFIX_LEN]).unwrap();
    let request = request_for(&mock_server, "/old", &sink)
        .resume(true)
        .build()
        .unwrap();

    let outcome = run_fast(request, 3).await;

    assert_eq!(outcome.status, TransferStatus::FatalAbort);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.total_bytes, PREFIX_LEN as u64);
    match &outcome.reason {
        Some(TransferError::RedirectOnResume {
            status, location, ..
        }) => {
            assert_eq!(*status, 302);
            assert_eq!(location.as_deref(), Some("/new"));
        }
        other => panic!("expected RedirectOnResume, got {other:?}"),
    }
    assert_eq!(std::fs::read(&sink).unwrap(), vec![0xAA; PREFIX_LEN]);
}

#[tokio::test]
async fn test_redirect_loop_is_not_retried() {
    let mock_server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop"))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = dir.path().join("loop");
    let request = request_for(&mock_server, "/loop", &sink)
        .follow_redirects(true)
        .build()
        .unwrap();

    let outcome = run_fast(request, 2).await;

    assert_eq!(outcome.status, TransferStatus::FatalAbort);
    assert_eq!(outcome.attempts, 1);
    assert!(matches!(outcome.reason, Some(TransferError::Network { .. })));
}

#[tokio::test]
async fn test_redirect_without_follow_saves_redirect_body() {
    let mock_server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", "/new")
                .set_body_string("moved"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = dir.path().join("out");
    let request = request_for(&mock_server, "/old", &sink).build().unwrap();

    let outcome = run_fast(request, 3).await;

    assert!(outcome.is_success());
    assert_eq!(std::fs::read(&sink).unwrap(), b"moved");
}

#[tokio::test]
async fn test_redirect_followed_with_location_flag() {
    let mock_server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/new"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("payload"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = dir.path().join("out");
    let request = request_for(&mock_server, "/old", &sink)
        .follow_redirects(true)
        .build()
        .unwrap();

    let outcome = run_fast(request, 3).await;

    assert!(outcome.is_success());
    assert_eq!(std::fs::read(&sink).unwrap(), b"payload");
}

// ==================== Retries ====================

#[tokio::test]
async fn test_two_failures_then_partial_content_completes() {
    let mock_server = require_mock_server!();
    let body = file_body();
    Mock::given(method("GET"))
        .and(path("/f.bin"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/f.bin"))
        .and(header("Range", "bytes=1024-"))
        .respond_with(partial_response(&body, PREFIX_LEN))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = dir.path().join("f.bin");
    std::fs::write(&sink, &body[..PREFIX_LEN]).unwrap();
    let request = request_for(&mock_server, "/f.bin", &sink)
        .resume(true)
        .build()
        .unwrap();

    let outcome = run_fast(request, 5).await;

    assert_eq!(outcome.status, TransferStatus::Success);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.total_bytes, FILE_LEN as u64);
    assert_eq!(std::fs::read(&sink).unwrap(), body);
    assert_eq!(request_count(&mock_server).await, 3);
}

#[tokio::test]
async fn test_body_cut_short_resumes_from_written_length() {
    if should_skip_socket_bound_test() {
        return socket_skip_return();
    }
    let body = file_body();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // wiremock always sends complete bodies, so the short read needs a raw socket.
    let served = body.clone();
    let server = tokio::spawn(async move {
        let mut heads = Vec::new();

        let (mut first, _) = listener.accept().await.unwrap();
        heads.push(read_request_head(&mut first).await);
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {FILE_LEN}\r\nConnection: close\r\n\r\n"
        );
        first.write_all(head.as_bytes()).await.unwrap();
        first.write_all(&served[..CUT_AT]).await.unwrap();
        let _ = first.shutdown().await;
        drop(first);

        let (mut second, _) = listener.accept().await.unwrap();
        heads.push(read_request_head(&mut second).await);
        let head = format!(
            "HTTP/1.1 206 Partial Content\r\nContent-Range: bytes {CUT_AT}-{}/{FILE_LEN}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            FILE_LEN - 1,
            FILE_LEN - CUT_AT
        );
        second.write_all(head.as_bytes()).await.unwrap();
        second.write_all(&served[CUT_AT..]).await.unwrap();
        let _ = second.shutdown().await;
        heads
    });

    let dir = TempDir::new().unwrap();
    let sink = dir.path().join("f.bin");
    let request = TransferRequest::builder(format!("http://{addr}/f.bin"))
        .sink(Sink::File(sink.clone()))
        .build()
        .unwrap();

    let outcome = run_fast(request, 3).await;
    let heads = tokio::time::timeout(Duration::from_secs(10), server)
        .await
        .expect("server finished")
        .unwrap();

    assert_eq!(outcome.status, TransferStatus::Success);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.total_bytes, FILE_LEN as u64);
    assert_eq!(std::fs::read(&sink).unwrap(), body);
    assert!(!heads[0].contains("range:"), "first request: {}", heads[0]);
    assert!(
        heads[1].contains("range: bytes=2000-"),
        "second request: {}",
        heads[1]
    );
}

#[tokio::test]
async fn test_budget_allows_one_more_request_than_retries() {
    let mock_server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/f.bin"))
        .respond_with(ResponseTemplate::new(500).set_body_string("server error"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = dir.path().join("f.bin");
    let request = request_for(&mock_server, "/f.bin", &sink).build().unwrap();

    let outcome = run_fast(request, 2).await;

    assert_eq!(outcome.status, TransferStatus::ExhaustedRetries);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(
        outcome.reason.as_ref().and_then(TransferError::http_status_code),
        Some(500)
    );
    // Error bodies never reach the sink.
    assert_eq!(std::fs::read(&sink).unwrap().len(), 0);
}

#[tokio::test]
async fn test_zero_budget_retries_until_success() {
    let mock_server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/f.bin"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(5)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/f.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_string("finally"))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = dir.path().join("f.bin");
    let request = request_for(&mock_server, "/f.bin", &sink).build().unwrap();

    let outcome = run_fast(request, 0).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.attempts, 6);
    assert_eq!(std::fs::read(&sink).unwrap(), b"finally");
}

#[tokio::test]
async fn test_not_found_is_fatal_even_with_unlimited_budget() {
    let mock_server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such file"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = dir.path().join("missing");
    let request = request_for(&mock_server, "/missing", &sink).build().unwrap();

    let outcome = run_fast(request, 0).await;

    assert_eq!(outcome.status, TransferStatus::FatalAbort);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.total_bytes, 0);
    assert_eq!(
        outcome.reason.as_ref().and_then(TransferError::http_status_code),
        Some(404)
    );
    assert_eq!(std::fs::read(&sink).unwrap().len(), 0);
}

#[tokio::test]
async fn test_unauthorized_is_fatal_auth_error() {
    let mock_server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/private"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = dir.path().join("private");
    let request = request_for(&mock_server, "/private", &sink).build().unwrap();

    let outcome = run_fast(request, 5).await;

    assert_eq!(outcome.status, TransferStatus::FatalAbort);
    assert!(matches!(
        outcome.reason,
        Some(TransferError::AuthRequired { status: 401, .. })
    ));
}

#[tokio::test]
async fn test_too_many_requests_honours_retry_after() {
    let mock_server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = dir.path().join("busy");
    let request = request_for(&mock_server, "/busy", &sink).build().unwrap();

    // A 30s fixed delay would time the test out if Retry-After were ignored.
    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        TransferController::new(request)
            .unwrap()
            .with_retry_policy(
                RetryPolicy::from_budget(3).with_backoff(BackoffStrategy::Fixed(Duration::from_secs(30))),
            )
            .run(),
    )
    .await
    .expect("Retry-After: 0 should override the fixed delay");

    assert!(outcome.is_success());
    assert_eq!(outcome.attempts, 2);
}

#[tokio::test]
async fn test_timeout_is_recoverable() {
    let mock_server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = dir.path().join("slow");
    let request = request_for(&mock_server, "/slow", &sink)
        .timeout_secs(1)
        .build()
        .unwrap();

    let outcome = run_fast(request, 1).await;

    assert_eq!(outcome.status, TransferStatus::ExhaustedRetries);
    assert_eq!(outcome.attempts, 2);
    assert!(matches!(outcome.reason, Some(TransferError::Timeout { .. })));
}

#[tokio::test]
async fn test_dropped_tls_handshake_is_recoverable() {
    if should_skip_socket_bound_test() {
        return socket_skip_return();
    }
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepts);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });

    let dir = TempDir::new().unwrap();
    let request = TransferRequest::builder(format!("https://{addr}/f.bin"))
        .sink(Sink::File(dir.path().join("f.bin")))
        .build()
        .unwrap();

    let outcome = run_fast(request, 1).await;

    assert_eq!(outcome.status, TransferStatus::ExhaustedRetries);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(accepts.load(Ordering::SeqCst), 2);
}

// ==================== Pre-flight Failures ====================

#[tokio::test]
async fn test_malformed_url_is_single_fatal_attempt() {
    let dir = TempDir::new().unwrap();
    let request = TransferRequest::builder("not a url")
        .sink(Sink::File(dir.path().join("out")))
        .build()
        .unwrap();

    let outcome = run_fast(request, 0).await;

    assert_eq!(outcome.status, TransferStatus::FatalAbort);
    assert_eq!(outcome.attempts, 1);
    assert!(matches!(outcome.reason, Some(TransferError::InvalidUrl { .. })));
}

#[tokio::test]
async fn test_unwritable_sink_aborts_before_any_attempt() {
    let dir = TempDir::new().unwrap();
    let request = TransferRequest::builder("http://127.0.0.1:9/f")
        .sink(Sink::File(dir.path().join("no-such-dir").join("f")))
        .build()
        .unwrap();

    let outcome = run_fast(request, 3).await;

    assert_eq!(outcome.status, TransferStatus::FatalAbort);
    assert_eq!(outcome.attempts, 0);
    assert!(matches!(outcome.reason, Some(TransferError::Io { .. })));
}

// ==================== Request Options ====================

#[tokio::test]
async fn test_credentials_and_custom_headers_are_sent() {
    let mock_server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/auth"))
        .and(header("Authorization", "Basic dXNlcjpwYXNz"))
        .and(header("X-Custom", "yes"))
        .and(header("User-Agent", "agent/1.0"))
        .and(header("Referer", "http://ref.test/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("secret"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = dir.path().join("auth");
    let request = request_for(&mock_server, "/auth", &sink)
        .http_user(Some("user".to_string()))
        .http_password(Some("pass".to_string()))
        .header_line("X-Custom: yes")
        .user_agent(Some("agent/1.0".to_string()))
        .referer(Some("http://ref.test/".to_string()))
        .build()
        .unwrap();

    let outcome = run_fast(request, 0).await;

    assert!(outcome.is_success());
    assert_eq!(std::fs::read(&sink).unwrap(), b"secret");
}

#[tokio::test]
async fn test_default_user_agent_names_the_tool() {
    let mock_server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/ua"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let request = request_for(&mock_server, "/ua", &dir.path().join("ua"))
        .build()
        .unwrap();
    assert!(run_fast(request, 0).await.is_success());

    let received = mock_server.received_requests().await.unwrap();
    let agent = received[0]
        .headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(agent.starts_with("wurl/"), "unexpected agent: {agent}");
}

#[tokio::test]
async fn test_rate_limit_slows_transfer() {
    let mock_server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/paced"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = dir.path().join("paced");
    let request = request_for(&mock_server, "/paced", &sink)
        .rate_limit(Some(4096))
        .build()
        .unwrap();

    let start = Instant::now();
    let outcome = run_fast(request, 0).await;

    assert!(outcome.is_success());
    assert_eq!(std::fs::read(&sink).unwrap().len(), 4096);
    assert!(
        start.elapsed() >= Duration::from_millis(900),
        "4096 bytes at 4096 B/s finished in {:?}",
        start.elapsed()
    );
}

// ==================== Interrupts ====================

#[tokio::test]
async fn test_interrupt_during_attempt_stops_run() {
    let mock_server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/hang"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("never")
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = dir.path().join("hang");
    let request = request_for(&mock_server, "/hang", &sink).build().unwrap();

    let interrupt = Arc::new(AtomicBool::new(false));
    let setter = Arc::clone(&interrupt);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        setter.store(true, Ordering::SeqCst);
    });

    let start = Instant::now();
    let outcome = TransferController::new(request)
        .unwrap()
        .with_interrupt(interrupt)
        .run()
        .await;

    assert_eq!(outcome.status, TransferStatus::Interrupted);
    assert_eq!(outcome.attempts, 1);
    assert!(outcome.reason.is_none());
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_interrupt_during_backoff_stops_run() {
    let mock_server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = dir.path().join("down");
    let request = request_for(&mock_server, "/down", &sink).build().unwrap();

    let interrupt = Arc::new(AtomicBool::new(false));
    let setter = Arc::clone(&interrupt);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        setter.store(true, Ordering::SeqCst);
    });

    let outcome = TransferController::new(request)
        .unwrap()
        .with_retry_policy(
            RetryPolicy::from_budget(0).with_backoff(BackoffStrategy::Fixed(Duration::from_secs(30))),
        )
        .with_interrupt(interrupt)
        .run()
        .await;

    assert_eq!(outcome.status, TransferStatus::Interrupted);
    assert_eq!(outcome.attempts, 1);
}
