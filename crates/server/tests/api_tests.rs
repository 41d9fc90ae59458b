use axum::http::{HeaderValue, Method, StatusCode, header};
use axum_test::TestServer;
use federation_report::api::{self, AppState};
use federation_report::error::{DiscoveryError, FetchError};
use federation_report::federation::TlsSession;
use federation_report::report::{
    Discover, KeyVerification, Probe, ProbeOutcome, ReportGenerator, ReportOptions, VerifyKeys,
};
use federation_report::response::{DiscoveryResult, KeyDocument};
use federation_report::security::parse_key_document;
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;

/// Resolves `example.org` to one address and records every name it was asked for.
#[derive(Default)]
struct RecordingDiscoverer {
    requested: Arc<Mutex<Vec<String>>>,
}

impl Discover for RecordingDiscoverer {
    async fn discover(&self, server_name: &str) -> Result<DiscoveryResult, DiscoveryError> {
        self.requested.lock().unwrap().push(server_name.to_string());
        if server_name != "example.org" {
            return Err(DiscoveryError::InvalidServerName(server_name.to_string()));
        }
        Ok(DiscoveryResult {
            addrs: vec!["192.0.2.1:8448".to_string(), "192.0.2.2:8448".to_string()],
            ..Default::default()
        })
    }
}

struct SplitProber;

impl Probe for SplitProber {
    async fn probe(
        &self,
        server_name: &str,
        addr: &str,
        _sni: Option<&str>,
    ) -> Result<ProbeOutcome, FetchError> {
        if addr != "192.0.2.1:8448" {
            return Err(FetchError::Network("connection refused".to_string()));
        }
        let body = format!(r#"{{"server_name":"{server_name}","valid_until_ts":0}}"#);
        Ok(ProbeOutcome {
            key_document: parse_key_document(body.as_bytes())
                .map_err(|e| FetchError::Json(e.to_string()))?,
            session: TlsSession {
                version: 0x0303,
                cipher_suite: 0x002f,
                ..Default::default()
            },
        })
    }
}

struct NoopVerifier;

impl VerifyKeys for NoopVerifier {
    fn verify_keys(
        &self,
        _server_name: &str,
        _now: OffsetDateTime,
        _key_document: &KeyDocument,
        _session: &TlsSession,
    ) -> KeyVerification {
        KeyVerification::default()
    }
}

fn test_server() -> (TestServer, Arc<Mutex<Vec<String>>>) {
    let discoverer = RecordingDiscoverer::default();
    let requested = discoverer.requested.clone();
    let generator = ReportGenerator::new(
        discoverer,
        SplitProber,
        NoopVerifier,
        ReportOptions::default(),
    );
    let server = TestServer::new(api::app(AppState::new(generator))).expect("create test server");
    (server, requested)
}

#[tokio::test]
async fn test_report_returns_json() {
    let (server, _) = test_server();

    let response = server
        .get("/api/report")
        .add_query_param("server_name", "example.org")
        .await;

    response.assert_status_ok();
    assert_eq!(response.header(header::CONTENT_TYPE), "application/json");

    let body: serde_json::Value = response.json();
    assert_eq!(
        body["ConnectionReports"]["192.0.2.1:8448"]["Cipher"]["Version"],
        "TLS 1.2"
    );
    assert_eq!(
        body["ConnectionReports"]["192.0.2.1:8448"]["Keys"]["server_name"],
        "example.org"
    );
    assert_eq!(
        body["ConnectionErrors"]["192.0.2.2:8448"]["Message"],
        "Network error: connection refused"
    );
}

#[tokio::test]
async fn test_report_lowercases_server_name() {
    let (server, requested) = test_server();

    server
        .get("/api/report")
        .add_query_param("server_name", "Example.ORG")
        .add_query_param("tls_sni", "")
        .await
        .assert_status_ok();

    assert_eq!(*requested.lock().unwrap(), vec!["example.org".to_string()]);
}

#[tokio::test]
async fn test_discovery_failure_is_500() {
    let (server, _) = test_server();

    let response = server
        .get("/api/report")
        .add_query_param("server_name", "unknown.example")
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.text().starts_with("Error Generating Report: "));
}

#[tokio::test]
async fn test_missing_server_name_is_500() {
    let (server, requested) = test_server();

    let response = server.get("/api/report").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(*requested.lock().unwrap(), vec![String::new()]);
}

#[tokio::test]
async fn test_unsupported_method() {
    let (server, _) = test_server();

    let response = server.post("/api/report").await;

    response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
    response.assert_text("Unsupported method.");
}

#[tokio::test]
async fn test_options_is_ok() {
    let (server, requested) = test_server();

    let response = server.method(Method::OPTIONS, "/api/report").await;

    response.assert_status_ok();
    assert!(requested.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_cors_headers() {
    let (server, _) = test_server();

    let response = server
        .get("/api/report")
        .add_query_param("server_name", "example.org")
        .add_header(header::ORIGIN, HeaderValue::from_static("https://example.com"))
        .await;

    response.assert_status_ok();
    assert_eq!(response.header(header::ACCESS_CONTROL_ALLOW_ORIGIN), "*");
}

#[tokio::test]
async fn test_cors_headers_on_error_responses() {
    let (server, _) = test_server();
    let origin = HeaderValue::from_static("https://example.com");

    let failed = server
        .get("/api/report")
        .add_query_param("server_name", "unknown.example")
        .add_header(header::ORIGIN, origin.clone())
        .await;
    failed.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(failed.header(header::ACCESS_CONTROL_ALLOW_ORIGIN), "*");

    let rejected = server
        .post("/api/report")
        .add_header(header::ORIGIN, origin)
        .await;
    rejected.assert_status(StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(rejected.header(header::ACCESS_CONTROL_ALLOW_ORIGIN), "*");
}

#[tokio::test]
async fn test_health() {
    let (server, _) = test_server();

    let response = server.get("/healthz").await;

    response.assert_status_ok();
    response.assert_text("ok");
}
