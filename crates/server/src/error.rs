use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failure of a single endpoint probe. Recorded in the report, never fatal.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("TLS error: {0}")]
    Tls(String),
    #[error("Network timeout after {0:?}")]
    Timeout(std::time::Duration),
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP status {status}: {context}")]
    Http { status: StatusCode, context: String },
    #[error("JSON parse error: {0}")]
    Json(String),
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),
    #[error("Unexpected content type: {0}")]
    UnexpectedContentType(String),
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Invalid server name: {0}")]
    InvalidServerName(String),
    #[error("No addresses found for {server_name}: {details}")]
    NoAddresses { server_name: String, details: String },
    #[error("DNS timeout after {0:?}")]
    Timeout(std::time::Duration),
    #[error("DNS resolution failed: {0}")]
    Resolver(String),
}

#[derive(Debug, Error)]
pub enum ReportGenerationError {
    #[error("Discovery failed: {0}")]
    DiscoveryFailed(#[from] DiscoveryError),
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unsupported method {0}")]
    UnsupportedMethod(Method),
    #[error(transparent)]
    Report(#[from] ReportGenerationError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UnsupportedMethod(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Report(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match &self {
            ApiError::UnsupportedMethod(_) => "Unsupported method.".to_string(),
            ApiError::Report(e) => format!("Error Generating Report: {e}"),
        };
        (self.status(), body).into_response()
    }
}
