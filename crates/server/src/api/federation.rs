//! Report endpoint.
//!
//! `GET /report?server_name=..&tls_sni=..` returns the indented JSON report.
//! `OPTIONS` is answered by the CORS layer, every other method gets a 405.

use crate::error::ApiError;
use crate::report::{Discover, Probe, ReportGenerator, VerifyKeys};
use axum::Router;
use axum::extract::{Query, State};
use axum::http::{Method, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use serde::Deserialize;
use std::sync::Arc;

/// Query parameters for the report endpoint.
#[derive(Deserialize, Debug, Default)]
pub struct ApiParams {
    /// A missing name is treated as empty and fails discovery.
    #[serde(default)]
    pub server_name: String,
    #[serde(default)]
    pub tls_sni: Option<String>,
}

/// Shared state for the report endpoint.
pub struct AppState<D, P, V> {
    pub generator: Arc<ReportGenerator<D, P, V>>,
}

impl<D, P, V> Clone for AppState<D, P, V> {
    fn clone(&self) -> Self {
        Self {
            generator: self.generator.clone(),
        }
    }
}

impl<D, P, V> AppState<D, P, V> {
    pub fn new(generator: ReportGenerator<D, P, V>) -> Self {
        Self {
            generator: Arc::new(generator),
        }
    }
}

/// Creates the report router.
pub fn router<D, P, V>(state: AppState<D, P, V>) -> Router
where
    D: Discover + 'static,
    P: Probe + 'static,
    V: VerifyKeys + 'static,
{
    Router::new()
        .route(
            "/report",
            get(get_report::<D, P, V>)
                .options(preflight)
                .fallback(unsupported_method),
        )
        .with_state(state)
}

#[tracing::instrument(name = "api.get_report", skip_all)]
async fn get_report<D, P, V>(
    State(state): State<AppState<D, P, V>>,
    Query(params): Query<ApiParams>,
) -> Result<impl IntoResponse, ApiError>
where
    D: Discover + 'static,
    P: Probe + 'static,
    V: VerifyKeys + 'static,
{
    let server_name = params.server_name.trim().to_lowercase();
    let sni = params.tls_sni.as_deref().filter(|sni| !sni.is_empty());
    tracing::info!(
        server_name = %server_name,
        sni = ?sni,
        "Received request for federation report"
    );

    let body = state
        .generator
        .json_report(&server_name, sni)
        .await
        .inspect_err(|e| {
            tracing::error!(
                name = "api.get_report.failed",
                error = %e,
                "Error generating report"
            );
        })?;

    Ok(([(header::CONTENT_TYPE, "application/json")], body))
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn unsupported_method(method: Method) -> ApiError {
    ApiError::UnsupportedMethod(method)
}
