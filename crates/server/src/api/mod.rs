//! HTTP surface of the report service.
//!
//! - `federation` - report endpoint (/api/report)
//! - `health` - health check endpoint (/healthz)

pub mod federation;
pub mod health;

pub use federation::{AppState, ApiParams};

use crate::report::{Discover, Probe, VerifyKeys};
use axum::Router;
use axum::http::{HeaderName, Method, header};
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Unrestricted CORS so browser tooling can call the API directly.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            HeaderName::from_static("x-requested-with"),
            header::CONTENT_TYPE,
            header::ACCEPT,
        ])
}

/// The full application router with CORS and request tracing attached.
pub fn app<D, P, V>(state: AppState<D, P, V>) -> Router
where
    D: Discover + 'static,
    P: Probe + 'static,
    V: VerifyKeys + 'static,
{
    Router::new()
        .nest("/api", federation::router(state))
        .route("/healthz", get(health::health))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

/// Starts the web server on `bind_address`.
#[tracing::instrument(skip(state))]
pub async fn start_webserver<D, P, V>(
    state: AppState<D, P, V>,
    bind_address: &str,
) -> color_eyre::Result<()>
where
    D: Discover + 'static,
    P: Probe + 'static,
    V: VerifyKeys + 'static,
{
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    tracing::info!(addr = %bind_address, "Server running");
    axum::serve(listener, app(state))
        .await
        .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}
