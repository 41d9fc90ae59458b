//! Health check endpoint.

/// Liveness probe for load balancers and orchestrators.
#[tracing::instrument()]
pub async fn health() -> &'static str {
    "ok"
}
