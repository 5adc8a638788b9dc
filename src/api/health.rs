//! Health check endpoint

/// Liveness probe, plain text
pub async fn healthcheck() -> &'static str {
    "ok"
}
