//! HTTP surface: webhook ingress and health checks

pub mod health;
pub mod webhook;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::app::AppState;

/// Build the gateway router
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", post(webhook::handle))
        .route("/healthcheck", get(health::healthcheck))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
