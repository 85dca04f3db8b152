// Throttling gateway: per-client fixed-window quota in front of one upstream

pub mod client_key;
pub mod config;
pub mod error;
pub mod forwarder;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod state;

use axum::Router;
use axum::routing::get;
use std::sync::Arc;

use crate::handlers::{metrics_handler, throttle_handler};
use crate::state::AppState;

// Gateway router, every route falls through to the throttle
pub fn app(state: Arc<AppState>) -> Router {
    Router::new().fallback(throttle_handler).with_state(state)
}

// Metrics router, served on its own port
pub fn metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}
