use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::metrics::REQUESTS_FAILED;
use crate::rate_limit::TrackerError;

// Failures that stop a request before it can be counted or forwarded.
// Both fail closed: 500, empty body, nothing sent upstream.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("could not resolve client identity: {0}")]
    ClientIdentity(String),

    #[error(transparent)]
    TrackerUnavailable(#[from] TrackerError),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        REQUESTS_FAILED.inc();
        tracing::error!(error = %self, "request failed closed");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}
