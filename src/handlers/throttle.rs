use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::GatewayError;
use crate::metrics::{REQUEST_TOTAL, REQUESTS_REJECTED};
use crate::models::Rejection;
use crate::rate_limit::UsageSnapshot;
use crate::state::AppState;

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

// Rate limit headers carried by every counted response
fn usage_headers(usage: &UsageSnapshot) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(LIMIT_HEADER, HeaderValue::from(usage.limit));
    headers.insert(REMAINING_HEADER, HeaderValue::from(usage.remaining));
    headers.insert(RESET_HEADER, HeaderValue::from(usage.reset_at.timestamp()));
    headers
}

// Gateway entry point - every path, every method
pub async fn throttle_handler(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Response, GatewayError> {
    REQUEST_TOTAL.inc();

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let (key, peer_ip) = state.resolver.resolve(peer, request.headers())?;

    // one observation drives both the headers and the decision
    let usage = state.tracker.check(&key).await?;
    let headers = usage_headers(&usage);

    if usage.reached {
        REQUESTS_REJECTED.inc();
        tracing::warn!(client = %key, uri = %request.uri(), "too many requests");
        return Ok((
            StatusCode::TOO_MANY_REQUESTS,
            headers,
            Json(Rejection::too_many_requests()),
        )
            .into_response());
    }

    tracing::debug!(
        client = %key,
        uri = %request.uri(),
        remaining = usage.remaining,
        "admitted"
    );

    let mut response = state.forwarder.forward(request, peer_ip).await;
    let out = response.headers_mut();
    out.extend(headers);
    out.insert("x-ben", HeaderValue::from_static("Rad"));
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn usage_headers_are_decimal() {
        let usage = UsageSnapshot {
            limit: 4,
            remaining: 2,
            reset_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            reached: false,
        };
        let headers = usage_headers(&usage);
        assert_eq!(headers.get(LIMIT_HEADER).unwrap(), "4");
        assert_eq!(headers.get(REMAINING_HEADER).unwrap(), "2");
        assert_eq!(headers.get(RESET_HEADER).unwrap(), "1700000000");
    }
}
