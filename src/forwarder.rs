use async_trait::async_trait;
use axum::body::{Body, HttpBody};
use axum::extract::Request;
use axum::http::header::{CONNECTION, HOST};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use reqwest::Url;
use std::net::IpAddr;
use std::time::Instant;

use crate::client_key::FORWARDED_FOR;
use crate::metrics::UPSTREAM_LATENCY;

// headers that describe a single connection and never cross a proxy
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

// Relays an admitted request upstream; always yields a response, even on failure
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, request: Request, peer: IpAddr) -> Response;
}

// Reverse proxy to a single fixed upstream
pub struct HttpForwarder {
    client: reqwest::Client,
    upstream: Url,
}

impl HttpForwarder {
    pub fn new(upstream: Url) -> Result<Self, reqwest::Error> {
        // upstream redirects go back to the client untouched
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        tracing::info!(upstream = %upstream, "forwarder initialized");
        Ok(Self { client, upstream })
    }

    // upstream base + the request's path and query
    pub fn target(&self, uri: &Uri) -> String {
        let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        format!("{}{}", self.upstream.as_str().trim_end_matches('/'), path)
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(&self, request: Request, peer: IpAddr) -> Response {
        let (parts, body) = request.into_parts();
        let target = self.target(&parts.uri);

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(HOST);
        append_forwarded_for(&mut headers, peer);

        tracing::debug!(method = %parts.method, target = %target, "forwarding upstream");

        let mut upstream_req = self.client.request(parts.method, &target).headers(headers);
        // client body is streamed through, never buffered
        if body.size_hint().exact() != Some(0) {
            upstream_req = upstream_req.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let start_time = Instant::now();
        let result = upstream_req.send().await;
        UPSTREAM_LATENCY.observe(start_time.elapsed().as_secs_f64());

        match result {
            Ok(upstream) => relay(upstream),
            Err(e) => {
                tracing::error!(target = %target, error = %e, "upstream request failed");
                StatusCode::BAD_GATEWAY.into_response()
            }
        }
    }
}

// Copy status, headers and a streamed body from the upstream response
fn relay(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    strip_hop_by_hop(&mut headers);

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // anything named in Connection is hop-by-hop as well
    let named: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, peer: IpAddr) {
    let prior: Vec<&str> = headers
        .get_all(FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();

    let chain = if prior.is_empty() {
        peer.to_string()
    } else {
        format!("{}, {}", prior.join(", "), peer)
    };

    if let Ok(value) =
        HeaderValue::from_str(&chain).or_else(|_| HeaderValue::from_str(&peer.to_string()))
    {
        headers.insert(FORWARDED_FOR, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forwarder(base: &str) -> HttpForwarder {
        HttpForwarder::new(Url::parse(base).unwrap()).unwrap()
    }

    #[test]
    fn target_joins_base_and_path() {
        let f = forwarder("http://my-app");
        let uri: Uri = "/v1/items?page=2".parse().unwrap();
        assert_eq!(f.target(&uri), "http://my-app/v1/items?page=2");

        let f = forwarder("http://my-app/api/");
        assert_eq!(f.target(&"/".parse().unwrap()), "http://my-app/api/");
    }

    #[test]
    fn hop_by_hop_headers_are_removed() {
        let mut headers = HeaderMap::new();
        headers.insert("connection", HeaderValue::from_static("keep-alive, x-private"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-private", HeaderValue::from_static("1"));
        headers.insert("x-kept", HeaderValue::from_static("1"));

        strip_hop_by_hop(&mut headers);

        assert!(headers.get("connection").is_none());
        assert!(headers.get("keep-alive").is_none());
        assert!(headers.get("x-private").is_none());
        assert_eq!(headers.get("x-kept").unwrap(), "1");
    }

    #[test]
    fn forwarded_for_chain_grows() {
        let mut headers = HeaderMap::new();
        append_forwarded_for(&mut headers, "10.0.0.5".parse().unwrap());
        assert_eq!(headers.get(FORWARDED_FOR).unwrap(), "10.0.0.5");

        append_forwarded_for(&mut headers, "10.0.0.9".parse().unwrap());
        assert_eq!(headers.get(FORWARDED_FOR).unwrap(), "10.0.0.5, 10.0.0.9");
    }

    #[tokio::test]
    async fn unreachable_upstream_is_bad_gateway() {
        // nothing listens on the discard port locally
        let f = forwarder("http://127.0.0.1:9");
        let request = axum::http::Request::builder()
            .uri("/")
            .body(Body::empty())
            .unwrap();

        let response = f.forward(request, "127.0.0.1".parse().unwrap()).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
