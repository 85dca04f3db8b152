use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

use crate::error::GatewayError;

pub const FORWARDED_FOR: &str = "x-forwarded-for";

// Who may override the client key with X-Forwarded-For
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardedTrust {
    // every peer
    Any,
    // only these peers
    Proxies(Vec<IpAddr>),
}

impl ForwardedTrust {
    fn allows(&self, peer: IpAddr) -> bool {
        match self {
            ForwardedTrust::Any => true,
            ForwardedTrust::Proxies(list) => list.contains(&peer),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientKeyResolver {
    trust: ForwardedTrust,
}

impl ClientKeyResolver {
    pub fn new(trust: ForwardedTrust) -> Self {
        Self { trust }
    }

    // Key the request is counted under, plus the peer IP it arrived from.
    // The peer must be known even when an override header is present.
    pub fn resolve(
        &self,
        peer: Option<SocketAddr>,
        headers: &HeaderMap,
    ) -> Result<(String, IpAddr), GatewayError> {
        let peer = peer.ok_or_else(|| {
            GatewayError::ClientIdentity("peer address missing from connection".to_string())
        })?;
        let ip = peer.ip();

        if self.trust.allows(ip) {
            if let Some(forwarded) = forwarded_for(headers) {
                return Ok((forwarded.to_string(), ip));
            }
        } else if forwarded_for(headers).is_some() {
            tracing::debug!(peer = %ip, "ignoring X-Forwarded-For from untrusted peer");
        }

        Ok((ip.to_string(), ip))
    }
}

fn forwarded_for(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}
