use chrono::{TimeDelta, Utc};
use clap::Parser;
use reqwest::Url;
use std::net::IpAddr;
use std::time::Duration;

use crate::client_key::ForwardedTrust;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "throttle-gateway")]
#[command(about = "Per-client throttling proxy in front of a single upstream API")]
pub struct Args {
    // Port to run the gateway on
    #[arg(short, long, env = "THROTTLE_PORT", default_value_t = 8079)]
    pub port: u16,

    // Upstream base address, scheme optional
    #[arg(short, long, env = "THROTTLE_UPSTREAM", default_value = "http://my-app")]
    pub upstream: String,

    // Rate limit max requests per window
    #[arg(long, env = "THROTTLE_RATE_LIMIT", default_value_t = 4)]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, env = "THROTTLE_RATE_WINDOW", default_value_t = 3600)]
    pub rate_window: u64,

    // How often expired windows are evicted, in seconds
    #[arg(long, env = "THROTTLE_SWEEP_INTERVAL", default_value_t = 60)]
    pub sweep_interval: u64,

    // Proxies allowed to set X-Forwarded-For (comma-separated)
    // Example: "10.0.0.1,10.0.0.2"
    #[arg(long, env = "THROTTLE_TRUSTED_PROXIES", value_delimiter = ',')]
    pub trusted_proxies: Vec<IpAddr>,

    // Serve prometheus metrics on this port
    #[arg(long, env = "THROTTLE_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("rate limit must be greater than zero")]
    ZeroLimit,
    #[error("rate window must be greater than zero")]
    ZeroWindow,
    #[error("rate window of {0:?} is too large")]
    WindowTooLarge(Duration),
    #[error("sweep interval must be greater than zero")]
    ZeroSweepInterval,
    #[error("invalid upstream address {0:?}: {1}")]
    Upstream(String, String),
}

// Quota applied to every client key for the life of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    pub limit: u32,
    pub window: Duration,
}

impl QuotaPolicy {
    pub fn new(limit: u32, window: Duration) -> Result<Self, ConfigError> {
        if limit == 0 {
            return Err(ConfigError::ZeroLimit);
        }
        if window.is_zero() {
            return Err(ConfigError::ZeroWindow);
        }
        // reset timestamps are wall clock + window, keep that representable
        let span =
            TimeDelta::from_std(window).map_err(|_| ConfigError::WindowTooLarge(window))?;
        if Utc::now().checked_add_signed(span).is_none() {
            return Err(ConfigError::WindowTooLarge(window));
        }
        Ok(Self { limit, window })
    }
}

impl Args {
    pub fn quota(&self) -> Result<QuotaPolicy, ConfigError> {
        QuotaPolicy::new(self.rate_limit, Duration::from_secs(self.rate_window))
    }

    pub fn sweep_every(&self) -> Result<Duration, ConfigError> {
        if self.sweep_interval == 0 {
            return Err(ConfigError::ZeroSweepInterval);
        }
        Ok(Duration::from_secs(self.sweep_interval))
    }

    pub fn upstream_url(&self) -> Result<Url, ConfigError> {
        let raw = self.upstream.trim();
        // add http:// if not present
        let full = if raw.starts_with("http://") || raw.starts_with("https://") {
            raw.to_string()
        } else {
            format!("http://{}", raw)
        };
        Url::parse(&full).map_err(|e| ConfigError::Upstream(raw.to_string(), e.to_string()))
    }

    pub fn forwarded_trust(&self) -> ForwardedTrust {
        if self.trusted_proxies.is_empty() {
            ForwardedTrust::Any
        } else {
            ForwardedTrust::Proxies(self.trusted_proxies.clone())
        }
    }
}
