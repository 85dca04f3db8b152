use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;

use crate::config::QuotaPolicy;
use crate::metrics::TRACKED_KEYS;

// clamps to the end of chrono's calendar instead of panicking
fn reset_time(wall: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(window)
        .ok()
        .and_then(|span| wall.checked_add_signed(span))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

// Rate limit entry - tracks requests per client key
pub struct RateLimitEntry {
    pub count: u64,
    pub window_start: Instant,
    pub reset_at: DateTime<Utc>, // wall clock time the window closes
}

impl RateLimitEntry {
    fn open(now: Instant, wall: DateTime<Utc>, window: Duration) -> Self {
        Self {
            count: 0,
            window_start: now,
            reset_at: reset_time(wall, window),
        }
    }

    fn expired(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.window_start) >= window
    }
}

// One observation of a client's usage, headers and decision both come from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageSnapshot {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    pub reached: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    // counter store could not be reached
    #[error("rate tracker unavailable: {0}")]
    Unavailable(String),
}

// Rate tracker - counts requests per key inside a fixed window
#[async_trait]
pub trait RateTracker: Send + Sync {
    // record one request for `key` and report the usage it observed
    async fn check(&self, key: &str) -> Result<UsageSnapshot, TrackerError>;
}

// In-memory tracker, one fixed window per key
pub struct MemoryRateTracker {
    entries: DashMap<String, RateLimitEntry>,
    quota: QuotaPolicy,
}

impl MemoryRateTracker {
    pub fn new(quota: QuotaPolicy) -> Self {
        Self {
            entries: DashMap::new(),
            quota,
        }
    }

    // number of keys currently held in memory
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // The entry guard holds the shard write lock, so the expiry test, the
    // increment and the snapshot all happen as one step for this key.
    fn observe(&self, key: &str, now: Instant, wall: DateTime<Utc>) -> UsageSnapshot {
        let window = self.quota.window;
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| RateLimitEntry::open(now, wall, window));

        //window closed..? start a new one
        if entry.expired(now, window) {
            *entry = RateLimitEntry::open(now, wall, window);
        }

        entry.count = entry.count.saturating_add(1);

        let limit = u64::from(self.quota.limit);
        UsageSnapshot {
            limit: self.quota.limit,
            remaining: limit.saturating_sub(entry.count) as u32,
            reset_at: entry.reset_at,
            reached: entry.count > limit,
        }
    }

    // drop closed windows, returns how many went
    pub fn sweep(&self, now: Instant) -> usize {
        let window = self.quota.window;
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.expired(now, window));
        before.saturating_sub(self.entries.len())
    }
}

#[async_trait]
impl RateTracker for MemoryRateTracker {
    async fn check(&self, key: &str) -> Result<UsageSnapshot, TrackerError> {
        Ok(self.observe(key, Instant::now(), Utc::now()))
    }
}

// Sweep loop - evicts closed windows so idle keys don't pile up
pub async fn sweep_loop(tracker: Arc<MemoryRateTracker>, every: Duration) {
    let mut interval = interval(every);

    tracing::info!(interval = ?every, "rate tracker sweeper started");

    loop {
        interval.tick().await;

        let removed = tracker.sweep(Instant::now());
        TRACKED_KEYS.set(tracker.len() as f64);

        if removed > 0 {
            tracing::debug!(removed, remaining = tracker.len(), "evicted expired rate windows");
        }
    }
}
