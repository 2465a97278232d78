//! Waiting room trigger.
//!
//! Decides, per request, whether the admission query should ask the service
//! to open a waiting room (`/enable`) or only check an existing one. A host
//! that exhausts its local token bucket is considered over capacity.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::EnableTriggerConfig;

/// A simple token bucket.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Per-host trigger for the `/enable` admission query.
///
/// Hosts come from client-supplied headers, so the bucket map is capped at
/// `max_tracked_hosts`. Buckets idle long enough to have refilled carry no
/// state and are swept when the cap is reached.
#[derive(Debug)]
pub struct EnableTrigger {
    enabled: bool,
    requests_per_second: f64,
    burst: f64,
    max_tracked_hosts: usize,
    buckets: DashMap<String, TokenBucket>,
}

impl EnableTrigger {
    pub fn new(config: &EnableTriggerConfig) -> Self {
        Self {
            enabled: config.enabled,
            requests_per_second: config.requests_per_second as f64,
            burst: config.burst_size as f64,
            max_tracked_hosts: config.max_tracked_hosts,
            buckets: DashMap::new(),
        }
    }

    /// A trigger that never asks for a waiting room.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            requests_per_second: 0.0,
            burst: 0.0,
            max_tracked_hosts: 0,
            buckets: DashMap::new(),
        }
    }

    /// Consume one token for `host`; returns true when the host is over its rate.
    pub fn should_enable(&self, host: &str) -> bool {
        if !self.enabled {
            return false;
        }

        if let Some(mut bucket) = self.buckets.get_mut(host) {
            return self.consume(host, &mut bucket);
        }

        if self.tracked_hosts() >= self.max_tracked_hosts {
            self.evict_idle();
            if self.tracked_hosts() >= self.max_tracked_hosts {
                tracing::debug!(
                    host = %host,
                    tracked = self.tracked_hosts(),
                    "Enable trigger at capacity, host not tracked"
                );
                return false;
            }
        }

        let mut bucket = self
            .buckets
            .entry(host.to_string())
            .or_insert_with(|| TokenBucket::new(self.burst));
        self.consume(host, &mut bucket)
    }

    fn consume(&self, host: &str, bucket: &mut TokenBucket) -> bool {
        let over = !bucket.try_acquire(self.burst, self.requests_per_second);
        if over {
            tracing::debug!(host = %host, "Host over local rate, requesting waiting room");
        }
        over
    }

    /// Drop buckets that have been idle long enough to refill completely.
    fn evict_idle(&self) {
        if self.requests_per_second <= 0.0 {
            return;
        }
        let refill = Duration::from_secs_f64(self.burst / self.requests_per_second);
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| bucket.last_update.elapsed() < refill);
        tracing::debug!(
            evicted = before.saturating_sub(self.buckets.len()),
            remaining = self.buckets.len(),
            "Evicted idle enable trigger buckets"
        );
    }

    /// Number of hosts currently tracked.
    pub fn tracked_hosts(&self) -> usize {
        self.buckets.len()
    }
}
