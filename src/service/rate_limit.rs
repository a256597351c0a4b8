use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use serde::Serialize;

use super::error::{ServiceError, ServiceResult};

/// Outcome of a budget check, with the numbers a transport echoes as headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitStatus {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    /// Seconds until the current window resets.
    pub reset_secs: u64,
}

impl RateLimitStatus {
    pub fn into_result(self) -> ServiceResult<Self> {
        if self.allowed {
            Ok(self)
        } else {
            Err(ServiceError::RateLimited {
                limit: self.limit,
                remaining: self.remaining,
                retry_after_secs: self.reset_secs,
            })
        }
    }
}

/// Fixed window request counter per key.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    buckets: Mutex<HashMap<String, (Instant, u64)>>,
}

impl RateLimiter {
    pub fn new(window: Duration) -> Self {
        Self { window, buckets: Mutex::new(HashMap::new()) }
    }

    /// Consumes one request from `key`'s budget if any is left.
    pub fn check(&self, key: &str, limit: u64) -> ServiceResult<RateLimitStatus> {
        self.check_at(key, limit, Instant::now())
    }

    pub(crate) fn check_at(&self, key: &str, limit: u64, now: Instant) -> ServiceResult<RateLimitStatus> {
        let mut buckets = self.buckets.lock().map_err(|_| ServiceError::Internal("rate limiter lock poisoned".into()))?;
        let (start, count) = buckets.entry(key.to_string()).or_insert((now, 0));

        if now.duration_since(*start) >= self.window {
            *start = now;
            *count = 0;
        }
        let reset_secs = self.window.saturating_sub(now.duration_since(*start)).as_secs();

        if *count >= limit {
            return Ok(RateLimitStatus { allowed: false, limit, remaining: 0, reset_secs });
        }
        *count += 1;
        Ok(RateLimitStatus { allowed: true, limit, remaining: limit - *count, reset_secs })
    }

    /// Drops buckets whose window has ended, returning how many were removed.
    pub fn prune_stale(&self) -> ServiceResult<usize> {
        self.prune_stale_at(Instant::now())
    }

    pub(crate) fn prune_stale_at(&self, now: Instant) -> ServiceResult<usize> {
        let mut buckets = self.buckets.lock().map_err(|_| ServiceError::Internal("rate limiter lock poisoned".into()))?;
        let before = buckets.len();
        buckets.retain(|_, (start, _)| now.duration_since(*start) < self.window);
        Ok(before - buckets.len())
    }
}
