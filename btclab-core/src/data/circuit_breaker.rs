//! Circuit breaker shared by the HTTP feeds.
//!
//! HTTP 403 trips the breaker immediately; repeated 429s / 5xx trip it after
//! a threshold. While open, every request is refused until the cooldown
//! (default 30 minutes) has elapsed.

use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Debug)]
struct Inner {
    tripped_at: Option<Instant>,
    consecutive_failures: u32,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration, failure_threshold: u32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                tripped_at: None,
                consecutive_failures: 0,
            }),
            cooldown,
            failure_threshold,
        }
    }

    /// 30-minute cooldown, trips after 3 consecutive failures.
    pub fn default_provider() -> Self {
        Self::new(Duration::from_secs(30 * 60), 3)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_allowed(&self) -> bool {
        let mut inner = self.lock();
        match inner.tripped_at {
            None => true,
            Some(at) if at.elapsed() >= self.cooldown => {
                inner.tripped_at = None;
                inner.consecutive_failures = 0;
                true
            }
            Some(_) => false,
        }
    }

    pub fn record_success(&self) {
        self.lock().consecutive_failures = 0;
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.failure_threshold && inner.tripped_at.is_none() {
            warn!(
                failures = inner.consecutive_failures,
                "circuit breaker tripped after repeated failures"
            );
            inner.tripped_at = Some(Instant::now());
        }
    }

    /// Trip immediately (HTTP 403 / IP ban).
    pub fn trip(&self) {
        warn!("circuit breaker tripped");
        self.lock().tripped_at = Some(Instant::now());
    }

    pub fn remaining_cooldown(&self) -> Duration {
        match self.lock().tripped_at {
            None => Duration::ZERO,
            Some(at) => self.cooldown.saturating_sub(at.elapsed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_after_threshold() {
        let cb = CircuitBreaker::new(Duration::from_secs(60), 3);
        cb.record_failure();
        cb.record_failure();
        assert!(cb.is_allowed());
        cb.record_failure();
        assert!(!cb.is_allowed());
        assert!(cb.remaining_cooldown() > Duration::ZERO);
    }

    #[test]
    fn success_resets_failures() {
        let cb = CircuitBreaker::new(Duration::from_secs(60), 2);
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        assert!(cb.is_allowed());
    }

    #[test]
    fn cooldown_expiry_closes_the_breaker() {
        let cb = CircuitBreaker::new(Duration::from_millis(10), 3);
        cb.trip();
        assert!(!cb.is_allowed());
        std::thread::sleep(Duration::from_millis(15));
        assert!(cb.is_allowed());
    }
}
