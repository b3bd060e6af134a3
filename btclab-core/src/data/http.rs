//! Blocking HTTP GET with bounded retry, exponential backoff, and the
//! circuit breaker. Shared by every network feed.

use super::circuit_breaker::CircuitBreaker;
use crate::error::FetchError;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// `base * 2^(attempt - 1)`, saturating at `Duration::MAX`.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32
        .checked_pow(attempt.saturating_sub(1))
        .unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}

pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    source_name: String,
    max_retries: u32,
    base_delay: Duration,
}

impl HttpFetcher {
    pub fn new(
        source_name: impl Into<String>,
        circuit_breaker: Arc<CircuitBreaker>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("btclab/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::NetworkUnreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            source_name: source_name.into(),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }

    pub fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }

    pub fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let resp = self.get(url)?;
        resp.json().map_err(|e| {
            FetchError::ResponseFormatChanged(format!(
                "failed to parse {} response: {e}",
                self.source_name
            ))
        })
    }

    pub fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let resp = self.get(url)?;
        resp.text()
            .map_err(|e| FetchError::NetworkUnreachable(format!("reading body: {e}")))
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, FetchError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(FetchError::CircuitBreakerTripped);
        }

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(self.base_delay, attempt);
                debug!(source = %self.source_name, attempt, ?delay, "retrying");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(FetchError::CircuitBreakerTripped);
            }

            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == StatusCode::FORBIDDEN {
                        self.circuit_breaker.trip();
                        return Err(FetchError::CircuitBreakerTripped);
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        self.circuit_breaker.record_failure();
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        warn!(source = %self.source_name, retry_after, "rate limited");
                        last_error = Some(FetchError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status == StatusCode::NOT_FOUND {
                        return Err(FetchError::HttpStatus {
                            source_name: self.source_name.clone(),
                            status: status.as_u16(),
                        });
                    }

                    if !status.is_success() {
                        self.circuit_breaker.record_failure();
                        last_error = Some(FetchError::HttpStatus {
                            source_name: self.source_name.clone(),
                            status: status.as_u16(),
                        });
                        continue;
                    }

                    self.circuit_breaker.record_success();
                    return Ok(resp);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        self.circuit_breaker.record_failure();
                        last_error = Some(FetchError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(FetchError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            FetchError::NetworkUnreachable(format!("{}: max retries exceeded", self.source_name))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_saturates() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 1), base);
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 40), base.saturating_mul(u32::MAX));
        assert_eq!(backoff_delay(Duration::MAX, 5), Duration::MAX);
    }

    #[test]
    fn refused_connections_trip_the_breaker() {
        let breaker = Arc::new(CircuitBreaker::new(Duration::from_secs(60), 3));
        let fetcher = HttpFetcher::new("local", breaker.clone(), Duration::from_secs(2))
            .unwrap()
            .with_retries(2, Duration::ZERO);

        // Nothing listens on port 1
        let result = fetcher.get_text("http://127.0.0.1:1/");
        assert!(matches!(result, Err(FetchError::NetworkUnreachable(_))));
        assert!(!breaker.is_allowed());
        assert!(matches!(
            fetcher.get_text("http://127.0.0.1:1/"),
            Err(FetchError::CircuitBreakerTripped)
        ));
    }
}
