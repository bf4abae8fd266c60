//! Throttled HTTP transport for the catalog API
//!
//! One token-bucket limiter sits in front of one reqwest client; every
//! request takes a permit before it leaves. The retry helper reruns a
//! failed operation on an exponential delay schedule so one flaky call
//! does not fail a whole series.

use std::fmt::Display;
use std::future::Future;
use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client, Response};
use tracing::{debug, warn};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Request budget for one remote endpoint.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub burst_size: u32,
}

impl RateLimitConfig {
    /// The catalog allows roughly 40 requests per 10 seconds.
    pub fn catalog() -> Self {
        Self {
            requests_per_second: 4,
            burst_size: 10,
        }
    }
}

/// HTTP client that takes a limiter permit before every request.
pub struct RateLimitedClient {
    client: Client,
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    name: &'static str,
}

impl RateLimitedClient {
    pub fn new(name: &'static str, config: RateLimitConfig) -> Self {
        let rate = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::MIN);

        Self {
            client: Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            limiter: RateLimiter::direct(Quota::per_second(rate).allow_burst(burst)),
            name,
        }
    }

    /// Client tuned for the remote catalog.
    pub fn for_catalog() -> Self {
        Self::new("catalog", RateLimitConfig::catalog())
    }

    /// Take a permit, then GET `url` with `query` appended.
    pub async fn get_with_query<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        query: &T,
    ) -> Result<Response> {
        self.limiter.until_ready().await;
        debug!(client = %self.name, url = %url, "Rate-limited GET");

        self.client
            .get(url)
            .query(query)
            .send()
            .await
            .context("HTTP request failed")
    }
}

/// Retry budget for one logical catalog operation.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts allowed in total, counting the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; later delays double, with jitter.
    pub first_delay: Duration,
    /// Cap on any single delay.
    pub max_delay: Duration,
}

impl RetryConfig {
    fn schedule(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.first_delay,
            max_interval: self.max_delay,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        }
    }
}

/// Rerun `operation` until it succeeds or the attempt budget runs out.
///
/// The error of the final attempt is returned unchanged.
pub async fn retry_async<T, E, Fut, F>(
    operation: F,
    config: &RetryConfig,
    operation_name: &str,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut schedule = config.schedule();
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= config.max_attempts {
                    warn!(
                        operation = %operation_name,
                        attempts = attempt,
                        error = %err,
                        "Catalog call failed, retries exhausted"
                    );
                    return Err(err);
                }

                let delay = schedule.next_backoff().unwrap_or(config.max_delay);
                warn!(
                    operation = %operation_name,
                    attempt,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "Catalog call failed, retrying"
                );
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_retries() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            first_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[test]
    fn test_catalog_budget() {
        let config = RateLimitConfig::catalog();
        assert_eq!(config.requests_per_second, 4);
        assert_eq!(config.burst_size, 10);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry_async(
            || async {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 3 {
                    Err("transient".to_string())
                } else {
                    Ok(attempt)
                }
            },
            &fast_retries(),
            "test op",
        )
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry_async(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<u32, String>("still broken".to_string())
            },
            &fast_retries(),
            "test op",
        )
        .await;

        assert_eq!(result.unwrap_err(), "still broken");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
