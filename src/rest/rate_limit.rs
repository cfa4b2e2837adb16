use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::HeaderMap;
use tokio::sync::Mutex;

use super::response::RestResponse;
use crate::error::RestError;

pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET_AFTER: &str = "x-ratelimit-reset-after";
pub const HEADER_PRECISION: &str = "x-ratelimit-precision";
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// Last rate-limit state reported by the server. `-1` means unknown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitBucket {
    pub remaining: i64,
    /// Seconds, fractional with millisecond precision.
    pub reset_after: f64,
}

impl Default for RateLimitBucket {
    fn default() -> Self {
        Self {
            remaining: -1,
            reset_after: -1.0,
        }
    }
}

impl RateLimitBucket {
    /// Absent or unparsable headers keep the previous values.
    pub fn update(&mut self, headers: &HeaderMap) {
        if let Some(remaining) = header_number::<i64>(headers, HEADER_REMAINING) {
            self.remaining = remaining;
        }
        if let Some(reset_after) = header_number::<f64>(headers, HEADER_RESET_AFTER) {
            self.reset_after = reset_after;
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Zero when the reset time is unknown or negative. Values too large
    /// for a `Duration` are clamped to `Duration::MAX`.
    pub fn reset_delay(&self) -> Duration {
        if !(self.reset_after.is_finite() && self.reset_after > 0.0) {
            return Duration::ZERO;
        }
        match Duration::try_from_secs_f64(self.reset_after) {
            Ok(delay) => delay,
            Err(e) => {
                tracing::warn!("reset-after of {}s is out of range: {e}", self.reset_after);
                Duration::MAX
            }
        }
    }
}

fn header_number<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Buckets may be shared between routes. Concurrent requests on one bucket
/// race on its fields; each update wins until the next one.
pub type SharedBucket = Arc<Mutex<RateLimitBucket>>;

/// Retries requests that come back throttled, waiting out the bucket's
/// reset time between attempts.
#[derive(Debug, Clone, Default)]
pub struct RateLimitedExecutor {
    default_bucket: SharedBucket,
    max_attempts: Option<NonZeroU32>,
}

impl RateLimitedExecutor {
    pub fn new(max_attempts: Option<NonZeroU32>) -> Self {
        Self {
            default_bucket: SharedBucket::default(),
            max_attempts,
        }
    }

    pub fn default_bucket(&self) -> &SharedBucket {
        &self.default_bucket
    }

    pub async fn execute<T, F, Fut>(&self, request_fn: F) -> Result<RestResponse<T>, RestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<RestResponse<T>, RestError>>,
    {
        self.execute_in(&self.default_bucket, request_fn).await
    }

    pub async fn execute_in<T, F, Fut>(
        &self,
        bucket: &SharedBucket,
        mut request_fn: F,
    ) -> Result<RestResponse<T>, RestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<RestResponse<T>, RestError>>,
    {
        let mut attempts: u32 = 0;
        loop {
            let response = request_fn().await?;
            attempts += 1;

            let (throttled, delay) = {
                let mut bucket = bucket.lock().await;
                bucket.update(&response.headers);
                let throttled =
                    response.status == STATUS_TOO_MANY_REQUESTS || bucket.is_exhausted();
                (throttled, bucket.reset_delay())
            };

            if !throttled {
                return Ok(response);
            }
            if let Some(max) = self.max_attempts {
                if attempts >= max.get() {
                    tracing::warn!("rate limit still active after {attempts} attempts");
                    return Err(RestError::RateLimitExhausted { attempts });
                }
            }

            tracing::debug!(
                "rate limited (status {}), retrying in {:?}",
                response.status,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}
