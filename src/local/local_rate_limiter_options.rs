use std::time::{Duration, Instant};

use crate::LimiterError;

/// Configuration for [`LocalRateLimiter`](crate::LocalRateLimiter).
///
/// The bucket for a key holds at most `capacity` tokens and regains all of them over
/// `refill_rate`, i.e. the continuous rate is `capacity / refill_rate`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalRateLimiterOptions {
    /// Burst size: the maximum number of tokens a bucket can hold.
    pub capacity: u64,
    /// Time over which `capacity` tokens regenerate.
    pub refill_rate: Duration,
    /// How often idle buckets are swept. `Duration::ZERO` disables the sweep.
    ///
    /// A bucket is idle once its last refill is older than `2 × refill_rate`.
    pub cleanup_interval: Duration,
}

impl Default for LocalRateLimiterOptions {
    /// 100 tokens per second, swept every minute.
    fn default() -> Self {
        Self {
            capacity: 100,
            refill_rate: Duration::from_secs(1),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl LocalRateLimiterOptions {
    pub(crate) fn validate(&self) -> Result<(), LimiterError> {
        if self.capacity == 0 {
            return Err(LimiterError::InvalidLimit(
                "Capacity must be greater than 0".to_string(),
            ));
        }

        if self.refill_rate.is_zero() {
            return Err(LimiterError::InvalidWindow(
                "Refill rate must be greater than 0".to_string(),
            ));
        }

        // buckets go stale after 2 × refill_rate, which must stay representable as an Instant
        if Instant::now()
            .checked_add(self.refill_rate.saturating_mul(2))
            .is_none()
        {
            return Err(LimiterError::InvalidWindow(
                "Refill rate is too large".to_string(),
            ));
        }

        Ok(())
    }
}
