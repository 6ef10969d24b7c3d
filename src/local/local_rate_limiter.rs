use std::{
    future::{self, Future},
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant, SystemTime},
};

use dashmap::{DashMap, mapref::entry::Entry};

use crate::{
    Limiter, LimiterError, LocalRateLimiterOptions, RateLimitDecision, RateLimitKey,
    common::saturating_add,
    local::{CleanupLoop, TokenBucket},
};

/// In-process token bucket rate limiter.
///
/// Each key owns a bucket of at most `capacity` tokens. Every admitted call takes one token;
/// tokens come back lazily, in proportion to the time since the bucket was last refilled.
///
/// # Algorithm
///
/// 1. **First call for a key:** create the bucket with `capacity - 1` tokens and admit.
/// 2. **Refill:** `tokens_to_add = floor(capacity × elapsed / refill_rate)`. When at least one
///    whole token is due, the bucket is topped up (capped at `capacity`) and its refill clock is
///    moved to now.
/// 3. **Decision:** admit and take a token if any is left, otherwise reject.
///
/// `reset_at` is always `last_refill + refill_rate`.
///
/// # Semantics & Limitations
///
/// **Truncating refill:**
/// - The fraction of a token earned since the last refill is dropped whenever a refill happens
/// - Over many short, uneven intervals the bucket refills slightly slower than
///   `capacity / refill_rate`
///
/// **Exclusive per-key mutation:**
/// - Buckets live in a [`DashMap`]; every call holds the write lock of the key's shard while it
///   reads, refills and takes a token
/// - Calls for one key are totally ordered, so there are no lost updates and no double spends
///
/// **Memory:**
/// - A bucket is created on the first call for a key and never persisted
/// - With a non-zero `cleanup_interval` a background thread removes buckets idle for longer than
///   `2 × refill_rate`
/// - [`shutdown`](Self::shutdown) stops that thread but keeps existing buckets
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use admission::{LocalRateLimiter, LocalRateLimiterOptions, RateLimitKey};
///
/// let limiter = LocalRateLimiter::new(LocalRateLimiterOptions {
///     capacity: 2,
///     refill_rate: Duration::from_secs(1),
///     cleanup_interval: Duration::ZERO,
/// })
/// .unwrap();
///
/// let key = RateLimitKey::try_from("user_123").unwrap();
///
/// assert!(limiter.inc(&key).is_allowed());
/// assert!(limiter.inc(&key).is_allowed());
/// assert!(!limiter.inc(&key).is_allowed());
/// ```
pub struct LocalRateLimiter {
    capacity: u64,
    refill_rate: Duration,
    buckets: Arc<DashMap<RateLimitKey, TokenBucket>>,
    cleanup_loop: Mutex<Option<CleanupLoop>>,
}

impl LocalRateLimiter {
    /// Build a limiter, starting the cleanup loop when `cleanup_interval` is non-zero.
    ///
    /// Fails with [`LimiterError::InvalidLimit`] for a zero capacity and
    /// [`LimiterError::InvalidWindow`] for a zero refill rate or one too large for the monotonic
    /// clock.
    pub fn new(options: LocalRateLimiterOptions) -> Result<Self, LimiterError> {
        options.validate()?;

        let buckets = Arc::new(DashMap::new());

        let cleanup_loop = if options.cleanup_interval.is_zero() {
            None
        } else {
            Some(CleanupLoop::spawn(
                Arc::downgrade(&buckets),
                options.cleanup_interval,
                options.refill_rate.saturating_mul(2),
            )?)
        };

        Ok(Self {
            capacity: options.capacity,
            refill_rate: options.refill_rate,
            buckets,
            cleanup_loop: Mutex::new(cleanup_loop),
        })
    } // end constructor

    #[cfg(test)]
    pub(crate) fn buckets(&self) -> &DashMap<RateLimitKey, TokenBucket> {
        &self.buckets
    }

    /// Check admission for `key` and, if allowed, take one token.
    ///
    /// Never blocks on I/O and never fails.
    pub fn inc(&self, key: &RateLimitKey) -> RateLimitDecision {
        self.inc_at(key, Instant::now())
    }

    pub(crate) fn inc_at(&self, key: &RateLimitKey, now: Instant) -> RateLimitDecision {
        let (allowed, remaining, reset_after) = match self.buckets.get_mut(key) {
            Some(mut bucket) => self.take(&mut bucket, now),
            None => match self.buckets.entry(key.clone()) {
                Entry::Occupied(mut occupied) => self.take(occupied.get_mut(), now),
                Entry::Vacant(vacant) => {
                    let remaining = self.capacity - 1;
                    vacant.insert(TokenBucket {
                        tokens: remaining,
                        last_refill: now,
                    });

                    (true, remaining, self.refill_rate)
                }
            },
        };

        if !allowed {
            tracing::debug!(key = %key, capacity = self.capacity, "local.reject, bucket is empty");
        }

        let reset_at = saturating_add(SystemTime::now(), reset_after);

        RateLimitDecision::new(self.capacity, remaining, reset_at, allowed)
    } // end method inc_at

    /// Refill, then take a token if one is left. Returns `(allowed, remaining, reset_after)`,
    /// where `reset_after` is the time from `now` to `last_refill + refill_rate`.
    fn take(&self, bucket: &mut TokenBucket, now: Instant) -> (bool, u64, Duration) {
        let elapsed = now.saturating_duration_since(bucket.last_refill);

        if !elapsed.is_zero() {
            let tokens_to_add = u128::from(self.capacity).saturating_mul(elapsed.as_nanos())
                / self.refill_rate.as_nanos();

            if tokens_to_add > 0 {
                let refilled = (u128::from(bucket.tokens) + tokens_to_add)
                    .min(u128::from(self.capacity));
                // refilled <= capacity, which came from a u64
                bucket.tokens = refilled as u64;
                bucket.last_refill = now;
            }
        }

        let reset_after = self
            .refill_rate
            .saturating_sub(now.saturating_duration_since(bucket.last_refill));

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            (true, bucket.tokens, reset_after)
        } else {
            (false, 0, reset_after)
        }
    } // end method take

    /// Number of keys currently holding a bucket.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether no key currently holds a bucket.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Stop the cleanup loop and wait for its thread to exit.
    ///
    /// Idempotent. Buckets already created are kept; they are no longer evicted.
    pub fn shutdown(&self) -> Result<(), LimiterError> {
        let cleanup_loop = self
            .cleanup_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match cleanup_loop {
            Some(cleanup_loop) => cleanup_loop.stop(),
            None => Ok(()),
        }
    } // end method shutdown

    #[cfg(test)]
    pub(crate) fn cleanup(&self, now: Instant) -> usize {
        super::cleanup_loop::sweep(&self.buckets, self.refill_rate.saturating_mul(2), now)
    }
} // end of impl

impl Limiter for LocalRateLimiter {
    fn allow(
        &self,
        key: &RateLimitKey,
    ) -> impl Future<Output = Result<RateLimitDecision, LimiterError>> + Send {
        future::ready(Ok(self.inc(key)))
    }
}
