//! The admission contract and the top-level entrypoint that wires the strategies.
//!
//! Every strategy implements [`Limiter`]. [`RateLimiter`] is a closed set of the strategies this
//! crate ships, for callers that pick one from configuration at runtime.

use std::future::Future;

use crate::{
    LimiterError, LocalRateLimiter, LocalRateLimiterOptions, RateLimitDecision, RateLimitKey,
};

#[cfg(feature = "redis-tokio")]
#[cfg_attr(docsrs, doc(cfg(feature = "redis-tokio")))]
use crate::{RedisRateLimiter, RedisRateLimiterOptions};

/// The single operation every strategy provides.
///
/// Implementations are safe to call concurrently for the same and for different keys.
///
/// On `Err` the caller has learned nothing about the key: the limiter never turns an unknown
/// state into an allow or a deny. Whether to fail open or closed is the caller's policy.
/// Dropping the returned future abandons the call; for the Redis strategy the server-side step
/// may or may not have run.
pub trait Limiter: Send + Sync {
    /// Decide whether the next unit of work for `key` may proceed, consuming budget if so.
    fn allow(
        &self,
        key: &RateLimitKey,
    ) -> impl Future<Output = Result<RateLimitDecision, LimiterError>> + Send;
}

/// Rate limiter entrypoint.
///
/// Wraps one of the concrete strategies and forwards [`Limiter::allow`] to it.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use admission::{Limiter, LocalRateLimiterOptions, RateLimitKey, RateLimiter};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let rl = RateLimiter::local(LocalRateLimiterOptions {
///     capacity: 5,
///     refill_rate: Duration::from_secs(1),
///     cleanup_interval: Duration::ZERO,
/// })
/// .unwrap();
///
/// let key = RateLimitKey::try_from("u1").unwrap();
/// let decision = rl.allow(&key).await.unwrap();
/// assert!(decision.is_allowed());
/// assert_eq!(decision.remaining(), 4);
/// # });
/// ```
pub enum RateLimiter {
    /// In-process token bucket.
    Local(LocalRateLimiter),
    /// Sliding window log shared through Redis.
    #[cfg(feature = "redis-tokio")]
    #[cfg_attr(docsrs, doc(cfg(feature = "redis-tokio")))]
    Redis(RedisRateLimiter),
}

impl RateLimiter {
    /// Build a rate limiter backed by the local token bucket.
    pub fn local(options: LocalRateLimiterOptions) -> Result<Self, LimiterError> {
        Ok(Self::Local(LocalRateLimiter::new(options)?))
    }

    /// Build a rate limiter backed by the Redis sliding window.
    #[cfg(feature = "redis-tokio")]
    #[cfg_attr(docsrs, doc(cfg(feature = "redis-tokio")))]
    pub fn redis(options: RedisRateLimiterOptions) -> Result<Self, LimiterError> {
        Ok(Self::Redis(RedisRateLimiter::new(options)?))
    }

    /// Stop any background work owned by the wrapped strategy.
    ///
    /// Only the local strategy runs background work; for Redis this is a no-op.
    pub fn shutdown(&self) -> Result<(), LimiterError> {
        match self {
            Self::Local(limiter) => limiter.shutdown(),
            #[cfg(feature = "redis-tokio")]
            Self::Redis(_) => Ok(()),
        }
    }
}

impl Limiter for RateLimiter {
    fn allow(
        &self,
        key: &RateLimitKey,
    ) -> impl Future<Output = Result<RateLimitDecision, LimiterError>> + Send {
        async move {
            match self {
                Self::Local(limiter) => Ok(limiter.inc(key)),
                #[cfg(feature = "redis-tokio")]
                Self::Redis(limiter) => limiter.inc(key).await,
            }
        }
    }
}
