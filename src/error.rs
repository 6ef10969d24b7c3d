use std::time::Duration;

/// Error type for this crate.
///
/// Configuration variants are only produced while building a limiter or a key. Runtime variants
/// are only produced by the Redis strategy; when one is returned the caller has not learned the
/// true state of the key and must not treat the call as either allowed or denied.
#[derive(Debug, thiserror::Error)]
pub enum LimiterError {
    /// Capacity or limit is not strictly positive.
    #[error("invalid limit: {0}")]
    InvalidLimit(String),

    /// Refill rate or window is not strictly positive.
    #[error("invalid window: {0}")]
    InvalidWindow(String),

    /// Rate limit key failed validation.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Redis key prefix failed validation.
    #[error("invalid prefix: {0}")]
    InvalidPrefix(String),

    /// The shared strategy was built without a Redis connection.
    #[error("missing redis connection")]
    MissingConnection,

    /// Redis error.
    #[cfg(feature = "redis-tokio")]
    #[error("redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    /// The round trip to the store did not finish within the configured response timeout.
    #[error("redis call timed out after {0:?}")]
    Timeout(Duration),

    /// The store answered with something the script never returns.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The background sweep could not be started or stopped cleanly.
    #[error("cleanup loop error: {0}")]
    CleanupLoop(String),
}
