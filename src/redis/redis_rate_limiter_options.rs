use std::time::Duration;

use redis::aio::ConnectionManager;

use crate::{KeyPrefix, LimiterError};

/// Longest accepted window: 2^53 microseconds, the largest integer a Lua number holds exactly.
/// Keeps `now - window` exact inside the script and the expiry well within `PEXPIRE` range.
pub(crate) const MAX_WINDOW: Duration = Duration::from_micros(1 << 53);

/// Configuration for [`RedisRateLimiter`](crate::RedisRateLimiter).
///
/// # Requirements
///
/// - **Redis version:** >= 5.0 (scripts call `TIME` before writing)
/// - **Runtime:** Tokio (via the `redis-tokio` feature)
///
/// # Examples
///
/// ```ignore
/// use std::time::Duration;
///
/// use admission::{KeyPrefix, RedisRateLimiterOptions};
///
/// let client = redis::Client::open("redis://127.0.0.1:6379/")?;
/// let connection_manager = client.get_connection_manager().await?;
///
/// let options = RedisRateLimiterOptions {
///     connection_manager: Some(connection_manager),
///     prefix: Some(KeyPrefix::try_from("myapp")?), // keys: myapp:<key>:sw
///     limit: 100,
///     window: Duration::from_secs(60),
///     response_timeout: Some(Duration::from_millis(250)),
/// };
/// ```
#[derive(Clone)]
pub struct RedisRateLimiterOptions {
    /// Redis connection manager from the `redis` crate.
    ///
    /// `ConnectionManager` multiplexes commands over one connection and reconnects on failure.
    /// Building a limiter without one fails with [`LimiterError::MissingConnection`], after
    /// `limit` and `window` have been checked.
    pub connection_manager: Option<ConnectionManager>,

    /// Optional prefix for all Redis keys. Defaults to [`KeyPrefix::default_prefix`].
    pub prefix: Option<KeyPrefix>,

    /// Maximum admissions per key within any trailing `window`.
    pub limit: u64,

    /// Length of the sliding window. Must be at least one millisecond and at most 2^53
    /// microseconds (about 285 years).
    pub window: Duration,

    /// Upper bound on each round trip. `None` waits as long as the connection does.
    pub response_timeout: Option<Duration>,
}

impl std::fmt::Debug for RedisRateLimiterOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRateLimiterOptions")
            .field("connection_manager", &self.connection_manager.is_some())
            .field("prefix", &self.prefix)
            .field("limit", &self.limit)
            .field("window", &self.window)
            .field("response_timeout", &self.response_timeout)
            .finish()
    }
}

impl RedisRateLimiterOptions {
    pub(crate) fn validate(&self) -> Result<(), LimiterError> {
        if self.limit == 0 {
            return Err(LimiterError::InvalidLimit(
                "Limit must be greater than 0".to_string(),
            ));
        }

        if self.window < Duration::from_millis(1) {
            return Err(LimiterError::InvalidWindow(
                "Window must be at least 1 millisecond".to_string(),
            ));
        }

        if self.window > MAX_WINDOW {
            return Err(LimiterError::InvalidWindow(format!(
                "Window must be at most {} microseconds",
                MAX_WINDOW.as_micros()
            )));
        }

        Ok(())
    }
}
