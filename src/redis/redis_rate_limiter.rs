use std::{
    future::Future,
    time::{Duration, UNIX_EPOCH},
};

use redis::{AsyncCommands, RedisResult, aio::ConnectionManager};

use super::RedisKeyGenerator;
use crate::{
    Limiter, LimiterError, RateLimitDecision, RateLimitKey, RedisRateLimiterOptions,
    common::saturating_add,
};

/// Sliding-window log rate limiter shared through Redis.
///
/// Every admission for a key is recorded in a sorted set at `<prefix>:<key>:sw`, scored by the
/// admission instant. All processes pointing at the same Redis and prefix share one budget.
///
/// # Algorithm
///
/// One Lua script, executed atomically by Redis:
///
/// 1. **Prune:** drop entries older than `now - window`
/// 2. **Count:** `count = ZCARD`
/// 3. **Decide:** if `count < limit`, add an entry for now, re-arm the set's expiry to `window`
///    and report `count + 1`; otherwise report `count` and write nothing
///
/// Because the three steps run as one script, concurrent callers can never jointly exceed
/// `limit`.
///
/// # Semantics & Limitations
///
/// **Server clock:**
/// - `now` is read with `TIME` inside the script, so every process agrees on it
/// - Admission instants are kept strictly increasing per key (microsecond resolution), so two
///   admissions in the same microsecond are still two entries
///
/// **Approximate `reset_at`:**
/// - Decisions report `reset_at = now + window`
/// - This is an upper bound: budget comes back as soon as the *oldest* entry in the window ages
///   out, which can be much earlier
///
/// **Failures:**
/// - Each call is exactly one round trip and is never retried
/// - On error the script either ran completely or not at all; the caller just did not learn
///   which
///
/// # Examples
///
/// ```ignore
/// use std::time::Duration;
///
/// use admission::{RateLimitKey, RedisRateLimiter, RedisRateLimiterOptions};
///
/// let client = redis::Client::open("redis://127.0.0.1:6379/")?;
///
/// let limiter = RedisRateLimiter::new(RedisRateLimiterOptions {
///     connection_manager: Some(client.get_connection_manager().await?),
///     prefix: None,
///     limit: 3,
///     window: Duration::from_secs(60),
///     response_timeout: None,
/// })?;
///
/// let key = RateLimitKey::try_from("user_123")?;
///
/// match limiter.inc(&key).await {
///     Ok(decision) if decision.is_allowed() => { /* proceed */ }
///     Ok(decision) => { /* 429, retry after decision.retry_after() */ }
///     Err(err) => { /* fail open or closed, caller's choice */ }
/// }
/// ```
pub struct RedisRateLimiter {
    connection_manager: ConnectionManager,
    limit: u64,
    window: Duration,
    response_timeout: Option<Duration>,
    key_generator: RedisKeyGenerator,
    inc_script: redis::Script,
    count_script: redis::Script,
}

impl RedisRateLimiter {
    /// Build a limiter.
    ///
    /// Fails with [`LimiterError::InvalidLimit`] for a zero limit,
    /// [`LimiterError::InvalidWindow`] for a window shorter than one millisecond or longer than
    /// 2^53 microseconds, and [`LimiterError::MissingConnection`] without a connection manager.
    pub fn new(options: RedisRateLimiterOptions) -> Result<Self, LimiterError> {
        options.validate()?;

        let RedisRateLimiterOptions {
            connection_manager,
            prefix,
            limit,
            window,
            response_timeout,
        } = options;

        let Some(connection_manager) = connection_manager else {
            return Err(LimiterError::MissingConnection);
        };

        let prefix = prefix.unwrap_or_default();

        let inc_script = redis::Script::new(
            r#"
            local log_key = KEYS[1]

            local window_us = tonumber(ARGV[1])
            local window_ms = tonumber(ARGV[2])
            local limit = tonumber(ARGV[3])

            local time_array = redis.call("TIME")
            local now_us = tonumber(time_array[1]) * 1000000 + tonumber(time_array[2])

            redis.call("ZREMRANGEBYSCORE", log_key, "-inf", string.format("(%.0f", now_us - window_us))

            local count = redis.call("ZCARD", log_key)

            if count >= limit then
                return {0, count, now_us}
            end

            local admitted_us = now_us
            local newest = redis.call("ZRANGE", log_key, -1, -1, "WITHSCORES")
            if #newest > 0 and tonumber(newest[2]) >= admitted_us then
                admitted_us = tonumber(newest[2]) + 1
            end

            local member = string.format("%.0f", admitted_us)
            redis.call("ZADD", log_key, member, member)
            redis.call("PEXPIRE", log_key, window_ms)

            return {1, count + 1, now_us}
        "#,
        );

        let count_script = redis::Script::new(
            r#"
            local log_key = KEYS[1]

            local window_us = tonumber(ARGV[1])

            local time_array = redis.call("TIME")
            local now_us = tonumber(time_array[1]) * 1000000 + tonumber(time_array[2])

            redis.call("ZREMRANGEBYSCORE", log_key, "-inf", string.format("(%.0f", now_us - window_us))

            return redis.call("ZCARD", log_key)
        "#,
        );

        Ok(Self {
            connection_manager,
            limit,
            window,
            response_timeout,
            key_generator: RedisKeyGenerator::new(prefix),
            inc_script,
            count_script,
        })
    } // end constructor

    /// Check admission and, if allowed, record the admission for `key`.
    ///
    /// Performs exactly one round trip to Redis.
    pub async fn inc(&self, key: &RateLimitKey) -> Result<RateLimitDecision, LimiterError> {
        let log_key = self.key_generator.get_window_log_key(key);
        let mut connection_manager = self.connection_manager.clone();

        let (admitted, count, now_us): (u64, u64, u64) = self
            .bounded(key, "inc", async {
                self.inc_script
                    .key(&log_key)
                    .arg(self.window_us())
                    .arg(self.window_ms())
                    .arg(self.limit)
                    .invoke_async(&mut connection_manager)
                    .await
            })
            .await?;

        let allowed = match admitted {
            1 => true,
            0 => false,
            other => {
                return Err(LimiterError::UnexpectedResponse(format!(
                    "admission flag {other} from sliding window script"
                )));
            }
        };

        if !allowed {
            tracing::debug!(key = %key, count, limit = self.limit, "redis.reject, window is full");
        }

        let reset_at = saturating_add(UNIX_EPOCH + Duration::from_micros(now_us), self.window);

        Ok(RateLimitDecision::new(
            self.limit,
            self.limit.saturating_sub(count),
            reset_at,
            allowed,
        ))
    } // end method inc

    /// Delete the whole admission log of `key`.
    ///
    /// This is a hard reset: the next call for `key` sees an empty window.
    pub async fn reset(&self, key: &RateLimitKey) -> Result<(), LimiterError> {
        let log_key = self.key_generator.get_window_log_key(key);
        let mut connection_manager = self.connection_manager.clone();

        self.bounded(key, "reset", async {
            connection_manager.del::<_, ()>(&log_key).await
        })
        .await
    } // end method reset

    /// Number of admissions of `key` within the current window.
    ///
    /// Prunes expired entries like [`inc`](Self::inc) but never records an admission, so
    /// repeated calls do not consume budget.
    pub async fn get_count(&self, key: &RateLimitKey) -> Result<u64, LimiterError> {
        let log_key = self.key_generator.get_window_log_key(key);
        let mut connection_manager = self.connection_manager.clone();

        self.bounded(key, "get_count", async {
            self.count_script
                .key(&log_key)
                .arg(self.window_us())
                .invoke_async(&mut connection_manager)
                .await
        })
        .await
    } // end method get_count

    /// Limit per window this limiter was built with.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Window length this limiter was built with.
    pub fn window(&self) -> Duration {
        self.window
    }

    fn window_us(&self) -> u64 {
        u64::try_from(self.window.as_micros()).unwrap_or(u64::MAX)
    }

    fn window_ms(&self) -> u64 {
        expiry_ms(self.window)
    }

    async fn bounded<T, F>(
        &self,
        key: &RateLimitKey,
        operation: &'static str,
        call: F,
    ) -> Result<T, LimiterError>
    where
        F: Future<Output = RedisResult<T>>,
    {
        let result = match self.response_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, call).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(key = %key, operation, ?timeout, "redis.timeout");
                    return Err(LimiterError::Timeout(timeout));
                }
            },
            None => call.await,
        };

        result.map_err(|err| {
            tracing::warn!(key = %key, operation, error = ?err, "redis.error");
            LimiterError::from(err)
        })
    } // end method bounded
} // end of impl

impl Limiter for RedisRateLimiter {
    fn allow(
        &self,
        key: &RateLimitKey,
    ) -> impl Future<Output = Result<RateLimitDecision, LimiterError>> + Send {
        self.inc(key)
    }
}

/// `PEXPIRE` argument for `window`: whole milliseconds, rounded up so the log never expires
/// while one of its entries is still inside the window.
pub(crate) fn expiry_ms(window: Duration) -> u64 {
    u64::try_from(window.as_micros().div_ceil(1_000)).unwrap_or(u64::MAX)
}
