use std::{
    fmt,
    ops::Deref,
    sync::Arc,
    time::{Duration, SystemTime},
};

use crate::LimiterError;

/// A validated, caller-chosen rate limit key.
///
/// The key is opaque: limiters never look inside it. The only constraint is that it must not be
/// empty. Composite keys such as `"ip:10.0.0.1:/login"` are fine.
///
/// # Examples
///
/// ```
/// use admission::RateLimitKey;
///
/// let key = RateLimitKey::try_from("user_123").unwrap();
/// assert_eq!(&*key, "user_123");
///
/// assert!(RateLimitKey::try_from("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RateLimitKey(Arc<str>);

impl Deref for RateLimitKey {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RateLimitKey {
    type Error = LimiterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl TryFrom<&str> for RateLimitKey {
    type Error = LimiterError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.is_empty() {
            Err(LimiterError::InvalidKey(
                "Rate limit key must not be empty".to_string(),
            ))
        } else {
            Ok(Self(Arc::from(value)))
        }
    }
}

/// Outcome of one admission check.
///
/// `remaining` never exceeds `limit`. When the call was admitted, `remaining` already accounts
/// for the unit of work that was just let through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    limit: u64,
    remaining: u64,
    reset_at: SystemTime,
    allowed: bool,
}

impl RateLimitDecision {
    pub(crate) fn new(limit: u64, remaining: u64, reset_at: SystemTime, allowed: bool) -> Self {
        Self {
            limit,
            remaining: remaining.min(limit),
            reset_at,
            allowed,
        }
    }

    /// Capacity (local) or per-window limit (Redis) the decision was taken against.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Units still available to the key after this call.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// When the key is expected to have budget again.
    ///
    /// For the Redis strategy this is an upper bound, see
    /// [`RedisRateLimiter`](crate::RedisRateLimiter).
    pub fn reset_at(&self) -> SystemTime {
        self.reset_at
    }

    /// Whether the current unit of work was admitted.
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// Time left until [`reset_at`](Self::reset_at), zero if it already passed.
    pub fn retry_after(&self) -> Duration {
        self.reset_at
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO)
    }
}

/// `base + offset`, clamped to the latest instant the platform's `SystemTime` can hold.
pub(crate) fn saturating_add(base: SystemTime, offset: Duration) -> SystemTime {
    if let Some(time) = base.checked_add(offset) {
        return time;
    }

    let mut latest = base;
    let mut step = offset;
    while !step.is_zero() {
        match latest.checked_add(step) {
            Some(next) => latest = next,
            None => step /= 2,
        }
    }

    latest
}
