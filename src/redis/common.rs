use std::{fmt, ops::Deref, sync::Arc};

use crate::{LimiterError, RateLimitKey};

/// A validated namespace for every Redis key a limiter writes.
///
/// Constraints:
/// - Must not be empty
/// - Must not be longer than 255 bytes
/// - Must not contain colons
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPrefix(Arc<str>);

impl KeyPrefix {
    /// The prefix used when none is configured: `"admission"`.
    pub fn default_prefix() -> Self {
        Self(Arc::from("admission"))
    }
}

impl Default for KeyPrefix {
    fn default() -> Self {
        Self::default_prefix()
    }
}

impl Deref for KeyPrefix {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for KeyPrefix {
    type Error = LimiterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            Err(LimiterError::InvalidPrefix(
                "Key prefix must not be empty".to_string(),
            ))
        } else if value.len() > 255 {
            Err(LimiterError::InvalidPrefix(
                "Key prefix must not be longer than 255 characters".to_string(),
            ))
        } else if value.contains(':') {
            Err(LimiterError::InvalidPrefix(
                "Key prefix must not contain colons".to_string(),
            ))
        } else {
            Ok(Self(Arc::from(value)))
        }
    }
}

impl TryFrom<&str> for KeyPrefix {
    type Error = LimiterError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.to_string())
    }
}

#[derive(Clone, Debug)]
pub(crate) struct RedisKeyGenerator {
    pub prefix: KeyPrefix,
    pub window_log_suffix: &'static str,
}

impl RedisKeyGenerator {
    pub(crate) fn new(prefix: KeyPrefix) -> Self {
        Self {
            prefix,
            window_log_suffix: "sw",
        }
    }

    /// `<prefix>:<key>:sw`, the sorted set holding the admission log of `key`.
    pub(crate) fn get_window_log_key(&self, key: &RateLimitKey) -> String {
        format!("{}:{}:{}", &*self.prefix, &**key, self.window_log_suffix)
    }
}
