//! Redis-backed rate limiting provider.
//!
//! Keeps a sliding-window log per key in Redis so that every process pointing at the same
//! server shares one budget. Each operation is a single round trip; admission runs as an atomic
//! Lua script.

mod common;
pub use common::KeyPrefix;
pub(crate) use common::RedisKeyGenerator;

mod redis_rate_limiter;
pub use redis_rate_limiter::*;

mod redis_rate_limiter_options;
pub use redis_rate_limiter_options::*;
