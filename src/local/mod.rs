//! In-process rate limiting provider.
//!
//! The local provider keeps one token bucket per key in memory, behind a sharded
//! [`DashMap`](dashmap::DashMap).
//!
//! # Key Characteristics
//!
//! - **Thread-safe:** Safe for concurrent use across multiple threads
//! - **No I/O:** Admission is pure arithmetic under the key's shard lock and never fails
//! - **Process-scoped:** State is not shared across processes and is lost on restart
//!
//! # When to Use
//!
//! ✅ **Use the local provider when:**
//! - A single process owns the traffic for a key
//! - Bursty traffic should be smoothed to a steady rate
//!
//! ❌ **Don't use the local provider when:**
//! - Several instances must share one budget (use the Redis provider)

use std::time::Instant;

mod cleanup_loop;
pub(crate) use cleanup_loop::CleanupLoop;

mod local_rate_limiter;
pub use local_rate_limiter::*;

mod local_rate_limiter_options;
pub use local_rate_limiter_options::*;

/// Per-key state of the token bucket.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TokenBucket {
    pub tokens: u64,
    pub last_refill: Instant,
}
