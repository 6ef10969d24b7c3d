#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod rate_limiter;
pub use rate_limiter::*;

pub mod local;
pub use local::*;

#[cfg(feature = "redis-tokio")]
#[cfg_attr(docsrs, doc(cfg(feature = "redis-tokio")))]
pub mod redis;
#[cfg(feature = "redis-tokio")]
pub use self::redis::*;

mod error;
pub use error::*;

mod common;
pub use common::{RateLimitDecision, RateLimitKey};

#[cfg(test)]
mod tests;
