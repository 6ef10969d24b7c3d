use std::time::Duration;

use super::runtime::block_on;
use crate::{
    Limiter, LimiterError, LocalRateLimiter, LocalRateLimiterOptions, RateLimitKey, RateLimiter,
};

fn options(capacity: u64) -> LocalRateLimiterOptions {
    LocalRateLimiterOptions {
        capacity,
        refill_rate: Duration::from_secs(1),
        cleanup_interval: Duration::ZERO,
    }
}

async fn admitted<L: Limiter>(limiter: &L, key: &RateLimitKey, calls: usize) -> Vec<bool> {
    let mut allowed = Vec::with_capacity(calls);
    for _ in 0..calls {
        allowed.push(limiter.allow(key).await.unwrap().is_allowed());
    }
    allowed
}

#[test]
fn facade_forwards_to_local_strategy() {
    let rl = RateLimiter::local(options(5)).unwrap();
    let k = RateLimitKey::try_from("u1").unwrap();

    let allowed = block_on(admitted(&rl, &k, 6));
    assert_eq!(allowed, [true, true, true, true, true, false]);

    rl.shutdown().unwrap();
}

#[test]
fn facade_rejects_invalid_local_options() {
    assert!(matches!(
        RateLimiter::local(options(0)),
        Err(LimiterError::InvalidLimit(_))
    ));
}

#[test]
fn local_limiter_implements_the_contract() {
    let limiter = LocalRateLimiter::new(options(2)).unwrap();
    let k = RateLimitKey::try_from("k").unwrap();

    let decision = block_on(limiter.allow(&k)).unwrap();
    assert!(decision.is_allowed());
    assert_eq!(decision.remaining(), 1);

    // the contract and the inherent call share one bucket
    assert!(limiter.inc(&k).is_allowed());
    assert!(!block_on(limiter.allow(&k)).unwrap().is_allowed());
}
