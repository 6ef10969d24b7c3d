#![cfg(feature = "redis-tokio")]

use std::{
    env,
    sync::Arc,
    time::{Duration, Instant},
};

use admission::{
    KeyPrefix, Limiter, LimiterError, RateLimitKey, RateLimiter, RedisRateLimiter,
    RedisRateLimiterOptions,
};

#[track_caller]
fn redis_url() -> Option<String> {
    let url = env::var("REDIS_URL").ok();
    if url.is_none() {
        eprintln!(
            "skipping redis integration test at {}: REDIS_URL not set",
            std::panic::Location::caller()
        );
    }
    url
}

fn unique_prefix() -> KeyPrefix {
    let n: u64 = rand::random();
    KeyPrefix::try_from(format!("admission_itest_{n}")).unwrap()
}

fn key(s: &str) -> RateLimitKey {
    RateLimitKey::try_from(s).unwrap()
}

async fn build_options(url: &str, limit: u64, window: Duration) -> RedisRateLimiterOptions {
    let client = redis::Client::open(url).unwrap();
    let connection_manager = client.get_connection_manager().await.unwrap();

    RedisRateLimiterOptions {
        connection_manager: Some(connection_manager),
        prefix: Some(unique_prefix()),
        limit,
        window,
        response_timeout: Some(Duration::from_secs(2)),
    }
}

#[test]
fn three_per_minute_scenario() {
    let Some(url) = redis_url() else {
        return;
    };

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let limiter =
            RedisRateLimiter::new(build_options(&url, 3, Duration::from_secs(60)).await).unwrap();
        let k = key("client_42");

        let mut allowed = Vec::new();
        for _ in 0..4 {
            allowed.push(limiter.inc(&k).await.unwrap().is_allowed());
        }
        assert_eq!(allowed, [true, true, true, false]);

        assert_eq!(limiter.get_count(&k).await.unwrap(), 3);

        limiter.reset(&k).await.unwrap();

        let decision = limiter.inc(&k).await.unwrap();
        assert!(decision.is_allowed());
        assert_eq!(decision.remaining(), 2);
    });
}

#[test]
fn concurrent_callers_admit_exactly_limit() {
    let Some(url) = redis_url() else {
        return;
    };

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let limit = 25;
        let limiter = Arc::new(
            RedisRateLimiter::new(build_options(&url, limit, Duration::from_secs(60)).await)
                .unwrap(),
        );

        let tasks: Vec<_> = (0..100)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move {
                    limiter
                        .allow(&key("shared"))
                        .await
                        .unwrap()
                        .is_allowed()
                })
            })
            .collect();

        let mut admitted = 0;
        for task in tasks {
            if task.await.unwrap() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, limit);
        assert_eq!(limiter.get_count(&key("shared")).await.unwrap(), limit);
    });
}

#[test]
fn two_limiters_share_one_budget() {
    let Some(url) = redis_url() else {
        return;
    };

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let options = build_options(&url, 2, Duration::from_secs(60)).await;
        let first = RedisRateLimiter::new(options.clone()).unwrap();
        let second = RedisRateLimiter::new(options).unwrap();
        let k = key("k");

        assert!(first.inc(&k).await.unwrap().is_allowed());
        assert!(second.inc(&k).await.unwrap().is_allowed());
        assert!(!first.inc(&k).await.unwrap().is_allowed());
        assert!(!second.inc(&k).await.unwrap().is_allowed());
    });
}

#[test]
fn facade_forwards_to_redis_strategy() {
    let Some(url) = redis_url() else {
        return;
    };

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let rl = RateLimiter::redis(build_options(&url, 1, Duration::from_secs(60)).await).unwrap();
        let k = key("k");

        assert!(rl.allow(&k).await.unwrap().is_allowed());
        assert!(!rl.allow(&k).await.unwrap().is_allowed());

        // no background work to stop
        rl.shutdown().unwrap();
    });
}

#[test]
fn unreachable_server_surfaces_an_error() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        // nothing listens on the discard port; connecting the manager itself fails or every
        // call does, but no call may report a decision
        let client = redis::Client::open("redis://127.0.0.1:9/").unwrap();
        let Ok(connection_manager) = client.get_connection_manager().await else {
            return;
        };

        let limiter = RedisRateLimiter::new(RedisRateLimiterOptions {
            connection_manager: Some(connection_manager),
            prefix: None,
            limit: 1,
            window: Duration::from_secs(1),
            response_timeout: Some(Duration::from_millis(200)),
        })
        .unwrap();

        let started = Instant::now();
        let err = limiter.inc(&key("k")).await.err().unwrap();
        assert!(matches!(
            err,
            LimiterError::RedisError(_) | LimiterError::Timeout(_)
        ));
        assert!(started.elapsed() < Duration::from_secs(5));
    });
}
