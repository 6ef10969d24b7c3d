use std::future::Future;

pub(super) fn block_on<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::runtime::Runtime::new().unwrap().block_on(f)
}

#[cfg(feature = "redis-tokio")]
pub(super) async fn async_sleep(d: std::time::Duration) {
    tokio::time::sleep(d).await;
}

/// `None` skips the test: Redis tests only run with `REDIS_URL` set.
#[cfg(feature = "redis-tokio")]
#[track_caller]
pub(super) fn redis_url() -> Option<String> {
    let url = std::env::var("REDIS_URL").ok();
    if url.is_none() {
        eprintln!(
            "skipping redis test at {}: REDIS_URL not set",
            std::panic::Location::caller()
        );
    }
    url
}

#[cfg(feature = "redis-tokio")]
pub(super) fn unique_prefix() -> crate::KeyPrefix {
    let n: u64 = rand::random();
    crate::KeyPrefix::try_from(format!("admission_test_{n}")).unwrap()
}
