use std::{
    sync::{
        Weak,
        mpsc::{self, RecvTimeoutError},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use dashmap::DashMap;

use crate::{LimiterError, RateLimitKey, local::TokenBucket};

/// Handle to the thread that evicts idle buckets.
///
/// Dropping the handle disconnects the stop channel, which ends the thread on its next wakeup.
pub(crate) struct CleanupLoop {
    stop: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl CleanupLoop {
    pub(crate) fn spawn(
        buckets: Weak<DashMap<RateLimitKey, TokenBucket>>,
        interval: Duration,
        stale_after: Duration,
    ) -> Result<Self, LimiterError> {
        let (stop, stop_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("admission-cleanup".to_string())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }

                    let Some(buckets) = buckets.upgrade() else {
                        break;
                    };

                    let removed = sweep(&buckets, stale_after, Instant::now());
                    if removed > 0 {
                        tracing::debug!(
                            removed,
                            tracked = buckets.len(),
                            "local.cleanup, evicted idle buckets"
                        );
                    }
                }

                tracing::debug!("local.cleanup, loop stopped");
            })
            .map_err(|err| {
                LimiterError::CleanupLoop(format!("failed to spawn cleanup thread: {err}"))
            })?;

        Ok(Self { stop, handle })
    } // end constructor

    /// Signal the thread and wait for it to exit.
    pub(crate) fn stop(self) -> Result<(), LimiterError> {
        // the thread may already be gone if the map was dropped
        let _ = self.stop.send(());

        self.handle
            .join()
            .map_err(|_| LimiterError::CleanupLoop("cleanup thread panicked".to_string()))
    } // end method stop

    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Drop the stop sender without signalling, as dropping the loop does, and hand back the
    /// thread handle.
    #[cfg(test)]
    pub(crate) fn disconnect(self) -> JoinHandle<()> {
        let Self { stop, handle } = self;
        drop(stop);
        handle
    }
} // end impl CleanupLoop

/// Remove every bucket whose last refill is older than `stale_after`. Returns how many went.
pub(crate) fn sweep(
    buckets: &DashMap<RateLimitKey, TokenBucket>,
    stale_after: Duration,
    now: Instant,
) -> usize {
    let mut removed = 0;

    buckets.retain(|_, bucket| {
        let keep = now.saturating_duration_since(bucket.last_refill) <= stale_after;
        if !keep {
            removed += 1;
        }
        keep
    });

    removed
}
