//! Reconnect Scheduler
//!
//! Periodically recycles the gateway connection. The gateway drops sessions
//! that stay open too long, so the session is closed and reopened on a fixed
//! interval (20 minutes by default) instead of waiting for the server to do
//! it mid-request.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Single-instance periodic task.
#[derive(Debug)]
pub struct ReconnectScheduler {
    interval: Duration,
    running: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
}

impl ReconnectScheduler {
    /// Create a stopped scheduler ticking every `interval`.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            running: AtomicBool::new(false),
            cancel: Mutex::new(None),
        }
    }

    /// Whether the scheduler task is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start ticking. The first tick fires one interval from now.
    ///
    /// Returns `false` without spawning if a scheduler task already runs.
    pub fn start<F, Fut>(&self, tick: F) -> bool
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.cancel.lock();
        if self.running.swap(true, Ordering::SeqCst) {
            return false;
        }

        let cancel = CancellationToken::new();
        *slot = Some(cancel.clone());
        tokio::spawn(run(self.interval, cancel, tick));
        tracing::debug!(interval_secs = self.interval.as_secs(), "Reconnect scheduler started");
        true
    }

    /// Stop ticking. A tick already in progress runs to completion.
    pub fn stop(&self) {
        let mut slot = self.cancel.lock();
        if let Some(cancel) = slot.take() {
            cancel.cancel();
            tracing::debug!("Reconnect scheduler stopped");
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

async fn run<F, Fut>(period: Duration, cancel: CancellationToken, tick: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = interval.tick() => tick().await,
        }
    }
}
