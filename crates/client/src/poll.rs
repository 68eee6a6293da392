//! Cancellable periodic refresh tasks.
//!
//! A [`PollHandle`] owns a background task that re-runs a refresh on a fixed
//! interval. The task stops when the handle is cancelled or dropped, so a
//! view that holds the handle for its visible lifetime never leaks work.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Shortest interval a poll may run at.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Handle to a running poll. Dropping it stops the poll.
#[derive(Debug)]
pub struct PollHandle {
    name: &'static str,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Run `tick` every `period`, starting one period from now.
    ///
    /// `period` is raised to [`MIN_POLL_INTERVAL`] if shorter. A tick that
    /// overruns the period delays the next one instead of bunching up.
    /// Must be called from within a Tokio runtime.
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = period.max(MIN_POLL_INTERVAL);
        debug!(poll = name, ?period, "Starting poll");

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                tick().await;
            }
        });

        Self { name, task }
    }

    /// Stop the poll. An in-flight tick is abandoned.
    pub fn cancel(self) {
        drop(self);
    }

    /// Whether the poll task has stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        debug!(poll = self.name, "Stopping poll");
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting_poll(period: Duration) -> (PollHandle, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let ticks = Arc::clone(&count);
        let handle = PollHandle::spawn("test", period, move || {
            let ticks = Arc::clone(&ticks);
            async move {
                ticks.fetch_add(1, Ordering::SeqCst);
            }
        });
        (handle, count)
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_ticks_each_period() {
        let (handle, count) = counting_poll(Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        drop(handle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_poll_stops_ticking() {
        let (handle, count) = counting_poll(Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(15)).await;
        handle.cancel();
        let seen = count.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_period_has_a_floor() {
        let (_handle, count) = counting_poll(Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
