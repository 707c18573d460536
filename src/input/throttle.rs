//! Generic trailing-edge throttle for zero-argument actions.
//!
//! Used to rate-limit high-frequency UI events before they become
//! outbound commands. Unlike a plain rate limiter, the final trigger in a
//! burst is never dropped: it runs once after the remaining interval,
//! superseding any earlier still-pending execution.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::warn;

struct ThrottleState {
    last_run: Option<Instant>,
    pending: Option<JoinHandle<()>>,
}

/// Trailing-edge throttle with interval `T`: at most one execution per
/// interval under sustained triggering, and the last trigger of a burst
/// always executes eventually.
///
/// Requires a tokio runtime; deferred executions are spawned sleeps and a
/// replaced execution is aborted, which degrades gracefully if the abort
/// races the sleep completing. The internal lock is never held across the
/// action itself.
pub struct Throttler {
    interval: Duration,
    state: Arc<Mutex<ThrottleState>>,
}

impl Throttler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: Arc::new(Mutex::new(ThrottleState {
                last_run: None,
                pending: None,
            })),
        }
    }

    /// Execute `action` immediately if at least the throttle interval has
    /// passed since the last execution (or none happened yet); otherwise
    /// schedule it for the remaining time, replacing any pending
    /// scheduled execution.
    pub fn trigger<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let now = Instant::now();

        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(e) => {
                warn!("Throttler state poisoned, dropping trigger: {}", e);
                return;
            }
        };

        let elapsed = guard.last_run.map(|last| now.duration_since(last));
        match elapsed {
            Some(elapsed) if elapsed < self.interval => {
                let remaining = self.interval - elapsed;
                let state = Arc::clone(&self.state);
                let task = tokio::spawn(async move {
                    tokio::time::sleep(remaining).await;
                    if let Ok(mut guard) = state.lock() {
                        guard.last_run = Some(Instant::now());
                        guard.pending = None;
                        drop(guard);
                        action();
                    }
                });
                if let Some(old) = guard.pending.replace(task) {
                    old.abort();
                }
            }
            _ => {
                guard.last_run = Some(now);
                if let Some(old) = guard.pending.take() {
                    old.abort();
                }
                drop(guard);
                action();
            }
        }
    }

    /// Cancel any pending deferred execution without running it.
    pub fn cleanup(&self) {
        if let Ok(mut guard) = self.state.lock() {
            if let Some(pending) = guard.pending.take() {
                pending.abort();
            }
        }
    }
}

impl Drop for Throttler {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter_action(counter: &Arc<AtomicUsize>) -> impl FnOnce() + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_trigger_runs_immediately() {
        let throttler = Throttler::new(Duration::from_millis(100));
        let runs = Arc::new(AtomicUsize::new(0));
        throttler.trigger(counter_action(&runs));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_to_immediate_plus_trailing_run() {
        let throttler = Throttler::new(Duration::from_millis(100));
        let runs = Arc::new(AtomicUsize::new(0));
        let last_value = Arc::new(AtomicUsize::new(0));

        for i in 1..=5 {
            let runs = Arc::clone(&runs);
            let last_value = Arc::clone(&last_value);
            throttler.trigger(move || {
                runs.fetch_add(1, Ordering::SeqCst);
                last_value.store(i, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // Only the first trigger ran so far
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(last_value.load(Ordering::SeqCst), 1);

        // After the interval drains, exactly the final trigger ran
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(last_value.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn spaced_triggers_all_run_immediately() {
        let throttler = Throttler::new(Duration::from_millis(100));
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            throttler.trigger(counter_action(&runs));
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_cancels_pending_execution() {
        let throttler = Throttler::new(Duration::from_millis(100));
        let runs = Arc::new(AtomicUsize::new(0));

        throttler.trigger(counter_action(&runs));
        throttler.trigger(counter_action(&runs)); // deferred
        throttler.cleanup();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn trailing_run_rearms_the_interval() {
        let throttler = Throttler::new(Duration::from_millis(100));
        let runs = Arc::new(AtomicUsize::new(0));

        throttler.trigger(counter_action(&runs)); // immediate, t=0
        tokio::time::sleep(Duration::from_millis(50)).await;
        throttler.trigger(counter_action(&runs)); // deferred to t=100
        tokio::time::sleep(Duration::from_millis(60)).await; // t=110, ran

        assert_eq!(runs.load(Ordering::SeqCst), 2);

        // A trigger right after the trailing run is throttled again
        throttler.trigger(counter_action(&runs));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }
}
