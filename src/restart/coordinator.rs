//! # RestartCoordinator: one restart at a time, one pending timer at most.
//!
//! ## Rules
//! - At most one restart sequence runs at any time. The in-progress flag is
//!   taken with a compare-exchange and released by a drop guard after the
//!   whole sequence (including on error or panic).
//! - Requests arriving while the flag is held are coalesced: the running
//!   restart re-reads the current settings, so it already reflects them.
//! - At most one debounce timer exists. Arming a new one cancels the previous
//!   one; a timer that lost the race to a newer one does nothing when it fires.
//! - Timers are children of the disposing token: disposal cancels them.
//!
//! ```text
//! request(ConfigChange)  t=0     arm #1
//! request(ConfigChange)  t=0.4s  cancel #1, arm #2
//! request(ConfigChange)  t=0.7s  cancel #2, arm #3
//!                        t=1.7s  #3 fires ─► guarded restart
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{RestartOutcome, RestartTarget, Trigger};
use crate::error::RestartError;

/// The armed debounce timer.
struct PendingTimer {
    id: u64,
    token: CancellationToken,
}

/// Serializes restart requests.
pub struct RestartCoordinator {
    debounce: Duration,
    in_progress: Arc<AtomicBool>,
    pending: Arc<Mutex<Option<PendingTimer>>>,
    next_timer: AtomicU64,
    disposing: CancellationToken,
}

impl RestartCoordinator {
    /// Creates a coordinator whose timers stop when `disposing` is cancelled.
    pub fn new(debounce: Duration, disposing: CancellationToken) -> Self {
        Self {
            debounce,
            in_progress: Arc::new(AtomicBool::new(false)),
            pending: Arc::new(Mutex::new(None)),
            next_timer: AtomicU64::new(1),
            disposing,
        }
    }

    /// Handles one restart request.
    ///
    /// `Command` and `AutoAfterClosure` run now (or coalesce); `ConfigChange`
    /// arms the debounce timer and returns [`RestartOutcome::Scheduled`].
    pub async fn request(
        &self,
        trigger: Trigger,
        target: Arc<dyn RestartTarget>,
    ) -> Result<RestartOutcome, RestartError> {
        if self.disposing.is_cancelled() {
            return Err(RestartError::Disposed);
        }
        match trigger {
            Trigger::ConfigChange => {
                self.schedule(target);
                Ok(RestartOutcome::Scheduled)
            }
            Trigger::Command | Trigger::AutoAfterClosure => {
                run_guarded(&self.in_progress, trigger, target.as_ref()).await
            }
        }
    }

    /// Cancels the pending debounce timer, if any.
    pub fn cancel_pending(&self) {
        if let Some(timer) = lock(&self.pending).take() {
            timer.token.cancel();
            tracing::debug!(timer = timer.id, "pending restart cancelled");
        }
    }

    /// True while a restart sequence runs.
    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// True while a debounce timer is armed.
    pub fn has_pending(&self) -> bool {
        lock(&self.pending).is_some()
    }

    fn schedule(&self, target: Arc<dyn RestartTarget>) {
        let id = self.next_timer.fetch_add(1, Ordering::Relaxed);
        let token = self.disposing.child_token();

        let previous = lock(&self.pending).replace(PendingTimer {
            id,
            token: token.clone(),
        });
        if let Some(previous) = previous {
            previous.token.cancel();
        }
        tracing::debug!(timer = id, debounce = ?self.debounce, "restart scheduled");

        let debounce = self.debounce;
        let pending = Arc::clone(&self.pending);
        let in_progress = Arc::clone(&self.in_progress);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(debounce) => {}
            }
            {
                let mut slot = lock(&pending);
                match slot.as_ref() {
                    Some(timer) if timer.id == id => {
                        slot.take();
                    }
                    // Superseded between waking up and taking the lock.
                    _ => return,
                }
            }
            match run_guarded(&in_progress, Trigger::ConfigChange, target.as_ref()).await {
                Ok(outcome) => tracing::debug!(timer = id, ?outcome, "debounced restart finished"),
                Err(e) => tracing::debug!(timer = id, error = %e, "debounced restart failed"),
            }
        });
    }
}

/// Runs `target.restart` unless another restart holds the flag.
async fn run_guarded(
    flag: &AtomicBool,
    trigger: Trigger,
    target: &dyn RestartTarget,
) -> Result<RestartOutcome, RestartError> {
    let Some(_guard) = InProgress::acquire(flag) else {
        tracing::debug!(trigger = trigger.as_str(), "restart already in progress; coalesced");
        return Ok(RestartOutcome::Coalesced);
    };
    tracing::info!(trigger = trigger.as_str(), "restarting language server");
    let generation = target.restart(trigger).await?;
    Ok(RestartOutcome::Restarted { generation })
}

/// Holds the in-progress flag; clears it on drop.
struct InProgress<'a>(&'a AtomicBool);

impl<'a> InProgress<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectionError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    /// Counts restarts; each one takes `delay`.
    struct CountingTarget {
        calls: AtomicU32,
        delay: Duration,
        fail: AtomicBool,
    }

    impl CountingTarget {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                delay,
                fail: AtomicBool::new(false),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RestartTarget for CountingTarget {
        async fn restart(&self, _trigger: Trigger) -> Result<u64, RestartError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            if self.fail.load(Ordering::SeqCst) {
                return Err(RestartError::Start(ConnectionError::NotRunning));
            }
            Ok(u64::from(n))
        }
    }

    fn coordinator(debounce: Duration) -> Arc<RestartCoordinator> {
        Arc::new(RestartCoordinator::new(debounce, CancellationToken::new()))
    }

    #[tokio::test]
    async fn test_concurrent_commands_coalesce() {
        let coord = coordinator(Duration::from_millis(50));
        let target = CountingTarget::new(Duration::from_millis(50));

        let first = {
            let coord = coord.clone();
            let target: Arc<dyn RestartTarget> = target.clone();
            tokio::spawn(async move { coord.request(Trigger::Command, target).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(coord.is_in_progress());

        let second = coord.request(Trigger::AutoAfterClosure, target.clone()).await;
        assert_eq!(second, Ok(RestartOutcome::Coalesced));
        assert_eq!(
            first.await.unwrap(),
            Ok(RestartOutcome::Restarted { generation: 1 })
        );
        assert_eq!(target.calls(), 1);
        assert!(!coord.is_in_progress());
    }

    #[tokio::test]
    async fn test_config_burst_restarts_once() {
        let coord = coordinator(Duration::from_millis(60));
        let target = CountingTarget::new(Duration::ZERO);

        for _ in 0..3 {
            let outcome = coord.request(Trigger::ConfigChange, target.clone()).await;
            assert_eq!(outcome, Ok(RestartOutcome::Scheduled));
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(target.calls(), 0);
        assert!(coord.has_pending());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(target.calls(), 1);
        assert!(!coord.has_pending());
    }

    #[tokio::test]
    async fn test_cancel_pending() {
        let coord = coordinator(Duration::from_millis(30));
        let target = CountingTarget::new(Duration::ZERO);

        coord.request(Trigger::ConfigChange, target.clone()).await.unwrap();
        coord.cancel_pending();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(target.calls(), 0);
    }

    #[tokio::test]
    async fn test_disposal_cancels_timer_and_refuses_requests() {
        let disposing = CancellationToken::new();
        let coord = RestartCoordinator::new(Duration::from_millis(30), disposing.clone());
        let target = CountingTarget::new(Duration::ZERO);

        coord.request(Trigger::ConfigChange, target.clone()).await.unwrap();
        disposing.cancel();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(target.calls(), 0);
        assert_eq!(
            coord.request(Trigger::Command, target.clone()).await,
            Err(RestartError::Disposed)
        );
    }

    #[tokio::test]
    async fn test_flag_released_after_failure() {
        let coord = coordinator(Duration::from_millis(30));
        let target = CountingTarget::new(Duration::ZERO);
        target.fail.store(true, Ordering::SeqCst);

        let err = coord.request(Trigger::Command, target.clone()).await.unwrap_err();
        assert_eq!(err.as_label(), "restart_start_failed");
        assert!(!coord.is_in_progress());

        target.fail.store(false, Ordering::SeqCst);
        assert_eq!(
            coord.request(Trigger::Command, target.clone()).await,
            Ok(RestartOutcome::Restarted { generation: 2 })
        );
    }

    #[tokio::test]
    async fn test_timer_firing_during_restart_is_coalesced() {
        let coord = coordinator(Duration::from_millis(20));
        let target = CountingTarget::new(Duration::from_millis(100));

        coord.request(Trigger::ConfigChange, target.clone()).await.unwrap();
        // The command starts first and is still running when the timer fires.
        let outcome = coord.request(Trigger::Command, target.clone()).await;
        assert_eq!(outcome, Ok(RestartOutcome::Restarted { generation: 1 }));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(target.calls(), 1);
        assert!(!coord.has_pending());
    }
}
