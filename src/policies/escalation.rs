//! # Error escalation for protocol faults.
//!
//! [`EscalationPolicy`] never restarts on a fault: a malformed message leaves
//! the channel usable, so the session continues. It counts consecutive faults
//! and asks for a single alert when the count reaches the threshold.
//!
//! ```text
//! fault #1 .. #4     → Continue, alert = false
//! fault #threshold   → Continue, alert = true    (once)
//! fault #threshold+1 → Continue, alert = false
//! Running observed   → counter reset (next burst may alert again)
//! closure            → Restart
//! ```

use std::sync::atomic::{AtomicU32, Ordering};

/// What to do with the session after a fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultAction {
    /// Keep the session running.
    Continue,
}

/// What to do after the session closed without a stop being requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseAction {
    /// Request a restart.
    Restart,
}

/// Decision for one protocol fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaultDecision {
    pub action: FaultAction,
    /// True exactly when this fault brought the counter to the threshold.
    pub alert: bool,
}

/// Consecutive-fault counter with a one-time alert threshold.
#[derive(Debug)]
pub struct EscalationPolicy {
    threshold: u32,
    count: AtomicU32,
}

impl EscalationPolicy {
    /// Creates a policy alerting at `threshold` faults (at least 1).
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            count: AtomicU32::new(0),
        }
    }

    /// Records one fault and decides.
    pub fn on_fault(&self, reason: &str) -> FaultDecision {
        let count = self
            .count
            .fetch_add(1, Ordering::SeqCst)
            .saturating_add(1);
        tracing::warn!(count, threshold = self.threshold, %reason, "protocol fault");

        FaultDecision {
            action: FaultAction::Continue,
            alert: count == self.threshold,
        }
    }

    /// Decides what to do after an unexpected closure.
    pub fn on_closed(&self) -> CloseAction {
        CloseAction::Restart
    }

    /// The session reached `Running`: start counting from zero again.
    pub fn on_running(&self) {
        self.count.store(0, Ordering::SeqCst);
    }

    /// Faults seen since the last reset.
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alerts_once_at_threshold() {
        let policy = EscalationPolicy::new(5);
        let alerts: Vec<bool> = (0..8).map(|_| policy.on_fault("bad").alert).collect();
        assert_eq!(
            alerts,
            vec![false, false, false, false, true, false, false, false]
        );
        assert_eq!(policy.count(), 8);
    }

    #[test]
    fn test_faults_never_restart() {
        let policy = EscalationPolicy::new(1);
        let decision = policy.on_fault("bad");
        assert_eq!(decision.action, FaultAction::Continue);
        assert!(decision.alert);
    }

    #[test]
    fn test_running_resets_counter() {
        let policy = EscalationPolicy::new(2);
        policy.on_fault("a");
        assert!(policy.on_fault("b").alert);

        policy.on_running();
        assert_eq!(policy.count(), 0);
        assert!(!policy.on_fault("c").alert);
        assert!(policy.on_fault("d").alert);
    }

    #[test]
    fn test_zero_threshold_is_clamped() {
        let policy = EscalationPolicy::new(0);
        assert_eq!(policy.threshold(), 1);
        assert!(policy.on_fault("x").alert);
    }

    #[test]
    fn test_closure_restarts() {
        assert_eq!(EscalationPolicy::new(5).on_closed(), CloseAction::Restart);
    }
}
