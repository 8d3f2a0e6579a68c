//! Fault and closure policies.
//!
//! This module groups the pure decisions the supervisor takes when the
//! session misbehaves. Side effects (alerts, restarts) are applied by the
//! caller.
//!
//! ## Contents
//! - [`EscalationPolicy`] counts consecutive protocol faults and decides when to alert
//! - [`FaultDecision`], [`FaultAction`], [`CloseAction`] decisions returned to the caller
//!
//! ## Quick wiring
//! ```text
//! Event::ProtocolFault  ─► policy.on_fault(reason) ─► Continue (+ alert once at threshold)
//! Event::SessionClosed  ─► policy.on_closed()      ─► Restart  ─► RestartCoordinator
//! Event::Running        ─► policy.on_running()     ─► counter = 0
//! ```
//!
//! ## Defaults
//! - Alert threshold: 5 consecutive faults ([`Config::alert_threshold`](crate::Config::alert_threshold)).

mod escalation;

pub use escalation::{CloseAction, EscalationPolicy, FaultAction, FaultDecision};
