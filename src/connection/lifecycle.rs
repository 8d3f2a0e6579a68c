//! # Connection: one logical session to the language server.
//!
//! The [`Connection`] object lives for the whole supervisor lifetime; each
//! `start()` re-arms it with a fresh process and a new **generation**.
//!
//! ## Architecture
//! ```text
//!            status: watch<(state, generation)>     active: Option<Active>
//!                        │                                   │
//! start() ── Stopped→Starting (gen+1) ── Launcher::launch ───┤── Running, spawn pump(gen)
//!                                              └─ Err ─── Stopped(reason)
//!
//! pump(gen): signals ─┬─ Message  ──► messages() broadcast (relayed unchanged)
//!                     ├─ Fault    ──► Event::ProtocolFault
//!                     └─ Closed   ──► Stopped(reason) + Event::SessionClosed   (only if gen still active)
//!
//! stop() ── wait_for(state != Starting) ── take Active ── Stopped ── Session::shutdown(grace)
//! ```
//!
//! ## Rules
//! - Transitions are applied through `status` and published only when they
//!   change the current generation's state; a stale generation can never
//!   publish.
//! - `stop()` is idempotent and never tears down a half-initialized session.
//! - After [`Connection::dispose`] every `start()` fails.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::session::{InitOptions, Launched, Launcher, Session, SessionSignal};
use super::state::{ConnectionState, Snapshot};
use crate::error::ConnectionError;
use crate::events::{Bus, Event, EventKind};
use crate::locator::Executable;
use crate::settings::TraceLevel;

/// Capacity of the relayed-message broadcast channel.
const MESSAGE_CAPACITY: usize = 256;

/// The live session of the current generation.
struct Active {
    generation: u64,
    session: Box<dyn Session>,
    /// Stops this generation's pump.
    pump: CancellationToken,
}

/// Process connection with a three-state lifecycle.
pub struct Connection {
    launcher: Arc<dyn Launcher>,
    bus: Bus,
    grace: Duration,
    status: watch::Sender<Snapshot>,
    active: Mutex<Option<Active>>,
    messages: broadcast::Sender<Arc<Value>>,
    trace: AtomicU8,
    disposed: AtomicBool,
}

impl Connection {
    /// Creates a stopped connection (generation 0).
    pub fn new(launcher: Arc<dyn Launcher>, bus: Bus, grace: Duration) -> Arc<Self> {
        let (status, _) = watch::channel(Snapshot::default());
        let (messages, _) = broadcast::channel(MESSAGE_CAPACITY);
        Arc::new(Self {
            launcher,
            bus,
            grace,
            status,
            active: Mutex::new(None),
            messages,
            trace: AtomicU8::new(TraceLevel::Off.as_u8()),
            disposed: AtomicBool::new(false),
        })
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    /// Current generation (0 before the first start).
    pub fn generation(&self) -> u64 {
        self.status.borrow().generation
    }

    /// Current state and generation, read atomically.
    pub fn snapshot(&self) -> Snapshot {
        *self.status.borrow()
    }

    /// Receiver for connection events published from now on.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Event bus the connection publishes into.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Receiver for server messages relayed unchanged.
    pub fn messages(&self) -> broadcast::Receiver<Arc<Value>> {
        self.messages.subscribe()
    }

    /// Changes how relayed messages are logged. Takes effect immediately.
    pub fn set_trace(&self, level: TraceLevel) {
        self.trace.store(level.as_u8(), Ordering::Relaxed);
    }

    /// Sends a message to the server unchanged.
    pub fn send(&self, message: Value) -> Result<(), ConnectionError> {
        match self.lock_active().as_ref() {
            Some(active) => active.session.send(message),
            None => Err(ConnectionError::NotRunning),
        }
    }

    /// Refuses all future starts. Does not stop a live session.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }

    /// Waits until the current state is not `Starting` and returns it.
    pub async fn settled(&self) -> Snapshot {
        let mut rx = self.status.subscribe();
        let settled = match rx.wait_for(|s| s.state != ConnectionState::Starting).await {
            Ok(s) => *s,
            // The sender lives in `self`; it cannot be gone while we are borrowed.
            Err(_) => self.snapshot(),
        };
        settled
    }

    /// Arms a new generation and brings it to `Running`.
    ///
    /// Returns the generation on success. On failure the generation ends in
    /// `Stopped` and the launch error is returned.
    pub async fn start(
        self: &Arc<Self>,
        exe: &Executable,
        init: &InitOptions,
    ) -> Result<u64, ConnectionError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(ConnectionError::Disposed);
        }

        let mut armed = None;
        self.status.send_if_modified(|s| {
            if s.state != ConnectionState::Stopped {
                return false;
            }
            s.generation += 1;
            s.state = ConnectionState::Starting;
            armed = Some(s.generation);
            true
        });
        let Some(generation) = armed else {
            return Err(ConnectionError::AlreadyActive {
                state: self.state(),
            });
        };
        self.bus.publish(Event::transition(ConnectionState::Starting, generation));
        tracing::debug!(generation, command = %exe.display(), "connection starting");

        match self.launcher.launch(exe, init).await {
            Ok(Launched { session, signals }) => {
                let pump = CancellationToken::new();
                *self.lock_active() = Some(Active {
                    generation,
                    session,
                    pump: pump.clone(),
                });
                self.transition(generation, ConnectionState::Running, None);
                tokio::spawn(pump_signals(Arc::downgrade(self), generation, signals, pump));
                Ok(generation)
            }
            Err(e) => {
                self.transition(generation, ConnectionState::Stopped, Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// Stops the current session, if any.
    ///
    /// Idempotent. While `Starting`, waits for the start to resolve first.
    /// Teardown errors are returned for the caller to log; the state is
    /// `Stopped` either way.
    pub async fn stop(&self) -> Result<(), ConnectionError> {
        self.settled().await;

        let Some(active) = self.lock_active().take() else {
            return Ok(());
        };
        active.pump.cancel();
        self.transition(active.generation, ConnectionState::Stopped, None);
        tracing::debug!(generation = active.generation, "connection stopping");

        active.session.shutdown(self.grace).await
    }

    /// Applies a transition for `generation`; publishes only if it changed the state.
    fn transition(&self, generation: u64, state: ConnectionState, reason: Option<String>) {
        let applied = self.status.send_if_modified(|s| {
            if s.generation != generation || s.state == state {
                return false;
            }
            s.state = state;
            true
        });
        if !applied {
            return;
        }
        let ev = Event::transition(state, generation);
        self.bus.publish(match reason {
            Some(r) => ev.with_reason(r),
            None => ev,
        });
    }

    /// Handles a closure reported by the pump of `generation`.
    fn closed_unexpectedly(&self, generation: u64, reason: String) {
        let active = {
            let mut guard = self.lock_active();
            match guard.as_ref() {
                Some(a) if a.generation == generation => guard.take(),
                _ => None,
            }
        };
        // Explicit stop already took the session: nothing unexpected happened.
        let Some(active) = active else { return };

        active.pump.cancel();
        self.transition(generation, ConnectionState::Stopped, Some(reason.clone()));
        self.bus
            .publish(Event::new(EventKind::SessionClosed, generation).with_reason(reason));
        // Dropping the session reaps whatever is left of the process.
        drop(active);
    }

    fn relay(&self, generation: u64, message: Value) {
        match TraceLevel::from_u8(self.trace.load(Ordering::Relaxed)) {
            TraceLevel::Off => {}
            TraceLevel::Messages => {
                let method = message
                    .get("method")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("<response>");
                tracing::info!(generation, method, "server message");
            }
            TraceLevel::Verbose => tracing::info!(generation, %message, "server message"),
        }
        let _ = self.messages.send(Arc::new(message));
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<Active>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Forwards one generation's session signals until closure or cancellation.
async fn pump_signals(
    conn: Weak<Connection>,
    generation: u64,
    mut signals: mpsc::UnboundedReceiver<SessionSignal>,
    token: CancellationToken,
) {
    loop {
        let signal = tokio::select! {
            _ = token.cancelled() => break,
            s = signals.recv() => s,
        };
        let Some(conn) = conn.upgrade() else { break };
        match signal {
            Some(SessionSignal::Message(message)) => conn.relay(generation, message),
            Some(SessionSignal::Fault(reason)) => conn
                .bus
                .publish(Event::new(EventKind::ProtocolFault, generation).with_reason(reason)),
            Some(SessionSignal::Closed(reason)) => {
                conn.closed_unexpectedly(generation, reason);
                break;
            }
            None => {
                conn.closed_unexpectedly(generation, "session signal stream ended".to_string());
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockLauncher, eventually, init_options, test_executable};
    use std::time::Duration;

    fn connection(launcher: &Arc<MockLauncher>) -> Arc<Connection> {
        Connection::new(launcher.clone(), Bus::new(64), Duration::from_millis(50))
    }

    async fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<(EventKind, u64)> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push((ev.kind, ev.generation));
        }
        out
    }

    #[tokio::test]
    async fn test_start_reaches_running() {
        let launcher = MockLauncher::new();
        let conn = connection(&launcher);
        let mut rx = conn.subscribe();

        let generation = conn.start(&test_executable(), &init_options()).await.unwrap();
        assert_eq!(generation, 1);
        assert_eq!(conn.state(), ConnectionState::Running);
        assert_eq!(
            drain(&mut rx).await,
            vec![(EventKind::Starting, 1), (EventKind::Running, 1)]
        );
    }

    #[tokio::test]
    async fn test_start_refused_while_active() {
        let launcher = MockLauncher::new();
        let conn = connection(&launcher);
        conn.start(&test_executable(), &init_options()).await.unwrap();

        let err = conn.start(&test_executable(), &init_options()).await.unwrap_err();
        assert_eq!(
            err,
            ConnectionError::AlreadyActive {
                state: ConnectionState::Running
            }
        );
        assert_eq!(conn.generation(), 1);
    }

    #[tokio::test]
    async fn test_launch_failure_ends_stopped() {
        let launcher = MockLauncher::new();
        launcher.fail_next(1);
        let conn = connection(&launcher);
        let mut rx = conn.subscribe();

        let err = conn.start(&test_executable(), &init_options()).await.unwrap_err();
        assert!(err.is_launch_fault());
        assert_eq!(conn.state(), ConnectionState::Stopped);
        assert_eq!(
            drain(&mut rx).await,
            vec![(EventKind::Starting, 1), (EventKind::Stopped, 1)]
        );
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let launcher = MockLauncher::new();
        let conn = connection(&launcher);
        conn.stop().await.unwrap();

        conn.start(&test_executable(), &init_options()).await.unwrap();
        let mut rx = conn.subscribe();
        conn.stop().await.unwrap();
        conn.stop().await.unwrap();

        assert_eq!(conn.state(), ConnectionState::Stopped);
        assert_eq!(drain(&mut rx).await, vec![(EventKind::Stopped, 1)]);
        assert_eq!(launcher.shutdowns(), 1);
    }

    #[tokio::test]
    async fn test_stop_waits_for_in_flight_start() {
        let launcher = MockLauncher::new();
        launcher.set_handshake_delay(Duration::from_millis(50));
        let conn = connection(&launcher);

        let starter = {
            let conn = conn.clone();
            tokio::spawn(async move { conn.start(&test_executable(), &init_options()).await })
        };
        eventually(|| conn.state() == ConnectionState::Starting).await;

        conn.stop().await.unwrap();
        // The start finished first, then the stop tore the session down.
        assert_eq!(starter.await.unwrap(), Ok(1));
        assert_eq!(conn.state(), ConnectionState::Stopped);
        assert_eq!(launcher.shutdowns(), 1);
    }

    #[tokio::test]
    async fn test_settled_waits_for_start_to_resolve() {
        let launcher = MockLauncher::new();
        launcher.set_handshake_delay(Duration::from_millis(30));
        let conn = connection(&launcher);
        assert_eq!(conn.settled().await, Snapshot::default());

        let starter = {
            let conn = conn.clone();
            tokio::spawn(async move { conn.start(&test_executable(), &init_options()).await })
        };
        eventually(|| conn.state() == ConnectionState::Starting).await;

        assert_eq!(
            conn.settled().await,
            Snapshot { state: ConnectionState::Running, generation: 1 }
        );
        assert_eq!(starter.await.unwrap(), Ok(1));
    }

    #[tokio::test]
    async fn test_messages_relayed_at_every_trace_level() {
        let launcher = MockLauncher::new();
        let conn = connection(&launcher);
        conn.start(&test_executable(), &init_options()).await.unwrap();
        let mut messages = conn.messages();
        let session = launcher.session(0);

        for level in [TraceLevel::Off, TraceLevel::Messages, TraceLevel::Verbose] {
            conn.set_trace(level);
            session.message(serde_json::json!({ "method": "window/logMessage" }));
            session.message(serde_json::json!({ "id": 3, "result": null }));
            assert_eq!(messages.recv().await.unwrap()["method"], "window/logMessage");
            assert_eq!(messages.recv().await.unwrap()["id"], 3);
        }
    }

    #[tokio::test]
    async fn test_unexpected_closure() {
        let launcher = MockLauncher::new();
        let conn = connection(&launcher);
        conn.start(&test_executable(), &init_options()).await.unwrap();
        let mut rx = conn.subscribe();

        launcher.session(0).close("crashed");
        eventually(|| conn.state() == ConnectionState::Stopped).await;

        let events = {
            // SessionClosed is published right after Stopped.
            eventually(|| rx.len() >= 2).await;
            drain(&mut rx).await
        };
        assert_eq!(
            events,
            vec![(EventKind::Stopped, 1), (EventKind::SessionClosed, 1)]
        );
        assert_eq!(launcher.shutdowns(), 0);
    }

    #[tokio::test]
    async fn test_faults_and_messages_are_forwarded() {
        let launcher = MockLauncher::new();
        let conn = connection(&launcher);
        conn.start(&test_executable(), &init_options()).await.unwrap();
        let mut rx = conn.subscribe();
        let mut messages = conn.messages();

        let session = launcher.session(0);
        session.fault("bad frame");
        session.message(serde_json::json!({ "method": "textDocument/publishDiagnostics" }));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::ProtocolFault);
        assert_eq!(ev.reason.as_deref(), Some("bad frame"));
        let msg = messages.recv().await.unwrap();
        assert_eq!(msg["method"], "textDocument/publishDiagnostics");
        assert_eq!(conn.state(), ConnectionState::Running);
    }

    #[tokio::test]
    async fn test_late_closure_of_old_generation_is_ignored() {
        let launcher = MockLauncher::new();
        let conn = connection(&launcher);
        conn.start(&test_executable(), &init_options()).await.unwrap();
        conn.stop().await.unwrap();
        conn.start(&test_executable(), &init_options()).await.unwrap();
        let mut rx = conn.subscribe();

        // Generation 1's channel reports closure after generation 2 is running.
        launcher.session(0).close("late eof");
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(conn.snapshot(), Snapshot { state: ConnectionState::Running, generation: 2 });
        assert!(drain(&mut rx).await.is_empty());
    }

    #[tokio::test]
    async fn test_send_requires_running_session() {
        let launcher = MockLauncher::new();
        let conn = connection(&launcher);
        assert_eq!(
            conn.send(serde_json::json!({})),
            Err(ConnectionError::NotRunning)
        );
        conn.start(&test_executable(), &init_options()).await.unwrap();
        conn.send(serde_json::json!({ "method": "x" })).unwrap();
        assert_eq!(launcher.session(0).sent().len(), 1);
    }

    #[tokio::test]
    async fn test_disposed_connection_refuses_start() {
        let launcher = MockLauncher::new();
        let conn = connection(&launcher);
        conn.dispose();
        assert_eq!(
            conn.start(&test_executable(), &init_options()).await,
            Err(ConnectionError::Disposed)
        );
        assert_eq!(conn.generation(), 0);
    }
}
