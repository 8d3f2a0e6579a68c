//! Test doubles shared by the unit tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::connection::{InitOptions, Launched, Launcher, Session, SessionSignal};
use crate::error::ConnectionError;
use crate::host::{Host, Status};
use crate::locator::{Executable, ExecutableSource};

/// Polls `cond` until it holds (about one second at most).
pub(crate) async fn eventually(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

pub(crate) fn test_executable() -> Executable {
    Executable {
        command: PathBuf::from("l-lsp"),
        source: ExecutableSource::Fallback,
        env: Vec::new(),
        cwd: None,
    }
}

pub(crate) fn init_options() -> InitOptions {
    InitOptions {
        client_name: "test".into(),
        max_number_of_problems: 100,
        root_uri: None,
    }
}

/// Drives one mock session from the test side.
#[derive(Clone)]
pub(crate) struct SessionProbe {
    signals: mpsc::UnboundedSender<SessionSignal>,
    sent: Arc<Mutex<Vec<Value>>>,
}

impl SessionProbe {
    pub(crate) fn close(&self, reason: &str) {
        let _ = self.signals.send(SessionSignal::Closed(reason.to_string()));
    }

    pub(crate) fn fault(&self, reason: &str) {
        let _ = self.signals.send(SessionSignal::Fault(reason.to_string()));
    }

    pub(crate) fn message(&self, message: Value) {
        let _ = self.signals.send(SessionSignal::Message(message));
    }

    pub(crate) fn sent(&self) -> Vec<Value> {
        self.sent.lock().unwrap().clone()
    }
}

#[derive(Default)]
struct Script {
    fail_next: u32,
    fail_always: bool,
    delay: Duration,
    sessions: Vec<SessionProbe>,
    executables: Vec<Executable>,
    init: Vec<InitOptions>,
}

/// Scripted launcher: succeeds unless told to fail, records everything.
#[derive(Default)]
pub(crate) struct MockLauncher {
    script: Mutex<Script>,
    launches: AtomicU32,
    shutdowns: Arc<AtomicU32>,
}

impl MockLauncher {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The next `n` launches fail with a spawn error.
    pub(crate) fn fail_next(&self, n: u32) {
        self.script.lock().unwrap().fail_next = n;
    }

    /// Every launch fails with a spawn error.
    pub(crate) fn fail_always(&self, fail: bool) {
        self.script.lock().unwrap().fail_always = fail;
    }

    /// Every launch takes `delay` before resolving.
    pub(crate) fn set_handshake_delay(&self, delay: Duration) {
        self.script.lock().unwrap().delay = delay;
    }

    pub(crate) fn launches(&self) -> u32 {
        self.launches.load(Ordering::SeqCst)
    }

    pub(crate) fn shutdowns(&self) -> u32 {
        self.shutdowns.load(Ordering::SeqCst)
    }

    /// Probe for the `i`-th successful launch.
    pub(crate) fn session(&self, i: usize) -> SessionProbe {
        self.script.lock().unwrap().sessions[i].clone()
    }

    pub(crate) fn sessions(&self) -> usize {
        self.script.lock().unwrap().sessions.len()
    }

    pub(crate) fn last_executable(&self) -> Option<Executable> {
        self.script.lock().unwrap().executables.last().cloned()
    }

    pub(crate) fn last_init(&self) -> Option<InitOptions> {
        self.script.lock().unwrap().init.last().cloned()
    }
}

#[async_trait]
impl Launcher for MockLauncher {
    async fn launch(
        &self,
        exe: &Executable,
        init: &InitOptions,
    ) -> Result<Launched, ConnectionError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let delay = {
            let mut script = self.script.lock().unwrap();
            script.executables.push(exe.clone());
            script.init.push(init.clone());
            script.delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let fail = {
            let mut script = self.script.lock().unwrap();
            if script.fail_next > 0 {
                script.fail_next -= 1;
                true
            } else {
                script.fail_always
            }
        };
        if fail {
            return Err(ConnectionError::Spawn {
                command: exe.display(),
                error: "No such file or directory".into(),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        self.script.lock().unwrap().sessions.push(SessionProbe {
            signals: tx,
            sent: Arc::clone(&sent),
        });
        Ok(Launched {
            session: Box::new(MockSession {
                sent,
                shutdowns: Arc::clone(&self.shutdowns),
            }),
            signals: rx,
        })
    }
}

struct MockSession {
    sent: Arc<Mutex<Vec<Value>>>,
    shutdowns: Arc<AtomicU32>,
}

#[async_trait]
impl Session for MockSession {
    fn send(&self, message: Value) -> Result<(), ConnectionError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn shutdown(self: Box<Self>, _grace: Duration) -> Result<(), ConnectionError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Host recording every call.
#[derive(Default)]
pub(crate) struct RecordingHost {
    statuses: Mutex<Vec<Status>>,
    alerts: Mutex<Vec<String>>,
    progress_depth: AtomicI32,
    progress_shown: AtomicU32,
}

impl RecordingHost {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn statuses(&self) -> Vec<Status> {
        self.statuses.lock().unwrap().clone()
    }

    pub(crate) fn last_status(&self) -> Option<Status> {
        self.statuses.lock().unwrap().last().copied()
    }

    pub(crate) fn alerts(&self) -> Vec<String> {
        self.alerts.lock().unwrap().clone()
    }

    pub(crate) fn progress_depth(&self) -> i32 {
        self.progress_depth.load(Ordering::SeqCst)
    }

    pub(crate) fn progress_shown(&self) -> u32 {
        self.progress_shown.load(Ordering::SeqCst)
    }
}

impl Host for RecordingHost {
    fn set_status(&self, status: Status) {
        self.statuses.lock().unwrap().push(status);
    }

    fn show_alert(&self, message: &str) {
        self.alerts.lock().unwrap().push(message.to_string());
    }

    fn begin_progress(&self, _title: &str) {
        self.progress_shown.fetch_add(1, Ordering::SeqCst);
        self.progress_depth.fetch_add(1, Ordering::SeqCst);
    }

    fn end_progress(&self) {
        self.progress_depth.fetch_sub(1, Ordering::SeqCst);
    }
}
