//! # Stdio launcher: the production process boundary.
//!
//! Spawns the server with piped stdio and drives three background tasks per
//! process:
//!
//! ```text
//! writer   outbound mpsc ──► write_frame ──► child stdin
//! reader   child stdout ──► read_frame ──┬─► pending response (own requests)
//!                                        └─► SessionSignal::{Message, Fault, Closed}
//! stderr   child stderr ──► tracing::debug! line by line
//! ```
//!
//! Handshake: `initialize` request (with `initializationOptions`) followed by the
//! `initialized` notification. Teardown: `shutdown` request, `exit` notification,
//! bounded wait for the process, then kill.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::time;

use super::codec::{FrameError, read_frame, write_frame};
use super::session::{InitOptions, Launched, Launcher, Session, SessionSignal};
use crate::error::ConnectionError;
use crate::locator::Executable;

type Pending = Arc<Mutex<HashMap<i64, oneshot::Sender<Value>>>>;

/// Launches the server as a child process speaking over stdin/stdout.
#[derive(Clone, Debug, Default)]
pub struct StdioLauncher;

impl StdioLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Launcher for StdioLauncher {
    async fn launch(
        &self,
        exe: &Executable,
        init: &InitOptions,
    ) -> Result<Launched, ConnectionError> {
        tracing::info!(command = %exe.display(), "spawning language server");

        let mut cmd = Command::new(exe.program());
        cmd.envs(exe.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &exe.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|e| ConnectionError::Spawn {
            command: exe.display(),
            error: e.to_string(),
        })?;

        let stdin = child.stdin.take().ok_or_else(|| spawn_err(exe, "stdin not captured"))?;
        let stdout = child.stdout.take().ok_or_else(|| spawn_err(exe, "stdout not captured"))?;
        let stderr = child.stderr.take().ok_or_else(|| spawn_err(exe, "stderr not captured"))?;

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(write_loop(stdin, out_rx));
        tokio::spawn(read_loop(stdout, Arc::clone(&pending), signal_tx));
        tokio::spawn(stderr_loop(stderr));

        let session = StdioSession {
            child,
            outbound: out_tx,
            pending,
            next_id: AtomicI64::new(1),
        };
        // On failure the session is dropped here and kill_on_drop reaps the child.
        session.handshake(init).await?;

        Ok(Launched {
            session: Box::new(session),
            signals: signal_rx,
        })
    }
}

fn spawn_err(exe: &Executable, what: &str) -> ConnectionError {
    ConnectionError::Spawn {
        command: exe.display(),
        error: what.to_string(),
    }
}

/// One running server process.
struct StdioSession {
    child: Child,
    outbound: mpsc::UnboundedSender<Value>,
    pending: Pending,
    next_id: AtomicI64,
}

impl StdioSession {
    async fn handshake(&self, init: &InitOptions) -> Result<(), ConnectionError> {
        let params = json!({
            "processId": std::process::id(),
            "clientInfo": {
                "name": init.client_name,
                "version": env!("CARGO_PKG_VERSION"),
            },
            "rootUri": init.root_uri,
            "capabilities": {},
            "initializationOptions": {
                "maxNumberOfProblems": init.max_number_of_problems,
            },
        });

        let response = self
            .request("initialize", params)
            .await
            .map_err(|error| ConnectionError::Handshake { error })?;
        if let Some(error) = response.get("error") {
            return Err(ConnectionError::Handshake {
                error: rpc_error_message(error),
            });
        }

        self.notify("initialized", json!({}))
            .map_err(|e| ConnectionError::Handshake { error: e.to_string() })?;
        tracing::info!("language server initialized");
        Ok(())
    }

    /// Sends a request and waits for the raw response message.
    async fn request(&self, method: &str, params: Value) -> Result<Value, String> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);

        let message = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        if self.outbound.send(message).is_err() {
            lock(&self.pending).remove(&id);
            return Err("server input closed".to_string());
        }
        rx.await
            .map_err(|_| format!("server closed the channel before answering `{method}`"))
    }

    fn notify(&self, method: &str, params: Value) -> Result<(), ConnectionError> {
        let message = json!({ "jsonrpc": "2.0", "method": method, "params": params });
        self.outbound
            .send(message)
            .map_err(|_| ConnectionError::NotRunning)
    }
}

#[async_trait]
impl Session for StdioSession {
    fn send(&self, message: Value) -> Result<(), ConnectionError> {
        self.outbound
            .send(message)
            .map_err(|_| ConnectionError::NotRunning)
    }

    async fn shutdown(self: Box<Self>, grace: Duration) -> Result<(), ConnectionError> {
        let mut this = *self;

        match time::timeout(grace, this.request("shutdown", Value::Null)).await {
            Ok(Ok(_)) => tracing::debug!("server acknowledged shutdown"),
            Ok(Err(e)) => tracing::debug!(error = %e, "shutdown request not answered"),
            Err(_) => tracing::warn!(?grace, "server did not acknowledge shutdown in time"),
        }
        if let Err(e) = this.notify("exit", Value::Null) {
            tracing::debug!(error = %e, "exit notification not sent");
        }

        match time::timeout(grace, this.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!(%status, "language server exited");
                Ok(())
            }
            Ok(Err(e)) => Err(ConnectionError::Teardown {
                error: e.to_string(),
            }),
            Err(_) => {
                tracing::warn!(?grace, "language server did not exit in time; killing it");
                this.child.kill().await.map_err(|e| ConnectionError::Teardown {
                    error: e.to_string(),
                })
            }
        }
    }
}

async fn write_loop(mut stdin: ChildStdin, mut rx: mpsc::UnboundedReceiver<Value>) {
    while let Some(message) = rx.recv().await {
        if let Err(e) = write_frame(&mut stdin, &message).await {
            tracing::debug!(error = %e, "server stdin closed");
            break;
        }
    }
}

/// Reads server output until it ends.
///
/// Once the session's signal receiver is gone (teardown), responses to our
/// own requests are still delivered and everything else is discarded, so the
/// server's output never backs up.
async fn read_loop<R>(stdout: R, pending: Pending, signals: mpsc::UnboundedSender<SessionSignal>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stdout);
    let reason = loop {
        match read_frame(&mut reader).await {
            Ok(Some(message)) => {
                if let Some(tx) = take_pending(&pending, &message) {
                    let _ = tx.send(message);
                } else if signals.send(SessionSignal::Message(message)).is_err() {
                    tracing::trace!("server message discarded during teardown");
                }
            }
            Ok(None) => break "server closed its output".to_string(),
            Err(FrameError::Malformed(detail)) => {
                if signals.send(SessionSignal::Fault(detail)).is_err() {
                    tracing::trace!("malformed frame discarded during teardown");
                }
            }
            Err(e @ FrameError::Io(_)) => break e.to_string(),
        }
    };

    // Fail outstanding requests so their callers stop waiting.
    lock(&pending).clear();
    let _ = signals.send(SessionSignal::Closed(reason));
}

async fn stderr_loop(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(target: "lspvisor::server", "{line}");
    }
}

/// Removes and returns the waiter for a response to one of our own requests.
fn take_pending(pending: &Pending, message: &Value) -> Option<oneshot::Sender<Value>> {
    if message.get("method").is_some() {
        return None;
    }
    let id = message.get("id")?.as_i64()?;
    lock(pending).remove(&id)
}

fn rpc_error_message(error: &Value) -> String {
    let code = error.get("code").and_then(Value::as_i64).unwrap_or(-1);
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    format!("{message} (code {code})")
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
