//! Shared state threaded into every supervisor callback.

use std::path::Path;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::connection::{Connection, ConnectionState, InitOptions};
use crate::error::RestartError;
use crate::events::{Event, EventKind};
use crate::host::{Host, Progress, Status};
use crate::locator::{self, Environment, Executable};
use crate::policies::{CloseAction, EscalationPolicy};
use crate::restart::{RestartCoordinator, RestartTarget, Trigger};
use crate::settings::Settings;
use crate::subscribers::SubscriberSet;

pub(super) struct Context {
    pub cfg: Config,
    pub env: Environment,
    pub settings: RwLock<Settings>,
    pub connection: Arc<Connection>,
    pub policy: EscalationPolicy,
    pub restarts: RestartCoordinator,
    pub host: Arc<dyn Host>,
    /// Cancelled once at deactivation; every callback checks it first.
    pub disposing: CancellationToken,
}

impl Context {
    pub fn settings(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Stores `next` and returns the previous settings.
    pub fn replace_settings(&self, next: Settings) -> Settings {
        let mut current = self
            .settings
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *current, next)
    }

    /// Resolves the executable from the current settings.
    pub fn resolve(&self) -> (Executable, InitOptions) {
        let settings = self.settings();
        let exe = locator::resolve(&settings, &self.cfg.locator, &self.env);
        let init = InitOptions {
            client_name: self.cfg.client_name.clone(),
            max_number_of_problems: settings.max_number_of_problems,
            root_uri: root_uri(self.env.root()),
        };
        (exe, init)
    }

    /// Initial start. A launch fault is alerted once and not retried.
    pub async fn start_initial(&self) {
        let _progress = Progress::begin(self.host.as_ref(), "Starting language server");
        let (exe, init) = self.resolve();
        match self.connection.start(&exe, &init).await {
            Ok(generation) => tracing::info!(generation, "language server running"),
            Err(e) if self.disposing.is_cancelled() => {
                tracing::debug!(error = %e, "start abandoned during shutdown");
            }
            Err(e) => {
                tracing::error!(error = %e, label = e.as_label(), command = %exe.display(), "language server failed to start");
                self.host
                    .show_alert(&alert("Failed to start the language server"));
            }
        }
    }

    /// Stops the connection; teardown errors are logged, never returned.
    pub async fn stop_logged(&self) {
        if let Err(e) = self.connection.stop().await {
            tracing::warn!(error = %e, label = e.as_label(), "language server teardown failed");
        }
    }

    /// Applies one event from the connection's stream.
    pub fn on_event(self: &Arc<Self>, subs: &SubscriberSet, ev: Event) {
        if self.disposing.is_cancelled() {
            return;
        }
        let current = self.connection.generation();
        if ev.generation != current {
            tracing::debug!(
                kind = ev.kind.as_str(),
                generation = ev.generation,
                current,
                "stale event dropped"
            );
            return;
        }
        subs.emit(&ev);

        match ev.kind {
            EventKind::Starting | EventKind::Running | EventKind::Stopped => {
                if let Some(state) = ev.state() {
                    self.host.set_status(Status::from(state));
                }
                if ev.kind == EventKind::Running {
                    self.policy.on_running();
                }
            }
            EventKind::ProtocolFault => {
                let decision = self.policy.on_fault(ev.reason.as_deref().unwrap_or("unknown fault"));
                if decision.alert {
                    self.host.show_alert(&alert(&format!(
                        "The language server sent {} malformed messages",
                        self.policy.threshold()
                    )));
                }
            }
            EventKind::SessionClosed => match self.policy.on_closed() {
                CloseAction::Restart => self.spawn_restart(Trigger::AutoAfterClosure),
            },
        }
    }

    /// Requests a restart from a fresh task.
    pub fn spawn_restart(self: &Arc<Self>, trigger: Trigger) {
        let ctx = Arc::clone(self);
        tokio::spawn(async move {
            let target: Arc<dyn RestartTarget> = ctx.clone();
            match ctx.restarts.request(trigger, target).await {
                Ok(outcome) => tracing::debug!(trigger = trigger.as_str(), ?outcome, "restart request handled"),
                Err(e) => tracing::debug!(trigger = trigger.as_str(), error = %e, "restart request failed"),
            }
        });
    }

    async fn restart_sequence(&self) -> Result<u64, RestartError> {
        match self.connection.state() {
            ConnectionState::Running => self.stop_logged().await,
            ConnectionState::Starting => {
                if self.connection.settled().await.state == ConnectionState::Running {
                    self.stop_logged().await;
                }
            }
            ConnectionState::Stopped => {}
        }

        if self.disposing.is_cancelled() {
            return Err(RestartError::Disposed);
        }
        let (exe, init) = self.resolve();
        Ok(self.connection.start(&exe, &init).await?)
    }
}

#[async_trait]
impl RestartTarget for Context {
    async fn restart(&self, trigger: Trigger) -> Result<u64, RestartError> {
        let _progress = Progress::begin(self.host.as_ref(), "Restarting language server");
        let result = self.restart_sequence().await;

        match &result {
            Ok(generation) => {
                tracing::info!(generation, trigger = trigger.as_str(), "language server restarted");
            }
            Err(e) if self.disposing.is_cancelled() => {
                tracing::debug!(error = %e, "restart abandoned during shutdown");
            }
            Err(e) => {
                tracing::error!(error = %e, label = e.as_label(), trigger = trigger.as_str(), "language server failed to restart");
                self.host
                    .show_alert(&alert("Failed to restart the language server"));
            }
        }
        result
    }
}

/// User-visible alert text.
pub(super) fn alert(headline: &str) -> String {
    format!("{headline}. See the output log for details.")
}

fn root_uri(root: &Path) -> Option<String> {
    if !root.is_absolute() {
        return None;
    }
    let path = root.to_string_lossy().replace('\\', "/");
    if path.starts_with('/') {
        Some(format!("file://{path}"))
    } else {
        Some(format!("file:///{path}"))
    }
}
