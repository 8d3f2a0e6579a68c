use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;

use super::context::Context;
use super::listener::listen;
use crate::connection::{Connection, ConnectionState};
use crate::error::SupervisorError;
use crate::restart::{RestartOutcome, RestartTarget, Trigger};
use crate::settings::{Settings, SettingsKey};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Host command that restarts the server.
pub const RESTART_COMMAND: &str = "l.restartServer";

pub(super) enum Phase {
    Idle {
        subscribers: Vec<Arc<dyn Subscribe>>,
    },
    Active {
        listener: JoinHandle<()>,
    },
    Deactivated,
}

/// Owns the server connection for the lifetime of the host integration.
pub struct Supervisor {
    ctx: Arc<Context>,
    phase: Mutex<Phase>,
}

impl Supervisor {
    pub(super) fn from_parts(ctx: Arc<Context>, phase: Mutex<Phase>) -> Self {
        Self { ctx, phase }
    }

    /// Starts listening to the connection and launches the server.
    ///
    /// A launch fault is not an error here: it is shown to the user once and
    /// leaves the connection `Stopped` until the next restart request.
    pub async fn activate(&self) -> Result<(), SupervisorError> {
        {
            let mut phase = self.lock_phase();
            let subscribers = match &mut *phase {
                Phase::Idle { subscribers } => std::mem::take(subscribers),
                Phase::Active { .. } => return Err(SupervisorError::AlreadyActivated),
                Phase::Deactivated => return Err(SupervisorError::Deactivated),
            };
            // Subscribed before the first start so its transitions are seen.
            let rx = self.ctx.connection.subscribe();
            let listener = tokio::spawn(listen(
                Arc::clone(&self.ctx),
                rx,
                SubscriberSet::new(subscribers),
            ));
            *phase = Phase::Active { listener };
        }

        tracing::info!("supervisor activated");
        self.ctx.start_initial().await;
        Ok(())
    }

    /// Restarts the server now, or coalesces into a restart already running.
    pub async fn restart(&self) -> Result<RestartOutcome, SupervisorError> {
        self.ensure_active()?;
        let target: Arc<dyn RestartTarget> = self.ctx.clone();
        Ok(self.ctx.restarts.request(Trigger::Command, target).await?)
    }

    /// Runs a host command by name.
    pub async fn execute_command(&self, name: &str) -> Result<RestartOutcome, SupervisorError> {
        match name {
            RESTART_COMMAND => self.restart().await,
            other => Err(SupervisorError::UnknownCommand(other.to_string())),
        }
    }

    /// Stores new settings and reacts to what changed.
    ///
    /// `trace.server` applies immediately. Any other change schedules a
    /// debounced restart. Returns `None` when nothing needs a restart.
    pub async fn settings_changed(
        &self,
        settings: Settings,
    ) -> Result<Option<RestartOutcome>, SupervisorError> {
        if matches!(*self.lock_phase(), Phase::Deactivated) {
            return Err(SupervisorError::Deactivated);
        }

        let trace = settings.trace.server;
        let previous = self.ctx.replace_settings(settings.clone());
        let change = previous.diff(&settings);
        if change.is_empty() {
            return Ok(None);
        }
        tracing::info!(keys = ?change.keys(), "settings changed");

        if change.affects(SettingsKey::TraceServer) {
            self.ctx.connection.set_trace(trace);
        }
        if !change.requires_restart() || !self.is_active() {
            return Ok(None);
        }
        let target: Arc<dyn RestartTarget> = self.ctx.clone();
        let outcome = self.ctx.restarts.request(Trigger::ConfigChange, target).await?;
        Ok(Some(outcome))
    }

    /// Tears everything down. Idempotent; the supervisor cannot be reused.
    ///
    /// Teardown errors are logged and never returned.
    pub async fn deactivate(&self) {
        let listener = match std::mem::replace(&mut *self.lock_phase(), Phase::Deactivated) {
            Phase::Active { listener } => Some(listener),
            Phase::Idle { .. } | Phase::Deactivated => None,
        };

        self.ctx.disposing.cancel();
        self.ctx.restarts.cancel_pending();
        self.ctx.connection.dispose();
        self.ctx.stop_logged().await;

        if let Some(listener) = listener {
            if let Err(e) = listener.await {
                tracing::warn!(error = %e, "supervisor listener ended abnormally");
            }
            tracing::info!("supervisor deactivated");
        }
    }

    /// The supervised connection.
    pub fn connection(&self) -> &Arc<Connection> {
        &self.ctx.connection
    }

    pub fn state(&self) -> ConnectionState {
        self.ctx.connection.state()
    }

    /// Current settings.
    pub fn settings(&self) -> Settings {
        self.ctx.settings()
    }

    /// True while a restart sequence runs.
    pub fn is_restarting(&self) -> bool {
        self.ctx.restarts.is_in_progress()
    }

    /// True while a debounced restart is armed.
    pub fn has_pending_restart(&self) -> bool {
        self.ctx.restarts.has_pending()
    }

    #[cfg(test)]
    pub(super) fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    fn is_active(&self) -> bool {
        matches!(*self.lock_phase(), Phase::Active { .. })
    }

    fn ensure_active(&self) -> Result<(), SupervisorError> {
        match *self.lock_phase() {
            Phase::Active { .. } => Ok(()),
            Phase::Idle { .. } => Err(SupervisorError::NotActivated),
            Phase::Deactivated => Err(SupervisorError::Deactivated),
        }
    }

    fn lock_phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
