use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use tokio_util::sync::CancellationToken;

use super::context::Context;
use super::lifecycle::{Phase, Supervisor};
use crate::config::Config;
use crate::connection::{Connection, Launcher, StdioLauncher};
use crate::events::Bus;
use crate::host::{Host, LogHost};
use crate::locator::Environment;
use crate::policies::EscalationPolicy;
use crate::restart::RestartCoordinator;
use crate::settings::Settings;
use crate::subscribers::Subscribe;

/// Builder for a [`Supervisor`].
///
/// Defaults: [`LogHost`], [`StdioLauncher`], default [`Settings`], the process
/// environment anchored at the current directory, no subscribers.
pub struct SupervisorBuilder {
    cfg: Config,
    settings: Settings,
    host: Arc<dyn Host>,
    launcher: Arc<dyn Launcher>,
    env: Option<Environment>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SupervisorBuilder {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            settings: Settings::default(),
            host: Arc::new(LogHost),
            launcher: Arc::new(StdioLauncher::new()),
            env: None,
            subscribers: Vec::new(),
        }
    }

    /// Initial settings.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// UI surface for status, alerts and progress.
    pub fn with_host(mut self, host: Arc<dyn Host>) -> Self {
        self.host = host;
        self
    }

    /// Process boundary used for every start.
    pub fn with_launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Environment used for executable resolution.
    pub fn with_environment(mut self, env: Environment) -> Self {
        self.env = Some(env);
        self
    }

    /// Event subscribers, started at activation.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the supervisor. The connection is created here, stopped.
    pub fn build(self) -> Arc<Supervisor> {
        let env = self.env.unwrap_or_else(|| {
            Environment::capture(std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
        });
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let connection = Connection::new(self.launcher, bus, self.cfg.grace);
        connection.set_trace(self.settings.trace.server);

        let disposing = CancellationToken::new();
        let ctx = Arc::new(Context {
            policy: EscalationPolicy::new(self.cfg.alert_threshold_clamped()),
            restarts: RestartCoordinator::new(self.cfg.debounce, disposing.clone()),
            settings: RwLock::new(self.settings),
            host: self.host,
            connection,
            env,
            disposing,
            cfg: self.cfg,
        });

        Arc::new(Supervisor::from_parts(
            ctx,
            Mutex::new(Phase::Idle {
                subscribers: self.subscribers,
            }),
        ))
    }
}
