//! Standalone host for the supervisor.
//!
//! Runs the language server under supervision with settings read from a JSON
//! file. Commands are read line by line from stdin:
//!
//! ```text
//! restart   run the restart command
//! status    log the connection state
//! quit      deactivate and exit
//! ```
//!
//! `SIGHUP` re-reads the settings file. `SIGINT`/`SIGTERM`/`SIGQUIT` or the end
//! of stdin shut down.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use lspvisor::shutdown::{ReloadSignal, wait_for_shutdown_signal};
use lspvisor::{
    Config, Environment, LogWriter, RESTART_COMMAND, Settings, Supervisor, SupervisorBuilder,
};

#[derive(Parser, Debug)]
#[command(name = "lspvisor", version, about = "Supervise a language server over stdio")]
struct Args {
    /// JSON file holding the settings section (`serverPath`, `maxNumberOfProblems`, `trace.server`).
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Directory the build-output candidates are searched from.
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Value of the server's diagnostic verbosity variable.
    #[arg(long, value_name = "LEVEL")]
    server_log: Option<String>,

    /// Debounce window for configuration-driven restarts, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    debounce_ms: u64,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let settings = match &args.settings {
        Some(path) => load_settings(path)?,
        None => Settings::default(),
    };
    let root = match args.root.clone() {
        Some(root) => root,
        None => std::env::current_dir().context("cannot determine the current directory")?,
    };

    let mut cfg = Config {
        debounce: Duration::from_millis(args.debounce_ms),
        ..Config::default()
    };
    cfg.locator.log_level = args.server_log.clone();

    let sup = SupervisorBuilder::new(cfg)
        .with_settings(settings)
        .with_environment(Environment::capture(root))
        .with_subscribers(vec![Arc::new(LogWriter)])
        .build();

    sup.activate().await?;
    let result = run(&sup, &args).await;
    sup.deactivate().await;
    result
}

async fn run(sup: &Arc<Supervisor>, args: &Args) -> anyhow::Result<()> {
    let mut reload = ReloadSignal::new().context("cannot listen for reload signals")?;
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = wait_for_shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            res = &mut shutdown => {
                res.context("cannot listen for shutdown signals")?;
                tracing::info!("shutdown requested");
                return Ok(());
            }
            Some(()) = reload.recv() => {
                let Some(path) = &args.settings else {
                    tracing::warn!("reload requested but no settings file was given");
                    continue;
                };
                match load_settings(path) {
                    Ok(settings) => {
                        if let Err(e) = sup.settings_changed(settings).await {
                            tracing::warn!(error = %e, "settings change rejected");
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "settings reload failed"),
                }
            }
            line = stdin.next_line() => {
                let Some(line) = line.context("cannot read stdin")? else {
                    tracing::info!("stdin closed");
                    return Ok(());
                };
                match line.trim() {
                    "" => {}
                    "restart" => match sup.execute_command(RESTART_COMMAND).await {
                        Ok(outcome) => tracing::info!(?outcome, "restart handled"),
                        Err(e) => tracing::warn!(error = %e, label = e.as_label(), "restart failed"),
                    },
                    "status" => {
                        let snapshot = sup.connection().snapshot();
                        tracing::info!(state = %snapshot.state, generation = snapshot.generation, "status");
                    }
                    "quit" | "exit" => return Ok(()),
                    other => tracing::warn!(command = other, "unknown command"),
                }
            }
        }
    }
}

fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read settings file {}", path.display()))?;
    Settings::from_json(&text).with_context(|| format!("invalid settings in {}", path.display()))
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
