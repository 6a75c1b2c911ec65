//! agentmux daemon - streaming session multiplexer
//!
//! Accepts chat requests over SSE and WebSocket, streams fragments from
//! the configured source and fans every envelope out to all connections
//! of the session.
//!
//! # Usage
//!
//! ```bash
//! # Foreground, echo source (`start` is implied)
//! agentmuxd
//! agentmuxd --port 9000
//!
//! # OpenAI-compatible upstream, in the background
//! AGENTMUX_API_KEY=sk-... agentmuxd start --provider qwen -d
//!
//! agentmuxd status
//! agentmuxd stop
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use agentmux_source::build_source;
use agentmuxd::config::HubConfig;
use agentmuxd::monitor::spawn_monitor_task;
use agentmuxd::registry::spawn_registry;
use agentmuxd::server::HubServer;

/// Workspace crates logged at `info` unless `RUST_LOG` says otherwise.
const DEFAULT_LOG_DIRECTIVES: &[&str] = &[
    "agentmuxd=info",
    "agentmux_core=info",
    "agentmux_protocol=info",
    "agentmux_source=info",
    "tower_http=info",
];

/// How long `stop` waits for the daemon to exit.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// CLI Arguments
// ============================================================================

/// agentmux daemon - streaming session multiplexer
#[derive(Parser, Debug)]
#[command(name = "agentmuxd", version, about, args_conflicts_with_subcommands = true)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Options for the implied `start`
    #[command(flatten)]
    start: StartArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the daemon
    Start(StartArgs),
    /// Stop the running daemon
    Stop,
    /// Show daemon status
    Status,
}

#[derive(clap::Args, Debug)]
struct StartArgs {
    /// Fork to the background, logging to the state directory
    #[arg(short = 'd', long)]
    daemon: bool,

    /// Log filter, e.g. "agentmuxd=debug" (overrides RUST_LOG)
    #[arg(long)]
    log_filter: Option<String>,

    #[command(flatten)]
    hub: HubConfig,
}

// ============================================================================
// State Files
// ============================================================================

/// `$XDG_STATE_HOME/agentmux`, falling back to the temp directory.
fn state_dir() -> PathBuf {
    dirs::state_dir().unwrap_or_else(std::env::temp_dir).join("agentmux")
}

/// The daemon's PID file. A PID whose process is gone counts as absent.
struct PidFile {
    path: PathBuf,
}

impl PidFile {
    fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join("agentmuxd.pid"),
        }
    }

    fn read(&self) -> Option<u32> {
        fs::read_to_string(&self.path).ok()?.trim().parse().ok()
    }

    fn write(&self, pid: u32) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).context("Failed to create state directory")?;
        }
        fs::write(&self.path, pid.to_string()).context("Failed to write PID file")
    }

    fn remove(&self) {
        let _ = fs::remove_file(&self.path);
    }

    /// PID of the live daemon. Clears a stale file.
    fn running(&self) -> Option<u32> {
        let pid = self.read()?;
        if is_alive(pid) {
            Some(pid)
        } else {
            self.remove();
            None
        }
    }
}

fn is_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

// ============================================================================
// Commands
// ============================================================================

fn main() -> Result<()> {
    let args = Args::parse();
    let dir = state_dir();
    let pid_file = PidFile::in_dir(&dir);

    match args.command.unwrap_or(Command::Start(args.start)) {
        Command::Start(start) => {
            if let Some(pid) = pid_file.running() {
                eprintln!("Daemon is already running (PID {pid}); run 'agentmuxd stop' first.");
                process::exit(1);
            }
            if start.daemon {
                daemonize(&dir.join("agentmuxd.log"))?;
            }

            pid_file.write(process::id())?;
            let result = run_daemon(start.hub, start.log_filter);
            pid_file.remove();
            result
        }
        Command::Stop => {
            let Some(pid) = pid_file.running() else {
                println!("Daemon is not running.");
                return Ok(());
            };
            println!("Stopping daemon (PID {pid})...");
            send_sigterm(pid)?;
            if wait_for_exit(pid, STOP_TIMEOUT) {
                println!("Daemon stopped.");
                Ok(())
            } else {
                eprintln!("Daemon did not stop within {}s.", STOP_TIMEOUT.as_secs());
                process::exit(1);
            }
        }
        Command::Status => match pid_file.running() {
            Some(pid) => {
                println!("Daemon is running (PID {pid})");
                println!("Log: {}", dir.join("agentmuxd.log").display());
                Ok(())
            }
            None => {
                println!("Daemon is not running.");
                process::exit(1);
            }
        },
    }
}

#[cfg(unix)]
fn send_sigterm(pid: u32) -> Result<()> {
    let pid = i32::try_from(pid).context("PID out of range")?;
    // SAFETY: kill(2) only reads its arguments.
    if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
        bail!("Failed to send SIGTERM to process {pid}");
    }
    Ok(())
}

#[cfg(not(unix))]
fn send_sigterm(_pid: u32) -> Result<()> {
    bail!("Stop command is only supported on Unix systems")
}

fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let step = Duration::from_millis(100);
    let mut waited = Duration::ZERO;
    while is_alive(pid) {
        if waited >= timeout {
            return false;
        }
        thread::sleep(step);
        waited += step;
    }
    true
}

/// Forks to the background with stdout and stderr written to `log_path`.
fn daemonize(log_path: &Path) -> Result<()> {
    if let Some(dir) = log_path.parent() {
        fs::create_dir_all(dir).context("Failed to create log directory")?;
    }
    let stdout = fs::File::create(log_path).context("Failed to create log file")?;
    let stderr = stdout.try_clone().context("Failed to share log file with stderr")?;

    daemonize::Daemonize::new()
        .working_directory("/")
        .stdout(stdout)
        .stderr(stderr)
        .start()
        .context("Failed to daemonize")
}

// ============================================================================
// Daemon
// ============================================================================

/// `--log-filter` replaces everything; otherwise `RUST_LOG` plus the defaults.
fn env_filter(log_filter: Option<&str>) -> Result<EnvFilter> {
    if let Some(filter) = log_filter {
        return EnvFilter::try_new(filter).context("Invalid log filter");
    }
    DEFAULT_LOG_DIRECTIVES
        .iter()
        .try_fold(EnvFilter::from_default_env(), |filter, directive| {
            Ok(filter.add_directive(directive.parse()?))
        })
}

#[tokio::main]
async fn run_daemon(hub: HubConfig, log_filter: Option<String>) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(log_filter.as_deref())?)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        provider = %hub.provider,
        addr = %hub.addr(),
        "agentmux daemon starting"
    );

    // Misconfiguration is a startup error, not a per-exchange one.
    let source = build_source(&hub.source_config()).context("Invalid source configuration")?;

    let cancel_token = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel_token.clone()));

    let registry = spawn_registry();
    let _monitor = spawn_monitor_task(registry.clone(), cancel_token.clone());

    HubServer::new(hub.addr(), registry, source, cancel_token)
        .run()
        .await
        .inspect_err(|e| error!(error = %e, "Server error"))?;

    info!("agentmux daemon stopped");
    Ok(())
}

/// Cancels `token` on SIGTERM or SIGINT (Ctrl+C elsewhere).
async fn cancel_on_signal(token: CancellationToken) {
    #[cfg(unix)]
    let received = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        Ok::<_, std::io::Error>(name)
    }
    .await;

    #[cfg(not(unix))]
    let received = tokio::signal::ctrl_c().await.map(|()| "Ctrl+C");

    match received {
        Ok(signal) => info!(signal, "Shutdown signal received"),
        Err(e) => error!(error = %e, "Error waiting for shutdown signal"),
    }
    token.cancel();
}
