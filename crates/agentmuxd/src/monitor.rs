//! Periodic resource report for the agentmux daemon.
//!
//! Each [`SAMPLE_INTERVAL`] the daemon logs one [`DaemonSample`]: its own
//! memory and CPU (read through `sysinfo`) next to the registry's session
//! and connection counts. A sample over a warning level is logged at
//! `warn`, everything else at `info`.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - A stopped registry leaves the counts empty instead of failing the sample

use std::process;
use std::time::Duration;

use sysinfo::{Pid, System};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::registry::{RegistryHandle, RegistryStats};

/// Resident memory above which a sample is reported as a warning.
pub const MEMORY_WARN_MB: u64 = 100;

pub const CPU_WARN_PERCENT: f32 = 80.0;

pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(60);

/// One resource reading of the daemon.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DaemonSample {
    pub memory_mb: u64,
    pub cpu_percent: f32,
    /// `None` when the registry did not answer.
    pub sessions: Option<usize>,
    pub connections: Option<usize>,
}

impl DaemonSample {
    /// Names the first resource over its warning level, memory before CPU.
    pub fn pressure(&self) -> Option<&'static str> {
        if self.memory_mb > MEMORY_WARN_MB {
            Some("memory")
        } else if self.cpu_percent > CPU_WARN_PERCENT {
            Some("cpu")
        } else {
            None
        }
    }

    fn log(&self) {
        let cpu_percent = format!("{:.1}", self.cpu_percent);
        match self.pressure() {
            Some(resource) => warn!(
                resource,
                memory_mb = self.memory_mb,
                cpu_percent,
                sessions = self.sessions,
                connections = self.connections,
                "Daemon resource usage above warning level"
            ),
            None => info!(
                memory_mb = self.memory_mb,
                cpu_percent,
                sessions = self.sessions,
                connections = self.connections,
                "Daemon resource usage"
            ),
        }
    }
}

/// Reads the daemon's own process entry.
struct ResourceSampler {
    system: System,
    pid: Pid,
}

impl ResourceSampler {
    fn new() -> Self {
        Self {
            system: System::new(),
            pid: Pid::from_u32(process::id()),
        }
    }

    /// CPU is measured against the previous call; the first one reads zero.
    fn sample(&mut self, stats: Option<RegistryStats>) -> DaemonSample {
        // CPU usage needs the global CPU refresh, not just the process entry.
        self.system.refresh_all();

        let (memory, cpu_percent) = self
            .system
            .process(self.pid)
            .map(|p| (p.memory(), p.cpu_usage()))
            .unwrap_or_default();

        DaemonSample {
            memory_mb: memory / (1024 * 1024),
            cpu_percent,
            sessions: stats.as_ref().map(|s| s.sessions),
            connections: stats.as_ref().map(|s| s.connections),
        }
    }
}

/// Spawns the resource report loop. Runs until `cancel_token` fires.
pub fn spawn_monitor_task(registry: RegistryHandle, cancel_token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut sampler = ResourceSampler::new();
        let mut tick = interval(SAMPLE_INTERVAL);

        info!(
            memory_warn_mb = MEMORY_WARN_MB,
            cpu_warn_percent = CPU_WARN_PERCENT,
            interval_secs = SAMPLE_INTERVAL.as_secs(),
            "Resource monitor started"
        );

        loop {
            tokio::select! {
                biased;

                _ = cancel_token.cancelled() => break,

                _ = tick.tick() => {
                    let stats = registry.stats().await.ok();
                    sampler.sample(stats).log();
                }
            }
        }

        debug!("Resource monitor stopped");
    })
}
