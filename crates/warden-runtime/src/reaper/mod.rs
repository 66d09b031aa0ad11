//! Port reaper: kills processes still listening on known ports after a stop.
//!
//! Game servers sometimes leave helper processes behind that keep the login
//! and game ports bound, which blocks the next start. The reaper queries the
//! listeners of each configured port (never cached) and forcibly kills them.

mod system;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{debug, info, warn};
use warden_core::{EventKind, KillResult, ListenerSource, ListeningProcess, PidKiller, PortError};

pub use system::{ListenersSource, SystemKiller};

/// Result of killing one listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenerKill {
    pub pid: u32,
    pub process: String,
    pub result: KillResult,
}

/// What happened on one port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PortReap {
    /// Nothing was listening.
    Free { port: u16 },
    /// Listeners were found and a kill was attempted on each.
    Reaped { port: u16, kills: Vec<ListenerKill> },
    /// The listener query failed for this port.
    QueryFailed { port: u16, reason: String },
}

impl PortReap {
    pub const fn port(&self) -> u16 {
        match self {
            Self::Free { port } | Self::Reaped { port, .. } | Self::QueryFailed { port, .. } => {
                *port
            }
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            Self::Free { .. } => true,
            Self::Reaped { kills, .. } => kills.iter().all(|k| k.result.is_success()),
            Self::QueryFailed { .. } => false,
        }
    }
}

/// Outcome of a `reap_known_ports` pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "ports", rename_all = "snake_case")]
pub enum ReapReport {
    /// Listener queries are not available on this platform.
    Unsupported,
    Completed(Vec<PortReap>),
}

impl ReapReport {
    pub fn is_success(&self) -> bool {
        match self {
            Self::Unsupported => false,
            Self::Completed(ports) => ports.iter().all(PortReap::is_success),
        }
    }

    /// Lifecycle events describing this report, in port order.
    pub fn events(&self) -> Vec<EventKind> {
        let ports = match self {
            Self::Unsupported => return vec![EventKind::PortQueryUnsupported],
            Self::Completed(ports) => ports,
        };

        let mut events = Vec::new();
        for reap in ports {
            match reap {
                PortReap::Free { port } => events.push(EventKind::PortFree { port: *port }),
                PortReap::QueryFailed { port, reason } => events.push(EventKind::PortQueryFailed {
                    port: *port,
                    reason: reason.clone(),
                }),
                PortReap::Reaped { port, kills } => {
                    for kill in kills {
                        events.push(match &kill.result {
                            KillResult::Killed => EventKind::ListenerKilled {
                                port: *port,
                                pid: kill.pid,
                                process: kill.process.clone(),
                            },
                            KillResult::NotFound => EventKind::ListenerGone {
                                port: *port,
                                pid: kill.pid,
                            },
                            KillResult::Failed(reason) => EventKind::ListenerKillFailed {
                                port: *port,
                                pid: kill.pid,
                                reason: reason.clone(),
                            },
                        });
                    }
                }
            }
        }
        events
    }
}

/// Finds and kills lingering listeners on a set of ports.
pub struct PortReaper {
    listeners: Arc<dyn ListenerSource>,
    killer: Arc<dyn PidKiller>,
    own_pid: u32,
    warned_unsupported: AtomicBool,
}

impl PortReaper {
    pub fn new(listeners: Arc<dyn ListenerSource>, killer: Arc<dyn PidKiller>) -> Self {
        Self {
            listeners,
            killer,
            own_pid: std::process::id(),
            warned_unsupported: AtomicBool::new(false),
        }
    }

    /// Reaper backed by the OS.
    pub fn system() -> Self {
        Self::new(Arc::new(ListenersSource), Arc::new(SystemKiller))
    }

    /// Kill every process listening on any of `ports`.
    ///
    /// No listener counts as success, and so does a listener that is gone
    /// by the time it is killed. The supervisor's own PID is never killed.
    pub async fn reap_known_ports(&self, ports: &[u16]) -> ReapReport {
        let mut results = Vec::with_capacity(ports.len());

        for &port in ports {
            let listeners = match self.query(port).await {
                Ok(listeners) => listeners,
                Err(PortError::Unsupported) => {
                    if !self.warned_unsupported.swap(true, Ordering::Relaxed) {
                        warn!("Listing port listeners is not supported on this platform; skipping port reaping");
                    }
                    return ReapReport::Unsupported;
                }
                Err(PortError::QueryFailed(reason)) => {
                    warn!(port, %reason, "Failed to list port listeners");
                    results.push(PortReap::QueryFailed { port, reason });
                    continue;
                }
            };

            let mut seen = BTreeSet::new();
            let targets: Vec<ListeningProcess> = listeners
                .into_iter()
                .filter(|l| seen.insert(l.pid))
                .filter(|l| {
                    if l.pid == self.own_pid {
                        debug!(port, pid = l.pid, "Skipping own process");
                        false
                    } else {
                        true
                    }
                })
                .collect();

            if targets.is_empty() {
                debug!(port, "Port is free");
                results.push(PortReap::Free { port });
                continue;
            }

            let mut kills = Vec::with_capacity(targets.len());
            for target in targets {
                let result = self.kill(target.pid).await;
                match &result {
                    KillResult::Killed => {
                        info!(port, pid = target.pid, process = %target.name, "Killed lingering listener");
                    }
                    KillResult::NotFound => {
                        info!(port, pid = target.pid, "Listener already gone");
                    }
                    KillResult::Failed(reason) => {
                        warn!(port, pid = target.pid, %reason, "Failed to kill listener");
                    }
                }
                kills.push(ListenerKill {
                    pid: target.pid,
                    process: target.name,
                    result,
                });
            }
            results.push(PortReap::Reaped { port, kills });
        }

        ReapReport::Completed(results)
    }

    async fn query(&self, port: u16) -> Result<Vec<ListeningProcess>, PortError> {
        let listeners = Arc::clone(&self.listeners);
        tokio::task::spawn_blocking(move || listeners.listening_processes(port))
            .await
            .unwrap_or_else(|e| Err(PortError::QueryFailed(e.to_string())))
    }

    async fn kill(&self, pid: u32) -> KillResult {
        let killer = Arc::clone(&self.killer);
        tokio::task::spawn_blocking(move || killer.force_kill(pid))
            .await
            .unwrap_or_else(|e| KillResult::Failed(e.to_string()))
    }
}

impl std::fmt::Debug for PortReaper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortReaper")
            .field("own_pid", &self.own_pid)
            .finish_non_exhaustive()
    }
}
