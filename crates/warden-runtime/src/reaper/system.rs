//! OS-backed listener lookup and killer.

use warden_core::{KillResult, ListenerSource, ListeningProcess, PidKiller, PortError};

use crate::process::shutdown::force_kill_pid;

/// Lists listening sockets through the `listeners` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListenersSource;

#[cfg(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "windows",
    target_os = "freebsd"
))]
impl ListenerSource for ListenersSource {
    fn listening_processes(&self, port: u16) -> Result<Vec<ListeningProcess>, PortError> {
        let all = listeners::get_all().map_err(|e| PortError::QueryFailed(e.to_string()))?;
        Ok(all
            .into_iter()
            .filter(|listener| listener.socket.port() == port)
            .map(|listener| ListeningProcess {
                pid: listener.process.pid,
                name: listener.process.name,
            })
            .collect())
    }
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "windows",
    target_os = "freebsd"
)))]
impl ListenerSource for ListenersSource {
    fn listening_processes(&self, _port: u16) -> Result<Vec<ListeningProcess>, PortError> {
        Err(PortError::Unsupported)
    }
}

/// Kills with SIGKILL on Unix and the OS terminate call elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemKiller;

impl PidKiller for SystemKiller {
    fn force_kill(&self, pid: u32) -> KillResult {
        force_kill_pid(pid)
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn finds_own_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let found = ListenersSource.listening_processes(port).unwrap();
        assert!(found.iter().any(|p| p.pid == std::process::id()));
    }
}
