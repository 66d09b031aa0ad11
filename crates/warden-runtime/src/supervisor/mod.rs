//! Server supervisor: ordered start, reverse-order stop, crash detection.
//!
//! The supervisor owns one [`ProcessHandle`] per configured name. Starting
//! launches in configured order with a settle delay between launches;
//! stopping walks the recorded start order backwards and then reaps the
//! known ports. A background reconciliation loop notices processes that die
//! on their own.
//!
//! # Locking
//!
//! - `op_lock` serializes `start_all` and `stop_all`
//! - the state `RwLock` is never held across a process wait, so `status`
//!   stays responsive during a long stop

mod report;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use std::collections::HashSet;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use warden_core::{
    ConfigError, DEFAULT_KNOWN_PORTS, DEFAULT_REAP_DELAY_MS, DEFAULT_RECONCILE_INTERVAL_MS,
    DEFAULT_SETTLE_DELAY_MS, DEFAULT_STOP_PAUSE_MS, EventEmitter, LaunchSpec, LifecycleState,
    ProcessError, ProcessStatus, StopOutcome, SupervisorError, SupervisorEvent, WardenConfig,
};

use crate::pidfile;
use crate::process::ProcessHandle;
use crate::reaper::PortReaper;

pub use report::{StartFailure, StartReport, StopReport, StoppedProcess};

/// Timing and housekeeping knobs of a supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorOptions {
    /// Pause between two consecutive launches.
    pub settle_delay: Duration,
    /// Pause between two consecutive stops.
    pub stop_pause: Duration,
    /// Wait after the last stop before reaping.
    pub reap_delay: Duration,
    pub reconcile_interval: Duration,
    /// Ports reaped after `stop_all`.
    pub known_ports: Vec<u16>,
    /// Where PID records are written; none are written when unset.
    pub state_dir: Option<PathBuf>,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
            stop_pause: Duration::from_millis(DEFAULT_STOP_PAUSE_MS),
            reap_delay: Duration::from_millis(DEFAULT_REAP_DELAY_MS),
            reconcile_interval: Duration::from_millis(DEFAULT_RECONCILE_INTERVAL_MS),
            known_ports: DEFAULT_KNOWN_PORTS.to_vec(),
            state_dir: None,
        }
    }
}

impl SupervisorOptions {
    pub fn from_config(config: &WardenConfig) -> Self {
        Self {
            settle_delay: config.settle_delay(),
            stop_pause: config.stop_pause(),
            reap_delay: config.reap_delay(),
            reconcile_interval: config.reconcile_interval(),
            known_ports: config.known_ports.clone(),
            state_dir: config.state_dir.clone(),
        }
    }
}

struct Slot {
    spec: LaunchSpec,
    state: LifecycleState,
    handle: Option<ProcessHandle>,
    pid: Option<u32>,
    exit_code: Option<i32>,
}

impl Slot {
    fn status(&self) -> ProcessStatus {
        ProcessStatus {
            name: self.spec.name.clone(),
            state: self.state,
            pid: self.pid,
            exit_code: self.exit_code,
        }
    }

    fn mark_idle(&mut self, exit_code: Option<i32>) {
        self.state = LifecycleState::Idle;
        self.handle = None;
        self.pid = None;
        self.exit_code = exit_code;
    }
}

struct State {
    /// In configured order.
    slots: Vec<Slot>,
    /// Slot indices in the order they were launched.
    start_order: Vec<usize>,
    /// `AllStopped` was already emitted for the current idle period.
    all_stopped_reported: bool,
    /// A `stop_all` is in progress; it reports `AllStopped` itself, after
    /// the port reap.
    stopping: bool,
}

impl State {
    fn all_idle(&self) -> bool {
        self.slots.iter().all(|s| s.state == LifecycleState::Idle)
    }

    /// Whether this is the transition into "everything idle".
    fn take_all_stopped(&mut self) -> bool {
        if !self.all_stopped_reported && self.all_idle() {
            self.all_stopped_reported = true;
            true
        } else {
            false
        }
    }
}

struct Inner {
    state: RwLock<State>,
    op_lock: tokio::sync::Mutex<()>,
    emitter: Arc<dyn EventEmitter>,
    reaper: Arc<PortReaper>,
    options: SupervisorOptions,
    cancel: CancellationToken,
}

impl Inner {
    fn emit(&self, event: SupervisorEvent) {
        if event.is_error() {
            warn!(event = %event.kind, "Supervisor event");
        } else {
            info!(event = %event.kind, "Supervisor event");
        }
        self.emitter.emit(event);
    }

    fn write_pid_record(&self, name: &str, pid: u32) {
        let Some(dir) = &self.options.state_dir else {
            return;
        };
        let Some(record) = pidfile::record_for(pid) else {
            warn!(process = %name, pid, "Cannot read process start time; PID record not written");
            return;
        };
        if let Err(e) = pidfile::write_record(dir, name, record) {
            warn!(process = %name, pid, error = %e, "Failed to write PID record");
        }
    }

    fn remove_pid_record(&self, name: &str) {
        if let Some(dir) = &self.options.state_dir {
            if let Err(e) = pidfile::delete_record(dir, name) {
                warn!(process = %name, error = %e, "Failed to delete PID record");
            }
        }
    }

    /// Detect processes that died on their own.
    async fn reconcile_once(&self) {
        let (exits, all_stopped) = {
            let mut state = self.state.write().await;
            let mut exits = Vec::new();
            for slot in &mut state.slots {
                if slot.state != LifecycleState::Running {
                    continue;
                }
                let alive = slot.handle.as_mut().is_some_and(ProcessHandle::is_alive);
                if !alive {
                    let exit_code = slot.handle.as_ref().and_then(ProcessHandle::exit_code);
                    slot.mark_idle(exit_code);
                    exits.push((slot.spec.name.clone(), exit_code));
                }
            }
            let all_stopped = !state.stopping && state.take_all_stopped();
            (exits, all_stopped)
        };

        for (name, exit_code) in exits {
            self.remove_pid_record(&name);
            self.emit(SupervisorEvent::unexpected_exit(name, exit_code));
        }
        if all_stopped {
            self.emit(SupervisorEvent::all_stopped());
        }
    }
}

async fn run_reconciler(inner: Arc<Inner>) {
    let mut ticker = interval(inner.options.reconcile_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await;

    debug!(interval = ?inner.options.reconcile_interval, "Starting reconciliation loop");

    loop {
        tokio::select! {
            () = inner.cancel.cancelled() => break,
            _ = ticker.tick() => inner.reconcile_once().await,
        }
    }

    debug!("Reconciliation loop exiting");
}

fn validate_specs(specs: &[LaunchSpec], options: &SupervisorOptions) -> Result<(), ConfigError> {
    if specs.is_empty() {
        return Err(ConfigError::NoServers);
    }
    let mut seen = HashSet::new();
    for (index, spec) in specs.iter().enumerate() {
        if spec.name.trim().is_empty() {
            return Err(ConfigError::EmptyName(index));
        }
        if !seen.insert(spec.name.as_str()) {
            return Err(ConfigError::DuplicateName(spec.name.clone()));
        }
    }
    if options.reconcile_interval.is_zero() {
        return Err(ConfigError::InvalidInterval("reconcile_interval"));
    }
    Ok(())
}

/// Supervises a fixed, named set of server processes.
pub struct ServerSupervisor {
    inner: Arc<Inner>,
    reconciler: Mutex<Option<JoinHandle<()>>>,
}

impl ServerSupervisor {
    /// Create a supervisor for `specs`, in start order.
    ///
    /// Configuration errors are the only fatal errors and surface here.
    pub fn new(
        specs: Vec<LaunchSpec>,
        options: SupervisorOptions,
        emitter: Arc<dyn EventEmitter>,
        reaper: Arc<PortReaper>,
    ) -> Result<Self, SupervisorError> {
        validate_specs(&specs, &options)?;

        let slots = specs
            .into_iter()
            .map(|spec| Slot {
                spec,
                state: LifecycleState::Idle,
                handle: None,
                pid: None,
                exit_code: None,
            })
            .collect();

        Ok(Self {
            inner: Arc::new(Inner {
                state: RwLock::new(State {
                    slots,
                    start_order: Vec::new(),
                    all_stopped_reported: true,
                    stopping: false,
                }),
                op_lock: tokio::sync::Mutex::new(()),
                emitter,
                reaper,
                options,
                cancel: CancellationToken::new(),
            }),
            reconciler: Mutex::new(None),
        })
    }

    /// Create a supervisor for every server in a config file.
    pub fn from_config(
        config: &WardenConfig,
        emitter: Arc<dyn EventEmitter>,
        reaper: Arc<PortReaper>,
    ) -> Result<Self, SupervisorError> {
        config.validate()?;
        Self::new(
            config.launch_specs(),
            SupervisorOptions::from_config(config),
            emitter,
            reaper,
        )
    }

    pub fn options(&self) -> &SupervisorOptions {
        &self.inner.options
    }

    fn ensure_reconciler(&self) {
        let mut reconciler = self.reconciler.lock().unwrap_or_else(PoisonError::into_inner);
        if reconciler.is_none() && !self.inner.cancel.is_cancelled() {
            *reconciler = Some(tokio::spawn(run_reconciler(Arc::clone(&self.inner))));
        }
    }

    /// Launch every process in configured order.
    ///
    /// Waits `settle_delay` between launches. A failed launch stops the
    /// sequence: later processes are skipped and earlier ones keep running.
    pub async fn start_all(&self) -> Result<StartReport, SupervisorError> {
        self.start_all_until(&CancellationToken::new()).await
    }

    /// [`start_all`](Self::start_all) that gives up once `abort` is
    /// cancelled.
    ///
    /// The sequence only stops between launches, so every process is either
    /// fully started (and tracked for `stop_all`) or not started at all.
    /// The remaining processes are reported as skipped.
    pub async fn start_all_until(
        &self,
        abort: &CancellationToken,
    ) -> Result<StartReport, SupervisorError> {
        if self.inner.cancel.is_cancelled() {
            return Err(SupervisorError::ShutDown);
        }
        let _op = self.inner.op_lock.lock().await;

        let count = {
            let mut state = self.inner.state.write().await;
            if let Some(busy) = state.slots.iter().find(|s| s.state != LifecycleState::Idle) {
                return Err(SupervisorError::AlreadyRunning(busy.spec.name.clone()));
            }
            state.start_order.clear();
            state.slots.len()
        };

        self.ensure_reconciler();

        let inner = &self.inner;
        let mut report = StartReport::default();

        for index in 0..count {
            if index > 0 && !inner.options.settle_delay.is_zero() {
                tokio::select! {
                    () = sleep(inner.options.settle_delay) => {}
                    () = abort.cancelled() => {}
                }
            }
            if abort.is_cancelled() {
                let state = inner.state.read().await;
                report.skipped = state.slots[index..]
                    .iter()
                    .map(|s| s.spec.name.clone())
                    .collect();
                report.interrupted = true;
                info!(skipped = ?report.skipped, "Start sequence interrupted");
                break;
            }

            let spec = {
                let mut state = inner.state.write().await;
                let slot = &mut state.slots[index];
                slot.state = LifecycleState::Starting;
                slot.spec.clone()
            };
            inner.emit(SupervisorEvent::starting(&spec.name));

            match ProcessHandle::launch(&spec) {
                Ok(handle) => {
                    let pid = handle.pid();
                    {
                        let mut state = inner.state.write().await;
                        let slot = &mut state.slots[index];
                        slot.state = LifecycleState::Running;
                        slot.pid = Some(pid);
                        slot.exit_code = None;
                        slot.handle = Some(handle);
                        state.start_order.push(index);
                        state.all_stopped_reported = false;
                    }
                    inner.write_pid_record(&spec.name, pid);
                    inner.emit(SupervisorEvent::started(&spec.name, pid));
                    report.started.push(spec.name);
                }
                Err(err) => {
                    let ProcessError::SpawnFailed { reason, .. } = err;
                    let skipped: Vec<String> = {
                        let mut state = inner.state.write().await;
                        state.slots[index].state = LifecycleState::Idle;
                        state.slots[index + 1..]
                            .iter()
                            .map(|s| s.spec.name.clone())
                            .collect()
                    };

                    inner.emit(SupervisorEvent::spawn_failed(&spec.name, &reason));
                    for name in &skipped {
                        inner.emit(SupervisorEvent::start_skipped(name, &spec.name));
                    }

                    report.failed = Some(StartFailure {
                        name: spec.name,
                        reason,
                    });
                    report.skipped = skipped;
                    break;
                }
            }
        }

        Ok(report)
    }

    /// Stop every launched process in reverse start order, then reap ports.
    ///
    /// A per-process grace period from the launch spec overrides `grace`.
    /// Every process ends `Idle`, including ones reported `StillRunning`.
    pub async fn stop_all(&self, grace: Duration, kill: Duration) -> StopReport {
        let _op = self.inner.op_lock.lock().await;
        let inner = &self.inner;

        let order = {
            let mut state = inner.state.write().await;
            state.stopping = true;
            std::mem::take(&mut state.start_order)
        };
        let mut stopped = Vec::with_capacity(order.len());
        let mut first = true;

        for index in order.into_iter().rev() {
            let (name, own_grace, taken, last_exit) = {
                let mut state = inner.state.write().await;
                let slot = &mut state.slots[index];
                let taken = slot.handle.take();
                if taken.is_some() {
                    slot.state = LifecycleState::Stopping;
                }
                (
                    slot.spec.name.clone(),
                    slot.spec.grace_period,
                    taken,
                    slot.exit_code,
                )
            };

            // Died earlier; the reconciler already reported it.
            let Some(mut handle) = taken else {
                stopped.push(StoppedProcess {
                    name,
                    outcome: StopOutcome::AlreadyExited,
                    exit_code: last_exit,
                });
                continue;
            };

            if !first && !inner.options.stop_pause.is_zero() {
                sleep(inner.options.stop_pause).await;
            }
            first = false;

            inner.emit(SupervisorEvent::stopping(&name, Some(handle.pid())));
            let outcome = handle.stop(own_grace.unwrap_or(grace), kill).await;
            let exit_code = handle.exit_code();
            drop(handle);

            inner.state.write().await.slots[index].mark_idle(exit_code);
            inner.remove_pid_record(&name);
            inner.emit(SupervisorEvent::stopped(&name, outcome, exit_code));

            stopped.push(StoppedProcess {
                name,
                outcome,
                exit_code,
            });
        }

        if !inner.options.reap_delay.is_zero() {
            sleep(inner.options.reap_delay).await;
        }
        let reap = inner.reaper.reap_known_ports(&inner.options.known_ports).await;
        for kind in reap.events() {
            inner.emit(SupervisorEvent::new(kind));
        }

        let all_stopped = {
            let mut state = inner.state.write().await;
            state.stopping = false;
            state.take_all_stopped()
        };
        if all_stopped {
            inner.emit(SupervisorEvent::all_stopped());
        }

        StopReport { stopped, reap }
    }

    /// Snapshot of every managed process, in configured order.
    pub async fn status(&self) -> Vec<ProcessStatus> {
        let state = self.inner.state.read().await;
        state.slots.iter().map(Slot::status).collect()
    }

    /// Snapshot of one managed process.
    pub async fn process_status(&self, name: &str) -> Result<ProcessStatus, SupervisorError> {
        let state = self.inner.state.read().await;
        state
            .slots
            .iter()
            .find(|s| s.spec.name == name)
            .map(Slot::status)
            .ok_or_else(|| SupervisorError::UnknownProcess(name.to_string()))
    }

    /// Whether every managed process is idle.
    pub async fn all_idle(&self) -> bool {
        self.inner.state.read().await.all_idle()
    }

    /// Run one reconciliation pass now instead of waiting for the loop.
    pub async fn reconcile_once(&self) {
        self.inner.reconcile_once().await;
    }

    /// Stop the reconciliation loop and wait for it to exit.
    ///
    /// No event is emitted by the loop after this returns. Managed processes
    /// are left as they are; call `stop_all` first to stop them.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let handle = self
            .reconciler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Reconciliation loop ended abnormally");
            }
        }
    }
}

impl Drop for ServerSupervisor {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}

impl std::fmt::Debug for ServerSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerSupervisor")
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}
