//! End-to-end supervisor behavior against real child processes.

#![cfg(unix)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::{Instant, sleep};
use warden_core::{
    EventEmitter, EventKind, KillResult, LaunchSpec, LifecycleState, ListenerSource,
    ListeningProcess, PidKiller, PortError, ProcessStatus, StopOutcome, SupervisorError, SupervisorEvent,
};
use warden_runtime::pidfile;
use warden_runtime::{PortReaper, ReapReport, ServerSupervisor, SupervisorOptions};

#[derive(Default)]
struct RecordingEmitter(Mutex<Vec<SupervisorEvent>>);

impl RecordingEmitter {
    fn kinds(&self) -> Vec<EventKind> {
        self.0.lock().unwrap().iter().map(|e| e.kind.clone()).collect()
    }

    fn count(&self, pred: impl Fn(&EventKind) -> bool) -> usize {
        self.kinds().iter().filter(|k| pred(k)).count()
    }
}

impl EventEmitter for RecordingEmitter {
    fn emit(&self, event: SupervisorEvent) {
        self.0.lock().unwrap().push(event);
    }
}

struct NoListeners;

impl ListenerSource for NoListeners {
    fn listening_processes(&self, _port: u16) -> Result<Vec<ListeningProcess>, PortError> {
        Ok(Vec::new())
    }
}

struct NeverKill;

impl PidKiller for NeverKill {
    fn force_kill(&self, pid: u32) -> KillResult {
        panic!("unexpected kill of {pid}");
    }
}

fn fast_options() -> SupervisorOptions {
    SupervisorOptions {
        settle_delay: Duration::from_millis(100),
        stop_pause: Duration::from_millis(50),
        reap_delay: Duration::from_millis(10),
        reconcile_interval: Duration::from_millis(50),
        known_ports: vec![2106, 7777, 9014],
        state_dir: None,
    }
}

fn sleeper(name: &str) -> LaunchSpec {
    LaunchSpec::new(name, "sleep").with_args(["30"])
}

fn build(specs: Vec<LaunchSpec>, options: SupervisorOptions) -> (ServerSupervisor, Arc<RecordingEmitter>) {
    let emitter = Arc::new(RecordingEmitter::default());
    let reaper = Arc::new(PortReaper::new(Arc::new(NoListeners), Arc::new(NeverKill)));
    let sup = ServerSupervisor::new(specs, options, emitter.clone(), reaper).unwrap();
    (sup, emitter)
}

const GRACE: Duration = Duration::from_secs(5);
const KILL: Duration = Duration::from_secs(5);

#[tokio::test]
async fn login_then_game_start_and_reverse_stop() {
    let (sup, events) = build(vec![sleeper("login"), sleeper("game")], fast_options());

    let started_at = Instant::now();
    let report = sup.start_all().await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.started, vec!["login", "game"]);
    assert!(started_at.elapsed() >= Duration::from_millis(100));

    let status = sup.status().await;
    assert_eq!(status.len(), 2);
    assert!(status.iter().all(|s| s.state == LifecycleState::Running && s.pid.is_some()));

    let report = sup.stop_all(GRACE, KILL).await;
    assert_eq!(report.order(), vec!["game", "login"]);
    assert!(report.stopped.iter().all(|s| s.outcome == StopOutcome::Terminated));
    assert!(report.reap.is_success());
    assert!(matches!(report.reap, ReapReport::Completed(ref ports) if ports.len() == 3));

    assert!(sup.all_idle().await);
    let status = sup.status().await;
    assert!(status.iter().all(ProcessStatus::is_idle));
    assert!(status.iter().all(|s| s.pid.is_none()));

    let lifecycle: Vec<EventKind> = events
        .kinds()
        .into_iter()
        .filter(|k| !matches!(k, EventKind::PortFree { .. }))
        .collect();
    let expected_stop = |name: &str| EventKind::Stopped {
        name: name.to_string(),
        outcome: StopOutcome::Terminated,
        exit_code: None,
    };
    assert_eq!(lifecycle[0], EventKind::Starting { name: "login".into() });
    assert!(matches!(&lifecycle[1], EventKind::Started { name, .. } if name == "login"));
    assert_eq!(lifecycle[2], EventKind::Starting { name: "game".into() });
    assert!(matches!(&lifecycle[3], EventKind::Started { name, .. } if name == "game"));
    assert!(matches!(&lifecycle[4], EventKind::Stopping { name, pid: Some(_) } if name == "game"));
    assert_eq!(lifecycle[5], expected_stop("game"));
    assert!(matches!(&lifecycle[6], EventKind::Stopping { name, .. } if name == "login"));
    assert_eq!(lifecycle[7], expected_stop("login"));
    assert_eq!(lifecycle[8], EventKind::AllStopped);
    assert_eq!(lifecycle.len(), 9);

    sup.shutdown().await;
}

#[tokio::test]
async fn start_while_running_is_rejected() {
    let (sup, _events) = build(vec![sleeper("login")], fast_options());
    sup.start_all().await.unwrap();

    let err = sup.start_all().await.unwrap_err();
    assert!(matches!(err, SupervisorError::AlreadyRunning(name) if name == "login"));

    sup.stop_all(GRACE, KILL).await;
    // Idle again: the name is free for relaunch.
    assert!(sup.start_all().await.unwrap().is_success());
    sup.stop_all(GRACE, KILL).await;
    sup.shutdown().await;
}

#[tokio::test]
async fn failed_launch_skips_the_rest() {
    let missing = LaunchSpec::new("login", "/definitely/not/here/startLoginServer.sh");
    let (sup, events) = build(vec![missing, sleeper("game")], fast_options());

    let report = sup.start_all().await.unwrap();
    assert!(report.started.is_empty());
    assert_eq!(report.failed.as_ref().map(|f| f.name.as_str()), Some("login"));
    assert_eq!(report.skipped, vec!["game"]);
    assert!(sup.all_idle().await);

    assert_eq!(events.count(|k| matches!(k, EventKind::SpawnFailed { .. })), 1);
    assert_eq!(
        events.count(|k| matches!(k, EventKind::StartSkipped { name, blocked_by } if name == "game" && blocked_by == "login")),
        1
    );
    sup.shutdown().await;
}

#[tokio::test]
async fn failure_after_first_launch_leaves_it_running() {
    let missing = LaunchSpec::new("game", "/definitely/not/here/startGameServer.sh");
    let (sup, _events) = build(vec![sleeper("login"), missing], fast_options());

    let report = sup.start_all().await.unwrap();
    assert_eq!(report.started, vec!["login"]);
    assert_eq!(report.failed.as_ref().map(|f| f.name.as_str()), Some("game"));

    let login = sup.process_status("login").await.unwrap();
    assert_eq!(login.state, LifecycleState::Running);
    let game = sup.process_status("game").await.unwrap();
    assert_eq!(game.state, LifecycleState::Idle);

    let stop = sup.stop_all(GRACE, KILL).await;
    assert_eq!(stop.order(), vec!["login"]);
    sup.shutdown().await;
}

#[tokio::test]
async fn stop_all_finishes_within_grace_plus_kill() {
    let stubborn = LaunchSpec::new("game", "sh").with_args(["-c", "trap '' TERM; sleep 30"]);
    let (sup, _events) = build(vec![stubborn], fast_options());
    sup.start_all().await.unwrap();
    sleep(Duration::from_millis(200)).await;

    let grace = Duration::from_millis(300);
    let kill = Duration::from_secs(2);
    let started = Instant::now();
    let report = sup.stop_all(grace, kill).await;

    assert_eq!(report.stopped[0].outcome, StopOutcome::KilledAfterGrace);
    assert!(started.elapsed() < grace + kill + Duration::from_secs(1));
    assert!(sup.all_idle().await);
    sup.shutdown().await;
}

#[tokio::test]
async fn per_process_grace_overrides_stop_all_grace() {
    let stubborn = LaunchSpec::new("game", "sh")
        .with_args(["-c", "trap '' TERM; sleep 30"])
        .with_grace_period(Duration::from_millis(200));
    let (sup, _events) = build(vec![stubborn], fast_options());
    sup.start_all().await.unwrap();
    sleep(Duration::from_millis(200)).await;

    let started = Instant::now();
    let report = sup.stop_all(Duration::from_secs(30), KILL).await;
    assert_eq!(report.stopped[0].outcome, StopOutcome::KilledAfterGrace);
    assert!(started.elapsed() < Duration::from_secs(5));
    sup.shutdown().await;
}

#[tokio::test]
async fn out_of_band_kill_is_reported_once() {
    let (sup, events) = build(vec![sleeper("game")], fast_options());
    sup.start_all().await.unwrap();
    let pid = sup.process_status("game").await.unwrap().pid.unwrap();

    let status = std::process::Command::new("kill")
        .args(["-9", &pid.to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    let deadline = Instant::now() + Duration::from_secs(3);
    while !sup.all_idle().await && Instant::now() < deadline {
        sleep(Duration::from_millis(10)).await;
    }
    assert!(sup.all_idle().await);

    // Several more reconcile intervals must not repeat the event.
    sleep(Duration::from_millis(300)).await;
    assert_eq!(events.count(|k| matches!(k, EventKind::UnexpectedExit { name, .. } if name == "game")), 1);
    assert_eq!(events.count(|k| matches!(k, EventKind::AllStopped)), 1);

    let game = sup.process_status("game").await.unwrap();
    assert_eq!(game.state, LifecycleState::Idle);
    assert_eq!(game.exit_code, None);

    // Nothing left to stop; the report says so without new lifecycle events.
    let report = sup.stop_all(GRACE, KILL).await;
    assert_eq!(report.stopped[0].outcome, StopOutcome::AlreadyExited);
    assert_eq!(events.count(|k| matches!(k, EventKind::Stopping { .. })), 0);
    assert_eq!(events.count(|k| matches!(k, EventKind::AllStopped)), 1);
    sup.shutdown().await;
}

#[tokio::test]
async fn no_events_after_shutdown() {
    let (sup, events) = build(vec![sleeper("game")], fast_options());
    sup.start_all().await.unwrap();
    let pid = sup.process_status("game").await.unwrap().pid.unwrap();

    sup.shutdown().await;
    let before = events.kinds().len();

    std::process::Command::new("kill")
        .args(["-9", &pid.to_string()])
        .status()
        .unwrap();
    sleep(Duration::from_millis(300)).await;

    assert_eq!(events.kinds().len(), before);
}

#[tokio::test]
async fn pid_records_follow_the_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let options = SupervisorOptions {
        state_dir: Some(dir.path().to_path_buf()),
        ..fast_options()
    };
    let (sup, _events) = build(vec![sleeper("login"), sleeper("game")], options);

    sup.start_all().await.unwrap();
    let records = pidfile::list_records(dir.path()).unwrap();
    assert_eq!(records.len(), 2);
    for (name, record) in &records {
        let status = sup.process_status(name).await.unwrap();
        assert_eq!(status.pid, Some(record.pid));
        assert!(pidfile::is_live(record));
    }

    sup.stop_all(GRACE, KILL).await;
    assert!(pidfile::list_records(dir.path()).unwrap().is_empty());
    sup.shutdown().await;
}

#[tokio::test]
async fn all_stopped_follows_the_port_reap() {
    // A fast reconciler gets many chances to run during the reap delay.
    let options = SupervisorOptions {
        reap_delay: Duration::from_millis(200),
        reconcile_interval: Duration::from_millis(5),
        ..fast_options()
    };
    let (sup, events) = build(vec![sleeper("login"), sleeper("game")], options);
    sup.start_all().await.unwrap();
    sup.stop_all(GRACE, KILL).await;

    let kinds = events.kinds();
    assert_eq!(events.count(|k| matches!(k, EventKind::AllStopped)), 1);
    assert_eq!(kinds.last(), Some(&EventKind::AllStopped));
    let last_port = kinds
        .iter()
        .rposition(|k| matches!(k, EventKind::PortFree { .. }))
        .unwrap();
    assert_eq!(last_port, kinds.len() - 2);
    sup.shutdown().await;
}

#[tokio::test]
async fn abort_between_launches_skips_the_rest() {
    let options = SupervisorOptions {
        settle_delay: Duration::from_secs(10),
        ..fast_options()
    };
    let (sup, _events) = build(vec![sleeper("login"), sleeper("game")], options);

    let abort = tokio_util::sync::CancellationToken::new();
    let trigger = abort.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let report = sup.start_all_until(&abort).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(report.interrupted);
    assert!(!report.is_success());
    assert_eq!(report.started, vec!["login"]);
    assert_eq!(report.skipped, vec!["game"]);
    assert_eq!(
        sup.process_status("game").await.unwrap().state,
        LifecycleState::Idle
    );

    // The started server is tracked and stopped as usual.
    let stop = sup.stop_all(GRACE, KILL).await;
    assert_eq!(stop.order(), vec!["login"]);
    assert!(sup.all_idle().await);
    sup.shutdown().await;
}
