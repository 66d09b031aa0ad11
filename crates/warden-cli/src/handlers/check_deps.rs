//! `warden check-deps`: check that the servers' runtime dependencies are
//! installed.

use warden_core::CommandRunner;
use warden_runtime::SystemCommandRunner;
use warden_runtime::deps::{
    self, DATABASE_SERVICE_NAMES, DependencyReport, DependencyStatus, InstallPathReport,
    REQUIRED_DATABASE_VERSION, REQUIRED_JAVA_MAJOR, ServiceReport, ServiceStatus,
};

use crate::error::CliError;
use crate::presentation::{BOLD, GREEN, RED, RESET, YELLOW};

/// One row of the dependency table.
pub fn format_dependency(report: &DependencyReport) -> String {
    let (color, mark) = match &report.status {
        DependencyStatus::Ok { .. } => (GREEN, "✓"),
        DependencyStatus::WrongVersion { .. } | DependencyStatus::Unknown { .. } => (YELLOW, "!"),
        DependencyStatus::Missing => (RED, "✗"),
    };
    format!("{:<20} {color}{mark} {}{RESET}", report.name, report.status)
}

/// Informational line about the default install directory.
pub fn format_install_path(report: &InstallPathReport) -> String {
    let state = if report.exists { "present" } else { "absent" };
    format!("{:<20} {} ({state})", "Install directory", report.path.display())
}

/// Informational line about the database service.
pub fn format_service(report: &ServiceReport) -> String {
    let (color, mark) = match &report.status {
        ServiceStatus::Running => (GREEN, "✓"),
        ServiceStatus::Stopped { .. } | ServiceStatus::Unknown { .. } => (YELLOW, "!"),
        ServiceStatus::NotInstalled => (RED, "✗"),
    };
    let label = format!("Service {}", report.service);
    format!("{label:<20} {color}{mark} {}{RESET}", report.status)
}

/// Run every check. Returns whether all dependencies are satisfied.
pub async fn run_checks(runner: &dyn CommandRunner) -> (Vec<DependencyReport>, bool) {
    let reports = vec![
        deps::check_java(runner, REQUIRED_JAVA_MAJOR).await,
        deps::check_database(runner, REQUIRED_DATABASE_VERSION).await,
    ];
    let ok = reports.iter().all(|r| r.status.is_ok());
    (reports, ok)
}

pub async fn execute() -> Result<(), CliError> {
    println!("{BOLD}Checking system dependencies...{RESET}\n");

    let runner = SystemCommandRunner::new();
    let (reports, ok) = run_checks(&runner).await;
    for report in &reports {
        println!("{}", format_dependency(report));
    }

    let service = deps::check_database_service(&runner, &DATABASE_SERVICE_NAMES).await;
    println!("{}", format_service(&service));

    if let Some(dir) = deps::default_database_install_dir() {
        println!("{}", format_install_path(&deps::check_install_path(&dir)));
    }

    println!();
    if ok {
        println!("{GREEN}✓ All dependencies are installed{RESET}");
        Ok(())
    } else {
        Err(CliError::Failed("missing or outdated dependencies".to_string()))
    }
}
