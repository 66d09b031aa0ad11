//! Dependency checks for the Java runtime, the database client and the
//! database service.
//!
//! Each tool's version output is treated as an external interface with its
//! own small parser. Anything the parser does not recognize is reported as
//! `Unknown`, never as OK.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;
use warden_core::{CommandError, CommandRequest, CommandRunner, NoopSink};

/// Java major version the game servers are built for.
pub const REQUIRED_JAVA_MAJOR: u32 = 21;

/// Oldest supported database server version.
pub const REQUIRED_DATABASE_VERSION: Version = Version::new(10, 5, 28);

/// A dotted `major.minor.patch` version; missing parts are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse the leading dotted number of `text` ("10.5.28-MariaDB," -> 10.5.28).
    pub fn parse(text: &str) -> Option<Self> {
        let numeric: &str = text
            .split(|c: char| !(c.is_ascii_digit() || c == '.'))
            .next()?
            .trim_end_matches('.');
        if numeric.is_empty() {
            return None;
        }

        let mut parts = numeric.split('.').map(str::parse::<u32>);
        let major = parts.next()?.ok()?;
        let minor = parts.next().transpose().ok()?.unwrap_or(0);
        let patch = parts.next().transpose().ok()?.unwrap_or(0);
        Some(Self::new(major, minor, patch))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Which database server a client reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseFlavor {
    MariaDb,
    MySql,
}

impl fmt::Display for DatabaseFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MariaDb => "MariaDB",
            Self::MySql => "MySQL",
        })
    }
}

/// Major version from `java -version` output.
///
/// Accepts `openjdk version "21.0.2" 2024-01-16` as well as the legacy
/// `java version "1.8.0_381"` form, where the major is the second number.
pub fn parse_java_major(output: &str) -> Option<u32> {
    const MARKER: &str = "version \"";

    output.lines().find_map(|line| {
        let start = line.find(MARKER)? + MARKER.len();
        let quoted = line[start..].split('"').next()?;
        let mut parts = quoted.split(['.', '_', '-', '+']);
        let first: u32 = parts.next()?.parse().ok()?;
        if first == 1 {
            parts.next()?.parse().ok()
        } else {
            Some(first)
        }
    })
}

/// Flavor and server version from `mariadb --version` / `mysql --version`.
///
/// Recognized forms:
/// - `mysql  Ver 15.1 Distrib 10.5.28-MariaDB, for Win64 (AMD64)`
/// - `mariadb from 11.4.2-MariaDB, client 15.2 for debian-linux-gnu`
/// - `mysql  Ver 8.0.36 for Linux on x86_64 (MySQL Community Server - GPL)`
pub fn parse_database_version(output: &str) -> Option<(DatabaseFlavor, Version)> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    let flavor = if line.to_ascii_lowercase().contains("mariadb") {
        DatabaseFlavor::MariaDb
    } else {
        DatabaseFlavor::MySql
    };

    // The client's own version follows "Ver" when a "Distrib" is present.
    ["Distrib ", " from ", "Ver "].iter().find_map(|marker| {
        let start = line.find(marker)? + marker.len();
        let token = line[start..].split_whitespace().next()?;
        Version::parse(token).map(|version| (flavor, version))
    })
}

/// Verdict of one dependency check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DependencyStatus {
    Ok { version: String },
    WrongVersion { found: String, required: String },
    Missing,
    /// The tool ran but its output could not be understood.
    Unknown { reason: String },
}

impl DependencyStatus {
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}

impl fmt::Display for DependencyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok { version } => write!(f, "OK ({version})"),
            Self::WrongVersion { found, required } => {
                write!(f, "wrong version: found {found}, required {required}")
            }
            Self::Missing => f.write_str("not found"),
            Self::Unknown { reason } => write!(f, "unknown ({reason})"),
        }
    }
}

/// Result of checking one dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyReport {
    pub name: String,
    pub status: DependencyStatus,
}

/// Whether a well-known install directory exists.
///
/// Reported next to the database check but never changes its verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallPathReport {
    pub path: PathBuf,
    pub exists: bool,
}

/// Default MariaDB 10.5 binary directory on this platform, if there is one.
pub fn default_database_install_dir() -> Option<PathBuf> {
    if cfg!(windows) {
        Some(PathBuf::from(r"C:\Program Files\MariaDB 10.5\bin"))
    } else {
        None
    }
}

pub fn check_install_path(path: &Path) -> InstallPathReport {
    InstallPathReport {
        path: path.to_path_buf(),
        exists: path.is_dir(),
    }
}

async fn version_output(
    runner: &dyn CommandRunner,
    program: &str,
    flag: &str,
) -> Result<String, CommandError> {
    let request = CommandRequest::new(program).with_args([flag]);
    let outcome = runner.run(&request, &NoopSink).await?;
    debug!(program, code = ?outcome.exit_code, "Version check finished");
    Ok(outcome.output())
}

/// Check that `java` on `PATH` has exactly the required major version.
pub async fn check_java(runner: &dyn CommandRunner, required_major: u32) -> DependencyReport {
    let status = match version_output(runner, "java", "-version").await {
        Err(CommandError::NotFound(_)) => DependencyStatus::Missing,
        Err(e) => DependencyStatus::Unknown {
            reason: e.to_string(),
        },
        Ok(output) => match parse_java_major(&output) {
            Some(major) if major == required_major => DependencyStatus::Ok {
                version: major.to_string(),
            },
            Some(major) => DependencyStatus::WrongVersion {
                found: major.to_string(),
                required: required_major.to_string(),
            },
            None => DependencyStatus::Unknown {
                reason: "unrecognized `java -version` output".to_string(),
            },
        },
    };

    DependencyReport {
        name: format!("Java {required_major}"),
        status,
    }
}

/// Check the database client version, trying `mariadb` then `mysql`.
pub async fn check_database(runner: &dyn CommandRunner, required: Version) -> DependencyReport {
    let mut status = DependencyStatus::Missing;

    for program in ["mariadb", "mysql"] {
        match version_output(runner, program, "--version").await {
            Err(CommandError::NotFound(_)) => continue,
            Err(e) => {
                status = DependencyStatus::Unknown {
                    reason: e.to_string(),
                };
            }
            Ok(output) => {
                status = match parse_database_version(&output) {
                    Some((flavor, version)) if version >= required => DependencyStatus::Ok {
                        version: format!("{flavor} {version}"),
                    },
                    Some((flavor, version)) => DependencyStatus::WrongVersion {
                        found: format!("{flavor} {version}"),
                        required: format!("{required} or newer"),
                    },
                    None => DependencyStatus::Unknown {
                        reason: format!("unrecognized `{program} --version` output"),
                    },
                };
            }
        }
        break;
    }

    DependencyReport {
        name: format!("MariaDB/MySQL {required}+"),
        status,
    }
}

/// Database service names to look for, in order.
pub const DATABASE_SERVICE_NAMES: [&str; 2] = if cfg!(windows) {
    ["MariaDB", "MySQL"]
} else {
    ["mariadb", "mysql"]
};

/// State of the database service as reported by the service manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ServiceStatus {
    Running,
    Stopped { state: String },
    NotInstalled,
    /// The service manager could not be asked or gave an unrecognized answer.
    Unknown { reason: String },
}

impl ServiceStatus {
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("running"),
            Self::Stopped { state } => write!(f, "not running ({state})"),
            Self::NotInstalled => f.write_str("not installed"),
            Self::Unknown { reason } => write!(f, "unknown ({reason})"),
        }
    }
}

/// Result of the database service check.
///
/// Shown on its own line; the client version verdict does not depend on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceReport {
    /// Service name that produced the status, or the first one tried.
    pub service: String,
    pub status: ServiceStatus,
}

/// Service state from Windows `sc query <name>` output.
///
/// ```text
/// SERVICE_NAME: MariaDB
///         TYPE               : 10  WIN32_OWN_PROCESS
///         STATE              : 4  RUNNING
/// ```
///
/// Error 1060 means the service does not exist.
pub fn parse_sc_query(output: &str) -> Option<ServiceStatus> {
    if output.contains("1060") {
        return Some(ServiceStatus::NotInstalled);
    }
    let line = output
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("STATE"))?;
    let (_, value) = line.split_once(':')?;
    let state = value.split_whitespace().nth(1)?;
    Some(if state == "RUNNING" {
        ServiceStatus::Running
    } else {
        ServiceStatus::Stopped {
            state: state.to_ascii_lowercase(),
        }
    })
}

/// Service state from `systemctl is-active <unit>` output.
pub fn parse_systemctl_is_active(output: &str) -> Option<ServiceStatus> {
    let state = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    match state {
        "active" => Some(ServiceStatus::Running),
        "inactive" | "failed" | "activating" | "deactivating" | "reloading" => {
            Some(ServiceStatus::Stopped {
                state: state.to_string(),
            })
        }
        "unknown" => Some(ServiceStatus::NotInstalled),
        _ => None,
    }
}

async fn service_status(runner: &dyn CommandRunner, service: &str) -> ServiceStatus {
    let (program, args, parse): (&str, [&str; 2], fn(&str) -> Option<ServiceStatus>) =
        if cfg!(windows) {
            ("sc", ["query", service], parse_sc_query)
        } else {
            ("systemctl", ["is-active", service], parse_systemctl_is_active)
        };

    let request = CommandRequest::new(program).with_args(args);
    match runner.run(&request, &NoopSink).await {
        Err(CommandError::NotFound(_)) => ServiceStatus::Unknown {
            reason: format!("`{program}` not available"),
        },
        Err(e) => ServiceStatus::Unknown {
            reason: e.to_string(),
        },
        Ok(outcome) => {
            debug!(program, service, code = ?outcome.exit_code, "Service query finished");
            parse(&outcome.output()).unwrap_or_else(|| ServiceStatus::Unknown {
                reason: format!("unrecognized `{program}` output"),
            })
        }
    }
}

/// Ask the service manager whether a database service is running.
///
/// Tries each name in order and stops at the first running one. Otherwise
/// reports the first name that exists, or `NotInstalled` when none do.
pub async fn check_database_service(runner: &dyn CommandRunner, names: &[&str]) -> ServiceReport {
    let mut first_found: Option<ServiceReport> = None;

    for name in names {
        let status = service_status(runner, name).await;
        if status.is_running() {
            return ServiceReport {
                service: (*name).to_string(),
                status,
            };
        }
        if status != ServiceStatus::NotInstalled && first_found.is_none() {
            first_found = Some(ServiceReport {
                service: (*name).to_string(),
                status,
            });
        }
    }

    first_found.unwrap_or_else(|| ServiceReport {
        service: names.first().copied().unwrap_or_default().to_string(),
        status: ServiceStatus::NotInstalled,
    })
}
