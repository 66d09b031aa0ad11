//! Terminal rendering for events, log output and reports.

use std::fmt::Write as _;
use std::io::{self, Write};

use chrono::Local;
use warden_core::{LogChunk, SupervisorEvent};
use warden_runtime::ReapReport;

// ANSI color codes
pub const GREEN: &str = "\x1b[32m";
pub const RED: &str = "\x1b[31m";
pub const YELLOW: &str = "\x1b[33m";
pub const BOLD: &str = "\x1b[1m";
pub const RESET: &str = "\x1b[0m";

/// One event line, red when it reports a failure.
pub fn format_event(event: &SupervisorEvent) -> String {
    if event.is_error() {
        format!("{RED}{event}{RESET}")
    } else {
        event.to_string()
    }
}

pub fn print_event(event: &SupervisorEvent) {
    println!("{}", format_event(event));
}

/// Print the events a reap produced, stamped with the current time.
pub fn print_reap_report(report: &ReapReport) {
    for kind in report.events() {
        print_event(&SupervisorEvent::new(kind));
    }
}

/// Turns log chunks into terminal text.
///
/// With a label, output is cut into whole lines and each line is prefixed
/// so interleaved logs from several servers stay readable. Without one,
/// bytes pass through unchanged.
#[derive(Debug, Default)]
pub struct LogPrinter {
    label: Option<String>,
    partial: Vec<u8>,
}

impl LogPrinter {
    pub fn new(label: Option<String>) -> Self {
        Self {
            label,
            partial: Vec::new(),
        }
    }

    fn prefix(&self) -> String {
        self.label
            .as_ref()
            .map_or_else(String::new, |label| format!("{BOLD}[{label}]{RESET} "))
    }

    /// Text to show for `chunk`. May be empty while a line is incomplete.
    pub fn render(&mut self, chunk: &LogChunk) -> String {
        match chunk {
            LogChunk::Waiting => format!("{}{YELLOW}waiting for log file{RESET}\n", self.prefix()),
            LogChunk::Reset => {
                self.partial.clear();
                format!("{}{YELLOW}log file was truncated, replaying{RESET}\n", self.prefix())
            }
            LogChunk::Error(reason) => {
                format!("{}{RED}cannot read log file: {reason}{RESET}\n", self.prefix())
            }
            LogChunk::Data(bytes) if self.label.is_none() => {
                String::from_utf8_lossy(bytes).into_owned()
            }
            LogChunk::Data(bytes) => {
                self.partial.extend_from_slice(bytes);
                let Some(last_newline) = self.partial.iter().rposition(|b| *b == b'\n') else {
                    return String::new();
                };
                let rest = self.partial.split_off(last_newline + 1);
                let complete = std::mem::replace(&mut self.partial, rest);

                let prefix = self.prefix();
                let mut out = String::new();
                for line in String::from_utf8_lossy(&complete).lines() {
                    let _ = writeln!(out, "{prefix}{line}");
                }
                out
            }
        }
    }

    /// Render and write to stdout.
    pub fn print(&mut self, chunk: &LogChunk) {
        let text = self.render(chunk);
        if text.is_empty() {
            return;
        }
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }
}

/// `HH:MM:SS` of a Unix timestamp in local time.
pub fn format_start_time(epoch_secs: u64) -> String {
    i64::try_from(epoch_secs)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map_or_else(
            || "unknown".to_string(),
            |at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
        )
}


#[cfg(test)]
mod tests {
    use super::*;

    fn data(text: &str) -> LogChunk {
        LogChunk::Data(text.as_bytes().to_vec())
    }

    #[test]
    fn test_unlabelled_passes_bytes_through() {
        let mut printer = LogPrinter::new(None);
        assert_eq!(printer.render(&data("par")), "par");
        assert_eq!(printer.render(&data("tial\n")), "tial\n");
    }

    #[test]
    fn test_labelled_buffers_partial_lines() {
        let mut printer = LogPrinter::new(Some("game".into()));
        assert_eq!(printer.render(&data("Game server ")), "");
        let out = printer.render(&data("listening\nnext"));
        assert_eq!(out, format!("{BOLD}[game]{RESET} Game server listening\n"));
        let out = printer.render(&data(" line\n"));
        assert_eq!(out, format!("{BOLD}[game]{RESET} next line\n"));
    }

    #[test]
    fn test_reset_drops_partial_line() {
        let mut printer = LogPrinter::new(Some("login".into()));
        assert_eq!(printer.render(&data("half a li")), "");
        assert!(printer.render(&LogChunk::Reset).contains("truncated"));
        let out = printer.render(&data("fresh\n"));
        assert_eq!(out, format!("{BOLD}[login]{RESET} fresh\n"));
    }

    #[test]
    fn test_error_events_are_red() {
        let failed = SupervisorEvent::spawn_failed("login", "not found");
        assert!(format_event(&failed).starts_with(RED));
        let started = SupervisorEvent::started("login", 42);
        assert!(!format_event(&started).contains(RED));
    }

    #[test]
    fn test_format_start_time_handles_out_of_range() {
        assert_eq!(format_start_time(u64::MAX), "unknown");
        assert_ne!(format_start_time(1_700_000_000), "unknown");
    }
}
