//! `warden exec`: run one external command, streaming its output.

use warden_core::{CommandRequest, CommandRunner, OutputSink};
use warden_runtime::SystemCommandRunner;

use crate::error::CliError;

/// Prints every output line as it arrives.
struct StdoutSink;

impl OutputSink for StdoutSink {
    fn line(&self, line: &str) {
        println!("{line}");
    }
}

pub async fn execute(program: &str, args: &[String]) -> Result<(), CliError> {
    let request = CommandRequest::new(program).with_args(args.iter().cloned());
    tracing::debug!(command = %request.display_line(), "Running external command");

    let outcome = SystemCommandRunner::new().run(&request, &StdoutSink).await?;
    match outcome.exit_code {
        Some(0) => Ok(()),
        Some(code) => Err(CliError::Failed(format!("{program} exited with code {code}"))),
        None => Err(CliError::Failed(format!("{program} was terminated by a signal"))),
    }
}
