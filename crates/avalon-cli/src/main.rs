//! Entrypoint of the `avalon` binary.
//!
//! Delegates to [`avalon_cli::run`], which loads settings, installs
//! telemetry and dispatches the requested subcommand against the session
//! found in the process environment.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    avalon_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
