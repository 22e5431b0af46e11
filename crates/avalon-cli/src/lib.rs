//! Command-line runtime for the Avalon pipeline.
//!
//! The runtime layers settings from defaults, an optional file, the
//! environment and command-line flags, installs telemetry, builds a
//! [`Pipeline`](avalon_pipeline::Pipeline) for the session found in the
//! environment and then lists, resolves or launches applications. Both the
//! environment snapshot and the output streams are injectable so tests can
//! drive the runtime without touching the process state.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use avalon_pipeline::launcher::process_environment;
use clap::Parser;
use clap::error::ErrorKind;
use tracing::debug;

mod bootstrap;
mod cli;
mod commands;
mod errors;
mod telemetry;

use cli::Cli;
use errors::AppError;

/// Tracing target for the CLI runtime.
const CLI_TARGET: &str = "avalon_cli";

/// Runs the CLI against the current process environment.
///
/// Variables whose name or value is not valid UTF-8 are ignored.
#[must_use]
pub fn run<I, T, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    W: Write,
    E: Write,
{
    run_with_env(args, process_environment(), stdout, stderr)
}

/// Runs the CLI against an explicit environment snapshot.
///
/// `vars` seeds the settings overrides, the session and the base
/// environment of launched applications.
#[must_use]
pub fn run_with_env<I, T, V, W, E>(args: I, vars: V, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    V: IntoIterator<Item = (String, String)>,
    W: Write,
    E: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => return report_usage(error, stdout, stderr),
    };
    let environment: Vec<(String, String)> = vars.into_iter().collect();

    execute(&cli, environment, stdout).unwrap_or_else(|error| {
        if let Err(write_error) = writeln!(stderr, "avalon: {error}") {
            debug!(
                target: CLI_TARGET,
                error = %write_error,
                "could not report failure"
            );
        }
        ExitCode::FAILURE
    })
}

fn execute<W: Write>(
    cli: &Cli,
    environment: Vec<(String, String)>,
    stdout: &mut W,
) -> Result<ExitCode, AppError> {
    let config = bootstrap::load_config(cli, &environment)?;
    telemetry::initialise(&config)?;
    debug!(
        target: CLI_TARGET,
        command = ?cli.command,
        plugin_paths = config.plugin_paths().len(),
        "resolved configuration"
    );
    let pipeline = bootstrap::build_pipeline(&config, environment)?;
    commands::dispatch(&cli.command, &pipeline, stdout)
}

fn report_usage<W: Write, E: Write>(error: clap::Error, stdout: &mut W, stderr: &mut E) -> ExitCode {
    let informational = matches!(
        error.kind(),
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
    );
    let written = if informational {
        write!(stdout, "{}", error.render())
    } else {
        write!(stderr, "{}", AppError::CliUsage(error))
    };
    if let Err(write_error) = written {
        debug!(target: CLI_TARGET, error = %write_error, "could not print usage");
    }
    if informational {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    }
}

/// Maps a child process exit status onto this process's exit code.
///
/// Statuses outside `0..=255`, or a child killed by a signal, map to
/// [`ExitCode::FAILURE`].
pub(crate) fn exit_code_from_status(status: Option<i32>) -> ExitCode {
    status
        .and_then(|code| u8::try_from(code).ok())
        .map_or(ExitCode::FAILURE, ExitCode::from)
}

#[cfg(test)]
mod tests;
