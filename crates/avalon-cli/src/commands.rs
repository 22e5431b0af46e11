//! Subcommand handlers.

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use avalon_pipeline::application::REQUIRED_SESSION_KEYS;
use avalon_pipeline::plugin::Plugin;
use avalon_pipeline::{
    ActionOutcome, Application, Capability, Pipeline, PipelineError, ProcessOptions,
};
use serde::Serialize;
use tracing::info;

use crate::cli::CliCommand;
use crate::errors::AppError;
use crate::exit_code_from_status;

const COMMANDS_TARGET: &str = "avalon_cli::commands";

/// Runs `command` against `pipeline`, writing results to `stdout`.
pub(crate) fn dispatch<W: Write>(
    command: &CliCommand,
    pipeline: &Pipeline,
    stdout: &mut W,
) -> Result<ExitCode, AppError> {
    match command {
        CliCommand::Apps { all } => list_applications(pipeline, *all, stdout),
        CliCommand::Environ { app } => print_environment(pipeline, app, stdout),
        CliCommand::Launch {
            app,
            no_initialize,
            wait,
        } => launch(pipeline, app, !*no_initialize, *wait, stdout),
        CliCommand::Session => write_json(stdout, pipeline.session()),
    }
}

fn list_applications<W: Write>(
    pipeline: &Pipeline,
    all: bool,
    stdout: &mut W,
) -> Result<ExitCode, AppError> {
    let session = pipeline.session();
    for class in pipeline.registry().discover(Capability::Application) {
        let label = Plugin::label(class.plugin());
        if class.is_compatible(session) {
            writeln!(stdout, "{}\t{label}", class.name()).map_err(AppError::Write)?;
        } else if all {
            writeln!(stdout, "{}\t{label}\t(incompatible)", class.name())
                .map_err(AppError::Write)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_environment<W: Write>(
    pipeline: &Pipeline,
    name: &str,
    stdout: &mut W,
) -> Result<ExitCode, AppError> {
    let application = find_application(pipeline, name)?;
    let context = pipeline.action_context(ProcessOptions {
        initialize: false,
        launch: false,
    });
    let environment = application.environ(pipeline.session(), &context)?;
    write_json(stdout, &environment)
}

fn launch<W: Write>(
    pipeline: &Pipeline,
    name: &str,
    initialize: bool,
    wait: bool,
    stdout: &mut W,
) -> Result<ExitCode, AppError> {
    find_application(pipeline, name)?;
    let options = ProcessOptions {
        initialize,
        launch: true,
    };
    let ActionOutcome::Launched(mut handle) = pipeline.run_action(name, options)? else {
        return Err(AppError::NotLaunched {
            name: name.to_owned(),
        });
    };
    writeln!(stdout, "launched {name} (pid {})", handle.pid()).map_err(AppError::Write)?;
    stdout.flush().map_err(AppError::Write)?;

    if !wait {
        return Ok(ExitCode::SUCCESS);
    }
    let status = handle.wait()?;
    let code = status.and_then(|exit| exit.code());
    info!(
        target: COMMANDS_TARGET,
        application = name,
        pid = handle.pid(),
        code = ?code,
        "application exited"
    );
    Ok(exit_code_from_status(code))
}

/// Looks an application up by name and checks the session can run it.
fn find_application(pipeline: &Pipeline, name: &str) -> Result<Arc<Application>, AppError> {
    let application = pipeline
        .registry()
        .discover(Capability::Application)
        .into_iter()
        .filter(|class| class.name() == name)
        .find_map(|class| class.as_application())
        .ok_or_else(|| PipelineError::NotFound {
            capability: Capability::Application,
            name: name.to_owned(),
        })?;

    let missing = pipeline.session().missing(&REQUIRED_SESSION_KEYS);
    if !missing.is_empty() {
        return Err(AppError::Incompatible {
            name: name.to_owned(),
            missing: missing.into_iter().map(str::to_owned).collect(),
        });
    }
    Ok(application)
}

fn write_json<W: Write, T: Serialize + ?Sized>(
    stdout: &mut W,
    value: &T,
) -> Result<ExitCode, AppError> {
    let text = serde_json::to_string_pretty(value).map_err(AppError::Serialise)?;
    writeln!(stdout, "{text}").map_err(AppError::Write)?;
    Ok(ExitCode::SUCCESS)
}
