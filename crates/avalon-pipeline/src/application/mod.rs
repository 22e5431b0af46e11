//! Application launcher action.
//!
//! An [`Application`] wraps an [`ApplicationDefinition`] and launches it in
//! three stages:
//!
//! 1. [`Application::environ`] builds the process environment from the OS
//!    environment, the session and the definition's environment template,
//!    computing `AVALON_WORKDIR` from the project's work template;
//! 2. [`Application::initialize`] creates the work directory with its default
//!    subdirectories and copies the declared files into it;
//! 3. [`Application::launch`] resolves the executable on `PATH` and spawns it
//!    through a [`ProcessLauncher`].
//!
//! [`Action::process`] runs the stages according to [`ProcessOptions`].
//!
//! [`ProcessOptions`]: crate::plugin::ProcessOptions

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use avalon_config::{ApplicationDefinition, DEFAULT_WORK_TEMPLATE};
use tracing::{debug, error, info};

use crate::error::PipelineError;
use crate::launcher::{
    Environment, LaunchRequest, ProcessHandle, ProcessLauncher, normalize_path, which,
};
use crate::plugin::{Action, ActionContext, ActionOutcome, Plugin};
use crate::session::{Session, keys};
use crate::template::{TemplateVars, format_str, prepare_environment};

/// Tracing target for application operations.
const APPLICATION_TARGET: &str = "avalon_pipeline::application";

/// Session keys an application needs before it can launch.
pub const REQUIRED_SESSION_KEYS: [&str; 4] =
    [keys::PROJECTS, keys::PROJECT, keys::ASSET, keys::TASK];

/// Name of the executable search path variable.
const PATH_VAR: &str = "PATH";

/// Computes the work directory of `session` from a work template.
///
/// The template sees `root` (the registered `root`, else
/// `AVALON_PROJECTS`), `project`, `asset`, `silo`, `task` and `app`, plus
/// `user` and `hierarchy` when the session sets them. The result is
/// normalised lexically.
///
/// # Errors
///
/// Returns [`PipelineError::MissingVariable`] when the template uses a
/// variable the session does not provide.
pub fn work_directory(
    template: &str,
    session: &Session,
    root: Option<&Path>,
) -> Result<PathBuf, PipelineError> {
    let mut vars = TemplateVars::new();
    let root_value = root
        .map(|path| path.display().to_string())
        .or_else(|| session.get(keys::PROJECTS).map(str::to_owned));
    if let Some(value) = root_value {
        vars.insert(String::from("root"), value);
    }
    for (name, key) in [
        ("project", keys::PROJECT),
        ("asset", keys::ASSET),
        ("silo", keys::SILO),
        ("task", keys::TASK),
        ("app", keys::APP),
        ("user", keys::USER),
        ("hierarchy", keys::HIERARCHY),
    ] {
        if let Some(value) = session.get(key) {
            vars.insert(name.to_owned(), value.to_owned());
        }
    }

    let workdir = format_str(template, &vars)?;
    Ok(normalize_path(&workdir))
}

/// An application launchable from the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    definition: ApplicationDefinition,
}

impl Application {
    /// Wraps an application definition.
    #[must_use]
    pub const fn new(definition: ApplicationDefinition) -> Self {
        Self { definition }
    }

    /// Returns the wrapped definition.
    #[must_use]
    pub const fn definition(&self) -> &ApplicationDefinition {
        &self.definition
    }

    /// Builds the environment of the application process.
    ///
    /// The result is the base environment of `context`, overlaid with the
    /// session (plus `AVALON_APP`, `AVALON_APP_NAME` and `AVALON_WORKDIR`),
    /// overlaid with the resolved environment template of the definition.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingVariable`] or
    /// [`PipelineError::TemplateSyntax`] when the work template or the
    /// environment template cannot be resolved.
    pub fn environ(
        &self,
        session: &Session,
        context: &ActionContext<'_>,
    ) -> Result<Environment, PipelineError> {
        let mut app_session = session.clone();
        app_session.set(keys::APP, self.definition.application_dir());
        app_session.set(keys::APP_NAME, self.definition.name());

        let template = context
            .config()
            .map_or(DEFAULT_WORK_TEMPLATE, |config| config.work_template());
        let workdir = work_directory(template, &app_session, context.root())?;
        app_session.set(keys::WORKDIR, workdir.display().to_string());

        let mut environment = context.base_environment().clone();
        environment.extend(
            app_session
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );

        let mut resolved = Environment::new();
        for (key, template_value) in prepare_environment(self.definition.environment()) {
            let value = format_str(&template_value, &environment).inspect_err(|_| {
                error!(
                    target: APPLICATION_TARGET,
                    application = self.definition.name(),
                    variable = key.as_str(),
                    "a variable in the application environment was not found in this session"
                );
            })?;
            resolved.insert(key, value);
        }
        environment.extend(resolved);

        debug!(
            target: APPLICATION_TARGET,
            application = self.definition.name(),
            workdir = %workdir.display(),
            variables = environment.len(),
            "built application environment"
        );
        Ok(environment)
    }

    /// Prepares the work directory named by `AVALON_WORKDIR`.
    ///
    /// A missing work directory is created together with the default
    /// subdirectories. Declared copies run on every call; a failed copy is
    /// logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Configuration`] when `AVALON_WORKDIR` is not
    /// set, [`PipelineError::Io`] when a directory cannot be created, or a
    /// template error when a directory or copy entry cannot be resolved.
    pub fn initialize(&self, environment: &Environment) -> Result<(), PipelineError> {
        let workdir = workdir_of(environment)?;

        if !workdir.exists() {
            info!(
                target: APPLICATION_TARGET,
                workdir = %workdir.display(),
                "creating working directory"
            );
            fs::create_dir_all(&workdir).map_err(|err| PipelineError::io(&workdir, err))?;

            for dir in self.definition.default_dirs() {
                let name = format_str(dir, environment)?;
                let path = workdir.join(&name);
                match fs::create_dir_all(&path) {
                    Ok(()) => debug!(
                        target: APPLICATION_TARGET,
                        dir = name.as_str(),
                        "created default directory"
                    ),
                    Err(err) if err.kind() == ErrorKind::AlreadyExists => {}
                    Err(err) => return Err(PipelineError::io(&path, err)),
                }
            }
        }

        for (source, destination) in self.definition.copy() {
            let source_path = PathBuf::from(format_str(source, environment)?);
            let destination_path = workdir.join(format_str(destination, environment)?);
            info!(
                target: APPLICATION_TARGET,
                source = %source_path.display(),
                destination = %destination_path.display(),
                "copying application file"
            );
            if let Err(err) = fs::copy(&source_path, &destination_path) {
                error!(
                    target: APPLICATION_TARGET,
                    source = %source_path.display(),
                    destination = %destination_path.display(),
                    error = %err,
                    "could not copy application file"
                );
            }
        }

        Ok(())
    }

    /// Resolves the executable and spawns the application.
    ///
    /// The executable is looked up on the environment's `PATH`, falling
    /// back to the `PATH` of the current process.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ExecutableNotFound`] when the executable is
    /// not on `PATH`, or the launcher's error when spawning fails.
    pub fn launch(
        &self,
        environment: &Environment,
        launcher: &dyn ProcessLauncher,
    ) -> Result<ProcessHandle, PipelineError> {
        let search_path = environment
            .get(PATH_VAR)
            .cloned()
            .unwrap_or_else(|| std::env::var(PATH_VAR).unwrap_or_default());
        let executable_name = self.definition.executable();
        let Some(executable) = which(executable_name, &search_path) else {
            return Err(PipelineError::ExecutableNotFound {
                executable: executable_name.to_owned(),
                search_path,
            });
        };

        let request = LaunchRequest {
            executable,
            args: self.definition.args().to_vec(),
            environment: environment.clone(),
            working_dir: environment.get(keys::WORKDIR).map(PathBuf::from),
        };
        info!(
            target: APPLICATION_TARGET,
            application = self.definition.name(),
            executable = %request.executable.display(),
            "launching application"
        );
        launcher.spawn(&request)
    }
}

fn workdir_of(environment: &Environment) -> Result<PathBuf, PipelineError> {
    environment
        .get(keys::WORKDIR)
        .map(PathBuf::from)
        .ok_or_else(|| {
            PipelineError::configuration(format!(
                "{} is not set; build the environment with `environ` first",
                keys::WORKDIR
            ))
        })
}

impl Plugin for Application {
    fn name(&self) -> &str {
        self.definition.name()
    }

    fn label(&self) -> &str {
        self.definition.label()
    }

    fn order(&self) -> i32 {
        self.definition.order()
    }

    fn icon(&self) -> Option<&str> {
        self.definition.icon()
    }

    fn is_compatible(&self, session: &Session) -> bool {
        let missing = session.missing(&REQUIRED_SESSION_KEYS);
        if missing.is_empty() {
            return true;
        }
        debug!(
            target: APPLICATION_TARGET,
            application = self.definition.name(),
            missing = ?missing,
            "application is not compatible with the session"
        );
        false
    }
}

impl Action for Application {
    fn process(
        &self,
        session: &Session,
        context: &ActionContext<'_>,
    ) -> Result<ActionOutcome, PipelineError> {
        let environment = self.environ(session, context)?;
        let options = context.options();

        if options.initialize {
            self.initialize(&environment)?;
        }

        if options.launch {
            let handle = self.launch(&environment, context.launcher())?;
            return Ok(ActionOutcome::Launched(handle));
        }

        Ok(ActionOutcome::Prepared(environment))
    }
}
