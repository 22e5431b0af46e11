//! Settings layering and pipeline construction.

use std::ffi::OsString;

use avalon_config::{Config, PLUGIN_PATH_ENV, ProjectDocument, split_path_list};
use avalon_pipeline::session::keys;
use avalon_pipeline::{Environment, Pipeline, Session};
use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use tracing::{debug, info};

use crate::cli::Cli;
use crate::errors::AppError;

const BOOTSTRAP_TARGET: &str = "avalon_cli::bootstrap";

/// Program name handed to the settings loader as `argv[0]`.
const BINARY_NAME: &str = "avalon";

/// Loads the layered settings.
///
/// The settings flags parsed by clap are forwarded to the loader, which
/// layers them over the settings file and `AVALON_*` variables. Plugin
/// directories from the `AVALON_PLUGIN_PATH` search-path list and from
/// `--plugin-path` are appended afterwards.
pub(crate) fn load_config(cli: &Cli, environment: &[(String, String)]) -> Result<Config, AppError> {
    let mut config =
        Config::load_from_iter(config_arguments(cli)).map_err(AppError::LoadConfiguration)?;
    let listed = environment
        .iter()
        .filter(|(key, _)| key == PLUGIN_PATH_ENV)
        .flat_map(|(_, value)| split_path_list(value));
    for path in listed {
        config.push_plugin_path(path);
    }
    for path in &cli.plugin_paths {
        config.push_plugin_path(path.clone());
    }
    Ok(config)
}

/// Rebuilds the settings flags in the form the layered loader parses.
pub(crate) fn config_arguments(cli: &Cli) -> Vec<OsString> {
    let flags = [
        ("--config-path", cli.config_path.as_deref().map(Utf8Path::as_str)),
        ("--log-filter", cli.log_filter.as_deref()),
        ("--log-format", cli.log_format.as_deref()),
        ("--root", cli.root.as_deref().map(Utf8Path::as_str)),
        ("--project-config", cli.project_config.as_deref().map(Utf8Path::as_str)),
    ];
    std::iter::once(OsString::from(BINARY_NAME))
        .chain(flags.into_iter().flat_map(|(flag, value)| {
            value
                .into_iter()
                .flat_map(move |text| [OsString::from(flag), OsString::from(text)])
        }))
        .collect()
}

/// Builds a pipeline for the session found in `environment`.
///
/// The environment also becomes the base environment of launched
/// applications. An explicit project configuration file wins; otherwise the
/// project document under the projects root is used when present.
pub(crate) fn build_pipeline(
    config: &Config,
    environment: Vec<(String, String)>,
) -> Result<Pipeline, AppError> {
    let session = Session::from_environment(environment.iter().cloned());
    let base: Environment = environment.into_iter().collect();
    let mut pipeline = Pipeline::new(session).with_base_environment(base);

    let root = config
        .root()
        .map(Utf8Path::to_path_buf)
        .or_else(|| pipeline.session().get(keys::PROJECTS).map(Utf8PathBuf::from));

    for path in config.plugin_paths() {
        pipeline.registry_mut().register_plugin_path(path.as_std_path());
    }
    if let Some(root_dir) = &root {
        pipeline.registry_mut().register_root(root_dir.as_std_path());
    }

    let project_document = match (config.project_config_path(), &root) {
        (None, Some(root_dir)) => project_document(&pipeline, root_dir)?,
        _ => None,
    };
    match project_document {
        Some(document) => {
            info!(
                target: BOOTSTRAP_TARGET,
                project = document.name.as_str(),
                label = document.display_label(),
                "using project document"
            );
            pipeline.session_mut().set(keys::PROJECT, document.name);
            pipeline.registry_mut().register_config(document.config);
        }
        None => {
            let project = config.project()?;
            pipeline.registry_mut().register_config(project);
        }
    }

    debug!(
        target: BOOTSTRAP_TARGET,
        session_keys = pipeline.session().len(),
        plugin_paths = pipeline.registry().plugin_paths().len(),
        "pipeline ready"
    );
    Ok(pipeline)
}

fn project_document(
    pipeline: &Pipeline,
    root: &Utf8Path,
) -> Result<Option<ProjectDocument>, AppError> {
    let Some(project) = pipeline.session().get(keys::PROJECT) else {
        return Ok(None);
    };
    let project_dir = root.join(project);
    if !ProjectDocument::path_for(&project_dir).is_file() {
        debug!(
            target: BOOTSTRAP_TARGET,
            project_dir = project_dir.as_str(),
            "no project document; using default project configuration"
        );
        return Ok(None);
    }
    Ok(Some(ProjectDocument::load(&project_dir)?))
}
