//! Shared configuration for the Avalon pipeline crates.
//!
//! Two kinds of configuration live here. [`Config`] holds the runtime
//! settings of the tooling (log filter and format, plugin search paths,
//! project root, project configuration file). It derives [`OrthoConfig`], so
//! it is layered from defaults, a TOML settings file (`--config-path` or
//! `AVALON_CONFIG_PATH`), `AVALON_*` environment variables and command-line
//! flags, later layers winning. [`ProjectConfig`] and
//! [`ApplicationDefinition`] describe the project being worked on and the
//! applications that can be launched for it.

mod application;
mod defaults;
mod logging;
mod project;

use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use application::{ApplicationDefinition, TemplateValue};
pub use defaults::{
    CONFIG_SCHEMA, DEFAULT_LOG_FILTER, DEFAULT_PUBLISH_TEMPLATE, DEFAULT_WORK_TEMPLATE,
    PROJECT_FILE_NAME, PROJECT_SCHEMA, default_log_filter, default_log_filter_string,
    default_log_format, default_project_config,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use project::{NamedEntry, ProjectConfig, ProjectDocument, Templates};

/// Environment variable holding a search-path list of plugin directories.
///
/// The value uses the platform path separator, so it is split with
/// [`split_path_list`] rather than deserialised as a settings field.
pub const PLUGIN_PATH_ENV: &str = "AVALON_PLUGIN_PATH";

/// Errors raised while loading project documents and definitions.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration file could not be read.
    #[error("failed to read configuration file '{path}': {source}")]
    Read {
        /// File that was read.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },
    /// A configuration document was not valid TOML for its schema.
    #[error("failed to parse configuration from '{origin}': {source}")]
    Parse {
        /// File path or description of the parsed text.
        origin: String,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
    /// No project document exists at the given location.
    #[error("unable to load project: configuration file is missing at '{path}'")]
    MissingProject {
        /// Expected project file path.
        path: Utf8PathBuf,
    },
    /// An application definition is unusable.
    #[error("invalid application definition '{name}': {message}")]
    InvalidApplication {
        /// Application name as declared.
        name: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Runtime settings shared by the pipeline tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "AVALON")]
pub struct Config {
    #[serde(default = "default_log_filter_string")]
    #[ortho_config(default = default_log_filter_string())]
    log_filter: String,
    #[serde(default = "default_log_format")]
    #[ortho_config(default = default_log_format())]
    log_format: LogFormat,
    #[serde(default)]
    #[ortho_config(merge_strategy = "append")]
    plugin_paths: Vec<Utf8PathBuf>,
    #[serde(default)]
    root: Option<Utf8PathBuf>,
    #[serde(default)]
    project_config: Option<Utf8PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            plugin_paths: Vec::new(),
            root: None,
            project_config: None,
        }
    }
}

impl Config {
    /// Returns the configured log filter expression.
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Returns the configured log format.
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Returns the plugin search paths in registration order.
    pub fn plugin_paths(&self) -> &[Utf8PathBuf] {
        &self.plugin_paths
    }

    /// Appends a plugin search path unless it is already present.
    pub fn push_plugin_path(&mut self, path: impl Into<Utf8PathBuf>) {
        let path = path.into();
        if !self.plugin_paths.contains(&path) {
            self.plugin_paths.push(path);
        }
    }

    /// Returns the project root, if configured.
    pub fn root(&self) -> Option<&Utf8Path> {
        self.root.as_deref()
    }

    /// Returns the project configuration file, if configured.
    pub fn project_config_path(&self) -> Option<&Utf8Path> {
        self.project_config.as_deref()
    }

    /// Loads the project configuration named by the settings.
    ///
    /// Falls back to [`ProjectConfig::default`] when no file is configured.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the configured file is unusable.
    pub fn project(&self) -> Result<ProjectConfig, ConfigError> {
        match &self.project_config {
            Some(path) => ProjectConfig::load(path),
            None => Ok(ProjectConfig::default()),
        }
    }
}

/// Splits a search-path list such as the value of [`PLUGIN_PATH_ENV`].
///
/// Empty entries and entries that are not valid UTF-8 are skipped.
pub fn split_path_list(value: &str) -> impl Iterator<Item = Utf8PathBuf> + '_ {
    std::env::split_paths(OsStr::new(value))
        .filter(|path| !path.as_os_str().is_empty())
        .filter_map(|path: PathBuf| Utf8PathBuf::from_path_buf(path).ok())
}
