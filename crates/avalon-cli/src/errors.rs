//! Error types for the CLI runtime.

use std::io;
use std::sync::Arc;

use avalon_config::ConfigError;
use avalon_pipeline::PipelineError;
use ortho_config::OrthoError;
use thiserror::Error;

use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<OrthoError>),
    #[error("failed to load project configuration: {0}")]
    Project(Arc<ConfigError>),
    #[error("failed to initialise telemetry: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("application '{name}' cannot run in this session; missing: {}", .missing.join(", "))]
    Incompatible { name: String, missing: Vec<String> },
    #[error("application '{name}' did not start a process")]
    NotLaunched { name: String },
    #[error("failed to serialise output: {0}")]
    Serialise(serde_json::Error),
    #[error("failed to write output: {0}")]
    Write(io::Error),
}

impl From<ConfigError> for AppError {
    fn from(error: ConfigError) -> Self {
        Self::Project(Arc::new(error))
    }
}
