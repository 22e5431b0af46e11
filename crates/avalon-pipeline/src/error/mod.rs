//! Domain errors raised by pipeline operations.
//!
//! All errors use `thiserror`-derived enums with structured context so callers
//! can inspect the failure programmatically. I/O errors are wrapped in `Arc`
//! to satisfy the `result_large_err` Clippy lint.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::plugin::Capability;

/// Errors arising from pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A host adapter, plugin or project configuration is unusable.
    #[error("configuration error: {message}")]
    Configuration {
        /// Human-readable description naming the offending value.
        message: String,
    },

    /// A `{variable}` placeholder had no value in the formatting context.
    #[error(
        "variable '{key}' referenced by a template was not found in this session \
         (available: {})",
        available_keys(.context)
    )]
    MissingVariable {
        /// Name of the unresolved placeholder.
        key: String,
        /// The complete mapping the template was formatted against.
        context: BTreeMap<String, String>,
    },

    /// A template contained an unbalanced brace or an invalid format spec.
    #[error("malformed template '{template}': {message}")]
    TemplateSyntax {
        /// The template text.
        template: String,
        /// Description of the problem.
        message: String,
    },

    /// The application executable could not be located.
    #[error("'{executable}' not found on your PATH\n{search_path}")]
    ExecutableNotFound {
        /// Executable name as declared by the application.
        executable: String,
        /// The `PATH` value that was searched.
        search_path: String,
    },

    /// A plugin manifest or module could not be loaded during discovery.
    #[error("failed to discover plugins from '{}': {message}", .source_path.display())]
    PluginDiscovery {
        /// Manifest file or plugin path that failed.
        source_path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// No compatible plugin with the requested name is registered.
    #[error("no compatible {capability} plugin named '{name}'")]
    NotFound {
        /// Capability that was searched.
        capability: Capability,
        /// Plugin or family name that was looked up.
        name: String,
    },

    /// The registered host does not implement an operation.
    #[error("host '{host}' does not support '{operation}'")]
    Unsupported {
        /// Host name.
        host: String,
        /// Operation that was requested.
        operation: String,
    },

    /// A filesystem operation failed.
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        /// Path the operation targeted.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The application process could not be spawned.
    #[error("failed to launch '{}': {source}", .executable.display())]
    Spawn {
        /// Resolved executable path.
        executable: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// A plugin reported a failure of its own.
    #[error("plugin '{name}' failed: {message}")]
    Plugin {
        /// Plugin name.
        name: String,
        /// Plugin-supplied description.
        message: String,
    },
}

impl PipelineError {
    /// Creates a [`PipelineError::Configuration`] error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a [`PipelineError::Plugin`] error.
    pub fn plugin(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Plugin {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Wraps an I/O error with the path it concerned.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }
}

fn available_keys(context: &BTreeMap<String, String>) -> String {
    if context.is_empty() {
        return String::from("none");
    }
    context.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests;
