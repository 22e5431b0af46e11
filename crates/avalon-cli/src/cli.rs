//! Command-line argument definitions for the `avalon` binary.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

/// Launches pipeline applications for the session in the environment.
#[derive(Parser, Debug)]
#[command(name = "avalon", version, disable_help_subcommand = true)]
pub(crate) struct Cli {
    /// Settings file to load instead of `AVALON_CONFIG_PATH`.
    #[arg(long, value_name = "PATH", global = true)]
    pub(crate) config_path: Option<Utf8PathBuf>,
    /// Tracing filter expression, for example `avalon_pipeline=debug`.
    #[arg(long, value_name = "FILTER", global = true)]
    pub(crate) log_filter: Option<String>,
    /// Log output format: `compact` or `json`.
    #[arg(long, value_name = "FORMAT", global = true)]
    pub(crate) log_format: Option<String>,
    /// Directory holding the projects.
    #[arg(long, value_name = "DIR", global = true)]
    pub(crate) root: Option<Utf8PathBuf>,
    /// Additional plugin search path; may be repeated.
    #[arg(long = "plugin-path", value_name = "DIR", global = true)]
    pub(crate) plugin_paths: Vec<Utf8PathBuf>,
    /// Project configuration file overriding the project document.
    #[arg(long, value_name = "PATH", global = true)]
    pub(crate) project_config: Option<Utf8PathBuf>,
    /// What to do.
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

/// Subcommands of the `avalon` binary.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub(crate) enum CliCommand {
    /// Lists the applications available to the session.
    Apps {
        /// Also list applications the session cannot launch.
        #[arg(long)]
        all: bool,
    },
    /// Prints the environment an application would be launched with.
    Environ {
        /// Application name.
        #[arg(value_name = "APP")]
        app: String,
    },
    /// Prepares the work directory and launches an application.
    Launch {
        /// Application name.
        #[arg(value_name = "APP")]
        app: String,
        /// Skip work directory preparation.
        #[arg(long)]
        no_initialize: bool,
        /// Wait for the application and exit with its status.
        #[arg(long)]
        wait: bool,
    },
    /// Prints the session read from the environment.
    Session,
}
