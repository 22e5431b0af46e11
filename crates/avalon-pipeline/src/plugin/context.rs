//! Dispatch context handed to plugins.

use std::path::Path;

use avalon_config::ProjectConfig;
use serde_json::{Map, Value};

use crate::host::HostAdapter;
use crate::launcher::{Environment, ProcessHandle, ProcessLauncher};
use crate::plugin::Representation;
use crate::session::Session;

/// Identifier written into every created instance.
pub const INSTANCE_ID: &str = "pyblish.avalon.instance";

/// Toggles for the stages of an application launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOptions {
    /// Prepare the work directory before launching.
    pub initialize: bool,
    /// Spawn the application process.
    pub launch: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            initialize: true,
            launch: true,
        }
    }
}

/// Collaborators available to an action while it runs.
#[derive(Clone, Copy)]
pub struct ActionContext<'a> {
    config: Option<&'a ProjectConfig>,
    root: Option<&'a Path>,
    host: Option<&'a dyn HostAdapter>,
    launcher: &'a dyn ProcessLauncher,
    base_environment: &'a Environment,
    options: ProcessOptions,
}

impl<'a> ActionContext<'a> {
    /// Creates a context with a launcher and the base process environment.
    #[must_use]
    pub fn new(launcher: &'a dyn ProcessLauncher, base_environment: &'a Environment) -> Self {
        Self {
            config: None,
            root: None,
            host: None,
            launcher,
            base_environment,
            options: ProcessOptions::default(),
        }
    }

    /// Sets the registered project configuration.
    #[must_use]
    pub const fn with_config(mut self, config: Option<&'a ProjectConfig>) -> Self {
        self.config = config;
        self
    }

    /// Sets the registered project root.
    #[must_use]
    pub const fn with_root(mut self, root: Option<&'a Path>) -> Self {
        self.root = root;
        self
    }

    /// Sets the registered host.
    #[must_use]
    pub const fn with_host(mut self, host: Option<&'a dyn HostAdapter>) -> Self {
        self.host = host;
        self
    }

    /// Sets the launch toggles.
    #[must_use]
    pub const fn with_options(mut self, options: ProcessOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the registered project configuration.
    #[must_use]
    pub const fn config(&self) -> Option<&'a ProjectConfig> {
        self.config
    }

    /// Returns the registered project root.
    #[must_use]
    pub const fn root(&self) -> Option<&'a Path> {
        self.root
    }

    /// Returns the registered host.
    #[must_use]
    pub const fn host(&self) -> Option<&'a dyn HostAdapter> {
        self.host
    }

    /// Returns the process launcher.
    #[must_use]
    pub const fn launcher(&self) -> &'a dyn ProcessLauncher {
        self.launcher
    }

    /// Returns the environment inherited by launched processes.
    #[must_use]
    pub const fn base_environment(&self) -> &'a Environment {
        self.base_environment
    }

    /// Returns the launch toggles.
    #[must_use]
    pub const fn options(&self) -> ProcessOptions {
        self.options
    }
}

/// Result of running an action.
#[derive(Debug)]
pub enum ActionOutcome {
    /// The action finished and produced a value.
    Completed(Value),
    /// An application environment was prepared but not launched.
    Prepared(Environment),
    /// An application process was spawned.
    Launched(ProcessHandle),
}

/// Input of [`Creator::process`](crate::plugin::Creator::process).
#[derive(Debug, Clone, PartialEq)]
pub struct CreateRequest {
    name: String,
    asset: String,
    family: String,
    options: Value,
    data: Map<String, Value>,
}

impl CreateRequest {
    /// Creates a request whose instance data is seeded with the instance
    /// id, family, asset, subset name and `active = true`.
    pub fn new(name: impl Into<String>, asset: impl Into<String>, family: impl Into<String>) -> Self {
        let subset: String = name.into();
        let asset_name: String = asset.into();
        let family_name: String = family.into();
        let mut data = Map::new();
        data.insert(String::from("id"), Value::from(INSTANCE_ID));
        data.insert(String::from("family"), Value::from(family_name.as_str()));
        data.insert(String::from("asset"), Value::from(asset_name.as_str()));
        data.insert(String::from("subset"), Value::from(subset.as_str()));
        data.insert(String::from("active"), Value::Bool(true));
        Self {
            name: subset,
            asset: asset_name,
            family: family_name,
            options: Value::Null,
            data,
        }
    }

    /// Sets creator-specific options.
    #[must_use]
    pub fn with_options(mut self, options: Value) -> Self {
        self.options = options;
        self
    }

    /// Returns the subset name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the asset name.
    #[must_use]
    pub fn asset(&self) -> &str {
        &self.asset
    }

    /// Returns the family.
    #[must_use]
    pub fn family(&self) -> &str {
        &self.family
    }

    /// Returns the creator options.
    #[must_use]
    pub const fn options(&self) -> &Value {
        &self.options
    }

    /// Returns the seeded instance data.
    #[must_use]
    pub const fn data(&self) -> &Map<String, Value> {
        &self.data
    }
}

/// What a loader receives about the representation to load.
#[derive(Debug, Clone, Copy)]
pub struct LoadContext<'a> {
    /// Representation being loaded.
    pub representation: &'a Representation,
    /// Session at load time.
    pub session: &'a Session,
    /// Resolved file location, when a project config is registered.
    pub path: Option<&'a Path>,
}
