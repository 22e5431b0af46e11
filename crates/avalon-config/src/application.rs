//! Application definitions.
//!
//! An [`ApplicationDefinition`] describes how to launch a creative
//! application for a task: which executable to look up on `PATH`, which
//! arguments to pass, which environment to layer over the session and which
//! directories and files to prepare in the work directory.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// A value in an environment template.
///
/// Strings may contain `{variable}` placeholders. Lists of strings are
/// treated as path lists when used as environment values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateValue {
    /// A single string, possibly containing placeholders.
    Text(String),
    /// An ordered sequence of values.
    List(Vec<TemplateValue>),
    /// A nested mapping of values.
    Map(BTreeMap<String, TemplateValue>),
}

impl TemplateValue {
    /// Returns the string payload when the value is [`TemplateValue::Text`].
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::List(_) | Self::Map(_) => None,
        }
    }
}

impl From<&str> for TemplateValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for TemplateValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<TemplateValue>> From<Vec<T>> for TemplateValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// Declarative description of a launchable application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDefinition {
    name: String,
    #[serde(default)]
    label: Option<String>,
    executable: String,
    #[serde(default)]
    application_dir: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    environment: BTreeMap<String, TemplateValue>,
    #[serde(default)]
    default_dirs: Vec<String>,
    #[serde(default)]
    copy: BTreeMap<String, String>,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    order: i32,
}

impl ApplicationDefinition {
    /// Creates a definition with no arguments, environment or side effects.
    pub fn new(name: impl Into<String>, executable: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            executable: executable.into(),
            application_dir: None,
            args: Vec::new(),
            environment: BTreeMap::new(),
            default_dirs: Vec::new(),
            copy: BTreeMap::new(),
            icon: None,
            order: 0,
        }
    }

    /// Sets the human-readable label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the application directory name exported as `AVALON_APP`.
    #[must_use]
    pub fn with_application_dir(mut self, dir: impl Into<String>) -> Self {
        self.application_dir = Some(dir.into());
        self
    }

    /// Sets the arguments passed to the executable.
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Adds one environment template entry.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<TemplateValue>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Sets the directories created inside a fresh work directory.
    #[must_use]
    pub fn with_default_dirs(mut self, dirs: Vec<String>) -> Self {
        self.default_dirs = dirs;
        self
    }

    /// Adds a file copied into the work directory before launch.
    #[must_use]
    pub fn with_copy(mut self, source: impl Into<String>, destination: impl Into<String>) -> Self {
        self.copy.insert(source.into(), destination.into());
        self
    }

    /// Sets the sort order used when listing applications.
    #[must_use]
    pub const fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Checks that the definition can be launched at all.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidApplication`] if the name or the
    /// executable is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidApplication {
                name: self.name.clone(),
                message: String::from("application name must not be empty"),
            });
        }
        if self.executable.trim().is_empty() {
            return Err(ConfigError::InvalidApplication {
                name: self.name.clone(),
                message: String::from("executable must not be empty"),
            });
        }
        Ok(())
    }

    /// Returns the application name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the label, falling back to the name.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Returns the executable looked up on `PATH`.
    pub fn executable(&self) -> &str {
        &self.executable
    }

    /// Returns the application directory, falling back to the name.
    pub fn application_dir(&self) -> &str {
        self.application_dir.as_deref().unwrap_or(&self.name)
    }

    /// Returns the launch arguments.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns the environment template.
    pub fn environment(&self) -> &BTreeMap<String, TemplateValue> {
        &self.environment
    }

    /// Returns the default work subdirectories.
    pub fn default_dirs(&self) -> &[String] {
        &self.default_dirs
    }

    /// Returns the copy manifest, source to work-relative destination.
    pub fn copy(&self) -> &BTreeMap<String, String> {
        &self.copy
    }

    /// Returns the optional icon name.
    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    /// Returns the sort order.
    pub const fn order(&self) -> i32 {
        self.order
    }
}
