//! Project configuration and project documents.
//!
//! A [`ProjectConfig`] carries the path templates and the application and
//! task catalogue of a project. It is normally stored inside the project
//! document, a `.project.toml` file at the project root, which is read here
//! but never written: creating projects belongs to the storage layer.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::ConfigError;
use crate::defaults::{
    CONFIG_SCHEMA, DEFAULT_PUBLISH_TEMPLATE, DEFAULT_WORK_TEMPLATE, PROJECT_FILE_NAME,
    PROJECT_SCHEMA, default_project_config,
};

/// A named catalogue entry such as an application or a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedEntry {
    /// Unique name of the entry.
    pub name: String,
    /// Optional human-readable label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl NamedEntry {
    /// Creates an entry without a label.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
        }
    }

    /// Creates an entry with a label.
    pub fn labelled(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: Some(label.into()),
        }
    }

    /// Returns the label, falling back to the name.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// Path templates of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Templates {
    /// Work directory template, e.g. `{root}/{project}/{silo}/{asset}/work/{task}`.
    #[serde(default = "default_work_template")]
    pub work: String,
    /// Publish location template.
    #[serde(default = "default_publish_template")]
    pub publish: String,
}

fn default_work_template() -> String {
    DEFAULT_WORK_TEMPLATE.to_owned()
}

fn default_publish_template() -> String {
    DEFAULT_PUBLISH_TEMPLATE.to_owned()
}

fn default_config_schema() -> String {
    CONFIG_SCHEMA.to_owned()
}

impl Default for Templates {
    fn default() -> Self {
        Self {
            work: default_work_template(),
            publish: default_publish_template(),
        }
    }
}

/// Read-only project configuration consumed by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Schema identifier of the document.
    #[serde(default = "default_config_schema")]
    pub schema: String,
    /// Applications available to the project.
    #[serde(default)]
    pub apps: Vec<NamedEntry>,
    /// Tasks available to the project.
    #[serde(default)]
    pub tasks: Vec<NamedEntry>,
    /// Path templates.
    #[serde(default)]
    pub template: Templates,
    /// Families published in the project.
    #[serde(default)]
    pub families: Vec<NamedEntry>,
    /// Groups used to organise subsets.
    #[serde(default)]
    pub groups: Vec<NamedEntry>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        default_project_config()
    }
}

impl ProjectConfig {
    /// Parses a project configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the text is not a valid
    /// configuration document.
    pub fn from_toml_str(origin: &str, text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            origin: origin.to_owned(),
            source,
        })
    }

    /// Reads a project configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let text = read_file(path)?;
        Self::from_toml_str(path.as_str(), &text)
    }

    /// Returns the work directory template.
    pub fn work_template(&self) -> &str {
        &self.template.work
    }

    /// Returns `true` when the project lists an application with `name`.
    pub fn has_app(&self, name: &str) -> bool {
        self.apps.iter().any(|app| app.name == name)
    }

    /// Returns `true` when the project lists a task with `name`.
    pub fn has_task(&self, name: &str) -> bool {
        self.tasks.iter().any(|task| task.name == name)
    }
}

/// A project document as stored in `.project.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDocument {
    /// Schema identifier of the document.
    #[serde(default = "default_project_schema")]
    pub schema: String,
    /// Document type, always `project`.
    #[serde(rename = "type", default = "default_project_type")]
    pub kind: String,
    /// Unique project name, also used as folder name.
    pub name: String,
    /// Human-readable project name.
    #[serde(default)]
    pub label: Option<String>,
    /// Free-form project data.
    #[serde(default)]
    pub data: BTreeMap<String, toml::Value>,
    /// Project configuration.
    #[serde(default)]
    pub config: ProjectConfig,
}

fn default_project_schema() -> String {
    PROJECT_SCHEMA.to_owned()
}

fn default_project_type() -> String {
    String::from("project")
}

impl ProjectDocument {
    /// Reads the project document stored at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingProject`] when `root` holds no project
    /// file, or a read/parse error when the file is unusable.
    pub fn load(root: &Utf8Path) -> Result<Self, ConfigError> {
        let path = Self::path_for(root);
        if !path.is_file() {
            return Err(ConfigError::MissingProject { path });
        }
        let text = read_file(&path)?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            origin: path.to_string(),
            source,
        })
    }

    /// Returns the location of the project document for `root`.
    pub fn path_for(root: &Utf8Path) -> Utf8PathBuf {
        root.join(PROJECT_FILE_NAME)
    }

    /// Returns the label, falling back to the name.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

pub(crate) fn read_file(path: &Utf8Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source: io::Error| ConfigError::Read {
        path: path.to_path_buf(),
        source: Arc::new(source),
    })
}
