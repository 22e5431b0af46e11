//! Containers and representations.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PipelineError;
use crate::launcher::normalize_path;
use crate::plugin::Loader;
use crate::template::format_str;

/// Schema tag written into every container.
pub const CONTAINER_SCHEMA: &str = "avalon-core:container-2.0";

/// Identifier tag written into every container.
pub const CONTAINER_ID: &str = "pyblish.avalon.container";

/// A representation loaded into a host document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    /// Schema of the container record.
    pub schema: String,
    /// Identifier marking the record as a container.
    pub id: String,
    /// Name given to the loaded content.
    pub name: String,
    /// Namespace the content was loaded into.
    pub namespace: String,
    /// Name of the loader that produced the container.
    pub loader: String,
    /// Identifier of the loaded representation.
    pub representation: String,
    /// Host or loader specific data.
    #[serde(default, flatten)]
    pub data: BTreeMap<String, Value>,
}

impl Container {
    /// Creates a container record with the standard schema and id.
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        loader: impl Into<String>,
        representation: impl Into<String>,
    ) -> Self {
        Self {
            schema: CONTAINER_SCHEMA.to_owned(),
            id: CONTAINER_ID.to_owned(),
            name: name.into(),
            namespace: namespace.into(),
            loader: loader.into(),
            representation: representation.into(),
            data: BTreeMap::new(),
        }
    }

    /// Adds one entry of extra data.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// A published file format of a subset version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Representation {
    /// Unique identifier.
    pub id: String,
    /// Format name, e.g. `ma` or `abc`.
    pub name: String,
    /// Families of the version the representation belongs to.
    #[serde(default)]
    pub families: Vec<String>,
    /// Template variables locating the representation: `root`, `project`,
    /// `silo`, `asset`, `subset`, `version`.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl Representation {
    /// Creates a representation without families or context.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            families: Vec::new(),
            context: BTreeMap::new(),
        }
    }

    /// Sets the families of the owning version.
    #[must_use]
    pub fn with_families<I, S>(mut self, families: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.families = families.into_iter().map(Into::into).collect();
        self
    }

    /// Adds one context variable.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Returns the loaders able to load `representation`.
///
/// A loader qualifies when one of its families is among the
/// representation's families and its representations list the
/// representation name or `"*"`.
#[must_use]
pub fn loaders_from_representation(
    loaders: &[Arc<dyn Loader>],
    representation: &Representation,
) -> Vec<Arc<dyn Loader>> {
    loaders
        .iter()
        .filter(|loader| {
            loader
                .families()
                .iter()
                .any(|family| representation.families.contains(family))
        })
        .filter(|loader| {
            loader
                .representations()
                .iter()
                .any(|name| name == "*" || *name == representation.name)
        })
        .cloned()
        .collect()
}

/// Resolves the on-disk location of `representation` from a publish template.
///
/// The representation context provides the variables; `representation`
/// defaults to the representation name.
///
/// # Errors
///
/// Returns [`PipelineError::MissingVariable`] when the context lacks a
/// variable the template uses, or [`PipelineError::TemplateSyntax`].
pub fn representation_path(
    template: &str,
    representation: &Representation,
) -> Result<PathBuf, PipelineError> {
    let mut vars = representation.context.clone();
    vars.entry(String::from("representation"))
        .or_insert_with(|| representation.name.clone());
    let path = format_str(template, &vars)?;
    Ok(normalize_path(&path))
}
