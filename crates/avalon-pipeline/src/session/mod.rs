//! Session state shared by every dispatch.
//!
//! A [`Session`] is an ordered mapping of context variables such as
//! `AVALON_PROJECT` or `AVALON_TASK`. Plugins receive it by shared reference;
//! only the [`Pipeline`](crate::Pipeline) mutates it.

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::{Deserialize, Serialize};

/// Well-known session keys.
pub mod keys {
    /// Root directory holding every project.
    pub const PROJECTS: &str = "AVALON_PROJECTS";
    /// Name of the active project.
    pub const PROJECT: &str = "AVALON_PROJECT";
    /// Name of the active asset.
    pub const ASSET: &str = "AVALON_ASSET";
    /// Silo of the active asset.
    pub const SILO: &str = "AVALON_SILO";
    /// Name of the active task.
    pub const TASK: &str = "AVALON_TASK";
    /// Application directory of the running application.
    pub const APP: &str = "AVALON_APP";
    /// Name of the running application.
    pub const APP_NAME: &str = "AVALON_APP_NAME";
    /// Resolved work directory.
    pub const WORKDIR: &str = "AVALON_WORKDIR";
    /// Hierarchy path between silo and asset.
    pub const HIERARCHY: &str = "AVALON_HIERARCHY";
    /// Name of the current user.
    pub const USER: &str = "AVALON_USER";
    /// Label shown by tools.
    pub const LABEL: &str = "AVALON_LABEL";
    /// Timeout used by tools, in milliseconds.
    pub const TIMEOUT: &str = "AVALON_TIMEOUT";
    /// Prefix shared by every session variable.
    pub const PREFIX: &str = "AVALON_";
}

/// Defaults applied by [`Session::from_environment`].
pub const SESSION_DEFAULTS: &[(&str, &str)] = &[(keys::LABEL, "Avalon"), (keys::TIMEOUT, "1000")];

/// Ordered context variables of the current project, asset and task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Session {
    values: BTreeMap<String, String>,
}

impl Session {
    /// Creates an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a session from an environment snapshot.
    ///
    /// Only `AVALON_*` variables are kept. [`SESSION_DEFAULTS`] fill in keys
    /// the environment does not provide.
    pub fn from_environment<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut session = Self::new();
        for (key, value) in vars {
            let name: String = key.into();
            if name.starts_with(keys::PREFIX) {
                session.values.insert(name, value.into());
            }
        }
        for (key, value) in SESSION_DEFAULTS {
            session
                .values
                .entry((*key).to_owned())
                .or_insert_with(|| (*value).to_owned());
        }
        session
    }

    /// Returns the value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns `true` when `key` is set.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Sets a single key, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.insert(key.into(), value.into())
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    /// Merges `changes` into the session; later values win.
    pub fn update<I, K, V>(&mut self, changes: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.values.extend(
            changes
                .into_iter()
                .map(|(key, value)| (key.into(), value.into())),
        );
    }

    /// Replaces the whole session with `values`.
    pub fn replace<I, K, V>(&mut self, values: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.values.clear();
        self.update(values);
    }

    /// Removes every key.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Returns the keys of `required` that are not set, in input order.
    #[must_use]
    pub fn missing<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|key| !self.values.contains_key(*key))
            .collect()
    }

    /// Returns the number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when the session holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over the keys and values in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.values.iter()
    }

    /// Returns the underlying mapping.
    #[must_use]
    pub const fn as_map(&self) -> &BTreeMap<String, String> {
        &self.values
    }
}

impl<'a> IntoIterator for &'a Session {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Session {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut session = Self::new();
        session.update(iter);
        session
    }
}
