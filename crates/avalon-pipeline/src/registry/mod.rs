//! Plugin registry and discovery.
//!
//! The [`PluginRegistry`] holds everything the pipeline has been told about:
//! explicitly registered plugin classes, plugin search paths, the catalogue
//! of [`PluginModule`]s, the host adapter, the project configuration and the
//! project root.
//!
//! Discovery walks the plugin paths in registration order. Each `*.toml`
//! file in a path is a plugin manifest, read in file-name order:
//!
//! ```toml
//! # Modules from the catalogue that register their plugin classes.
//! modules = ["studio.loaders"]
//!
//! # Applications offered as launch actions.
//! [[application]]
//! name = "maya2016"
//! executable = "maya"
//! ```
//!
//! A manifest that cannot be read or parsed, an unknown module and a module
//! that fails to register are logged and skipped; discovery itself never
//! fails.
//!
//! Plugin paths are walked once per canonical directory, so `/a`, `/a/` and
//! a symlink to `/a` contribute their manifests once. Applications declared
//! in a manifest are cached per canonical manifest path and name: repeated
//! discoveries return the same [`Arc`] until the definition changes on disk.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use avalon_config::{ApplicationDefinition, ProjectConfig};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::application::Application;
use crate::error::PipelineError;
use crate::host::{HostAdapter, missing_capabilities};
use crate::plugin::{Capability, PluginClass};

/// Tracing target for registry operations.
const REGISTRY_TARGET: &str = "avalon_pipeline::registry";

/// Extension of plugin manifest files.
const MANIFEST_EXTENSION: &str = "toml";

/// A statically linked bundle of plugin classes.
///
/// Plugin manifests name modules; discovery asks each named module to
/// register its classes.
pub trait PluginModule: Send + Sync {
    /// Name manifests use to refer to the module.
    fn name(&self) -> &str;

    /// Appends the module's plugin classes to `plugins`.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineError`] when the module cannot provide its
    /// classes; discovery logs it and skips the module.
    fn register(&self, plugins: &mut Vec<PluginClass>) -> Result<(), PipelineError>;
}

/// A [`PluginModule`] backed by a fixed list of classes.
#[derive(Debug, Clone)]
pub struct StaticModule {
    name: String,
    plugins: Vec<PluginClass>,
}

impl StaticModule {
    /// Creates a module registering `plugins`.
    pub fn new(name: impl Into<String>, plugins: Vec<PluginClass>) -> Self {
        Self {
            name: name.into(),
            plugins,
        }
    }
}

impl PluginModule for StaticModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn register(&self, plugins: &mut Vec<PluginClass>) -> Result<(), PipelineError> {
        plugins.extend(self.plugins.iter().cloned());
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct PluginManifest {
    #[serde(default)]
    modules: Vec<String>,
    #[serde(default, rename = "application")]
    applications: Vec<ApplicationDefinition>,
}

/// Plugins found by [`PluginRegistry::discover_with_report`] together with
/// the sources that were skipped.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    plugins: Vec<PluginClass>,
    failures: Vec<PipelineError>,
}

impl DiscoveryReport {
    /// Returns the discovered plugins, sorted by order and name.
    #[must_use]
    pub fn plugins(&self) -> &[PluginClass] {
        &self.plugins
    }

    /// Returns the failures that were logged and skipped.
    #[must_use]
    pub fn failures(&self) -> &[PipelineError] {
        &self.failures
    }

    /// Consumes the report, returning the plugins.
    #[must_use]
    pub fn into_plugins(self) -> Vec<PluginClass> {
        self.plugins
    }
}

/// Applications built from manifests, keyed by canonical manifest path and
/// application name.
type ApplicationCache = BTreeMap<(PathBuf, String), Arc<Application>>;

/// Registered plugins, plugin paths, modules, host, config and root.
#[derive(Default)]
pub struct PluginRegistry {
    plugin_paths: Vec<PathBuf>,
    plugins: Vec<PluginClass>,
    modules: BTreeMap<String, Arc<dyn PluginModule>>,
    host: Option<Arc<dyn HostAdapter>>,
    config: Option<ProjectConfig>,
    root: Option<PathBuf>,
    applications: Mutex<ApplicationCache>,
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugin_paths", &self.plugin_paths)
            .field("plugins", &self.plugins)
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .field("host", &self.host.as_ref().map(|host| host.name()))
            .field("config", &self.config.is_some())
            .field("root", &self.root)
            .finish()
    }
}

impl PluginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Plugin classes
    // -----------------------------------------------------------------------

    /// Registers a plugin class. Returns `false` if it was already registered.
    pub fn register_plugin(&mut self, plugin: impl Into<PluginClass>) -> bool {
        let class = plugin.into();
        if self.plugins.iter().any(|existing| existing.ptr_eq(&class)) {
            return false;
        }
        debug!(
            target: REGISTRY_TARGET,
            plugin = class.name(),
            capability = %class.capability(),
            "registered plugin"
        );
        self.plugins.push(class);
        true
    }

    /// Removes a plugin class. Returns `false` if it was not registered.
    pub fn deregister_plugin(&mut self, plugin: &PluginClass) -> bool {
        let before = self.plugins.len();
        self.plugins.retain(|existing| !existing.ptr_eq(plugin));
        self.plugins.len() != before
    }

    /// Returns the explicitly registered plugin classes.
    #[must_use]
    pub fn registered_plugins(&self) -> &[PluginClass] {
        &self.plugins
    }

    // -----------------------------------------------------------------------
    // Plugin paths
    // -----------------------------------------------------------------------

    /// Adds a plugin search path. Returns `false` if it was already present.
    pub fn register_plugin_path(&mut self, path: impl Into<PathBuf>) -> bool {
        let path_buf = path.into();
        if self.plugin_paths.contains(&path_buf) {
            return false;
        }
        debug!(
            target: REGISTRY_TARGET,
            path = %path_buf.display(),
            "registered plugin path"
        );
        self.plugin_paths.push(path_buf);
        true
    }

    /// Removes a plugin search path. Returns `false` if it was not present.
    pub fn deregister_plugin_path(&mut self, path: &Path) -> bool {
        let before = self.plugin_paths.len();
        self.plugin_paths.retain(|existing| existing != path);
        self.plugin_paths.len() != before
    }

    /// Returns the plugin search paths in registration order.
    #[must_use]
    pub fn plugin_paths(&self) -> &[PathBuf] {
        &self.plugin_paths
    }

    // -----------------------------------------------------------------------
    // Modules
    // -----------------------------------------------------------------------

    /// Adds a module to the catalogue, replacing one with the same name.
    pub fn register_module(&mut self, module: Arc<dyn PluginModule>) {
        let name = module.name().to_owned();
        debug!(target: REGISTRY_TARGET, module = name.as_str(), "registered plugin module");
        self.modules.insert(name, module);
    }

    /// Removes a module from the catalogue. Returns `false` if it was absent.
    pub fn deregister_module(&mut self, name: &str) -> bool {
        self.modules.remove(name).is_some()
    }

    /// Returns the names of the catalogued modules in sorted order.
    #[must_use]
    pub fn module_names(&self) -> Vec<&str> {
        self.modules.keys().map(String::as_str).collect()
    }

    // -----------------------------------------------------------------------
    // Host, config and root
    // -----------------------------------------------------------------------

    /// Registers the host adapter, replacing any previous host.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Configuration`] naming the required
    /// capabilities the host does not declare.
    pub fn register_host(&mut self, host: Arc<dyn HostAdapter>) -> Result<(), PipelineError> {
        let missing = missing_capabilities(host.as_ref());
        if !missing.is_empty() {
            let names: Vec<String> = missing.iter().map(ToString::to_string).collect();
            return Err(PipelineError::configuration(format!(
                "host '{}' does not implement: {}",
                host.name(),
                names.join(", ")
            )));
        }
        debug!(target: REGISTRY_TARGET, host = host.name(), "registered host");
        self.host = Some(host);
        Ok(())
    }

    /// Returns the registered host.
    #[must_use]
    pub fn registered_host(&self) -> Option<&Arc<dyn HostAdapter>> {
        self.host.as_ref()
    }

    /// Removes the registered host, returning it.
    pub fn deregister_host(&mut self) -> Option<Arc<dyn HostAdapter>> {
        self.host.take()
    }

    /// Registers the project configuration.
    pub fn register_config(&mut self, config: ProjectConfig) {
        self.config = Some(config);
    }

    /// Returns the registered project configuration.
    #[must_use]
    pub const fn registered_config(&self) -> Option<&ProjectConfig> {
        self.config.as_ref()
    }

    /// Registers the root directory holding the projects.
    pub fn register_root(&mut self, root: impl Into<PathBuf>) {
        self.root = Some(root.into());
    }

    /// Returns the registered project root.
    #[must_use]
    pub fn registered_root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Resets the registry to its empty state.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    // -----------------------------------------------------------------------
    // Discovery
    // -----------------------------------------------------------------------

    /// Returns every plugin satisfying `capability`.
    ///
    /// Plugins from the plugin paths are merged with the registered classes,
    /// de-duplicated by identity and sorted by order, then name.
    #[must_use]
    pub fn discover(&self, capability: Capability) -> Vec<PluginClass> {
        self.discover_with_report(capability).into_plugins()
    }

    /// Like [`PluginRegistry::discover`], also returning skipped failures.
    #[must_use]
    pub fn discover_with_report(&self, capability: Capability) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();
        let mut candidates = Vec::new();
        let mut walked: Vec<PathBuf> = Vec::new();

        for path in &self.plugin_paths {
            let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.clone());
            if walked.contains(&canonical) {
                continue;
            }
            self.discover_path(&canonical, &mut candidates, &mut report.failures);
            walked.push(canonical);
        }
        candidates.extend(self.plugins.iter().cloned());

        for class in candidates {
            if class.satisfies(capability)
                && !report.plugins.iter().any(|known| known.ptr_eq(&class))
            {
                report.plugins.push(class);
            }
        }
        report
            .plugins
            .sort_by(|left, right| {
                left.order()
                    .cmp(&right.order())
                    .then_with(|| left.name().cmp(right.name()))
            });

        debug!(
            target: REGISTRY_TARGET,
            capability = %capability,
            found = report.plugins.len(),
            skipped = report.failures.len(),
            "discovered plugins"
        );
        report
    }

    fn discover_path(
        &self,
        path: &Path,
        candidates: &mut Vec<PluginClass>,
        failures: &mut Vec<PipelineError>,
    ) {
        if !path.is_dir() {
            debug!(
                target: REGISTRY_TARGET,
                path = %path.display(),
                "plugin path is not a directory; skipped"
            );
            return;
        }

        let manifests = match manifest_files(path) {
            Ok(manifests) => manifests,
            Err(message) => {
                record_failure(failures, path, message);
                return;
            }
        };

        for manifest_path in manifests {
            match read_manifest(&manifest_path) {
                Ok(manifest) => {
                    self.load_manifest(&manifest_path, manifest, candidates, failures);
                }
                Err(message) => record_failure(failures, &manifest_path, message),
            }
        }
    }

    fn load_manifest(
        &self,
        manifest_path: &Path,
        manifest: PluginManifest,
        candidates: &mut Vec<PluginClass>,
        failures: &mut Vec<PipelineError>,
    ) {
        for module_name in &manifest.modules {
            let Some(module) = self.modules.get(module_name) else {
                record_failure(
                    failures,
                    manifest_path,
                    format!("unknown plugin module '{module_name}'"),
                );
                continue;
            };
            let mut registered = Vec::new();
            match module.register(&mut registered) {
                Ok(()) => candidates.append(&mut registered),
                Err(err) => record_failure(
                    failures,
                    manifest_path,
                    format!("module '{module_name}' failed to register: {err}"),
                ),
            }
        }

        for definition in manifest.applications {
            match definition.validate() {
                Ok(()) => candidates.push(PluginClass::Application(
                    self.cached_application(manifest_path, definition),
                )),
                Err(err) => record_failure(failures, manifest_path, err.to_string()),
            }
        }
    }

    /// Returns the cached application for `definition`, replacing the entry
    /// when the manifest now declares something different.
    fn cached_application(
        &self,
        manifest_path: &Path,
        definition: ApplicationDefinition,
    ) -> Arc<Application> {
        let key = (manifest_path.to_path_buf(), definition.name().to_owned());
        let mut cache = self.application_cache();
        if let Some(cached) = cache.get(&key)
            && cached.definition() == &definition
        {
            return Arc::clone(cached);
        }
        let application = Arc::new(Application::new(definition));
        cache.insert(key, Arc::clone(&application));
        application
    }

    fn application_cache(&self) -> MutexGuard<'_, ApplicationCache> {
        self.applications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn manifest_files(path: &Path) -> Result<Vec<PathBuf>, String> {
    let entries = fs::read_dir(path).map_err(|err| err.to_string())?;
    let mut manifests: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|candidate| {
            candidate.is_file()
                && candidate
                    .extension()
                    .is_some_and(|extension| extension == MANIFEST_EXTENSION)
        })
        .collect();
    manifests.sort_by(|left, right| left.file_name().cmp(&right.file_name()));
    Ok(manifests)
}

fn read_manifest(path: &Path) -> Result<PluginManifest, String> {
    let text = fs::read_to_string(path).map_err(|err| err.to_string())?;
    toml::from_str(&text).map_err(|err| err.to_string())
}

fn record_failure(failures: &mut Vec<PipelineError>, path: &Path, message: String) {
    let error = PipelineError::PluginDiscovery {
        source_path: path.to_path_buf(),
        message,
    };
    warn!(target: REGISTRY_TARGET, error = %error, "skipping plugin source");
    failures.push(error);
}
