//! The pipeline runtime.
//!
//! [`Pipeline`] owns the registry, the event bus, the session and the
//! process launcher, and dispatches plugins against them. Every dispatch
//! operation emits `before_<step>` before it runs and `after_<step>` once it
//! has succeeded.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, info};

use crate::application::work_directory;
use crate::error::PipelineError;
use crate::events::EventBus;
use crate::host::{HostAdapter, HostCapability};
use crate::launcher::{Environment, ProcessLauncher, SystemLauncher, process_environment};
use crate::plugin::{
    ActionContext, ActionOutcome, Capability, Container, CreateRequest, LoadContext, PluginClass,
    ProcessOptions, Representation, loaders_from_representation, representation_path,
};
use crate::registry::PluginRegistry;
use crate::session::{Session, keys};

/// Tracing target for pipeline dispatch.
const PIPELINE_TARGET: &str = "avalon_pipeline::pipeline";

/// Lifecycle events emitted by [`Pipeline`].
pub mod lifecycle {
    /// Emitted once a host is installed. Arguments: host name.
    pub const INIT: &str = "init";
    /// Emitted before the pipeline is uninstalled.
    pub const UNINSTALL: &str = "uninstall";
    /// Emitted after the current task changed. Arguments: the changes.
    pub const TASK_CHANGED: &str = "taskChanged";

    /// Step name of [`Pipeline::run_action`](crate::Pipeline::run_action).
    pub const RUN_ACTION: &str = "run_action";
    /// Step name of [`Pipeline::run_inventory_action`](crate::Pipeline::run_inventory_action).
    pub const RUN_INVENTORY_ACTION: &str = "run_inventory_action";
    /// Step name of [`Pipeline::create`](crate::Pipeline::create).
    pub const CREATE: &str = "create";
    /// Step name of [`Pipeline::load`](crate::Pipeline::load).
    pub const LOAD: &str = "load";
    /// Step name of [`Pipeline::update`](crate::Pipeline::update).
    pub const UPDATE: &str = "update";
    /// Step name of [`Pipeline::remove`](crate::Pipeline::remove).
    pub const REMOVE: &str = "remove";
    /// Step name of [`Pipeline::update_current_task`](crate::Pipeline::update_current_task).
    pub const UPDATE_CURRENT_TASK: &str = "update_current_task";
}

/// Owning context of a pipeline integration.
pub struct Pipeline {
    registry: PluginRegistry,
    events: Arc<EventBus>,
    session: Session,
    launcher: Arc<dyn ProcessLauncher>,
    base_environment: Environment,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("registry", &self.registry)
            .field("events", &self.events)
            .field("session", &self.session)
            .field("base_environment", &self.base_environment.len())
            .finish_non_exhaustive()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(Session::new())
    }
}

impl Pipeline {
    /// Creates a pipeline for `session` that spawns real processes with the
    /// environment of the current process as base.
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            registry: PluginRegistry::new(),
            events: Arc::new(EventBus::new()),
            session,
            launcher: Arc::new(SystemLauncher),
            base_environment: process_environment(),
        }
    }

    /// Replaces the process launcher.
    #[must_use]
    pub fn with_launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Replaces the base environment applications inherit.
    #[must_use]
    pub fn with_base_environment(mut self, environment: Environment) -> Self {
        self.base_environment = environment;
        self
    }

    /// Returns the registry.
    #[must_use]
    pub const fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Returns the registry for registration.
    pub const fn registry_mut(&mut self) -> &mut PluginRegistry {
        &mut self.registry
    }

    /// Returns the event bus.
    #[must_use]
    pub const fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Returns the session.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the session for modification.
    pub const fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Returns the base environment applications inherit.
    #[must_use]
    pub const fn base_environment(&self) -> &Environment {
        &self.base_environment
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Installs `host` and emits [`lifecycle::INIT`].
    ///
    /// # Errors
    ///
    /// Returns the registration error when the host lacks a required
    /// capability, or the error of the host's install hook. The host is not
    /// left registered in either case.
    pub fn install(&mut self, host: Arc<dyn HostAdapter>) -> Result<(), PipelineError> {
        self.registry.register_host(Arc::clone(&host))?;
        if let Err(err) = host.install() {
            self.registry.deregister_host();
            return Err(err);
        }
        info!(target: PIPELINE_TARGET, host = host.name(), "installed host");
        self.events.emit(lifecycle::INIT, &[json!(host.name())]);
        Ok(())
    }

    /// Emits [`lifecycle::UNINSTALL`], runs the host's uninstall hook and
    /// clears the registry.
    ///
    /// # Errors
    ///
    /// Returns the error of the host's uninstall hook. The registry is
    /// cleared regardless.
    pub fn uninstall(&mut self) -> Result<(), PipelineError> {
        self.events.emit(lifecycle::UNINSTALL, &[]);
        let result = self
            .registry
            .registered_host()
            .map_or(Ok(()), |host| host.uninstall());
        self.registry.clear();
        info!(target: PIPELINE_TARGET, "uninstalled pipeline");
        result
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Returns the plugins satisfying `capability` that accept the session.
    #[must_use]
    pub fn compatible(&self, capability: Capability) -> Vec<PluginClass> {
        self.registry
            .discover(capability)
            .into_iter()
            .filter(|class| {
                let accepted = class.is_compatible(&self.session);
                if !accepted {
                    debug!(
                        target: PIPELINE_TARGET,
                        plugin = class.name(),
                        capability = %capability,
                        "skipping incompatible plugin"
                    );
                }
                accepted
            })
            .collect()
    }

    /// Builds the context handed to actions.
    #[must_use]
    pub fn action_context(&self, options: ProcessOptions) -> ActionContext<'_> {
        ActionContext::new(self.launcher.as_ref(), &self.base_environment)
            .with_config(self.registry.registered_config())
            .with_root(self.registry.registered_root())
            .with_host(self.registry.registered_host().map(|host| host.as_ref()))
            .with_options(options)
    }

    /// Runs the compatible action (or application) called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NotFound`] when no compatible action has that
    /// name, or the action's own error.
    pub fn run_action(
        &self,
        name: &str,
        options: ProcessOptions,
    ) -> Result<ActionOutcome, PipelineError> {
        let action = self
            .find(Capability::Action, name)?
            .as_action()
            .ok_or_else(|| not_found(Capability::Action, name))?;

        self.events.emit_before(lifecycle::RUN_ACTION, &[json!(name)]);
        let context = self.action_context(options);
        let outcome = action.process(&self.session, &context)?;
        info!(target: PIPELINE_TARGET, action = name, "ran action");
        self.events.emit_after(lifecycle::RUN_ACTION, &[json!(name)]);
        Ok(outcome)
    }

    /// Runs the inventory action called `name` on the containers it accepts.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NotFound`] when no compatible inventory
    /// action has that name, or the action's own error.
    pub fn run_inventory_action(
        &self,
        name: &str,
        items: &[Container],
        options: ProcessOptions,
    ) -> Result<ActionOutcome, PipelineError> {
        let action = self
            .find(Capability::InventoryAction, name)?
            .as_inventory_action()
            .ok_or_else(|| not_found(Capability::InventoryAction, name))?;
        let accepted: Vec<Container> = items
            .iter()
            .filter(|item| action.accepts(item))
            .cloned()
            .collect();

        self.events
            .emit_before(lifecycle::RUN_INVENTORY_ACTION, &[json!(name), json!(accepted.len())]);
        let context = self.action_context(options);
        let outcome = action.process(&self.session, &accepted, &context)?;
        self.events
            .emit_after(lifecycle::RUN_INVENTORY_ACTION, &[json!(name), json!(accepted.len())]);
        Ok(outcome)
    }

    /// Creates an instance called `name` of `family` for `asset`.
    ///
    /// Compatible creators of `family` run in discovery order until one
    /// returns a non-null instance.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NotFound`] naming the family when no
    /// compatible creator produced an instance, or a creator's own error.
    pub fn create(
        &self,
        name: &str,
        asset: &str,
        family: &str,
        options: Value,
    ) -> Result<Value, PipelineError> {
        let request = CreateRequest::new(name, asset, family).with_options(options);
        self.events
            .emit_before(lifecycle::CREATE, &[json!(name), json!(asset), json!(family)]);

        for creator in self
            .compatible(Capability::Creator)
            .iter()
            .filter_map(PluginClass::as_creator)
            .filter(|creator| creator.family() == family)
        {
            let instance = creator.process(&request)?;
            if instance.is_null() {
                continue;
            }
            info!(
                target: PIPELINE_TARGET,
                creator = creator.name(),
                subset = name,
                family,
                "created instance"
            );
            self.events.emit_after(lifecycle::CREATE, &[instance.clone()]);
            return Ok(instance);
        }

        Err(not_found(Capability::Creator, family))
    }

    /// Loads `representation` with the loader called `loader`.
    ///
    /// `name` defaults to the representation's `subset` context entry, else
    /// its name. `namespace` defaults to the asset (from the representation
    /// context, else the session) followed by `_`. When a project config is
    /// registered the loader also receives the path resolved from its
    /// publish template. The new container is handed to the host.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NotFound`] for an unknown loader,
    /// [`PipelineError::Configuration`] when the loader does not handle the
    /// representation, a template error for the publish path, or the error
    /// of the loader or host.
    pub fn load(
        &self,
        loader: &str,
        representation: &Representation,
        namespace: Option<&str>,
        name: Option<&str>,
    ) -> Result<Container, PipelineError> {
        let plugin = self
            .find(Capability::Loader, loader)?
            .as_loader()
            .ok_or_else(|| not_found(Capability::Loader, loader))?;
        if loaders_from_representation(std::slice::from_ref(&plugin), representation).is_empty() {
            return Err(PipelineError::configuration(format!(
                "loader '{loader}' cannot load representation '{}'",
                representation.name
            )));
        }

        let container_name = name.map_or_else(|| default_name(representation), str::to_owned);
        let container_namespace = namespace.map_or_else(
            || default_namespace(representation, &self.session),
            str::to_owned,
        );
        let path = self
            .registry
            .registered_config()
            .map(|config| representation_path(&config.template.publish, representation))
            .transpose()?;

        self.events.emit_before(
            lifecycle::LOAD,
            &[json!(loader), json!(representation.id), json!(container_name)],
        );
        let context = LoadContext {
            representation,
            session: &self.session,
            path: path.as_deref(),
        };
        let container = plugin.load(&context, &container_name, &container_namespace, &Value::Null)?;
        if let Some(host) = self.registry.registered_host() {
            host.containerise(&container)?;
        }
        info!(
            target: PIPELINE_TARGET,
            loader,
            container = container.name.as_str(),
            namespace = container.namespace.as_str(),
            "loaded representation"
        );
        self.events
            .emit_after(lifecycle::LOAD, &[container_value(&container)]);
        Ok(container)
    }

    /// Switches `container` to `representation` through its loader.
    ///
    /// The host forgets the old record and containerises the one returned
    /// by the loader, which is also returned to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NotFound`] when the container's loader is
    /// not registered, or the error of the loader or host.
    pub fn update(
        &self,
        container: &Container,
        representation: &Representation,
    ) -> Result<Container, PipelineError> {
        let plugin = self.loader_of(container)?;
        self.events
            .emit_before(lifecycle::UPDATE, &[container_value(container), json!(representation.id)]);
        let updated = plugin.update(container, representation)?;
        if let Some(host) = self.registry.registered_host() {
            host.forget(container)?;
            host.containerise(&updated)?;
        }
        info!(
            target: PIPELINE_TARGET,
            container = updated.name.as_str(),
            from = container.representation.as_str(),
            to = updated.representation.as_str(),
            "updated container"
        );
        self.events.emit_after(
            lifecycle::UPDATE,
            &[container_value(&updated), json!(representation.id)],
        );
        Ok(updated)
    }

    /// Removes `container` through its loader and drops it from the host.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NotFound`] when the container's loader is
    /// not registered, or the error of the loader or host.
    pub fn remove(&self, container: &Container) -> Result<(), PipelineError> {
        let plugin = self.loader_of(container)?;
        self.events
            .emit_before(lifecycle::REMOVE, &[container_value(container)]);
        plugin.remove(container)?;
        if let Some(host) = self.registry.registered_host() {
            host.forget(container)?;
        }
        info!(
            target: PIPELINE_TARGET,
            container = container.name.as_str(),
            "removed container"
        );
        self.events
            .emit_after(lifecycle::REMOVE, &[container_value(container)]);
        Ok(())
    }

    /// Moves the session to another task, asset or application.
    ///
    /// The given values are merged into the session. With a registered
    /// project config, `AVALON_WORKDIR` is recomputed from its work template.
    /// A host declaring [`HostCapability::SetContext`] receives the new
    /// session. Emits [`lifecycle::TASK_CHANGED`] with the changes, which are
    /// also returned.
    ///
    /// # Errors
    ///
    /// Returns a template error when the work directory cannot be computed,
    /// leaving the session untouched, or the host's error.
    pub fn update_current_task(
        &mut self,
        task: Option<&str>,
        asset: Option<&str>,
        app: Option<&str>,
    ) -> Result<BTreeMap<String, String>, PipelineError> {
        let mut changes = BTreeMap::new();
        for (key, value) in [(keys::TASK, task), (keys::ASSET, asset), (keys::APP, app)] {
            if let Some(new_value) = value {
                changes.insert(key.to_owned(), new_value.to_owned());
            }
        }
        self.events
            .emit_before(lifecycle::UPDATE_CURRENT_TASK, &[json!(changes)]);

        if let Some(config) = self.registry.registered_config() {
            let mut candidate = self.session.clone();
            candidate.update(changes.clone());
            let workdir = work_directory(
                config.work_template(),
                &candidate,
                self.registry.registered_root(),
            )?;
            changes.insert(String::from(keys::WORKDIR), workdir.display().to_string());
        }
        self.session.update(changes.clone());

        if let Some(host) = self.registry.registered_host()
            && host.capabilities().contains(&HostCapability::SetContext)
        {
            host.set_context(&self.session)?;
        }

        info!(target: PIPELINE_TARGET, changes = ?changes, "changed current task");
        self.events.emit(lifecycle::TASK_CHANGED, &[json!(changes)]);
        self.events
            .emit_after(lifecycle::UPDATE_CURRENT_TASK, &[json!(changes)]);
        Ok(changes)
    }

    fn find(&self, capability: Capability, name: &str) -> Result<PluginClass, PipelineError> {
        self.compatible(capability)
            .into_iter()
            .find(|class| class.name() == name)
            .ok_or_else(|| not_found(capability, name))
    }

    fn loader_of(
        &self,
        container: &Container,
    ) -> Result<Arc<dyn crate::plugin::Loader>, PipelineError> {
        self.registry
            .discover(Capability::Loader)
            .iter()
            .filter(|class| class.name() == container.loader)
            .find_map(PluginClass::as_loader)
            .ok_or_else(|| not_found(Capability::Loader, &container.loader))
    }
}

fn not_found(capability: Capability, name: &str) -> PipelineError {
    PipelineError::NotFound {
        capability,
        name: name.to_owned(),
    }
}

fn default_name(representation: &Representation) -> String {
    representation
        .context
        .get("subset")
        .cloned()
        .unwrap_or_else(|| representation.name.clone())
}

fn default_namespace(representation: &Representation, session: &Session) -> String {
    let asset = representation
        .context
        .get("asset")
        .map(String::as_str)
        .or_else(|| session.get(keys::ASSET))
        .unwrap_or_default();
    format!("{asset}_")
}

fn container_value(container: &Container) -> Value {
    serde_json::to_value(container).unwrap_or(Value::Null)
}
