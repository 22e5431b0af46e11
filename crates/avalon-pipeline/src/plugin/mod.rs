//! Plugin contracts dispatched by the pipeline.
//!
//! Every dispatchable unit implements [`Plugin`] for its metadata and the
//! compatibility gate, plus one capability trait: [`Loader`], [`Creator`],
//! [`Action`] or [`InventoryAction`]. Applications are actions backed by an
//! [`ApplicationDefinition`](avalon_config::ApplicationDefinition). The
//! registry stores them as [`PluginClass`] values, shared references tagged
//! with their [`Capability`].

mod container;
mod context;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::application::Application;
use crate::error::PipelineError;
use crate::session::Session;

pub use self::container::{
    CONTAINER_ID, CONTAINER_SCHEMA, Container, Representation, loaders_from_representation,
    representation_path,
};
pub use self::context::{
    ActionContext, ActionOutcome, CreateRequest, INSTANCE_ID, LoadContext, ProcessOptions,
};

/// Capability role a plugin fulfils.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    /// Loads published representations into the host.
    Loader,
    /// Creates publishable instances.
    Creator,
    /// Runs a task-level action.
    Action,
    /// Runs an action over loaded containers.
    InventoryAction,
    /// Launches an application; a specialisation of [`Capability::Action`].
    Application,
}

impl Capability {
    /// Every capability, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Loader,
        Self::Creator,
        Self::Action,
        Self::InventoryAction,
        Self::Application,
    ];

    /// Returns the lowercase name of the capability.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Loader => "loader",
            Self::Creator => "creator",
            Self::Action => "action",
            Self::InventoryAction => "inventory_action",
            Self::Application => "application",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata and compatibility gate shared by every plugin.
///
/// Plugins are stateless: the same instance may be dispatched many times
/// and from several threads.
pub trait Plugin: Send + Sync {
    /// Unique name used to look the plugin up.
    fn name(&self) -> &str;

    /// Human-readable label; defaults to the name.
    fn label(&self) -> &str {
        self.name()
    }

    /// Sort order; lower values come first.
    fn order(&self) -> i32 {
        0
    }

    /// Families the plugin applies to.
    fn families(&self) -> &[String] {
        &[]
    }

    /// Optional icon name.
    fn icon(&self) -> Option<&str> {
        None
    }

    /// Returns `true` when the plugin can run against `session`.
    fn is_compatible(&self, _session: &Session) -> bool {
        true
    }
}

/// A task-level action.
pub trait Action: Plugin {
    /// Runs the action.
    ///
    /// # Errors
    ///
    /// Returns any [`PipelineError`] the action raises; it reaches the
    /// dispatch caller unchanged.
    fn process(
        &self,
        session: &Session,
        context: &ActionContext<'_>,
    ) -> Result<ActionOutcome, PipelineError>;
}

/// An action over containers loaded in the host.
pub trait InventoryAction: Plugin {
    /// Returns `true` when the action applies to `container`.
    fn accepts(&self, _container: &Container) -> bool {
        true
    }

    /// Runs the action over the accepted containers.
    ///
    /// # Errors
    ///
    /// Returns any [`PipelineError`] the action raises.
    fn process(
        &self,
        session: &Session,
        items: &[Container],
        context: &ActionContext<'_>,
    ) -> Result<ActionOutcome, PipelineError>;
}

/// Loads published representations into the host.
pub trait Loader: Plugin {
    /// Representation names the loader understands; `"*"` matches any.
    fn representations(&self) -> &[String];

    /// Loads the representation described by `context`.
    ///
    /// # Errors
    ///
    /// Returns any [`PipelineError`] the loader raises.
    fn load(
        &self,
        context: &LoadContext<'_>,
        name: &str,
        namespace: &str,
        options: &Value,
    ) -> Result<Container, PipelineError>;

    /// Switches `container` to another representation.
    ///
    /// # Errors
    ///
    /// The default implementation fails with [`PipelineError::Plugin`].
    fn update(
        &self,
        container: &Container,
        _representation: &Representation,
    ) -> Result<Container, PipelineError> {
        Err(PipelineError::plugin(
            self.name(),
            format!("updating container '{}' is not supported", container.name),
        ))
    }

    /// Removes `container` from the host.
    ///
    /// # Errors
    ///
    /// Returns any [`PipelineError`] the loader raises.
    fn remove(&self, container: &Container) -> Result<(), PipelineError>;
}

/// Creates publishable instances.
pub trait Creator: Plugin {
    /// Family of the instances this creator makes.
    fn family(&self) -> &str;

    /// Creates an instance and returns its data.
    ///
    /// # Errors
    ///
    /// Returns any [`PipelineError`] the creator raises.
    fn process(&self, request: &CreateRequest) -> Result<Value, PipelineError>;
}

/// A registered plugin tagged with its capability.
///
/// Cloning a `PluginClass` clones the reference, not the plugin; equality
/// of two classes is identity of the referenced plugin.
#[derive(Clone)]
pub enum PluginClass {
    /// A loader.
    Loader(Arc<dyn Loader>),
    /// A creator.
    Creator(Arc<dyn Creator>),
    /// An action.
    Action(Arc<dyn Action>),
    /// An inventory action.
    InventoryAction(Arc<dyn InventoryAction>),
    /// An application launcher.
    Application(Arc<Application>),
}

impl PluginClass {
    /// Returns the capability the class was registered with.
    #[must_use]
    pub const fn capability(&self) -> Capability {
        match self {
            Self::Loader(_) => Capability::Loader,
            Self::Creator(_) => Capability::Creator,
            Self::Action(_) => Capability::Action,
            Self::InventoryAction(_) => Capability::InventoryAction,
            Self::Application(_) => Capability::Application,
        }
    }

    /// Returns `true` when the class can be used as `capability`.
    ///
    /// Applications also satisfy [`Capability::Action`].
    #[must_use]
    pub fn satisfies(&self, capability: Capability) -> bool {
        let own = self.capability();
        own == capability || (own == Capability::Application && capability == Capability::Action)
    }

    /// Returns the plugin metadata.
    #[must_use]
    pub fn plugin(&self) -> &dyn Plugin {
        match self {
            Self::Loader(plugin) => plugin.as_ref(),
            Self::Creator(plugin) => plugin.as_ref(),
            Self::Action(plugin) => plugin.as_ref(),
            Self::InventoryAction(plugin) => plugin.as_ref(),
            Self::Application(plugin) => plugin.as_ref(),
        }
    }

    /// Returns the plugin name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.plugin().name()
    }

    /// Returns the plugin sort order.
    #[must_use]
    pub fn order(&self) -> i32 {
        self.plugin().order()
    }

    /// Returns `true` when the plugin accepts `session`.
    #[must_use]
    pub fn is_compatible(&self, session: &Session) -> bool {
        self.plugin().is_compatible(session)
    }

    /// Returns `true` when both classes reference the same plugin.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Loader(left), Self::Loader(right)) => Arc::ptr_eq(left, right),
            (Self::Creator(left), Self::Creator(right)) => Arc::ptr_eq(left, right),
            (Self::Action(left), Self::Action(right)) => Arc::ptr_eq(left, right),
            (Self::InventoryAction(left), Self::InventoryAction(right)) => {
                Arc::ptr_eq(left, right)
            }
            (Self::Application(left), Self::Application(right)) => Arc::ptr_eq(left, right),
            _ => false,
        }
    }

    /// Returns the loader, if this class is one.
    #[must_use]
    pub fn as_loader(&self) -> Option<Arc<dyn Loader>> {
        match self {
            Self::Loader(loader) => Some(Arc::clone(loader)),
            _ => None,
        }
    }

    /// Returns the creator, if this class is one.
    #[must_use]
    pub fn as_creator(&self) -> Option<Arc<dyn Creator>> {
        match self {
            Self::Creator(creator) => Some(Arc::clone(creator)),
            _ => None,
        }
    }

    /// Returns the class as an action; applications qualify.
    #[must_use]
    pub fn as_action(&self) -> Option<Arc<dyn Action>> {
        match self {
            Self::Action(action) => Some(Arc::clone(action)),
            Self::Application(application) => {
                let action: Arc<dyn Action> = application.clone();
                Some(action)
            }
            _ => None,
        }
    }

    /// Returns the inventory action, if this class is one.
    #[must_use]
    pub fn as_inventory_action(&self) -> Option<Arc<dyn InventoryAction>> {
        match self {
            Self::InventoryAction(action) => Some(Arc::clone(action)),
            _ => None,
        }
    }

    /// Returns the application, if this class is one.
    #[must_use]
    pub fn as_application(&self) -> Option<Arc<Application>> {
        match self {
            Self::Application(application) => Some(Arc::clone(application)),
            _ => None,
        }
    }
}

impl PartialEq for PluginClass {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for PluginClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginClass")
            .field("capability", &self.capability())
            .field("name", &self.name())
            .field("order", &self.order())
            .finish()
    }
}

impl From<Arc<dyn Loader>> for PluginClass {
    fn from(plugin: Arc<dyn Loader>) -> Self {
        Self::Loader(plugin)
    }
}

impl From<Arc<dyn Creator>> for PluginClass {
    fn from(plugin: Arc<dyn Creator>) -> Self {
        Self::Creator(plugin)
    }
}

impl From<Arc<dyn Action>> for PluginClass {
    fn from(plugin: Arc<dyn Action>) -> Self {
        Self::Action(plugin)
    }
}

impl From<Arc<dyn InventoryAction>> for PluginClass {
    fn from(plugin: Arc<dyn InventoryAction>) -> Self {
        Self::InventoryAction(plugin)
    }
}

impl From<Arc<Application>> for PluginClass {
    fn from(plugin: Arc<Application>) -> Self {
        Self::Application(plugin)
    }
}
