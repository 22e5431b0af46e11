//! Core of the Avalon asset pipeline.
//!
//! The crate connects creative applications (hosts) to a production
//! pipeline. Plugins declare a capability ([`Capability`]) and are
//! registered explicitly or discovered from plugin manifests by the
//! [`PluginRegistry`]. The [`Pipeline`] runtime owns the registry together
//! with the [`Session`] describing the current project, asset and task, and
//! dispatches compatible plugins against it. Lifecycle steps are announced on
//! a weak-reference [`EventBus`].
//!
//! Applications are plugins too: an [`Application`] resolves its environment
//! template with the [`template`] resolver, prepares the work directory and
//! spawns the executable through a [`ProcessLauncher`].
//!
//! ```
//! use std::sync::Arc;
//!
//! use avalon_pipeline::{Capability, DebugHost, Pipeline, Session};
//!
//! let mut pipeline = Pipeline::new(Session::new());
//! pipeline.install(Arc::new(DebugHost::new())).expect("debug host installs");
//! assert!(pipeline.compatible(Capability::Creator).is_empty());
//! pipeline.uninstall().expect("debug host uninstalls");
//! ```

pub mod application;
pub mod error;
pub mod events;
pub mod host;
pub mod launcher;
pub mod pipeline;
pub mod plugin;
pub mod registry;
pub mod session;
pub mod template;

pub use application::{Application, work_directory};
pub use error::PipelineError;
pub use events::{Callback, EmitReport, EventBus, SubscriptionId, callback};
pub use host::{DebugHost, HostAdapter, HostCapability};
pub use launcher::{Environment, LaunchRequest, ProcessHandle, ProcessLauncher, SystemLauncher};
pub use pipeline::Pipeline;
pub use plugin::{
    Action, ActionContext, ActionOutcome, Capability, Container, CreateRequest, Creator,
    InventoryAction, Loader, Plugin, PluginClass, ProcessOptions, Representation,
};
pub use registry::{DiscoveryReport, PluginModule, PluginRegistry, StaticModule};
pub use session::Session;

#[cfg(test)]
mod tests;
