//! Host adapters.
//!
//! A host is the creative application the pipeline is installed into. The
//! pipeline talks to it only through [`HostAdapter`]. Operations a host does
//! not implement fail with [`PipelineError::Unsupported`]. A host declares
//! its surface through [`HostAdapter::capabilities`] and the registry refuses
//! hosts lacking any of [`REQUIRED_HOST_CAPABILITIES`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::PipelineError;
use crate::plugin::Container;
use crate::session::Session;

/// An operation a host may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HostCapability {
    /// [`HostAdapter::ls`].
    ListContainers,
    /// [`HostAdapter::context`].
    Context,
    /// [`HostAdapter::set_context`].
    SetContext,
    /// [`HostAdapter::open_file`].
    OpenFile,
    /// [`HostAdapter::save_file`].
    SaveFile,
    /// [`HostAdapter::current_file`].
    CurrentFile,
    /// [`HostAdapter::has_unsaved_changes`].
    UnsavedChanges,
    /// [`HostAdapter::containerise`] and [`HostAdapter::forget`].
    TrackContainers,
}

impl fmt::Display for HostCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ListContainers => "ls",
            Self::Context => "context",
            Self::SetContext => "set_context",
            Self::OpenFile => "open_file",
            Self::SaveFile => "save_file",
            Self::CurrentFile => "current_file",
            Self::UnsavedChanges => "has_unsaved_changes",
            Self::TrackContainers => "containerise",
        };
        f.write_str(name)
    }
}

/// Capabilities every registered host must declare.
pub const REQUIRED_HOST_CAPABILITIES: [HostCapability; 4] = [
    HostCapability::ListContainers,
    HostCapability::Context,
    HostCapability::OpenFile,
    HostCapability::SaveFile,
];

/// Returns the required capabilities `host` does not declare.
#[must_use]
pub fn missing_capabilities(host: &dyn HostAdapter) -> Vec<HostCapability> {
    let declared = host.capabilities();
    REQUIRED_HOST_CAPABILITIES
        .into_iter()
        .filter(|capability| !declared.contains(capability))
        .collect()
}

/// Document and context operations of a host application.
pub trait HostAdapter: Send + Sync {
    /// Name of the host, e.g. `maya`.
    fn name(&self) -> &str;

    /// Operations the host implements.
    fn capabilities(&self) -> &[HostCapability];

    /// Lists the containers loaded in the current document.
    ///
    /// # Errors
    ///
    /// Fails with [`PipelineError::Unsupported`] unless overridden.
    fn ls(&self) -> Result<Vec<Container>, PipelineError> {
        Err(unsupported(self.name(), HostCapability::ListContainers))
    }

    /// Returns the host's view of the session.
    ///
    /// # Errors
    ///
    /// Fails with [`PipelineError::Unsupported`] unless overridden.
    fn context(&self) -> Result<Session, PipelineError> {
        Err(unsupported(self.name(), HostCapability::Context))
    }

    /// Pushes a new session into the host.
    ///
    /// # Errors
    ///
    /// Fails with [`PipelineError::Unsupported`] unless overridden.
    fn set_context(&self, _session: &Session) -> Result<(), PipelineError> {
        Err(unsupported(self.name(), HostCapability::SetContext))
    }

    /// Opens a work file.
    ///
    /// # Errors
    ///
    /// Fails with [`PipelineError::Unsupported`] unless overridden.
    fn open_file(&self, _path: &Path) -> Result<(), PipelineError> {
        Err(unsupported(self.name(), HostCapability::OpenFile))
    }

    /// Saves the current document to `path`.
    ///
    /// # Errors
    ///
    /// Fails with [`PipelineError::Unsupported`] unless overridden.
    fn save_file(&self, _path: &Path) -> Result<(), PipelineError> {
        Err(unsupported(self.name(), HostCapability::SaveFile))
    }

    /// Returns the path of the current document, if it has one.
    ///
    /// # Errors
    ///
    /// Fails with [`PipelineError::Unsupported`] unless overridden.
    fn current_file(&self) -> Result<Option<PathBuf>, PipelineError> {
        Err(unsupported(self.name(), HostCapability::CurrentFile))
    }

    /// Returns `true` when the current document has unsaved changes.
    ///
    /// # Errors
    ///
    /// Fails with [`PipelineError::Unsupported`] unless overridden.
    fn has_unsaved_changes(&self) -> Result<bool, PipelineError> {
        Err(unsupported(self.name(), HostCapability::UnsavedChanges))
    }

    /// Records a freshly loaded container in the current document.
    ///
    /// Hosts whose loaders write containers themselves keep the default,
    /// which does nothing.
    ///
    /// # Errors
    ///
    /// Returns any [`PipelineError`] the host raises.
    fn containerise(&self, _container: &Container) -> Result<(), PipelineError> {
        Ok(())
    }

    /// Drops a removed container from the current document.
    ///
    /// # Errors
    ///
    /// Returns any [`PipelineError`] the host raises.
    fn forget(&self, _container: &Container) -> Result<(), PipelineError> {
        Ok(())
    }

    /// Called when the host is installed into a pipeline.
    ///
    /// # Errors
    ///
    /// Returns any [`PipelineError`] the host raises; installation aborts.
    fn install(&self) -> Result<(), PipelineError> {
        Ok(())
    }

    /// Called when the pipeline is uninstalled.
    ///
    /// # Errors
    ///
    /// Returns any [`PipelineError`] the host raises.
    fn uninstall(&self) -> Result<(), PipelineError> {
        Ok(())
    }
}

fn unsupported(host: &str, capability: HostCapability) -> PipelineError {
    PipelineError::Unsupported {
        host: host.to_owned(),
        operation: capability.to_string(),
    }
}

/// In-memory host for tooling and tests.
///
/// Containers, context and the current file live in memory; opening and
/// saving only record the path.
#[derive(Debug, Default)]
pub struct DebugHost {
    state: Mutex<DebugState>,
}

#[derive(Debug, Default)]
struct DebugState {
    containers: Vec<Container>,
    context: Session,
    current_file: Option<PathBuf>,
    dirty: bool,
}

impl DebugHost {
    /// Name reported by [`HostAdapter::name`].
    pub const NAME: &'static str = "debug";

    const CAPABILITIES: [HostCapability; 8] = [
        HostCapability::ListContainers,
        HostCapability::Context,
        HostCapability::SetContext,
        HostCapability::OpenFile,
        HostCapability::SaveFile,
        HostCapability::CurrentFile,
        HostCapability::UnsavedChanges,
        HostCapability::TrackContainers,
    ];

    /// Creates an empty debug host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the current document as modified.
    pub fn touch(&self) {
        self.lock().dirty = true;
    }

    fn lock(&self) -> MutexGuard<'_, DebugState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl HostAdapter for DebugHost {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn capabilities(&self) -> &[HostCapability] {
        &Self::CAPABILITIES
    }

    fn ls(&self) -> Result<Vec<Container>, PipelineError> {
        Ok(self.lock().containers.clone())
    }

    fn context(&self) -> Result<Session, PipelineError> {
        Ok(self.lock().context.clone())
    }

    fn set_context(&self, session: &Session) -> Result<(), PipelineError> {
        self.lock().context = session.clone();
        Ok(())
    }

    fn open_file(&self, path: &Path) -> Result<(), PipelineError> {
        let mut state = self.lock();
        state.current_file = Some(path.to_path_buf());
        state.dirty = false;
        Ok(())
    }

    fn save_file(&self, path: &Path) -> Result<(), PipelineError> {
        let mut state = self.lock();
        state.current_file = Some(path.to_path_buf());
        state.dirty = false;
        Ok(())
    }

    fn current_file(&self) -> Result<Option<PathBuf>, PipelineError> {
        Ok(self.lock().current_file.clone())
    }

    fn has_unsaved_changes(&self) -> Result<bool, PipelineError> {
        Ok(self.lock().dirty)
    }

    fn containerise(&self, container: &Container) -> Result<(), PipelineError> {
        let mut state = self.lock();
        state.containers.push(container.clone());
        state.dirty = true;
        Ok(())
    }

    fn forget(&self, container: &Container) -> Result<(), PipelineError> {
        let mut state = self.lock();
        state.containers.retain(|existing| existing != container);
        state.dirty = true;
        Ok(())
    }
}
