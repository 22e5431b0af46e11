//! Process launching and `PATH` lookup.
//!
//! The [`ProcessLauncher`] trait is the seam between application actions
//! and the operating system. [`SystemLauncher`] spawns real processes with
//! [`std::process::Command`]; tests substitute a mock that records the
//! [`LaunchRequest`] instead.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use std::process::{Child, Command, ExitStatus};
use std::sync::Arc;

use tracing::debug;

use crate::error::PipelineError;

/// Tracing target for launcher operations.
const LAUNCHER_TARGET: &str = "avalon_pipeline::launcher";

/// Environment of a launched process.
pub type Environment = BTreeMap<String, String>;

/// Everything needed to spawn an application process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Resolved executable path.
    pub executable: PathBuf,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Complete environment of the process; nothing else is inherited.
    pub environment: Environment,
    /// Working directory of the process.
    pub working_dir: Option<PathBuf>,
}

/// A spawned application process.
///
/// The launcher does not wait for the process; the handle lets the caller
/// do so.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: u32,
    executable: PathBuf,
    child: Option<Child>,
}

impl ProcessHandle {
    /// Creates a handle for a process not owned by this handle.
    #[must_use]
    pub fn detached(pid: u32, executable: impl Into<PathBuf>) -> Self {
        Self {
            pid,
            executable: executable.into(),
            child: None,
        }
    }

    /// Wraps a spawned child process.
    #[must_use]
    pub fn from_child(child: Child, executable: impl Into<PathBuf>) -> Self {
        Self {
            pid: child.id(),
            executable: executable.into(),
            child: Some(child),
        }
    }

    /// Returns the process id.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Returns the executable that was spawned.
    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Returns `true` when the handle owns the child process.
    #[must_use]
    pub const fn is_owned(&self) -> bool {
        self.child.is_some()
    }

    /// Waits for an owned child to exit.
    ///
    /// Returns `Ok(None)` for detached handles.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Spawn`] when waiting fails.
    pub fn wait(&mut self) -> Result<Option<ExitStatus>, PipelineError> {
        let Some(child) = self.child.as_mut() else {
            return Ok(None);
        };
        child.wait().map(Some).map_err(|source| PipelineError::Spawn {
            executable: self.executable.clone(),
            source: Arc::new(source),
        })
    }
}

/// Spawns application processes.
pub trait ProcessLauncher: Send + Sync {
    /// Spawns the process described by `request` without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Spawn`] when the process cannot be started.
    fn spawn(&self, request: &LaunchRequest) -> Result<ProcessHandle, PipelineError>;
}

/// Launches processes with [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl ProcessLauncher for SystemLauncher {
    fn spawn(&self, request: &LaunchRequest) -> Result<ProcessHandle, PipelineError> {
        debug!(
            target: LAUNCHER_TARGET,
            executable = %request.executable.display(),
            args = ?request.args,
            working_dir = ?request.working_dir,
            "spawning application process"
        );

        let mut command = Command::new(&request.executable);
        command
            .args(&request.args)
            .env_clear()
            .envs(&request.environment);
        if let Some(dir) = &request.working_dir {
            command.current_dir(dir);
        }

        let child = command.spawn().map_err(|source| PipelineError::Spawn {
            executable: request.executable.clone(),
            source: Arc::new(source),
        })?;

        debug!(
            target: LAUNCHER_TARGET,
            pid = child.id(),
            "application process spawned"
        );
        Ok(ProcessHandle::from_child(child, &request.executable))
    }
}

/// Snapshot of the current process environment.
///
/// Variables whose name or value is not valid UTF-8 are skipped.
#[must_use]
pub fn process_environment() -> Environment {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}

/// Looks `executable` up in the directories of `search_path`.
///
/// An executable containing a path separator is checked as given.
#[must_use]
pub fn which(executable: &str, search_path: &str) -> Option<PathBuf> {
    let candidate = Path::new(executable);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    std::env::split_paths(OsStr::new(search_path))
        .filter(|dir| !dir.as_os_str().is_empty())
        .flat_map(|dir| {
            EXECUTABLE_SUFFIXES
                .iter()
                .map(move |suffix| dir.join(format!("{executable}{suffix}")))
        })
        .find(|path| is_executable(path))
}

#[cfg(windows)]
const EXECUTABLE_SUFFIXES: &[&str] = &["", ".exe", ".bat", ".cmd"];

#[cfg(not(windows))]
const EXECUTABLE_SUFFIXES: &[&str] = &[""];

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .is_ok_and(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Normalises `path` lexically: `.` segments and repeated separators are
/// dropped and `..` removes the preceding segment.
#[must_use]
pub fn normalize_path(path: &str) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(normalized.components().next_back(), Some(Component::Normal(_)))
                    && normalized.pop();
                if !popped && !normalized.has_root() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    if normalized.as_os_str().is_empty() {
        normalized.push(Component::CurDir);
    }
    normalized
}
