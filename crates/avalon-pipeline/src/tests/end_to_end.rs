//! End-to-end tests driving a pipeline from manifests to a launched process.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use avalon_config::ProjectConfig;
use rstest::{fixture, rstest};
use serde_json::Value;
use tempfile::TempDir;

use crate::events::{after_event, callback};
use crate::host::{DebugHost, HostAdapter};
use crate::launcher::{Environment, LaunchRequest, ProcessHandle, ProcessLauncher};
use crate::pipeline::{Pipeline, lifecycle};
use crate::plugin::{ActionOutcome, Capability, ProcessOptions, Representation};
use crate::registry::StaticModule;
use crate::session::{Session, keys};
use crate::PipelineError;

use super::{StubInventoryAction, loader_class};

/// Launcher that records requests instead of spawning processes.
#[derive(Default)]
struct RecordingLauncher {
    requests: Mutex<Vec<LaunchRequest>>,
}

impl RecordingLauncher {
    fn requests(&self) -> Vec<LaunchRequest> {
        self.requests.lock().expect("launcher lock").clone()
    }
}

impl ProcessLauncher for RecordingLauncher {
    fn spawn(&self, request: &LaunchRequest) -> Result<ProcessHandle, PipelineError> {
        self.requests
            .lock()
            .expect("launcher lock")
            .push(request.clone());
        Ok(ProcessHandle::detached(100, &request.executable))
    }
}

struct Studio {
    projects: TempDir,
    plugins: TempDir,
    tools: TempDir,
    launcher: Arc<RecordingLauncher>,
    host: Arc<DebugHost>,
    pipeline: Pipeline,
}

impl Studio {
    fn workdir(&self, task: &str) -> PathBuf {
        self.projects
            .path()
            .join("hero/assets/ben/work")
            .join(task)
    }
}

#[cfg(unix)]
fn install_tool(dir: &Path, name: &str) {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, "#!/bin/sh\n").expect("write tool");
    let mut permissions = fs::metadata(&path).expect("metadata").permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(&path, permissions).expect("chmod");
}

#[cfg(not(unix))]
fn install_tool(dir: &Path, name: &str) {
    fs::write(dir.join(format!("{name}.exe")), "").expect("write tool");
}

const MAYA_MANIFEST: &str = r#"
modules = ["studio.loaders"]

[[application]]
name = "maya2016"
label = "Autodesk Maya 2016"
executable = "maya"
application_dir = "maya"
args = ["-noAutoloadPlugins"]
default_dirs = ["scenes", "data"]

[application.environment]
MAYA_PROJECT = "{AVALON_WORKDIR}"
PYTHONPATH = ["{AVALON_PROJECTS}/{AVALON_PROJECT}/scripts", "/studio/python"]
"#;

#[fixture]
fn studio() -> Studio {
    let projects = TempDir::new().expect("projects dir");
    let plugins = TempDir::new().expect("plugins dir");
    let tools = TempDir::new().expect("tools dir");
    install_tool(tools.path(), "maya");
    fs::write(plugins.path().join("maya.toml"), MAYA_MANIFEST).expect("write manifest");

    let session = Session::from_iter([
        (keys::PROJECTS, projects.path().display().to_string()),
        (keys::PROJECT, String::from("hero")),
        (keys::SILO, String::from("assets")),
        (keys::ASSET, String::from("ben")),
        (keys::TASK, String::from("model")),
    ]);
    let launcher = Arc::new(RecordingLauncher::default());
    let base = Environment::from([(
        String::from("PATH"),
        tools.path().display().to_string(),
    )]);
    let mut pipeline = Pipeline::new(session)
        .with_launcher(launcher.clone())
        .with_base_environment(base);

    let registry = pipeline.registry_mut();
    registry.register_module(Arc::new(StaticModule::new(
        "studio.loaders",
        vec![loader_class("reference", &["avalon.model"], &["ma"])],
    )));
    registry.register_plugin_path(plugins.path());
    registry.register_config(ProjectConfig::default());

    let host = Arc::new(DebugHost::new());
    pipeline.install(host.clone()).expect("install host");

    Studio {
        projects,
        plugins,
        tools,
        launcher,
        host,
        pipeline,
    }
}

#[rstest]
fn manifests_contribute_loaders_and_applications(studio: Studio) {
    let loaders = studio.pipeline.compatible(Capability::Loader);
    let actions = studio.pipeline.compatible(Capability::Action);

    assert_eq!(
        loaders.iter().map(|class| class.name()).collect::<Vec<_>>(),
        ["reference"]
    );
    assert_eq!(
        actions.iter().map(|class| class.name()).collect::<Vec<_>>(),
        ["maya2016"]
    );
    assert!(studio.plugins.path().join("maya.toml").is_file());
}

#[cfg(unix)]
#[rstest]
fn task_change_then_launch_prepares_workdir_and_spawns(mut studio: Studio) {
    studio
        .pipeline
        .update_current_task(Some("rig"), None, None)
        .expect("switch to rig");

    let outcome = studio
        .pipeline
        .run_action("maya2016", ProcessOptions::default())
        .expect("launch maya");

    let workdir = studio.workdir("rig");
    assert!(matches!(outcome, ActionOutcome::Launched(ref handle) if handle.pid() == 100));
    assert!(workdir.join("scenes").is_dir());
    assert!(workdir.join("data").is_dir());

    let requests = studio.launcher.requests();
    let request = requests.first().expect("one launch request");
    assert_eq!(requests.len(), 1);
    assert!(request.executable.starts_with(studio.tools.path()));
    assert_eq!(request.working_dir.as_deref(), Some(workdir.as_path()));
    assert_eq!(request.args, [String::from("-noAutoloadPlugins")]);
    assert_eq!(
        request.environment.get("MAYA_PROJECT"),
        Some(&workdir.display().to_string())
    );
    assert_eq!(
        request.environment.get(keys::TASK).map(String::as_str),
        Some("rig")
    );
    let python_path = request
        .environment
        .get("PYTHONPATH")
        .expect("PYTHONPATH is set");
    assert!(python_path.ends_with("/studio/python"), "{python_path}");
}

#[rstest]
fn loaded_containers_flow_through_inventory_actions(mut studio: Studio) {
    let switch: Arc<dyn crate::plugin::InventoryAction> =
        Arc::new(StubInventoryAction::for_loader("switch", "reference"));
    studio.pipeline.registry_mut().register_plugin(switch);
    let loaded = Arc::new(Mutex::new(Vec::<Value>::new()));
    let sink = Arc::clone(&loaded);
    let on_load = callback(move |args| {
        sink.lock().expect("sink lock").extend(args.iter().cloned());
        Ok(())
    });
    studio
        .pipeline
        .events()
        .on(&after_event(lifecycle::LOAD), &on_load);
    let representation = Representation::new("r1", "ma")
        .with_families(["avalon.model"])
        .with_context("root", studio.projects.path().display().to_string())
        .with_context("project", "hero")
        .with_context("silo", "assets")
        .with_context("asset", "ben")
        .with_context("subset", "modelDefault")
        .with_context("version", "3");

    let container = studio
        .pipeline
        .load("reference", &representation, None, None)
        .expect("load model");
    let containers = studio.host.ls().expect("ls");
    let outcome = studio
        .pipeline
        .run_inventory_action("switch", &containers, ProcessOptions::default())
        .expect("run switch");

    assert_eq!(containers, vec![container.clone()]);
    assert_eq!(loaded.lock().expect("loaded lock").len(), 1);
    let expected_path = studio
        .projects
        .path()
        .join("hero/assets/ben/publish/modelDefault/v003/modelDefault.ma");
    assert_eq!(
        container.data.get("path"),
        Some(&Value::from(expected_path.display().to_string()))
    );
    assert!(matches!(
        outcome,
        ActionOutcome::Completed(ref names) if *names == serde_json::json!(["modelDefault"])
    ));

    studio.pipeline.remove(&container).expect("remove model");
    assert!(studio.host.ls().expect("ls").is_empty());
}

#[rstest]
fn uninstall_forgets_everything(mut studio: Studio) {
    studio.pipeline.uninstall().expect("uninstall");

    assert!(studio.pipeline.compatible(Capability::Action).is_empty());
    assert!(studio.pipeline.compatible(Capability::Loader).is_empty());
    assert!(
        studio
            .pipeline
            .run_action("maya2016", ProcessOptions::default())
            .is_err()
    );
}
