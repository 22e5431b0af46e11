//! Unit tests for the CLI runtime.

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use rstest::{fixture, rstest};
use serde_json::Value;
use tempfile::TempDir;

use super::bootstrap::config_arguments;
use super::cli::Cli;
use super::telemetry::{TelemetryError, parse_filter};
use super::{exit_code_from_status, run_with_env};

const MANIFEST: &str = r#"
[[application]]
name = "maya2016"
label = "Autodesk Maya 2016"
executable = "maya"
application_dir = "maya"

[application.environment]
MAYA_PROJECT = "{AVALON_WORKDIR}"

[[application]]
name = "nuke10"
executable = "Nuke10.0"
order = -1
"#;

struct Studio {
    projects: TempDir,
    plugins: TempDir,
}

impl Studio {
    fn plugin_path(&self) -> String {
        self.plugins.path().display().to_string()
    }

    fn session_vars(&self) -> Vec<(String, String)> {
        vec![
            (
                String::from("AVALON_PROJECTS"),
                self.projects.path().display().to_string(),
            ),
            (String::from("AVALON_PROJECT"), String::from("hero")),
            (String::from("AVALON_SILO"), String::from("assets")),
            (String::from("AVALON_ASSET"), String::from("ben")),
            (String::from("AVALON_TASK"), String::from("model")),
            (String::from("AVALON_PLUGIN_PATH"), self.plugin_path()),
        ]
    }
}

#[fixture]
fn studio() -> Studio {
    let projects = TempDir::new().expect("projects dir");
    let plugins = TempDir::new().expect("plugins dir");
    fs::write(plugins.path().join("apps.toml"), MANIFEST).expect("write manifest");
    Studio { projects, plugins }
}

struct Output {
    code: ExitCode,
    stdout: String,
    stderr: String,
}

fn invoke(args: &[&str], vars: Vec<(String, String)>) -> Output {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let argv = std::iter::once("avalon").chain(args.iter().copied());
    let code = run_with_env(argv, vars, &mut stdout, &mut stderr);
    Output {
        code,
        stdout: String::from_utf8(stdout).expect("stdout is utf-8"),
        stderr: String::from_utf8(stderr).expect("stderr is utf-8"),
    }
}

fn write_project_document(root: &Path, text: &str) {
    let project_dir = root.join("hero");
    fs::create_dir_all(&project_dir).expect("project dir");
    fs::write(project_dir.join(".project.toml"), text).expect("write project document");
}

#[rstest]
fn help_goes_to_stdout_and_succeeds() {
    let output = invoke(&["--help"], Vec::new());

    assert_eq!(output.code, ExitCode::SUCCESS);
    assert!(output.stdout.contains("Usage"), "{}", output.stdout);
    assert!(output.stderr.is_empty());
}

#[rstest]
fn unknown_subcommand_is_a_usage_error() {
    let output = invoke(&["frobnicate"], Vec::new());

    assert_eq!(output.code, ExitCode::from(2));
    assert!(output.stdout.is_empty());
    assert!(output.stderr.contains("frobnicate"), "{}", output.stderr);
}

#[rstest]
fn session_keeps_only_avalon_variables_and_fills_defaults() {
    let vars = vec![
        (String::from("AVALON_PROJECT"), String::from("hero")),
        (String::from("HOME"), String::from("/home/artist")),
    ];

    let output = invoke(&["session"], vars);

    assert_eq!(output.code, ExitCode::SUCCESS);
    let session: Value = serde_json::from_str(&output.stdout).expect("session json");
    assert_eq!(session["AVALON_PROJECT"], "hero");
    assert_eq!(session["AVALON_LABEL"], "Avalon");
    assert!(session.get("HOME").is_none());
}

#[rstest]
fn apps_lists_compatible_applications_in_order(studio: Studio) {
    let output = invoke(&["apps"], studio.session_vars());

    assert_eq!(output.code, ExitCode::SUCCESS, "{}", output.stderr);
    assert_eq!(
        output.stdout,
        "nuke10\tnuke10\nmaya2016\tAutodesk Maya 2016\n"
    );
}

#[rstest]
#[case::hidden(&["apps"], "")]
#[case::flagged(&["apps", "--all"], "(incompatible)")]
fn apps_without_a_task_marks_incompatible(
    studio: Studio,
    #[case] args: &[&str],
    #[case] expected: &str,
) {
    let vars = vec![(String::from("AVALON_PLUGIN_PATH"), studio.plugin_path())];

    let output = invoke(args, vars);

    assert_eq!(output.code, ExitCode::SUCCESS, "{}", output.stderr);
    assert!(output.stdout.contains(expected));
    assert_eq!(output.stdout.is_empty(), expected.is_empty());
}

#[rstest]
fn plugin_path_flag_is_layered_over_the_environment(studio: Studio) {
    let mut vars = studio.session_vars();
    vars.retain(|(key, _)| key != "AVALON_PLUGIN_PATH");
    let plugin_path = studio.plugin_path();

    let output = invoke(&["--plugin-path", &plugin_path, "apps"], vars);

    assert!(output.stdout.contains("maya2016"), "{}", output.stderr);
}

#[rstest]
fn environ_resolves_the_work_directory(studio: Studio) {
    let output = invoke(&["environ", "maya2016"], studio.session_vars());

    assert_eq!(output.code, ExitCode::SUCCESS, "{}", output.stderr);
    let environment: Value = serde_json::from_str(&output.stdout).expect("environ json");
    let workdir = studio.projects.path().join("hero/assets/ben/work/model");
    let expected = workdir.display().to_string();
    assert_eq!(environment["AVALON_WORKDIR"], expected.as_str());
    assert_eq!(environment["MAYA_PROJECT"], expected.as_str());
    assert_eq!(environment["AVALON_APP"], "maya");
    assert_eq!(environment["AVALON_APP_NAME"], "maya2016");
}

#[rstest]
fn environ_uses_the_project_document_templates(studio: Studio) {
    write_project_document(
        studio.projects.path(),
        "name = \"hero\"\n\n[config.template]\nwork = \"{root}/{project}/{asset}/{task}/{app}\"\n",
    );

    let output = invoke(&["environ", "maya2016"], studio.session_vars());

    assert_eq!(output.code, ExitCode::SUCCESS, "{}", output.stderr);
    let environment: Value = serde_json::from_str(&output.stdout).expect("environ json");
    let workdir = studio.projects.path().join("hero/ben/model/maya");
    assert_eq!(
        environment["AVALON_WORKDIR"],
        workdir.display().to_string().as_str()
    );
}

#[rstest]
fn environ_names_the_missing_session_keys(studio: Studio) {
    let mut vars = studio.session_vars();
    vars.retain(|(key, _)| key != "AVALON_TASK" && key != "AVALON_ASSET");

    let output = invoke(&["environ", "maya2016"], vars);

    assert_eq!(output.code, ExitCode::FAILURE);
    assert!(
        output.stderr.contains("missing: AVALON_ASSET, AVALON_TASK"),
        "{}",
        output.stderr
    );
}

#[rstest]
fn environ_reports_unknown_applications(studio: Studio) {
    let output = invoke(&["environ", "houdini"], studio.session_vars());

    assert_eq!(output.code, ExitCode::FAILURE);
    assert!(
        output
            .stderr
            .contains("no compatible application plugin named 'houdini'"),
        "{}",
        output.stderr
    );
}

#[rstest]
fn launch_fails_when_the_executable_is_missing(studio: Studio) {
    let mut vars = studio.session_vars();
    vars.push((String::from("PATH"), studio.projects.path().display().to_string()));

    let output = invoke(&["launch", "nuke10", "--no-initialize"], vars);

    assert_eq!(output.code, ExitCode::FAILURE);
    assert!(output.stderr.contains("'Nuke10.0' not found"), "{}", output.stderr);
    assert!(!studio.projects.path().join("hero").exists());
}

#[rstest]
fn invalid_log_format_fails_configuration(studio: Studio) {
    let output = invoke(&["--log-format", "xml", "apps"], studio.session_vars());

    assert_eq!(output.code, ExitCode::FAILURE);
    assert!(
        output.stderr.contains("failed to load configuration"),
        "{}",
        output.stderr
    );
}

#[rstest]
fn settings_file_plugin_paths_are_discovered(studio: Studio) {
    let settings = studio.projects.path().join("avalon.toml");
    fs::write(
        &settings,
        format!("plugin_paths = [{:?}]\n", studio.plugin_path()),
    )
    .expect("write settings");
    let mut vars = studio.session_vars();
    vars.retain(|(key, _)| key != "AVALON_PLUGIN_PATH");
    let settings_path = settings.display().to_string();

    let output = invoke(&["--config-path", &settings_path, "apps"], vars);

    assert_eq!(output.code, ExitCode::SUCCESS, "{}", output.stderr);
    assert!(output.stdout.contains("maya2016"), "{}", output.stdout);
}

#[rstest]
fn only_given_settings_flags_reach_the_loader() {
    let cli = Cli::try_parse_from([
        "avalon",
        "--log-filter",
        "trace",
        "--root",
        "/mnt/projects",
        "--plugin-path",
        "/opt/plugins",
        "session",
    ])
    .expect("parse cli");

    let arguments: Vec<String> = config_arguments(&cli)
        .into_iter()
        .map(|argument| argument.to_string_lossy().into_owned())
        .collect();

    assert_eq!(
        arguments,
        ["avalon", "--log-filter", "trace", "--root", "/mnt/projects"]
    );
}

#[rstest]
#[case::levels("info")]
#[case::targets("avalon_pipeline=debug,warn")]
#[case::silent("off")]
fn log_filters_accept_directives(#[case] expression: &str) {
    assert!(parse_filter(expression).is_ok());
}

#[rstest]
fn invalid_log_filter_names_the_expression() {
    let error = parse_filter("avalon=loud").expect_err("unknown level");

    assert!(matches!(
        &error,
        TelemetryError::Filter { filter, .. } if filter == "avalon=loud"
    ));
}

#[rstest]
fn invalid_log_filter_fails_the_run(studio: Studio) {
    let output = invoke(&["--log-filter", "avalon=loud", "apps"], studio.session_vars());

    assert_eq!(output.code, ExitCode::FAILURE);
    assert!(
        output.stderr.contains("invalid log filter 'avalon=loud'"),
        "{}",
        output.stderr
    );
}

#[rstest]
#[case::success(Some(0), ExitCode::SUCCESS)]
#[case::failure(Some(3), ExitCode::from(3))]
#[case::out_of_range(Some(300), ExitCode::FAILURE)]
#[case::negative(Some(-1), ExitCode::FAILURE)]
#[case::signalled(None, ExitCode::FAILURE)]
fn exit_codes_follow_the_child(#[case] status: Option<i32>, #[case] expected: ExitCode) {
    assert_eq!(exit_code_from_status(status), expected);
}
