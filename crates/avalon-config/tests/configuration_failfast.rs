//! Fail-fast behaviour of the settings and project loaders.

use std::ffi::OsString;
use std::fs;
use std::path::Path;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;

use avalon_config::{Config, ConfigError, split_path_list};

fn args_with(flag: &str, value: &Path) -> Vec<OsString> {
    vec![
        OsString::from("avalon"),
        OsString::from(flag),
        value.as_os_str().to_owned(),
    ]
}

fn mentions_file(error: &OrthoError, expected: &Path) -> bool {
    match error {
        OrthoError::File { path, .. } => path == expected,
        OrthoError::Aggregate(aggregate) => aggregate
            .iter()
            .any(|inner| mentions_file(inner, expected)),
        _ => false,
    }
}

#[test]
fn malformed_settings_file_is_reported_with_path() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let path = temp_dir.path().join("avalon.toml");
    fs::write(&path, "log_filter = [").expect("write malformed config");

    let error = Config::load_from_iter(args_with("--config-path", &path))
        .expect_err("malformed file should fail");

    assert!(
        mentions_file(error.as_ref(), &path),
        "expected the settings file to be named, got {error:?}"
    );
}

#[test]
fn unknown_log_format_flag_fails() {
    let args = vec![
        OsString::from("avalon"),
        OsString::from("--log-format"),
        OsString::from("xml"),
    ];

    assert!(Config::load_from_iter(args).is_err());
}

#[test]
fn configured_project_file_is_loaded() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let project = temp_dir.path().join("config.toml");
    fs::write(&project, "[template]\nwork = \"{root}/{project}/{task}\"\n")
        .expect("write project config");

    let config = Config::load_from_iter(args_with("--project-config", &project))
        .expect("load settings");
    let loaded = config.project().expect("load project config");

    assert_eq!(loaded.work_template(), "{root}/{project}/{task}");
}

#[test]
fn missing_project_file_is_a_read_error() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let project = temp_dir.path().join("absent.toml");

    let config = Config::load_from_iter(args_with("--project-config", &project))
        .expect("load settings");
    let error = config.project().expect_err("missing project file should fail");

    assert!(matches!(error, ConfigError::Read { .. }));
}

#[test]
fn plugin_path_lists_skip_empty_entries() {
    let separator = if cfg!(windows) { ";" } else { ":" };
    let value = format!("/studio/plugins{separator}{separator}/show/plugins");

    let paths: Vec<Utf8PathBuf> = split_path_list(&value).collect();

    assert_eq!(
        paths,
        [
            Utf8PathBuf::from("/studio/plugins"),
            Utf8PathBuf::from("/show/plugins")
        ]
    );
}
