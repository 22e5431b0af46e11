//! Unit tests for pipeline error types.

use std::collections::BTreeMap;
use std::path::PathBuf;

use rstest::rstest;

use super::*;

#[test]
fn missing_variable_names_key_and_available_context() {
    let context = BTreeMap::from([
        (String::from("x"), String::from("root")),
        (String::from("AVALON_TASK"), String::from("model")),
    ]);
    let error = PipelineError::MissingVariable {
        key: "y".into(),
        context,
    };
    let message = error.to_string();
    assert!(message.contains("'y'"), "expected key in message: {message}");
    assert!(
        message.contains("AVALON_TASK, x"),
        "expected sorted context keys in message: {message}"
    );
}

#[test]
fn missing_variable_with_empty_context_says_none() {
    let error = PipelineError::MissingVariable {
        key: "root".into(),
        context: BTreeMap::new(),
    };
    assert!(error.to_string().contains("available: none"));
}

#[test]
fn executable_not_found_includes_search_path() {
    let error = PipelineError::ExecutableNotFound {
        executable: "maya".into(),
        search_path: "/usr/bin:/opt/autodesk/bin".into(),
    };
    let message = error.to_string();
    assert!(message.contains("'maya' not found on your PATH"));
    assert!(message.contains("/opt/autodesk/bin"));
}

#[rstest]
#[case::configuration(PipelineError::configuration("host lacks 'ls'"), "host lacks 'ls'")]
#[case::plugin(PipelineError::plugin("publish-all", "nothing selected"), "publish-all")]
#[case::discovery(
    PipelineError::PluginDiscovery {
        source_path: PathBuf::from("/studio/plugins/broken.toml"),
        message: "expected a table".into(),
    },
    "broken.toml"
)]
#[case::not_found(
    PipelineError::NotFound {
        capability: Capability::Creator,
        name: "model".into(),
    },
    "creator"
)]
#[case::unsupported(
    PipelineError::Unsupported {
        host: "debug".into(),
        operation: "open_file".into(),
    },
    "open_file"
)]
fn error_message_includes_context(#[case] error: PipelineError, #[case] expected: &str) {
    let message = error.to_string();
    assert!(
        message.contains(expected),
        "expected '{expected}' in message: {message}"
    );
}

#[test]
fn io_error_exposes_source() {
    let error = PipelineError::io(
        "/projects/hero/work",
        std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
    );
    let source = std::error::Error::source(&error).expect("source should be present");
    assert!(source.to_string().contains("denied"));
    assert!(error.to_string().contains("/projects/hero/work"));
}
