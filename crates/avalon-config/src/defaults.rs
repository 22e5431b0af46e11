use crate::logging::LogFormat;
use crate::project::{NamedEntry, ProjectConfig, Templates};

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Schema identifier written into project configuration documents.
pub const CONFIG_SCHEMA: &str = "avalon-core:config-1.0";

/// Schema identifier written into project documents.
pub const PROJECT_SCHEMA: &str = "avalon-core:project-2.0";

/// File name of the project document stored at a project root.
pub const PROJECT_FILE_NAME: &str = ".project.toml";

/// Template used to derive the work directory of a task.
pub const DEFAULT_WORK_TEMPLATE: &str = "{root}/{project}/{silo}/{asset}/work/{task}";

/// Template used to derive the location of a published representation.
pub const DEFAULT_PUBLISH_TEMPLATE: &str =
    "{root}/{project}/{silo}/{asset}/publish/{subset}/v{version:0>3}/{subset}.{representation}";

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Project configuration used when no project file has been supplied.
///
/// Mirrors the stock template: a shell plus two DCC applications and the
/// model/render/animate task set.
pub fn default_project_config() -> ProjectConfig {
    ProjectConfig {
        schema: CONFIG_SCHEMA.to_owned(),
        apps: vec![
            NamedEntry::labelled("shell", "Shell"),
            NamedEntry::labelled("maya2016", "Autodesk Maya 2016"),
            NamedEntry::labelled("nuke10", "The Foundry Nuke 10.0"),
        ],
        tasks: vec![
            NamedEntry::new("model"),
            NamedEntry::new("render"),
            NamedEntry::new("animate"),
        ],
        template: Templates::default(),
        families: Vec::new(),
        groups: Vec::new(),
    }
}
