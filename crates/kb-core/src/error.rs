use crate::resource::Gvk;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KbError {
    #[error("unable to decode project file: {0}")]
    Decode(String),

    #[error("unknown project version '{0}'")]
    UnknownVersion(String),

    #[error("project version {version} does not support the {field} field")]
    UnsupportedField { version: String, field: String },

    #[error("plugin key '{0}' not found in project file")]
    PluginKeyNotFound(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(Gvk),

    #[error("resource already exists: {0}")]
    DuplicateResource(Gvk),

    #[error("invalid resource: {0}")]
    InvalidResource(String),

    #[error("invalid plugin key '{key}': {reason}")]
    InvalidPluginKey { key: String, reason: String },

    #[error("no plugin matches '{0}'")]
    UnknownPlugin(String),

    #[error("plugin '{plugin}' does not support project version {version}")]
    UnsupportedProjectVersion { plugin: String, version: String },

    #[error("unable to save project file: {0}")]
    Save(String),

    #[error("scaffolding failed: {0}")]
    Scaffold(String),

    #[error("not in a git repository")]
    NotAGitRepository,

    #[error("working directory has uncommitted changes; commit or stash them before updating")]
    DirtyWorkingTree,

    #[error("branch '{0}' does not exist locally; run 'git branch -a' to see available branches")]
    BranchNotFound(String),

    #[error("invalid semantic version '{0}': expected vX.Y.Z (e.g. v4.5.0)")]
    InvalidVersion(String),

    #[error("invalid update options: {0}")]
    InvalidOptions(String),

    #[error("no generator version recorded in the project file; use --from-version to set it")]
    MissingCliVersion,

    #[error("binary for version {0} is not published; check the available releases")]
    BinaryNotPublished(String),

    #[error("unexpected response {status} when checking binary availability for version {version}")]
    UnexpectedResponse { status: u16, version: String },

    #[error("download failed: {0}")]
    Download(String),

    #[error("required tool '{0}' not found on PATH")]
    ToolNotFound(String),

    #[error("command `{command}` failed: {reason}")]
    CommandFailed { command: String, reason: String },

    #[error("{step} failed")]
    Step {
        step: crate::update::UpdateStep,
        #[source]
        source: Box<KbError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl KbError {
    pub(crate) fn unsupported(version: impl ToString, field: &str) -> Self {
        KbError::UnsupportedField {
            version: version.to_string(),
            field: field.to_string(),
        }
    }

    /// True when the schema lacks the requested capability, as opposed to the
    /// value being missing or malformed.
    pub fn is_unsupported_field(&self) -> bool {
        matches!(self, KbError::UnsupportedField { .. })
    }

    /// True for malformed or unrecognised project documents.
    pub fn is_decode(&self) -> bool {
        matches!(self, KbError::Decode(_) | KbError::UnknownVersion(_))
    }
}

pub type Result<T> = std::result::Result<T, KbError>;
