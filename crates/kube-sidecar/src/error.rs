use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SidecarError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Validation error: {0}")]
    Validate(#[from] ValidateError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("Watch error: {0}")]
    Watch(#[from] WatchError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Failed to serve metrics on port {port}: {source}")]
    Serve {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Failed to initialise logging: {0}")]
    Logging(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config must be a YAML mapping")]
    NotAMapping,

    #[error("Missing {0}")]
    MissingField(&'static str),

    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Check syntax for Yaml and Json (Yaml != Json)")]
    ConflictingSyntaxChecks,

    #[error("Invalid CheckCommand '{command}': {reason}")]
    InvalidCommand { command: String, reason: String },

    #[error("Failed to read template file '{path}': {source}")]
    ReadTemplate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Template execution failed: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Template '{0}' rendered an empty directory")]
    EmptyDirectory(String),

    #[error("Invalid post-processing pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Error, Debug)]
pub enum ValidateError {
    #[error("Failed to write check file '{path}': {source}")]
    WriteCheckFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to run check command '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Check command '{program}' timed out after {seconds}s")]
    Timeout { program: String, seconds: u64 },

    #[error("Check command '{0}' was terminated by a signal")]
    Signalled(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove file '{path}': {source}")]
    RemoveFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Path has no parent directory: {0}")]
    NoParent(PathBuf),
}

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Failed to build Kubernetes client: {0}")]
    Client(String),

    #[error("Failed to read {kind} {namespace}/{name}: {source}")]
    Get {
        kind: String,
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("Failed to update {kind} {namespace}/{name}: {source}")]
    Update {
        kind: String,
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("Failed to create {kind} {namespace}/{name}: {source}")]
    Create {
        kind: String,
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },
}

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Event channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, SidecarError>;
