use crate::job::JobId;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error on path '{path}': {source}")]
    PathIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse snapshot data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to serialize TOML configuration: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("XDG Base Directory Error: {0}")]
    Xdg(#[from] xdg::BaseDirectoriesError),

    #[error("Invalid configuration: {0}")]
    General(String),

    #[error("Could not determine HOME directory.")]
    HomeDirectoryNotFound,

    #[error("Submission profile '{0}' is not defined in config.toml.")]
    ProfileNotFound(String),

    #[error("No submission profile selected. Please set 'active_profile' in your config or use the --profile flag.")]
    NoActiveProfile,

    #[error("Submission profile '{profile}' is missing the required field '{field}'.")]
    MissingProfileField { profile: String, field: &'static str },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Value {value} for '{field}' is outside the valid range [{min}, {max}].")]
    OutOfRange {
        field: &'static str,
        value: String,
        min: String,
        max: String,
    },

    #[error("Doping entry {0} does not exist.")]
    DopingIndex(usize),

    #[error("Job '{0}' not found in the job list.")]
    JobNotFound(JobId),

    #[error("The job list already holds {count} jobs; the maximum is {max}.")]
    CapacityReached { count: usize, max: usize },

    #[error("No job is selected.")]
    NoSelection,

    #[error("The job batch is empty.")]
    EmptyBatch,

    #[error("The job batch contains duplicate job IDs: {}", .0.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", "))]
    DuplicateJobIds(Vec<JobId>),

    #[error("Project state {0} is outside the known range 0-9.")]
    UnknownProjectState(u8),
}
