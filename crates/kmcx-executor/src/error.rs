use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("A background task (#{running}) is already running.")]
    Busy { running: u64 },

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
