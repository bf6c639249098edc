use kmcx_core::task::{FatalError, UserMessage};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] kmcx_core::errors::ConfigError),

    #[error(transparent)]
    Domain(#[from] kmcx_core::errors::DomainError),

    #[error(transparent)]
    Submission(#[from] kmcx_client::SubmissionError),

    #[error(transparent)]
    Executor(#[from] kmcx_executor::ExecutorError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{}: {}", .0.header, .0.text)]
    Message(UserMessage),

    #[error("{}: {}", .0.context, .0.message)]
    Fatal(FatalError),

    #[error("Operation cancelled.")]
    Cancelled,
}

impl CliError {
    /// Process exit code. Fatal errors are distinguished from user errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Fatal(_) => 2,
            CliError::Cancelled => 130,
            _ => 1,
        }
    }
}
