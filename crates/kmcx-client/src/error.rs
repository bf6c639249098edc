use kmcx_core::engine::EngineError;
use kmcx_core::errors::{ConfigError, DomainError};
use kmcx_core::job::JobId;
use kmcx_core::task::{FatalError, MessageCode, TaskResult, UserMessage};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error(transparent)]
    Precondition(#[from] DomainError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Could not connect to {host}: {message}")]
    Connection { host: String, message: String },

    #[error("Authentication as '{user}' on {host} failed.")]
    Authentication { user: String, host: String },

    #[error("The host key of {host} ({fingerprint}) was not trusted.")]
    HostRejected { host: String, fingerprint: String },

    #[error("File transfer failed for '{path}': {message}")]
    Transfer { path: String, message: String },

    #[error("Remote command '{command}' exited with code {exit_code}: {stderr}")]
    RemoteCommand {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Job {job} could not be prepared: {message}")]
    InputValidation { job: JobId, message: String },

    #[error("No up-to-date simulator executables were found in '{build_dir}'. Build them on the cluster first.")]
    BuildRequired { build_dir: String },

    #[error("Local submission is not implemented yet.")]
    NotImplemented,

    #[error("Engine contract violation: {0}")]
    Engine(EngineError),

    #[error("Submission was cancelled.")]
    Cancelled,

    #[error("Failed to start the network runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SubmissionError>;

impl SubmissionError {
    pub fn transfer(path: &str, err: impl std::fmt::Display) -> Self {
        SubmissionError::Transfer {
            path: path.to_string(),
            message: err.to_string(),
        }
    }

    pub fn connection(host: &str, err: impl std::fmt::Display) -> Self {
        SubmissionError::Connection {
            host: host.to_string(),
            message: err.to_string(),
        }
    }

    /// Engine failures while rendering a job's input: a rejected value is the
    /// user's to fix, anything else is fatal.
    pub fn from_engine(job: JobId, err: EngineError) -> Self {
        if err.is_fatal() {
            SubmissionError::Engine(err)
        } else {
            SubmissionError::InputValidation {
                job,
                message: err.to_string(),
            }
        }
    }

    pub fn into_task_result<T>(self) -> TaskResult<T> {
        let text = self.to_string();
        let msg = match self {
            SubmissionError::Precondition(err) => UserMessage::from(err),
            SubmissionError::Config(err) => UserMessage::from(err),
            SubmissionError::Connection { .. } => {
                UserMessage::new(MessageCode::Connection, "Connection failed", text).retryable()
            }
            SubmissionError::Authentication { .. } => {
                UserMessage::new(MessageCode::Authentication, "Authentication failed", text)
                    .retryable()
            }
            SubmissionError::HostRejected { .. } => {
                UserMessage::new(MessageCode::HostRejected, "Host not trusted", text)
            }
            SubmissionError::Transfer { .. } => {
                UserMessage::new(MessageCode::Transfer, "File transfer failed", text).retryable()
            }
            SubmissionError::RemoteCommand { .. } => {
                UserMessage::new(MessageCode::RemoteCommand, "Remote command failed", text)
            }
            SubmissionError::InputValidation { .. } => {
                UserMessage::new(MessageCode::InvalidInput, "Invalid job settings", text)
            }
            SubmissionError::BuildRequired { .. } => {
                UserMessage::new(MessageCode::BuildRequired, "Remote build required", text)
            }
            SubmissionError::NotImplemented => {
                UserMessage::new(MessageCode::NotImplemented, "Not implemented", text)
            }
            SubmissionError::Cancelled => return TaskResult::Cancelled,
            SubmissionError::Engine(_) | SubmissionError::Runtime(_) => {
                return TaskResult::Fatal(FatalError::new("Job submission", text))
            }
        };
        TaskResult::UserMessage(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kmcx_core::engine::StatusCode;

    #[test]
    fn test_categories() {
        let result: TaskResult<()> = SubmissionError::connection("h", "refused").into_task_result();
        match result {
            TaskResult::UserMessage(msg) => {
                assert_eq!(msg.code, MessageCode::Connection);
                assert!(msg.retryable);
            }
            other => panic!("unexpected: {other:?}"),
        }

        let result: TaskResult<()> =
            SubmissionError::Precondition(DomainError::EmptyBatch).into_task_result();
        assert!(matches!(
            result,
            TaskResult::UserMessage(UserMessage {
                code: MessageCode::EmptyBatch,
                ..
            })
        ));

        let result: TaskResult<()> = SubmissionError::Cancelled.into_task_result();
        assert_eq!(result, TaskResult::Cancelled);
    }

    #[test]
    fn test_engine_errors_split_by_severity() {
        let job = JobId::new(3).unwrap();
        let rejected = SubmissionError::from_engine(
            job,
            StatusCode::InvalidInput.check("MainMCSP").unwrap_err(),
        );
        assert!(matches!(rejected, SubmissionError::InputValidation { .. }));

        let broken = SubmissionError::from_engine(
            job,
            StatusCode::ObjectNotReady.check("Serialize").unwrap_err(),
        );
        let result: TaskResult<()> = broken.into_task_result();
        assert!(matches!(result, TaskResult::Fatal(_)));
    }
}
