//! Result and progress types shared by everything that runs off the
//! interactive thread.

use crate::engine::EngineError;
use crate::errors::{ConfigError, DomainError};
use serde::Serialize;
use std::fmt;
use std::sync::mpsc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageCode {
    InvalidInput,
    CapacityReached,
    NoSelection,
    EmptyBatch,
    DuplicateJobIds,
    MissingProfileField,
    Configuration,
    Connection,
    Authentication,
    HostRejected,
    Transfer,
    RemoteCommand,
    BuildRequired,
    NotImplemented,
}

/// A recoverable failure meant for the person at the keyboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserMessage {
    pub header: String,
    pub text: String,
    pub code: MessageCode,
    pub retryable: bool,
}

impl UserMessage {
    pub fn new(code: MessageCode, header: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            text: text.into(),
            code,
            retryable: false,
        }
    }

    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

impl fmt::Display for UserMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.header, self.text)
    }
}

impl From<DomainError> for UserMessage {
    fn from(err: DomainError) -> Self {
        let code = match &err {
            DomainError::CapacityReached { .. } => MessageCode::CapacityReached,
            DomainError::NoSelection | DomainError::JobNotFound(_) => MessageCode::NoSelection,
            DomainError::EmptyBatch => MessageCode::EmptyBatch,
            DomainError::DuplicateJobIds(_) => MessageCode::DuplicateJobIds,
            DomainError::OutOfRange { .. }
            | DomainError::DopingIndex(_)
            | DomainError::UnknownProjectState(_) => MessageCode::InvalidInput,
        };
        UserMessage::new(code, "Invalid job list operation", err.to_string())
    }
}

impl From<ConfigError> for UserMessage {
    fn from(err: ConfigError) -> Self {
        let code = match &err {
            ConfigError::MissingProfileField { .. } => MessageCode::MissingProfileField,
            _ => MessageCode::Configuration,
        };
        UserMessage::new(code, "Configuration problem", err.to_string())
    }
}

/// An unrecoverable failure: the engine or a worker broke its contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{context}: {message}")]
pub struct FatalError {
    pub context: String,
    pub message: String,
}

impl FatalError {
    pub fn new(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskResult<T> {
    Snapshot(T),
    UserMessage(UserMessage),
    Cancelled,
    Fatal(FatalError),
}

impl<T> TaskResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskResult::Snapshot(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> TaskResult<U> {
        match self {
            TaskResult::Snapshot(value) => TaskResult::Snapshot(f(value)),
            TaskResult::UserMessage(msg) => TaskResult::UserMessage(msg),
            TaskResult::Cancelled => TaskResult::Cancelled,
            TaskResult::Fatal(err) => TaskResult::Fatal(err),
        }
    }

    /// Classifies an engine failure. `context` prefixes both outcomes.
    pub fn from_engine_error(context: &str, err: EngineError) -> Self {
        if err.is_fatal() {
            TaskResult::Fatal(FatalError::new(context, err.to_string()))
        } else {
            TaskResult::UserMessage(UserMessage::new(
                MessageCode::InvalidInput,
                context,
                err.to_string(),
            ))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub percent: u8,
    pub log: Option<String>,
}

/// Capabilities handed to background work: a cancellation flag to poll
/// and a sink for progress updates.
#[derive(Debug, Clone)]
pub struct TaskContext {
    cancel: CancellationToken,
    progress: mpsc::Sender<Progress>,
}

impl TaskContext {
    pub fn new(cancel: CancellationToken, progress: mpsc::Sender<Progress>) -> Self {
        Self { cancel, progress }
    }

    /// Context not attached to an executor. The receiver sees every update.
    pub fn detached() -> (Self, mpsc::Receiver<Progress>) {
        let (tx, rx) = mpsc::channel();
        (Self::new(CancellationToken::new(), tx), rx)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn report(&self, percent: u8, log: Option<String>) {
        // The receiver may be gone once the caller stopped listening.
        let _ = self.progress.send(Progress {
            percent: percent.min(100),
            log,
        });
    }

    pub fn log(&self, percent: u8, text: impl Into<String>) {
        let text = text.into();
        tracing::info!("{}", text);
        self.report(percent, Some(text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobId;

    #[test]
    fn test_domain_error_codes() {
        let msg: UserMessage = DomainError::CapacityReached { count: 3, max: 3 }.into();
        assert_eq!(msg.code, MessageCode::CapacityReached);
        assert!(!msg.retryable);

        let msg: UserMessage = DomainError::DuplicateJobIds(vec![JobId::new(2).unwrap()]).into();
        assert_eq!(msg.code, MessageCode::DuplicateJobIds);
        assert!(msg.text.contains('2'));
    }

    #[test]
    fn test_engine_error_classification() {
        let user: TaskResult<()> = TaskResult::from_engine_error(
            "Apply",
            EngineError::InvalidInput {
                field: "Temperature".into(),
            },
        );
        assert!(matches!(user, TaskResult::UserMessage(_)));

        let fatal: TaskResult<()> = TaskResult::from_engine_error("Apply", EngineError::Poisoned);
        assert!(matches!(fatal, TaskResult::Fatal(_)));
    }

    #[test]
    fn test_progress_is_clamped_and_cancellation_visible() {
        let (ctx, rx) = TaskContext::detached();
        ctx.report(140, None);
        ctx.log(20, "step");
        assert_eq!(rx.recv().unwrap().percent, 100);
        assert_eq!(rx.recv().unwrap().log.as_deref(), Some("step"));

        assert!(!ctx.is_cancelled());
        ctx.cancel_token().cancel();
        assert!(ctx.clone().is_cancelled());
    }
}
