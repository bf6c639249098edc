//! Ports for the two remote sessions a submission needs. The SSH adapters
//! live in [`crate::ssh`]; tests substitute in-memory fakes.

use crate::error::Result;
use crate::trust::HostKeyPolicy;
use async_trait::async_trait;
use kmcx_core::config::{AuthMethod, ClusterTarget};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[async_trait]
pub trait CommandSession: Send {
    async fn exec(&mut self, command: &str) -> Result<ExecOutput>;

    /// Absolute path of the login directory.
    async fn home_dir(&mut self) -> Result<String>;

    async fn close(&mut self);
}

#[async_trait]
pub trait TransferSession: Send {
    async fn exists(&mut self, path: &str) -> Result<bool>;

    async fn is_dir(&mut self, path: &str) -> Result<bool>;

    async fn create_dir(&mut self, path: &str) -> Result<()>;

    /// Creates or truncates `path` with `contents` and permission `mode`.
    async fn upload(&mut self, path: &str, contents: &[u8], mode: u32) -> Result<()>;

    async fn set_mode(&mut self, path: &str, mode: u32) -> Result<()>;

    async fn close(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardPrompt {
    pub text: String,
    pub echo: bool,
}

/// Answers keyboard-interactive challenges the stored password cannot.
pub trait InteractivePrompter: Send + Sync {
    fn respond(&self, name: &str, instructions: &str, prompts: &[KeyboardPrompt]) -> Option<Vec<String>>;
}

/// Every authentication method the user made available for one batch.
/// The server picks among what is offered.
#[derive(Clone, Default)]
pub struct Credentials {
    pub methods: Vec<AuthMethod>,
    pub password: Option<String>,
    pub identity_file: Option<PathBuf>,
    pub prompter: Option<Arc<dyn InteractivePrompter>>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("methods", &self.methods)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("identity_file", &self.identity_file)
            .field("prompter", &self.prompter.is_some())
            .finish()
    }
}

impl Credentials {
    pub fn for_target(target: &ClusterTarget) -> Self {
        Self {
            methods: target.auth.clone(),
            identity_file: target.identity_file.clone(),
            ..Self::default()
        }
    }

    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    pub fn with_prompter(mut self, prompter: Arc<dyn InteractivePrompter>) -> Self {
        self.prompter = Some(prompter);
        self
    }

    pub fn offers(&self, method: AuthMethod) -> bool {
        self.methods.contains(&method)
    }
}

#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect_command(
        &self,
        target: &ClusterTarget,
        credentials: &Credentials,
        trust: Arc<HostKeyPolicy>,
    ) -> Result<Box<dyn CommandSession>>;

    async fn connect_transfer(
        &self,
        target: &ClusterTarget,
        credentials: &Credentials,
        trust: Arc<HostKeyPolicy>,
    ) -> Result<Box<dyn TransferSession>>;
}
