pub mod error;
pub mod local;
pub mod orchestrator;
pub mod remote;
pub mod session;
pub mod ssh;
pub mod trust;

pub use error::{Result, SubmissionError};
pub use local::LocalSubmission;
pub use orchestrator::{orchestrator_for, Orchestrator, SubmissionReport, SubmittedJob};
pub use remote::RemoteSubmission;
pub use session::{Credentials, InteractivePrompter, KeyboardPrompt};
pub use trust::{AcceptAll, FingerprintStore, HostKeyPolicy, ProfileStore, TrustDecision, TrustPrompt};
