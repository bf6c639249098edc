use crate::error::SubmissionError;
use crate::local::LocalSubmission;
use crate::remote::RemoteSubmission;
use crate::session::Credentials;
use crate::trust::HostKeyPolicy;
use kmcx_core::config::{ExecutionMode, RemoteLayout, SubmissionProfile};
use kmcx_core::engine::{EngineSnapshot, SharedEngine};
use kmcx_core::job::{JobConfiguration, JobId};
use kmcx_core::task::{TaskContext, TaskResult};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedJob {
    pub id: JobId,
    pub directory: String,
    pub input_path: String,
    /// Whatever the submit script printed, usually the scheduler job id.
    pub scheduler_reply: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReport {
    pub submitted: Vec<SubmittedJob>,
    pub snapshot: EngineSnapshot,
}

impl SubmissionReport {
    pub fn log(&self) {
        tracing::info!("Submitted {} job(s)", self.submitted.len());
        for job in &self.submitted {
            tracing::info!(
                "  job {} -> {} [{}]",
                job.id,
                job.directory,
                job.scheduler_reply
            );
        }
    }
}

/// Executes one batch of jobs somewhere. Runs on the worker thread.
pub trait Orchestrator: Send + Sync {
    fn submit(
        &self,
        jobs: Vec<JobConfiguration>,
        engine: SharedEngine,
        ctx: &TaskContext,
    ) -> TaskResult<SubmissionReport>;
}

/// Picks the orchestrator matching the profile's execution mode.
pub fn orchestrator_for(
    name: &str,
    profile: &SubmissionProfile,
    layout: &RemoteLayout,
    credentials: Credentials,
    trust: Arc<HostKeyPolicy>,
) -> Result<Box<dyn Orchestrator>, SubmissionError> {
    match profile.mode {
        ExecutionMode::Local => Ok(Box::new(LocalSubmission::new())),
        ExecutionMode::Cluster => {
            let target = profile.cluster_target(name)?;
            Ok(Box::new(RemoteSubmission::new(
                target,
                layout.clone(),
                credentials,
                trust,
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::AcceptAll;
    use kmcx_core::config::AuthMethod;

    fn policy() -> Arc<HostKeyPolicy> {
        Arc::new(HostKeyPolicy::new("p", None, Arc::new(AcceptAll), None))
    }

    #[test]
    fn test_cluster_profile_requires_fields() {
        let profile = SubmissionProfile {
            mode: ExecutionMode::Cluster,
            ..SubmissionProfile::default()
        };
        let err = orchestrator_for(
            "p",
            &profile,
            &RemoteLayout::default(),
            Credentials::default(),
            policy(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, SubmissionError::Config(_)));
    }

    #[test]
    fn test_local_profile_needs_nothing() {
        let profile = SubmissionProfile::default();
        assert!(orchestrator_for(
            "p",
            &profile,
            &RemoteLayout::default(),
            Credentials::default(),
            policy(),
        )
        .is_ok());

        let profile = SubmissionProfile {
            mode: ExecutionMode::Cluster,
            host: Some("h".into()),
            username: Some("u".into()),
            job_name_prefix: Some("sim".into()),
            auth: vec![AuthMethod::Password],
            ..SubmissionProfile::default()
        };
        assert!(orchestrator_for(
            "p",
            &profile,
            &RemoteLayout::default(),
            Credentials::default(),
            policy(),
        )
        .is_ok());
    }
}
