use crate::error::SubmissionError;
use crate::orchestrator::{Orchestrator, SubmissionReport};
use kmcx_core::engine::SharedEngine;
use kmcx_core::job::JobConfiguration;
use kmcx_core::job_list::validate_batch;
use kmcx_core::task::{TaskContext, TaskResult};

/// Runs batches on this machine. Only the precondition check exists so far.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSubmission;

impl LocalSubmission {
    pub fn new() -> Self {
        Self
    }
}

impl Orchestrator for LocalSubmission {
    fn submit(
        &self,
        jobs: Vec<JobConfiguration>,
        _engine: SharedEngine,
        ctx: &TaskContext,
    ) -> TaskResult<SubmissionReport> {
        if let Err(err) = validate_batch(&jobs) {
            return SubmissionError::from(err).into_task_result();
        }
        if ctx.is_cancelled() {
            return TaskResult::Cancelled;
        }
        tracing::warn!("Local submission requested for {} job(s)", jobs.len());
        SubmissionError::NotImplemented.into_task_result()
    }
}
