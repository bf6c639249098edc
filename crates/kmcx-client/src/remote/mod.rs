//! Submission of a job batch to a cluster over two SSH sessions: one runs
//! commands, the other transfers files.

pub mod command;
pub mod paths;
pub mod scripts;
pub mod staging;
pub mod version;

use crate::error::{Result, SubmissionError};
use crate::orchestrator::{Orchestrator, SubmissionReport, SubmittedJob};
use crate::session::{CommandSession, Credentials, SessionConnector, TransferSession};
use crate::ssh::SshConnector;
use crate::trust::HostKeyPolicy;
use command::RemoteCommand;
use kmcx_core::config::{ClusterTarget, RemoteLayout};
use kmcx_core::constants::{files, progress};
use kmcx_core::engine::{lock, EngineError, EngineSnapshot, SharedEngine};
use kmcx_core::job::JobConfiguration;
use kmcx_core::job_list::validate_batch;
use kmcx_core::task::{FatalError, TaskContext, TaskResult};
use paths::{
    combine_remote_paths, construct_remote_directory_list, job_directory_name, job_input_file_name,
    job_log_file_name, job_name, RemoteDirectoryPlan,
};
use staging::StagingDecision;
use std::sync::Arc;
use version::ExeVersion;

fn checkpoint(ctx: &TaskContext) -> Result<()> {
    if ctx.is_cancelled() {
        Err(SubmissionError::Cancelled)
    } else {
        Ok(())
    }
}

/// Creates a directory unless it exists. An existing non-directory entry
/// is an error.
async fn ensure_directory(transfer: &mut dyn TransferSession, path: &str) -> Result<()> {
    if transfer.exists(path).await? {
        if transfer.is_dir(path).await? {
            return Ok(());
        }
        return Err(SubmissionError::transfer(path, "exists and is not a directory"));
    }
    transfer.create_dir(path).await
}

fn engine_failure(operation: &str, code: kmcx_core::engine::StatusCode) -> EngineError {
    match code.check(operation) {
        Err(err) => err,
        Ok(()) => EngineError::Contract {
            operation: operation.to_string(),
            code,
        },
    }
}

/// Writes `job` into the engine and returns the serialized input text.
/// The engine lock is released before any network I/O.
fn render_input(job: &JobConfiguration, engine: &SharedEngine) -> Result<String> {
    let mut guard = lock(engine).map_err(SubmissionError::Engine)?;
    job.apply_data(&mut *guard)
        .map_err(|e| SubmissionError::from_engine(job.id(), e))?;
    guard
        .serialize_settings()
        .map_err(|code| SubmissionError::from_engine(job.id(), engine_failure("Serialize", code)))
}

fn final_snapshot(engine: &SharedEngine) -> Result<EngineSnapshot> {
    let guard = lock(engine).map_err(SubmissionError::Engine)?;
    guard
        .snapshot()
        .map_err(|code| SubmissionError::Engine(engine_failure("Snapshot", code)))
}

fn job_progress(done: usize, total: usize) -> u8 {
    let share = (usize::from(progress::JOBS_SHARE) * done) / total.max(1);
    progress::SETUP_SHARE + share.min(usize::from(progress::JOBS_SHARE)) as u8
}

pub struct RemoteSubmission {
    target: ClusterTarget,
    layout: RemoteLayout,
    credentials: Credentials,
    trust: Arc<HostKeyPolicy>,
    connector: Arc<dyn SessionConnector>,
    required_version: ExeVersion,
}

impl std::fmt::Debug for RemoteSubmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSubmission")
            .field("target", &self.target)
            .field("layout", &self.layout)
            .field("credentials", &self.credentials)
            .field("required_version", &self.required_version)
            .finish()
    }
}

impl RemoteSubmission {
    pub fn new(
        target: ClusterTarget,
        layout: RemoteLayout,
        credentials: Credentials,
        trust: Arc<HostKeyPolicy>,
    ) -> Self {
        Self {
            target,
            layout,
            credentials,
            trust,
            connector: Arc::new(SshConnector),
            required_version: ExeVersion::client(),
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn SessionConnector>) -> Self {
        self.connector = connector;
        self
    }

    /// Overrides the minimum executable version (defaults to this client's).
    pub fn with_required_version(mut self, version: ExeVersion) -> Self {
        self.required_version = version;
        self
    }

    pub fn target(&self) -> &ClusterTarget {
        &self.target
    }

    /// Job base and build directory chains below `home`.
    pub fn plan_directories(&self, home: &str) -> (RemoteDirectoryPlan, RemoteDirectoryPlan) {
        let base = construct_remote_directory_list(
            home,
            &self.target.workspace,
            &self.target.job_base_directory,
        );
        let build = construct_remote_directory_list(
            home,
            &self.target.workspace,
            &self.target.build_directory,
        );
        (base, build)
    }

    pub async fn run(
        &self,
        jobs: &[JobConfiguration],
        engine: &SharedEngine,
        ctx: &TaskContext,
    ) -> TaskResult<SubmissionReport> {
        match self.execute(jobs, engine, ctx).await {
            Ok(report) => {
                report.log();
                TaskResult::Snapshot(report)
            }
            Err(SubmissionError::Cancelled) => {
                tracing::warn!("Submission to {} cancelled", self.target.host);
                TaskResult::Cancelled
            }
            Err(err) => {
                tracing::error!("Submission to {} failed: {}", self.target.host, err);
                err.into_task_result()
            }
        }
    }

    async fn execute(
        &self,
        jobs: &[JobConfiguration],
        engine: &SharedEngine,
        ctx: &TaskContext,
    ) -> Result<SubmissionReport> {
        validate_batch(jobs)?;
        checkpoint(ctx)?;

        ctx.log(
            0,
            format!(
                "Connecting to {}@{}:{}",
                self.target.username, self.target.host, self.target.port
            ),
        );
        let mut commands = self
            .connector
            .connect_command(&self.target, &self.credentials, self.trust.clone())
            .await?;
        let mut transfer = match self
            .connector
            .connect_transfer(&self.target, &self.credentials, self.trust.clone())
            .await
        {
            Ok(transfer) => transfer,
            Err(err) => {
                commands.close().await;
                return Err(err);
            }
        };

        let result = self
            .drive(commands.as_mut(), transfer.as_mut(), jobs, engine, ctx)
            .await;

        transfer.close().await;
        commands.close().await;
        result
    }

    async fn drive(
        &self,
        commands: &mut dyn CommandSession,
        transfer: &mut dyn TransferSession,
        jobs: &[JobConfiguration],
        engine: &SharedEngine,
        ctx: &TaskContext,
    ) -> Result<SubmissionReport> {
        checkpoint(ctx)?;
        let home = commands.home_dir().await?;
        checkpoint(ctx)?;

        let (base_plan, build_plan) = self.plan_directories(&home);
        ctx.log(3, format!("Preparing {}", base_plan.target()));
        for dir in base_plan.iter().chain(build_plan.iter()) {
            ensure_directory(transfer, dir).await?;
            checkpoint(ctx)?;
        }
        let base = base_plan.target();
        let build = build_plan.target();

        ctx.log(6, "Checking simulator executables");
        let names = [
            self.layout.simulator_executable.as_str(),
            self.layout.solver_executable.as_str(),
        ];
        let found =
            staging::inspect_executables(transfer, commands, &names, base, build, ctx).await?;
        match staging::decide(&found, self.required_version) {
            StagingDecision::UpToDate => {
                tracing::info!("Executables in {} are up to date", base);
            }
            StagingDecision::CopyFromBuild { executables } => {
                ctx.log(9, format!("Copying {} from {}", executables.join(", "), build));
                staging::copy_from_build(commands, &executables, base, build, ctx).await?;
            }
            StagingDecision::BuildRequired => {
                return Err(SubmissionError::BuildRequired {
                    build_dir: build.to_string(),
                });
            }
        }

        ctx.log(12, "Uploading control scripts");
        scripts::stage_scripts(transfer, &self.layout, base, ctx).await?;
        ctx.report(progress::SETUP_SHARE, None);

        let total = jobs.len();
        let mut submitted = Vec::with_capacity(total);
        for (index, job) in jobs.iter().enumerate() {
            let outcome = self.submit_job(commands, transfer, job, engine, base, ctx).await;
            match outcome {
                Ok(entry) => submitted.push(entry),
                Err(err) => {
                    if !submitted.is_empty() {
                        tracing::warn!(
                            "{} of {} job(s) were already submitted and remain queued",
                            submitted.len(),
                            total
                        );
                    }
                    return Err(err);
                }
            }
            ctx.log(
                job_progress(index + 1, total),
                format!("Submitted job {} ({}/{})", job.id(), index + 1, total),
            );
        }

        let snapshot = final_snapshot(engine)?;
        ctx.log(100, "Batch submitted");
        Ok(SubmissionReport {
            submitted,
            snapshot,
        })
    }

    async fn submit_job(
        &self,
        commands: &mut dyn CommandSession,
        transfer: &mut dyn TransferSession,
        job: &JobConfiguration,
        engine: &SharedEngine,
        base: &str,
        ctx: &TaskContext,
    ) -> Result<SubmittedJob> {
        checkpoint(ctx)?;
        let id = job.id();
        let prefix = &self.target.job_name_prefix;
        let input = render_input(job, engine)?;
        checkpoint(ctx)?;

        let directory = combine_remote_paths(base, &job_directory_name(id));
        ensure_directory(transfer, &directory).await?;
        checkpoint(ctx)?;
        let input_path = combine_remote_paths(&directory, &job_input_file_name(prefix, id));
        let log_path = combine_remote_paths(&directory, &job_log_file_name(prefix, id));
        transfer
            .upload(&input_path, input.as_bytes(), files::INPUT_MODE)
            .await?;
        transfer.set_mode(&input_path, files::INPUT_MODE).await?;
        checkpoint(ctx)?;

        let cmd = RemoteCommand::new("sh")
            .arg(&combine_remote_paths(base, &self.layout.submit_script))
            .args([
                combine_remote_paths(base, &self.layout.job_script),
                combine_remote_paths(base, &self.layout.simulator_executable),
                directory.clone(),
                job_name(prefix, id),
                input_path.clone(),
                log_path,
            ])
            .to_shell_string();
        let output = commands.exec(&cmd).await?;
        if !output.success() {
            return Err(SubmissionError::RemoteCommand {
                command: cmd,
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }

        Ok(SubmittedJob {
            id,
            directory,
            input_path,
            scheduler_reply: output.stdout.trim().to_string(),
        })
    }
}

impl Orchestrator for RemoteSubmission {
    fn submit(
        &self,
        jobs: Vec<JobConfiguration>,
        engine: SharedEngine,
        ctx: &TaskContext,
    ) -> TaskResult<SubmissionReport> {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                return TaskResult::Fatal(FatalError::new(
                    "Job submission",
                    SubmissionError::Runtime(e).to_string(),
                ))
            }
        };
        runtime.block_on(self.run(&jobs, &engine, ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_progress_spans_setup_to_final_share() {
        assert_eq!(job_progress(0, 4), 15);
        assert_eq!(job_progress(1, 4), 35);
        assert_eq!(job_progress(4, 4), 95);
        assert_eq!(job_progress(1, 3), 41);
        assert_eq!(job_progress(3, 3), 95);
    }
}
