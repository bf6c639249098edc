use super::load;
use crate::cli::SubmitArgs;
use crate::error::CliError;
use crate::prompt::{self, TerminalPrompter, TerminalTrustPrompt};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use kmcx_client::{
    orchestrator_for, AcceptAll, Credentials, HostKeyPolicy, ProfileStore, SubmissionReport,
    TrustPrompt,
};
use kmcx_core::config::{AuthMethod, ExecutionMode, SubmissionProfile};
use kmcx_core::engine::{lock, shared, EngineError, OfflineEngine, SharedEngine};
use kmcx_core::job::load_batch;
use kmcx_core::project::Project;
use kmcx_core::stages::Stage;
use kmcx_core::task::{FatalError, Progress, TaskResult};
use kmcx_executor::TaskExecutor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const PASSWORD_ENV: &str = "KMCX_SSH_PASSWORD";
const POLL_INTERVAL: Duration = Duration::from_millis(20);

struct SubmitState {
    bar: ProgressBar,
    outcome: Option<TaskResult<SubmissionReport>>,
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(100);
    match ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
    {
        Ok(style) => bar.set_style(style.progress_chars("#>-")),
        Err(e) => tracing::debug!("Falling back to the default progress style: {}", e),
    }
    bar
}

fn credentials(name: &str, profile: &SubmissionProfile) -> Result<Credentials, CliError> {
    if profile.mode != ExecutionMode::Cluster {
        return Ok(Credentials::default());
    }
    let target = profile.cluster_target(name)?;
    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) => Some(password),
        Err(_) if target.auth.contains(&AuthMethod::Password) => {
            prompt::ask_password(&target.username, &target.host)
        }
        Err(_) => None,
    };
    Ok(Credentials::for_target(&target)
        .with_password(password)
        .with_prompter(Arc::new(TerminalPrompter)))
}

fn load_project(engine: &SharedEngine, max_job_count: usize) -> Result<Project, CliError> {
    let snapshot = {
        let guard = lock(engine).map_err(|e| CliError::Fatal(FatalError::new("Engine", e.to_string())))?;
        guard.snapshot().map_err(|code| {
            let err = EngineError::Contract {
                operation: "Snapshot".to_string(),
                code,
            };
            CliError::Fatal(FatalError::new("Engine", err.to_string()))
        })?
    };
    let mut project = Project::new(max_job_count);
    project.load(&snapshot)?;
    Ok(project)
}

fn print_report(profile: &str, report: &SubmissionReport) {
    println!(
        "{} Submitted {} job(s) via profile '{}'",
        "OK".green().bold(),
        report.submitted.len(),
        profile.cyan()
    );
    for job in &report.submitted {
        let reply = if job.scheduler_reply.is_empty() {
            String::new()
        } else {
            format!(" [{}]", job.scheduler_reply)
        };
        println!("  job {} -> {}{}", job.id.to_string().bold(), job.directory, reply.dimmed());
    }
}

pub fn handle_submit(args: SubmitArgs, requested: Option<&str>) -> Result<(), CliError> {
    let loaded = load()?;
    let (name, profile) = loaded.config.profile(requested)?;
    let batch = load_batch(&args.batch)?;

    let engine = shared(OfflineEngine::prepared(Stage::ALL.len()));
    let mut project = load_project(&engine, loaded.config.max_job_count)?;
    project.jobs_mut().restore(batch.jobs)?;
    let jobs = project.jobs().to_batch();
    tracing::info!(
        "Submitting {} job(s) from {} via profile '{}' ({})",
        jobs.len(),
        args.batch.display(),
        name,
        profile.mode
    );

    let credentials = credentials(name, profile)?;
    let prompt: Arc<dyn TrustPrompt> = if args.accept_new_host {
        Arc::new(AcceptAll)
    } else {
        Arc::new(TerminalTrustPrompt)
    };
    let trust = Arc::new(HostKeyPolicy::new(
        name,
        profile.host_fingerprint.clone(),
        prompt,
        Some(Arc::new(ProfileStore::new(loaded.path.clone()))),
    ));
    let orchestrator = orchestrator_for(name, profile, &loaded.config.remote, credentials, trust)?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        tracing::warn!("Could not install the Ctrl-C handler: {}", e);
    }

    let mut state = SubmitState {
        bar: progress_bar(),
        outcome: None,
    };
    let mut executor: TaskExecutor<SubmitState, SubmissionReport> = TaskExecutor::new();
    let work_engine = engine.clone();
    executor.run(
        move |ctx| orchestrator.submit(jobs, work_engine, ctx),
        |state: &mut SubmitState, update: &Progress| {
            state.bar.set_position(u64::from(update.percent));
            if let Some(log) = &update.log {
                state.bar.set_message(log.clone());
            }
        },
        |state: &mut SubmitState, result| state.outcome = Some(result),
    )?;

    let mut cancel_sent = false;
    while executor.is_busy() {
        if executor.pump(&mut state) {
            break;
        }
        if !cancel_sent && interrupted.load(Ordering::SeqCst) {
            executor.cancel();
            cancel_sent = true;
            state.bar.set_message("Cancelling...");
        }
        thread::sleep(POLL_INTERVAL);
    }
    state.bar.finish_and_clear();

    finish(name, state.outcome.take())
}

/// Turns the task outcome into the command result. The worker has already
/// logged the report.
fn finish(profile: &str, outcome: Option<TaskResult<SubmissionReport>>) -> Result<(), CliError> {
    match outcome {
        Some(TaskResult::Snapshot(report)) => {
            print_report(profile, &report);
            Ok(())
        }
        Some(TaskResult::UserMessage(msg)) => Err(CliError::Message(msg)),
        Some(TaskResult::Cancelled) => Err(CliError::Cancelled),
        Some(TaskResult::Fatal(err)) => Err(CliError::Fatal(err)),
        None => Err(CliError::Fatal(FatalError::new(
            "Job submission",
            "the background task ended without a result",
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kmcx_client::SubmittedJob;
    use kmcx_core::engine::EngineSnapshot;
    use kmcx_core::job::JobId;
    use std::io;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn report() -> SubmissionReport {
        SubmissionReport {
            submitted: vec![SubmittedJob {
                id: JobId::FIRST,
                directory: "/home/alice/jobs/0001".to_string(),
                input_path: "/home/alice/jobs/0001/job_0001.kmc".to_string(),
                scheduler_reply: "Submitted batch job 42".to_string(),
            }],
            snapshot: EngineSnapshot::default(),
        }
    }

    #[test]
    fn test_finished_report_is_not_logged_again() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let result = tracing::subscriber::with_default(subscriber, || {
            finish("cluster", Some(TaskResult::Snapshot(report())))
        });

        assert!(result.is_ok());
        let logged = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(!logged.contains("Submitted 1 job(s)"), "{}", logged);
    }

    #[test]
    fn test_cancelled_outcome_maps_to_cancelled() {
        assert!(matches!(
            finish("cluster", Some(TaskResult::Cancelled)),
            Err(CliError::Cancelled)
        ));
    }

    #[test]
    fn test_missing_outcome_is_fatal() {
        assert!(matches!(finish("cluster", None), Err(CliError::Fatal(_))));
    }
}
