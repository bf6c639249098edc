//! Decides whether the simulator executables in the job base directory
//! are usable, can be refreshed from the build directory, or need a build.

use super::checkpoint;
use super::command::RemoteCommand;
use super::paths::combine_remote_paths;
use super::version::ExeVersion;
use crate::error::{Result, SubmissionError};
use crate::session::{CommandSession, TransferSession};
use kmcx_core::constants::{executables, files};
use kmcx_core::task::TaskContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagingDecision {
    UpToDate,
    /// Executable names to copy from the build directory.
    CopyFromBuild { executables: Vec<String> },
    BuildRequired,
}

/// Versions reported by one executable in both candidate locations.
/// `None` means missing or not runnable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableVersions {
    pub name: String,
    pub base: Option<ExeVersion>,
    pub build: Option<ExeVersion>,
}

fn is_current(version: Option<ExeVersion>, required: ExeVersion) -> bool {
    version.is_some_and(|v| v >= required)
}

pub fn decide(found: &[ExecutableVersions], required: ExeVersion) -> StagingDecision {
    let stale: Vec<&ExecutableVersions> = found
        .iter()
        .filter(|p| !is_current(p.base, required))
        .collect();
    if stale.is_empty() {
        return StagingDecision::UpToDate;
    }
    if stale.iter().all(|p| is_current(p.build, required)) {
        return StagingDecision::CopyFromBuild {
            executables: stale.iter().map(|p| p.name.clone()).collect(),
        };
    }
    StagingDecision::BuildRequired
}

/// Runs `<path> -version`. Missing or failing executables yield `None`.
pub async fn query_version(
    transfer: &mut dyn TransferSession,
    commands: &mut dyn CommandSession,
    path: &str,
) -> Result<Option<ExeVersion>> {
    if !transfer.exists(path).await? {
        return Ok(None);
    }
    let cmd = RemoteCommand::executable(path)
        .arg(executables::VERSION_FLAG)
        .to_shell_string();
    let output = commands.exec(&cmd).await?;
    if !output.success() {
        tracing::debug!("{} -version exited with {}", path, output.exit_code);
        return Ok(None);
    }
    Ok(ExeVersion::parse(&output.stdout))
}

pub async fn inspect_executables(
    transfer: &mut dyn TransferSession,
    commands: &mut dyn CommandSession,
    names: &[&str],
    base_dir: &str,
    build_dir: &str,
    ctx: &TaskContext,
) -> Result<Vec<ExecutableVersions>> {
    let mut found = Vec::with_capacity(names.len());
    for name in names {
        let base = query_version(transfer, commands, &combine_remote_paths(base_dir, name)).await?;
        checkpoint(ctx)?;
        let build =
            query_version(transfer, commands, &combine_remote_paths(build_dir, name)).await?;
        checkpoint(ctx)?;
        tracing::debug!("Checked {}: base={:?} build={:?}", name, base, build);
        found.push(ExecutableVersions {
            name: name.to_string(),
            base,
            build,
        });
    }
    Ok(found)
}

/// Copies `names` from `build_dir` to `base_dir` and marks them executable.
pub async fn copy_from_build(
    commands: &mut dyn CommandSession,
    names: &[String],
    base_dir: &str,
    build_dir: &str,
    ctx: &TaskContext,
) -> Result<()> {
    let mode = format!("{:o}", files::SCRIPT_MODE);
    for name in names {
        checkpoint(ctx)?;
        let from = combine_remote_paths(build_dir, name);
        let to = combine_remote_paths(base_dir, name);
        let cmd = RemoteCommand::new("cp")
            .arg(&from)
            .arg(&to)
            .and(RemoteCommand::new("chmod").arg(&mode).arg(&to))
            .to_shell_string();
        let output = commands.exec(&cmd).await?;
        if !output.success() {
            return Err(SubmissionError::RemoteCommand {
                command: cmd,
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }
        tracing::info!("Staged {} from {}", name, build_dir);
    }
    Ok(())
}
