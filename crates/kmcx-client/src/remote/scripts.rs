use super::checkpoint;
use super::paths::combine_remote_paths;
use crate::error::Result;
use crate::session::TransferSession;
use kmcx_core::config::RemoteLayout;
use kmcx_core::constants::files;
use kmcx_core::task::TaskContext;

pub const SUBMIT_SCRIPT: &str = include_str!("../../scripts/kmcx_submit.sh");
pub const JOB_SCRIPT: &str = include_str!("../../scripts/kmcx_job.sh");

/// Uploads both control scripts into `base_dir` and marks them executable.
pub async fn stage_scripts(
    transfer: &mut dyn TransferSession,
    layout: &RemoteLayout,
    base_dir: &str,
    ctx: &TaskContext,
) -> Result<()> {
    let scripts = [
        (&layout.submit_script, SUBMIT_SCRIPT),
        (&layout.job_script, JOB_SCRIPT),
    ];
    for (name, contents) in scripts {
        checkpoint(ctx)?;
        let path = combine_remote_paths(base_dir, name);
        transfer
            .upload(&path, contents.as_bytes(), files::SCRIPT_MODE)
            .await?;
        transfer.set_mode(&path, files::SCRIPT_MODE).await?;
        checkpoint(ctx)?;
        tracing::debug!("Staged control script {}", path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripts_are_posix_shell() {
        assert!(SUBMIT_SCRIPT.starts_with("#!/bin/sh"));
        assert!(JOB_SCRIPT.starts_with("#!/bin/sh"));
        assert!(SUBMIT_SCRIPT.contains("\"$#\" -ne 6"));
    }
}
