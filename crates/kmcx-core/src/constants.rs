pub const MAX_JOB_COUNT: usize = 100_000;

pub mod files {
    pub const INPUT_EXTENSION: &str = "kmc";
    pub const LOG_EXTENSION: &str = "log";
    pub const INPUT_MODE: u32 = 0o744;
    pub const SCRIPT_MODE: u32 = 0o755;
}

pub mod dirs {
    pub const KMCX: &str = "kmcx";
    pub const JOBS: &str = "jobs";
    pub const BUILD: &str = "build";
    pub const LOGS: &str = "logs";
}

pub mod scripts {
    pub const SUBMIT: &str = "kmcx_submit.sh";
    pub const JOB: &str = "kmcx_job.sh";
}

pub mod executables {
    pub const SIMULATOR: &str = "kmc-simulator";
    pub const SOLVER: &str = "kmc-solver";
    pub const VERSION_FLAG: &str = "-version";
}

pub mod progress {
    pub const SETUP_SHARE: u8 = 15;
    pub const JOBS_SHARE: u8 = 80;
    pub const FINAL_SHARE: u8 = 5;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_shares_sum_to_hundred() {
        assert_eq!(
            progress::SETUP_SHARE + progress::JOBS_SHARE + progress::FINAL_SHARE,
            100
        );
    }

    #[test]
    fn test_file_constants() {
        assert_eq!(files::INPUT_EXTENSION, "kmc");
        assert_eq!(files::INPUT_MODE, 0o744);
    }

    #[test]
    fn test_dir_constants() {
        assert_eq!(dirs::KMCX, "kmcx");
        assert_eq!(dirs::JOBS, "jobs");
    }
}
