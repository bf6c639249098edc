use kmcx_core::config::{
    save_config_to, AuthMethod, Config, ExecutionMode, SubmissionProfile, CONFIG_FILE,
};
use kmcx_core::job::{JobBatch, JobConfiguration};
use std::fs;
use std::path::PathBuf;

/// Temporary home for a test: a config directory holding `config.toml`
/// with a `cluster` and a `local` profile.
pub struct TestContext {
    pub _temp_dir: tempfile::TempDir,
    pub test_root: PathBuf,
    pub config_path: PathBuf,
    pub cache_dir: PathBuf,
    pub config: Config,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_active_profile("cluster")
    }

    pub fn with_active_profile(active: &str) -> Self {
        let temp_dir = tempfile::Builder::new()
            .prefix("kmcx-test-")
            .tempdir()
            .expect("Failed to create temp dir");
        let test_root = temp_dir.path().to_path_buf();

        let config_dir = test_root.join("config").join("kmcx");
        let cache_dir = test_root.join("cache");
        fs::create_dir_all(&config_dir).expect("Failed to create config dir");
        fs::create_dir_all(&cache_dir).expect("Failed to create cache dir");

        let mut config = Config {
            active_profile: Some(active.to_string()),
            ..Config::default()
        };
        config
            .profiles
            .insert("cluster".to_string(), Self::cluster_profile());
        config
            .profiles
            .insert("local".to_string(), SubmissionProfile::default());

        let config_path = config_dir.join(CONFIG_FILE);
        save_config_to(&config, &config_path).expect("Failed to write temp config");

        Self {
            _temp_dir: temp_dir,
            test_root,
            config_path,
            cache_dir,
            config,
        }
    }

    pub fn cluster_profile() -> SubmissionProfile {
        SubmissionProfile {
            mode: ExecutionMode::Cluster,
            host: Some("cluster.example.org".to_string()),
            port: 2222,
            username: Some("alice".to_string()),
            job_name_prefix: Some("sim".to_string()),
            workspace: "projects/yttria".to_string(),
            auth: vec![AuthMethod::Password],
            ..SubmissionProfile::default()
        }
    }

    /// Rewrites `config.toml` after the test changed `self.config`.
    pub fn save(&self) {
        save_config_to(&self.config, &self.config_path).expect("Failed to rewrite temp config");
    }

    /// Writes a TOML job batch file and returns its path.
    pub fn write_jobs(&self, name: &str, jobs: &[JobConfiguration]) -> PathBuf {
        let path = self.test_root.join(name);
        let batch = JobBatch {
            jobs: jobs.to_vec(),
        };
        let content = batch.to_toml_string().expect("Failed to serialize jobs");
        fs::write(&path, content).expect("Failed to write job file");
        path
    }
}

pub fn job(id: u32) -> JobConfiguration {
    let mut job = JobConfiguration::draft();
    job.set_id(id).expect("fixture job id out of range");
    job
}

pub fn job_batch(count: u32) -> Vec<JobConfiguration> {
    (1..=count).map(job).collect()
}
