use crate::constants::{dirs, executables, scripts, MAX_JOB_COUNT};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.toml";
pub const DEFAULT_SSH_PORT: u16 = 22;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u64,
}

fn default_max_files() -> usize {
    10
}

fn default_max_age_days() -> u64 {
    7
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            max_age_days: default_max_age_days(),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Local,
    Cluster,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Local => write!(f, "local"),
            ExecutionMode::Cluster => write!(f, "cluster"),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMethod {
    PublicKey,
    Password,
    KeyboardInteractive,
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::PublicKey => write!(f, "public-key"),
            AuthMethod::Password => write!(f, "password"),
            AuthMethod::KeyboardInteractive => write!(f, "keyboard-interactive"),
        }
    }
}

/// Connection and target data for one place jobs can be sent to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmissionProfile {
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_name_prefix: Option<String>,
    #[serde(default)]
    pub workspace: String,
    #[serde(default = "default_job_base_directory")]
    pub job_base_directory: String,
    #[serde(default = "default_build_directory")]
    pub build_directory: String,
    #[serde(default = "default_auth_methods")]
    pub auth: Vec<AuthMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_fingerprint: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

fn default_job_base_directory() -> String {
    format!("{}/{}", dirs::KMCX, dirs::JOBS)
}

fn default_build_directory() -> String {
    format!("{}/{}", dirs::KMCX, dirs::BUILD)
}

fn default_auth_methods() -> Vec<AuthMethod> {
    vec![
        AuthMethod::PublicKey,
        AuthMethod::Password,
        AuthMethod::KeyboardInteractive,
    ]
}

impl Default for SubmissionProfile {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            host: None,
            port: DEFAULT_SSH_PORT,
            username: None,
            job_name_prefix: None,
            workspace: String::new(),
            job_base_directory: default_job_base_directory(),
            build_directory: default_build_directory(),
            auth: default_auth_methods(),
            identity_file: None,
            host_fingerprint: None,
        }
    }
}

/// A cluster profile with every field the remote orchestrator needs resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterTarget {
    pub profile_name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub job_name_prefix: String,
    pub workspace: String,
    pub job_base_directory: String,
    pub build_directory: String,
    pub auth: Vec<AuthMethod>,
    pub identity_file: Option<PathBuf>,
    pub host_fingerprint: Option<String>,
}

fn required(
    value: &Option<String>,
    profile: &str,
    field: &'static str,
) -> Result<String, ConfigError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ConfigError::MissingProfileField {
            profile: profile.to_string(),
            field,
        }),
    }
}

impl SubmissionProfile {
    pub fn cluster_target(&self, profile_name: &str) -> Result<ClusterTarget, ConfigError> {
        let host = required(&self.host, profile_name, "host")?;
        let username = required(&self.username, profile_name, "username")?;
        let job_name_prefix = required(&self.job_name_prefix, profile_name, "job_name_prefix")?;
        if self.auth.is_empty() {
            return Err(ConfigError::MissingProfileField {
                profile: profile_name.to_string(),
                field: "auth",
            });
        }

        let identity_file = match &self.identity_file {
            Some(path) => {
                let raw = path.to_string_lossy();
                let expanded = shellexpand::tilde(&raw);
                Some(PathBuf::from(expanded.as_ref()))
            }
            None => None,
        };

        Ok(ClusterTarget {
            profile_name: profile_name.to_string(),
            host,
            port: self.port,
            username,
            job_name_prefix,
            workspace: self.workspace.trim().to_string(),
            job_base_directory: self.job_base_directory.trim().to_string(),
            build_directory: self.build_directory.trim().to_string(),
            auth: self.auth.clone(),
            identity_file,
            host_fingerprint: self.host_fingerprint.clone(),
        })
    }
}

/// Names of the files the remote side expects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteLayout {
    #[serde(default = "default_simulator")]
    pub simulator_executable: String,
    #[serde(default = "default_solver")]
    pub solver_executable: String,
    #[serde(default = "default_submit_script")]
    pub submit_script: String,
    #[serde(default = "default_job_script")]
    pub job_script: String,
}

fn default_simulator() -> String {
    executables::SIMULATOR.to_string()
}

fn default_solver() -> String {
    executables::SOLVER.to_string()
}

fn default_submit_script() -> String {
    scripts::SUBMIT.to_string()
}

fn default_job_script() -> String {
    scripts::JOB.to_string()
}

impl Default for RemoteLayout {
    fn default() -> Self {
        Self {
            simulator_executable: default_simulator(),
            solver_executable: default_solver(),
            submit_script: default_submit_script(),
            job_script: default_job_script(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_profile: Option<String>,
    #[serde(default = "default_max_job_count")]
    pub max_job_count: usize,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub remote: RemoteLayout,
    #[serde(default)]
    pub profiles: BTreeMap<String, SubmissionProfile>,
}

fn default_max_job_count() -> usize {
    MAX_JOB_COUNT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            active_profile: None,
            max_job_count: MAX_JOB_COUNT,
            logging: LoggingConfig::default(),
            remote: RemoteLayout::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Resolves `requested`, falling back to `active_profile`.
    pub fn profile<'a>(
        &'a self,
        requested: Option<&'a str>,
    ) -> Result<(&'a str, &'a SubmissionProfile), ConfigError> {
        let name = requested
            .or(self.active_profile.as_deref())
            .ok_or(ConfigError::NoActiveProfile)?;
        let profile = self
            .profiles
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound(name.to_string()))?;
        Ok((name, profile))
    }

    pub fn pin_fingerprint(&mut self, profile: &str, fingerprint: &str) -> Result<(), ConfigError> {
        let entry = self
            .profiles
            .get_mut(profile)
            .ok_or_else(|| ConfigError::ProfileNotFound(profile.to_string()))?;
        entry.host_fingerprint = Some(fingerprint.to_string());
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf, ConfigError> {
    if let Ok(path) = std::env::var("KMCX_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    let xdg_dirs = xdg::BaseDirectories::with_prefix(dirs::KMCX);
    let config_home = xdg_dirs
        .get_config_home()
        .ok_or(ConfigError::HomeDirectoryNotFound)?;
    Ok(config_home.join(CONFIG_FILE))
}

pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let config: Config = toml::from_str(&content)?;
            tracing::debug!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(
                "No configuration at {}, using defaults",
                path.display()
            );
            Ok(Config::default())
        }
        Err(source) => Err(ConfigError::PathIo {
            path: path.to_path_buf(),
            source,
        }),
    }
}

pub fn save_config(config: &Config) -> Result<(), ConfigError> {
    save_config_to(config, &config_path()?)
}

pub fn save_config_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::PathIo {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::PathIo {
        path: path.to_path_buf(),
        source,
    })
}
