use super::JobConfiguration;
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// On-disk list of jobs, one `[[jobs]]` table per job. Omitted fields take
/// the draft defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobBatch {
    #[serde(default)]
    pub jobs: Vec<JobConfiguration>,
}

impl JobBatch {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

pub fn load_batch(path: &Path) -> Result<JobBatch, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::PathIo {
        path: path.to_path_buf(),
        source,
    })?;
    JobBatch::from_toml_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_jobs_with_defaults() {
        let batch = JobBatch::from_toml_str(
            r#"
[[jobs]]
id = 3
temperature = 1200.0

[[jobs]]
id = 4
lattice_size = 16
dopings = [{ concentration = 0.08, description = "Y" }]
"#,
        )
        .unwrap();

        assert_eq!(batch.jobs.len(), 2);
        assert_eq!(batch.jobs[0].temperature(), 1200.0);
        assert_eq!(batch.jobs[0].lattice_size(), 10);
        assert_eq!(batch.jobs[1].dopings()[0].description(), "Y");
    }

    #[test]
    fn test_out_of_range_value_fails_to_parse() {
        let err = JobBatch::from_toml_str("[[jobs]]\nid = 1\nlattice_size = 80\n").unwrap_err();
        assert!(err.to_string().contains("LatticeSize"));
    }
}
