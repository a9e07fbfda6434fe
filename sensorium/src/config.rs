use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    data::LoaderConfig,
    device::Device,
    evaluation::{
        DEFAULT_GROUND_TRUTH_PATH, DEFAULT_SUBMISSION_PATH, GroundTruthConfig, SubmissionConfig,
    },
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to open config \"{path}\"")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config \"{path}\"")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// File-level settings shared by every command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub device: Device,
    pub batch_size: usize,
    pub normalize: bool,
    pub include_behavior: bool,
    pub include_eye_position: bool,
    pub data_key: Option<String>,
    pub submission_path: PathBuf,
    pub ground_truth_path: PathBuf,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            device: Device::Cpu,
            batch_size: 64,
            normalize: true,
            include_behavior: false,
            include_eye_position: false,
            data_key: None,
            submission_path: PathBuf::from(DEFAULT_SUBMISSION_PATH),
            ground_truth_path: PathBuf::from(DEFAULT_GROUND_TRUTH_PATH),
        }
    }
}

impl EvaluationConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn loader_config(
        &self,
        paths: Vec<PathBuf>,
    ) -> LoaderConfig {
        LoaderConfig {
            paths,
            normalize: self.normalize,
            batch_size: self.batch_size,
            include_behavior: self.include_behavior,
            include_eye_position: self.include_eye_position,
        }
    }

    pub fn submission_config(&self) -> SubmissionConfig {
        SubmissionConfig {
            data_key: self.data_key.clone(),
            path: self.submission_path.clone(),
            device: self.device,
        }
    }

    pub fn ground_truth_config(&self) -> GroundTruthConfig {
        GroundTruthConfig {
            path: self.ground_truth_path.clone(),
            data_key: self.data_key.clone(),
            normalize: self.normalize,
            batch_size: self.batch_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::from_str;

    use super::*;

    #[test]
    fn test_defaults() {
        let config: EvaluationConfig = from_str("{}").unwrap();
        assert_eq!(config, EvaluationConfig::default());
        assert_eq!(config.submission_config(), SubmissionConfig::default());
        assert_eq!(config.ground_truth_config(), GroundTruthConfig::default());
    }

    #[test]
    fn test_config() {
        let config_str = r#"
            {
                "device": "cuda:0",
                "batch_size": 16,
                "normalize": false,
                "data_key": "26872-17-20",
                "submission_path": "out/submission.csv"
            }
        "#;
        let config: EvaluationConfig = from_str(config_str).unwrap();
        assert_eq!(config.device, Device::Cuda(0));
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.ground_truth_path, PathBuf::from("ground_truth_file.csv"));

        let submission = config.submission_config();
        assert_eq!(submission.path, PathBuf::from("out/submission.csv"));
        assert_eq!(submission.data_key.as_deref(), Some("26872-17-20"));

        let loader = config.loader_config(vec![PathBuf::from("static26872-17-20")]);
        assert!(!loader.normalize);
        assert_eq!(loader.batch_size, 16);
    }

    #[test]
    fn test_invalid_device() {
        let result: Result<EvaluationConfig, _> = from_str(r#"{"device": "tpu"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_reports_path() {
        let directory = tempfile::TempDir::new().unwrap();
        let path = directory.path().join("config.json");
        std::fs::write(&path, "{\"batch_size\": \"many\"}").unwrap();
        assert!(matches!(
            EvaluationConfig::load(&path),
            Err(ConfigError::Parse { path: error_path, .. }) if error_path == path
        ));
        assert!(matches!(
            EvaluationConfig::load(&directory.path().join("missing.json")),
            Err(ConfigError::Io { .. })
        ));
    }
}
