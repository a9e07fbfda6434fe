use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{
    error::EvaluationError,
    inference::{InferenceProgress, model_predictions_with_progress},
    metadata::{GroundTruth, file_tree_ground_truth, file_tree_ground_truth_from_path},
    table::{EvaluationTable, ValueColumn},
};
use crate::{
    data::{DataLoader, FileTreeDataset},
    device::Device,
    model::Model,
};

pub const DEFAULT_SUBMISSION_PATH: &str = "submission_file.csv";
pub const DEFAULT_GROUND_TRUTH_PATH: &str = "ground_truth_file.csv";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    /// Model head to evaluate, needed when the model was trained on several sessions.
    pub data_key: Option<String>,
    pub path: PathBuf,
    pub device: Device,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            data_key: None,
            path: PathBuf::from(DEFAULT_SUBMISSION_PATH),
            device: Device::Cpu,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundTruthConfig {
    pub path: PathBuf,
    pub data_key: Option<String>,
    pub normalize: bool,
    pub batch_size: usize,
}

impl Default for GroundTruthConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_GROUND_TRUTH_PATH),
            data_key: None,
            normalize: true,
            batch_size: 64,
        }
    }
}

/// What a writer put on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub path: PathBuf,
    pub rows: usize,
    pub neurons: usize,
}

/// Predicts every trial of `loader` with `model` and writes the predictions
/// keyed by trial index, image id and neuron ids.
pub fn generate_submission_file<M: Model + ?Sized>(
    model: &mut M,
    loader: &DataLoader,
    config: &SubmissionConfig,
) -> Result<WriteSummary, EvaluationError> {
    generate_submission_file_with_progress(model, loader, config, None::<fn(InferenceProgress)>)
}

pub fn generate_submission_file_with_progress<M, F>(
    model: &mut M,
    loader: &DataLoader,
    config: &SubmissionConfig,
    progress: Option<F>,
) -> Result<WriteSummary, EvaluationError>
where
    M: Model + ?Sized,
    F: Fn(InferenceProgress),
{
    let predictions = model_predictions_with_progress(
        model,
        loader,
        config.data_key.as_deref(),
        config.device,
        progress,
    )?;
    let dataset = loader.dataset();
    log::debug!("Extracting {} dataset metadata", dataset.kind());
    let metadata = dataset.evaluation_metadata()?;
    let table = EvaluationTable::assemble(ValueColumn::Prediction, &metadata, &predictions)?;
    save(&table, &config.path)
}

/// Writes the recorded test-tier responses of the dataset at `dataset_path`.
pub fn generate_ground_truth_file(
    dataset_path: &Path,
    config: &GroundTruthConfig,
) -> Result<WriteSummary, EvaluationError> {
    let ground_truth = file_tree_ground_truth_from_path(
        dataset_path,
        config.data_key.as_deref(),
        config.normalize,
        config.batch_size,
    )?;
    save_ground_truth(&ground_truth, &config.path)
}

pub fn generate_ground_truth_file_from_dataset(
    dataset: &FileTreeDataset,
    path: &Path,
) -> Result<WriteSummary, EvaluationError> {
    let ground_truth = file_tree_ground_truth(dataset)?;
    save_ground_truth(&ground_truth, path)
}

fn save_ground_truth(
    ground_truth: &GroundTruth,
    path: &Path,
) -> Result<WriteSummary, EvaluationError> {
    let table = EvaluationTable::assemble(
        ValueColumn::Responses,
        &ground_truth.metadata,
        &ground_truth.responses,
    )?;
    save(&table, path)
}

fn save(
    table: &EvaluationTable,
    path: &Path,
) -> Result<WriteSummary, EvaluationError> {
    table.write(path)?;
    log::info!("File saved. {} rows written to {:?}", table.len(), path);
    Ok(WriteSummary {
        path: path.to_path_buf(),
        rows: table.len(),
        neurons: table.neurons(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config: SubmissionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SubmissionConfig::default());
        assert_eq!(config.path, PathBuf::from("submission_file.csv"));

        let config: GroundTruthConfig =
            serde_json::from_str(r#"{"data_key": "27204-5-13", "normalize": false}"#).unwrap();
        assert_eq!(config.path, PathBuf::from("ground_truth_file.csv"));
        assert_eq!(config.data_key.as_deref(), Some("27204-5-13"));
        assert!(!config.normalize);
        assert_eq!(config.batch_size, 64);
    }

    #[test]
    fn test_submission_config_device() {
        let config: SubmissionConfig = serde_json::from_str(r#"{"device": "cuda:1"}"#).unwrap();
        assert_eq!(config.device, Device::Cuda(1));
    }
}
