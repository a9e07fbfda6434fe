use std::path::Path;

use thiserror::Error;

use crate::{
    Array, DataType,
    array::ArrayError,
    data::{
        Dataset, DatasetError, DatasetKind, FileTreeDataset, HubDataset, LoaderConfig, Loaders,
        STATIC_LOADERS_FN, Split, get_data,
    },
};

/// Tier label of the trials a submission is scored on.
pub const TEST_TIER: &str = "test";

const RESPONSES_FIELD: &str = "responses";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Dataset has no \"{0}\" metadata")]
    MissingAttribute(&'static str),
    #[error("Trial {index} has no \"responses\" field")]
    MissingResponses {
        index: usize,
    },
    #[error("\"{name}\" has {actual} entries, expected {expected}")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Several data keys are available ({0:?}), one must be selected")]
    AmbiguousDataKey(Vec<String>),
    #[error("Unknown data key \"{key}\", available: {available:?}")]
    UnknownDataKey {
        key: String,
        available: Vec<String>,
    },
    #[error("No loaders for the \"{0}\" split")]
    MissingSplit(Split),
    #[error("Expected a {expected} dataset, got {actual}")]
    WrongDatasetKind {
        expected: DatasetKind,
        actual: DatasetKind,
    },
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Array(#[from] ArrayError),
}

/// Identifiers of the evaluated trials, in dataset order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationMetadata {
    pub trial_indices: Vec<i64>,
    pub image_ids: Vec<i64>,
    pub neuron_ids: Vec<i64>,
}

impl EvaluationMetadata {
    pub fn len(&self) -> usize {
        self.trial_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trial_indices.is_empty()
    }
}

/// Test-tier metadata together with the recorded responses, shape `(trials, neurons)`.
#[derive(Debug, Clone)]
pub struct GroundTruth {
    pub metadata: EvaluationMetadata,
    pub responses: Array,
}

fn test_trials(dataset: &FileTreeDataset) -> Result<Vec<usize>, MetadataError> {
    let tiers = dataset.trial_info().tiers.as_ref().ok_or(MetadataError::MissingAttribute("tiers"))?;
    Ok(tiers
        .iter()
        .enumerate()
        .filter(|(_, tier)| tier.as_str() == TEST_TIER)
        .map(|(index, _)| index)
        .collect())
}

fn select<T: Copy>(
    values: &[T],
    indices: &[usize],
    name: &'static str,
    expected: usize,
) -> Result<Vec<T>, MetadataError> {
    if values.len() != expected {
        return Err(MetadataError::LengthMismatch {
            name,
            expected,
            actual: values.len(),
        });
    }
    Ok(indices.iter().map(|&index| values[index]).collect())
}

/// Trial indices, image ids and neuron ids of the test-tier trials. Neuron ids
/// are shared by every trial and are not filtered.
pub fn file_tree_metadata(dataset: &FileTreeDataset) -> Result<EvaluationMetadata, MetadataError> {
    let trial_info = dataset.trial_info();
    let neuron_ids = dataset.neurons().unit_ids.clone().ok_or(MetadataError::MissingAttribute("unit_ids"))?;
    let image_ids = trial_info
        .frame_image_id
        .as_deref()
        .ok_or(MetadataError::MissingAttribute("frame_image_id"))?;
    let trial_idx = trial_info.trial_idx.as_deref().ok_or(MetadataError::MissingAttribute("trial_idx"))?;

    let selected = test_trials(dataset)?;
    let len = dataset.len();
    Ok(EvaluationMetadata {
        trial_indices: select(trial_idx, &selected, "trial_idx", len)?,
        image_ids: select(image_ids, &selected, "frame_image_id", len)?,
        neuron_ids,
    })
}

/// [`file_tree_metadata`] plus the `responses` of each test-tier trial,
/// flattened to one row per trial and stacked.
pub fn file_tree_ground_truth(dataset: &FileTreeDataset) -> Result<GroundTruth, MetadataError> {
    let metadata = file_tree_metadata(dataset)?;
    let selected = test_trials(dataset)?;

    let neurons = metadata.neuron_ids.len();
    let mut responses = Vec::with_capacity(selected.len());
    for &index in &selected {
        let sample = dataset.sample(index)?;
        let trial_responses = sample
            .field(RESPONSES_FIELD)
            .ok_or(MetadataError::MissingResponses {
                index,
            })?
            .reshape(&[neurons])?;
        responses.push(trial_responses.cast::<f32>()?);
    }

    let responses = if responses.is_empty() {
        Array::zeros(&[0, neurons], DataType::F32, RESPONSES_FIELD)
    } else {
        Array::stack(&responses, RESPONSES_FIELD)?
    };
    log::debug!(
        "Extracted {} test trials of {} from {:?}",
        metadata.len(),
        dataset.len(),
        dataset.root()
    );
    Ok(GroundTruth {
        metadata,
        responses,
    })
}

/// Builds the static loaders for `path` and extracts the ground truth of the
/// dataset behind the train loader of the selected data key.
pub fn file_tree_ground_truth_from_path(
    path: &Path,
    data_key: Option<&str>,
    normalize: bool,
    batch_size: usize,
) -> Result<GroundTruth, MetadataError> {
    let config = LoaderConfig {
        normalize,
        batch_size,
        ..LoaderConfig::new(vec![path.to_path_buf()])
    };
    let loaders = get_data(STATIC_LOADERS_FN, &config)?;
    let data_key = select_data_key(&loaders, data_key)?;
    let train = loaders.get(&Split::Train).ok_or(MetadataError::MissingSplit(Split::Train))?;
    let loader = train.get(&data_key).ok_or_else(|| MetadataError::UnknownDataKey {
        key: data_key.clone(),
        available: train.keys().cloned().collect(),
    })?;
    let dataset = loader.dataset();
    let file_tree = dataset.as_file_tree().ok_or(MetadataError::WrongDatasetKind {
        expected: DatasetKind::FileTree,
        actual: dataset.kind(),
    })?;
    file_tree_ground_truth(file_tree)
}

/// Resolves the data key among the test split's loaders: the explicit key if
/// given, otherwise the only one available.
pub fn select_data_key(
    loaders: &Loaders,
    data_key: Option<&str>,
) -> Result<String, MetadataError> {
    let test = loaders.get(&Split::Test).ok_or(MetadataError::MissingSplit(Split::Test))?;
    let available: Vec<String> = test.keys().cloned().collect();
    match data_key {
        Some(key) if test.contains_key(key) => Ok(key.to_string()),
        Some(key) => Err(MetadataError::UnknownDataKey {
            key: key.to_string(),
            available,
        }),
        None => match available.len() {
            0 => Err(MetadataError::Dataset(DatasetError::NoDataKeys)),
            1 => Ok(available[0].clone()),
            _ => Err(MetadataError::AmbiguousDataKey(available)),
        },
    }
}

/// Stored id columns of a hub dataset, flattened, with `info["neuron_ids"]`.
/// Both columns must have one entry per trial.
pub fn hub_metadata(dataset: &HubDataset) -> Result<EvaluationMetadata, MetadataError> {
    let trial_indices = dataset.trial_indices().to_vec::<i64>()?;
    let image_ids = dataset.image_ids().to_vec::<i64>()?;
    let neuron_ids = dataset.neuron_ids().ok_or(MetadataError::MissingAttribute("neuron_ids"))?;

    if image_ids.len() != trial_indices.len() {
        return Err(MetadataError::LengthMismatch {
            name: "image_ids",
            expected: trial_indices.len(),
            actual: image_ids.len(),
        });
    }
    if trial_indices.len() != dataset.len() {
        return Err(MetadataError::LengthMismatch {
            name: "trial_indices",
            expected: dataset.len(),
            actual: trial_indices.len(),
        });
    }
    Ok(EvaluationMetadata {
        trial_indices,
        image_ids,
        neuron_ids,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, Value};

    use super::*;

    fn hub(
        image_ids: Vec<i64>,
        trial_indices: Vec<i64>,
        trials: usize,
    ) -> HubDataset {
        let mut info = Map::new();
        info.insert(String::from("neuron_ids"), Value::from(vec![1, 2]));
        HubDataset::new(
            Array::zeros(&[trials, 4], DataType::F32, "images"),
            Array::from_vec(&[image_ids.len(), 1], image_ids, "image_ids").unwrap(),
            Array::from_vec(&[trial_indices.len()], trial_indices, "trial_indices").unwrap(),
            info,
        )
    }

    #[test]
    fn test_hub_metadata_flattens_columns() {
        let metadata = hub_metadata(&hub(vec![4, 5, 6], vec![0, 1, 2], 3)).unwrap();
        assert_eq!(metadata.image_ids, vec![4, 5, 6]);
        assert_eq!(metadata.trial_indices, vec![0, 1, 2]);
        assert_eq!(metadata.neuron_ids, vec![1, 2]);
    }

    #[test]
    fn test_hub_metadata_length_mismatch() {
        assert!(matches!(
            hub_metadata(&hub(vec![4, 5], vec![0, 1, 2], 3)),
            Err(MetadataError::LengthMismatch { name: "image_ids", .. })
        ));
        assert!(matches!(
            hub_metadata(&hub(vec![4, 5], vec![0, 1], 3)),
            Err(MetadataError::LengthMismatch { name: "trial_indices", .. })
        ));
    }

    #[test]
    fn test_select() {
        assert_eq!(select(&[10, 11, 12], &[0, 2], "ids", 3).unwrap(), vec![10, 12]);
        assert!(matches!(
            select(&[10, 11], &[0], "ids", 3),
            Err(MetadataError::LengthMismatch { expected: 3, actual: 2, .. })
        ));
    }
}
