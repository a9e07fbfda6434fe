use std::{fmt, io, path::PathBuf};

use thiserror::Error;

use super::{
    batch::{Batch, Sample},
    file_tree::FileTreeDataset,
    npy::NpyError,
};
use crate::{
    Array,
    array::ArrayError,
    evaluation::metadata::{EvaluationMetadata, MetadataError},
};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to read \"{path}\"")]
    Npy {
        path: PathBuf,
        #[source]
        source: NpyError,
    },
    #[error("Failed to access \"{path}\"")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid info file \"{path}\"")]
    InvalidInfo {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Index {index} is out of range for a dataset of {len} trials")]
    IndexOutOfRange {
        index: usize,
        len: usize,
    },
    #[error("Sample {index} has fields {actual:?}, expected {expected:?}")]
    InconsistentFields {
        index: usize,
        expected: Vec<String>,
        actual: Vec<String>,
    },
    #[error("\"{name}\" has {actual} entries, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("Dataset at \"{path}\" has no \"{name}\" metadata")]
    MissingMetadata {
        path: PathBuf,
        name: &'static str,
    },
    #[error("Missing normalization statistics for \"{field}\" at \"{path}\"")]
    MissingStatistics {
        field: String,
        path: PathBuf,
    },
    #[error("A file-tree dataset needs at least one data key")]
    NoDataKeys,
    #[error("Unknown dataset function \"{0}\"")]
    UnknownDatasetFn(String),
    #[error("Unknown split \"{0}\"")]
    UnknownSplit(String),
    #[error("Batch size must be positive")]
    InvalidBatchSize,
    #[error("No data key can be derived from \"{0}\"")]
    InvalidPath(PathBuf),
    #[error(transparent)]
    Array(#[from] ArrayError),
}

/// Storage layout of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetKind {
    /// Per-trial `.npy` records with trial and neuron metadata arrays.
    FileTree,
    /// Flat, pre-filtered column arrays with an `info` mapping.
    Hub,
}

impl fmt::Display for DatasetKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            DatasetKind::FileTree => write!(f, "file-tree"),
            DatasetKind::Hub => write!(f, "hub"),
        }
    }
}

pub trait Dataset {
    fn kind(&self) -> DatasetKind;

    /// Number of trials.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sample(
        &self,
        index: usize,
    ) -> Result<Sample, DatasetError>;

    /// Groups samples into a batch. The default layout is a record whose
    /// fields keep the order of the first sample.
    fn collate(
        &self,
        samples: Vec<Sample>,
    ) -> Result<Batch, DatasetError> {
        Ok(Batch::Record(stack_samples(samples)?))
    }

    /// Identifiers of the trials a submission for this dataset is scored on.
    fn evaluation_metadata(&self) -> Result<EvaluationMetadata, MetadataError>;

    fn as_file_tree(&self) -> Option<&FileTreeDataset> {
        None
    }
}

/// Stacks every field of the samples along a new leading axis.
pub fn stack_samples(
    samples: Vec<Sample>
) -> Result<Vec<(String, Array)>, DatasetError> {
    let Some(first) = samples.first() else {
        return Ok(Vec::new());
    };
    let names: Vec<String> =
        first.fields().iter().map(|(name, _)| name.clone()).collect();

    for (index, sample) in samples.iter().enumerate() {
        let sample_names: Vec<&str> =
            sample.fields().iter().map(|(name, _)| name.as_str()).collect();
        if sample_names != names {
            return Err(DatasetError::InconsistentFields {
                index,
                expected: names,
                actual: sample_names.into_iter().map(String::from).collect(),
            });
        }
    }

    names
        .iter()
        .enumerate()
        .map(|(position, name)| {
            let stacked = Array::stack(
                samples.iter().map(|sample| &sample.fields()[position].1),
                name.clone(),
            )?;
            Ok((name.clone(), stacked))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DataType;

    fn sample(names: &[&str]) -> Sample {
        Sample::new(
            names
                .iter()
                .map(|name| (name.to_string(), Array::zeros(&[2], DataType::F32, *name)))
                .collect(),
        )
    }

    #[test]
    fn test_stack_samples() {
        let stacked =
            stack_samples(vec![sample(&["images", "responses"]); 3]).unwrap();
        assert_eq!(stacked.len(), 2);
        assert_eq!(stacked[0].0, "images");
        assert_eq!(stacked[0].1.shape(), &[3, 2]);
        assert!(stack_samples(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_stack_samples_rejects_different_fields() {
        let result = stack_samples(vec![
            sample(&["images", "responses"]),
            sample(&["images"]),
        ]);
        assert!(matches!(
            result,
            Err(DatasetError::InconsistentFields { index: 1, .. })
        ));
    }
}
