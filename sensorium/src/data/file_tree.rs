use std::{
    fs,
    path::{Path, PathBuf},
};

use super::{
    batch::Sample,
    dataset::{Dataset, DatasetError, DatasetKind},
    normalization::Normalizer,
    npy,
};
use crate::evaluation::metadata::{
    EvaluationMetadata, MetadataError, file_tree_metadata,
};

/// Per-trial metadata from `meta/trials/`. Arrays absent on disk are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrialInfo {
    pub tiers: Option<Vec<String>>,
    pub frame_image_id: Option<Vec<i64>>,
    pub trial_idx: Option<Vec<i64>>,
}

/// Per-neuron metadata from `meta/neurons/`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NeuronInfo {
    pub unit_ids: Option<Vec<i64>>,
}

/// Dataset stored as a directory tree of `.npy` files:
///
/// ```text
/// <root>/data/<key>/<trial>.npy
/// <root>/meta/trials/{tiers,frame_image_id,trial_idx}.npy
/// <root>/meta/neurons/unit_ids.npy
/// <root>/meta/statistics/<key>/all/{mean,std}.npy
/// ```
#[derive(Debug)]
pub struct FileTreeDataset {
    root: PathBuf,
    data_keys: Vec<String>,
    trial_info: TrialInfo,
    neurons: NeuronInfo,
    len: usize,
    normalizer: Option<Normalizer>,
}

impl FileTreeDataset {
    pub const DEFAULT_DATA_KEYS: [&'static str; 2] = ["images", "responses"];

    /// Opens the dataset at `root`. The first data key is the model input and
    /// its file count determines the number of trials.
    pub fn open<S: AsRef<str>>(
        root: impl Into<PathBuf>,
        data_keys: &[S],
    ) -> Result<Self, DatasetError> {
        let root = root.into();
        let data_keys: Vec<String> =
            data_keys.iter().map(|key| key.as_ref().to_string()).collect();
        let first_key = data_keys.first().ok_or(DatasetError::NoDataKeys)?;
        let len = count_trials(&root.join("data").join(first_key))?;

        let trials = root.join("meta").join("trials");
        let trial_info = TrialInfo {
            tiers: read_optional(&trials.join("tiers.npy"), npy::read_strings)?,
            frame_image_id: read_optional_ids(&trials.join("frame_image_id.npy"))?,
            trial_idx: read_optional_ids(&trials.join("trial_idx.npy"))?,
        };
        let neurons = NeuronInfo {
            unit_ids: read_optional_ids(
                &root.join("meta").join("neurons").join("unit_ids.npy"),
            )?,
        };

        check_length("trial_info.tiers", trial_info.tiers.as_ref().map(Vec::len), len)?;
        check_length(
            "trial_info.frame_image_id",
            trial_info.frame_image_id.as_ref().map(Vec::len),
            len,
        )?;
        check_length("trial_info.trial_idx", trial_info.trial_idx.as_ref().map(Vec::len), len)?;

        log::debug!(
            "Opened file-tree dataset at {:?}: {} trials, data keys {:?}",
            root,
            len,
            data_keys
        );

        Ok(Self {
            root,
            data_keys,
            trial_info,
            neurons,
            len,
            normalizer: None,
        })
    }

    /// Enables normalization with the statistics stored next to the data.
    pub fn normalized(mut self) -> Result<Self, DatasetError> {
        self.normalizer = Some(Normalizer::from_statistics(&self.root, &self.data_keys)?);
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_keys(&self) -> &[String] {
        &self.data_keys
    }

    pub fn trial_info(&self) -> &TrialInfo {
        &self.trial_info
    }

    pub fn neurons(&self) -> &NeuronInfo {
        &self.neurons
    }

    pub fn is_normalized(&self) -> bool {
        self.normalizer.is_some()
    }

    fn field_path(
        &self,
        key: &str,
        index: usize,
    ) -> PathBuf {
        self.root.join("data").join(key).join(format!("{index}.npy"))
    }
}

impl Dataset for FileTreeDataset {
    fn kind(&self) -> DatasetKind {
        DatasetKind::FileTree
    }

    fn len(&self) -> usize {
        self.len
    }

    fn sample(
        &self,
        index: usize,
    ) -> Result<Sample, DatasetError> {
        if index >= self.len {
            return Err(DatasetError::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        let mut fields = Vec::with_capacity(self.data_keys.len());
        for key in &self.data_keys {
            let path = self.field_path(key, index);
            let mut array = npy::read_array(&path).map_err(|source| DatasetError::Npy {
                path: path.clone(),
                source,
            })?;
            array = array.with_label(key.clone());
            if let Some(normalizer) = &self.normalizer {
                array = normalizer.apply(key, array)?;
            }
            fields.push((key.clone(), array));
        }
        Ok(Sample::new(fields))
    }

    fn evaluation_metadata(&self) -> Result<EvaluationMetadata, MetadataError> {
        file_tree_metadata(self)
    }

    fn as_file_tree(&self) -> Option<&FileTreeDataset> {
        Some(self)
    }
}

fn count_trials(directory: &Path) -> Result<usize, DatasetError> {
    let entries = fs::read_dir(directory).map_err(|source| DatasetError::Io {
        path: directory.to_path_buf(),
        source,
    })?;
    let mut count = 0;
    for entry in entries {
        let entry = entry.map_err(|source| DatasetError::Io {
            path: directory.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let is_trial = path.extension().is_some_and(|extension| extension == "npy")
            && path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .is_some_and(|stem| stem.parse::<usize>().is_ok());
        if is_trial {
            count += 1;
        }
    }
    Ok(count)
}

fn read_optional<T>(
    path: &Path,
    read: impl FnOnce(&Path) -> Result<T, npy::NpyError>,
) -> Result<Option<T>, DatasetError> {
    if !path.exists() {
        return Ok(None);
    }
    read(path).map(Some).map_err(|source| DatasetError::Npy {
        path: path.to_path_buf(),
        source,
    })
}

fn read_optional_ids(path: &Path) -> Result<Option<Vec<i64>>, DatasetError> {
    let Some(array) = read_optional(path, npy::read_array)? else {
        return Ok(None);
    };
    Ok(Some(array.to_vec::<i64>()?))
}

fn check_length(
    name: &str,
    actual: Option<usize>,
    expected: usize,
) -> Result<(), DatasetError> {
    match actual {
        Some(actual) if actual != expected => Err(DatasetError::LengthMismatch {
            name: name.to_string(),
            expected,
            actual,
        }),
        _ => Ok(()),
    }
}
