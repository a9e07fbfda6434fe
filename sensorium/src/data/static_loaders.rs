use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
    rc::Rc,
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use super::{
    dataset::{Dataset, DatasetError},
    file_tree::FileTreeDataset,
    loader::DataLoader,
};

/// Dataset function name understood by [`get_data`].
pub const STATIC_LOADERS_FN: &str = "sensorium.datasets.static_loaders";

fn default_normalize() -> bool {
    true
}

fn default_batch_size() -> usize {
    64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    pub paths: Vec<PathBuf>,
    #[serde(default = "default_normalize")]
    pub normalize: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub include_behavior: bool,
    #[serde(default)]
    pub include_eye_position: bool,
}

impl LoaderConfig {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            normalize: default_normalize(),
            batch_size: default_batch_size(),
            include_behavior: false,
            include_eye_position: false,
        }
    }

    /// Fields read from every trial, the model input first.
    pub fn data_keys(&self) -> Vec<&'static str> {
        let mut keys = FileTreeDataset::DEFAULT_DATA_KEYS.to_vec();
        if self.include_behavior {
            keys.push("behavior");
        }
        if self.include_eye_position {
            keys.push("pupil_center");
        }
        keys
    }
}

/// Partition of the trials, named after the tier labels stored with the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Split {
    Train,
    Validation,
    Test,
    FinalTest,
}

impl Split {
    pub const ALL: [Split; 4] = [Split::Train, Split::Validation, Split::Test, Split::FinalTest];

    pub fn tier(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Validation => "validation",
            Split::Test => "test",
            Split::FinalTest => "final_test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.tier())
    }
}

impl FromStr for Split {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Split::ALL
            .into_iter()
            .find(|split| split.tier() == s)
            .ok_or_else(|| DatasetError::UnknownSplit(s.to_string()))
    }
}

/// Loaders keyed by split, then by data key.
pub type Loaders = BTreeMap<Split, BTreeMap<String, DataLoader>>;

/// Builds loaders with the named dataset function.
pub fn get_data(
    dataset_fn: &str,
    config: &LoaderConfig,
) -> Result<Loaders, DatasetError> {
    match dataset_fn {
        STATIC_LOADERS_FN => static_loaders(config),
        _ => Err(DatasetError::UnknownDatasetFn(dataset_fn.to_string())),
    }
}

/// One loader per split and file-tree dataset. Loaders iterate their split's
/// trials in dataset order.
pub fn static_loaders(config: &LoaderConfig) -> Result<Loaders, DatasetError> {
    if config.batch_size == 0 {
        return Err(DatasetError::InvalidBatchSize);
    }
    let data_keys = config.data_keys();
    let mut loaders: Loaders = Split::ALL.into_iter().map(|split| (split, BTreeMap::new())).collect();

    for path in &config.paths {
        let data_key = data_key_from_path(path)?;
        let mut dataset = FileTreeDataset::open(path, &data_keys)?;
        if config.normalize {
            dataset = dataset.normalized()?;
        }
        let tiers = dataset.trial_info().tiers.clone().ok_or_else(|| DatasetError::MissingMetadata {
            path: path.clone(),
            name: "tiers",
        })?;
        let dataset: Rc<dyn Dataset> = Rc::new(dataset);

        for split in Split::ALL {
            let indices: Vec<usize> = tiers
                .iter()
                .enumerate()
                .filter(|(_, tier)| tier.as_str() == split.tier())
                .map(|(index, _)| index)
                .collect();
            log::debug!("{data_key}/{split}: {} trials", indices.len());
            let loader = DataLoader::with_indices(dataset.clone(), indices, config.batch_size);
            if let Some(split_loaders) = loaders.get_mut(&split) {
                if split_loaders.insert(data_key.clone(), loader).is_some() {
                    log::warn!("Data key \"{data_key}\" appears in several paths, keeping the last one");
                }
            }
        }
        log::info!("Loaded \"{}\" as data key \"{data_key}\"", path.display());
    }
    Ok(loaders)
}

/// Session identifier of a dataset path: the file name without extension,
/// after the last `static`, with `preproc` removed.
pub fn data_key_from_path(path: &Path) -> Result<String, DatasetError> {
    let invalid = || DatasetError::InvalidPath(path.to_path_buf());
    let name = path.file_name().and_then(|name| name.to_str()).ok_or_else(invalid)?;
    let after_prefix = name.rsplit("static").next().unwrap_or(name);
    let stem = after_prefix.split('.').next().unwrap_or(after_prefix);
    let key = stem.replace("preproc", "");
    if key.is_empty() {
        return Err(invalid());
    }
    Ok(key)
}
