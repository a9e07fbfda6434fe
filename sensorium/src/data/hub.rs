use std::{
    collections::BTreeMap,
    fs::File,
    io::BufReader,
    path::Path,
};

use serde_json::{Map, Value};

use super::{
    batch::{Batch, INPUTS_FIELD, Sample},
    dataset::{Dataset, DatasetError, DatasetKind, stack_samples},
    npy,
};
use crate::{
    Array,
    evaluation::metadata::{EvaluationMetadata, MetadataError, hub_metadata},
};

pub const INFO_FILE: &str = "info.json";
pub const NEURON_IDS_KEY: &str = "neuron_ids";

const IMAGES_FILE: &str = "images.npy";
const IMAGE_IDS_FILE: &str = "image_ids.npy";
const TRIAL_INDICES_FILE: &str = "trial_indices.npy";
const OPTIONAL_COLUMNS: [&str; 2] = ["behavior", "pupil_center"];

/// Pre-filtered dataset of flat column arrays. Every column has one entry per
/// trial along its leading axis.
#[derive(Debug, Clone)]
pub struct HubDataset {
    images: Array,
    columns: Vec<(String, Array)>,
    image_ids: Array,
    trial_indices: Array,
    info: Map<String, Value>,
}

impl HubDataset {
    pub fn new(
        images: Array,
        image_ids: Array,
        trial_indices: Array,
        info: Map<String, Value>,
    ) -> Self {
        Self {
            images,
            columns: Vec::new(),
            image_ids,
            trial_indices,
            info,
        }
    }

    /// Adds a side input, such as behavior, delivered with every batch.
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        column: Array,
    ) -> Result<Self, DatasetError> {
        let name = name.into();
        if column.len() != self.images.len() {
            return Err(DatasetError::LengthMismatch {
                name,
                expected: self.images.len(),
                actual: column.len(),
            });
        }
        self.columns.push((name, column));
        Ok(self)
    }

    /// Reads a hub directory with `info.json`, `images.npy`, `image_ids.npy`,
    /// `trial_indices.npy` and optionally `behavior.npy` / `pupil_center.npy`.
    pub fn open(directory: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let directory = directory.as_ref();
        let info = read_info(&directory.join(INFO_FILE))?;
        let images = read_column(directory, IMAGES_FILE)?;
        let image_ids = read_column(directory, IMAGE_IDS_FILE)?;
        let trial_indices = read_column(directory, TRIAL_INDICES_FILE)?;

        let mut dataset = Self::new(images, image_ids, trial_indices, info);
        for name in OPTIONAL_COLUMNS {
            let file_name = format!("{name}.npy");
            if directory.join(&file_name).exists() {
                let column = read_column(directory, &file_name)?;
                dataset = dataset.with_column(name, column)?;
            }
        }

        log::debug!(
            "Opened hub dataset at {:?}: {} trials",
            directory,
            dataset.len()
        );
        Ok(dataset)
    }

    pub fn info(&self) -> &Map<String, Value> {
        &self.info
    }

    pub fn image_ids(&self) -> &Array {
        &self.image_ids
    }

    pub fn trial_indices(&self) -> &Array {
        &self.trial_indices
    }

    /// `info["neuron_ids"]` as integers, `None` when absent or not an integer list.
    pub fn neuron_ids(&self) -> Option<Vec<i64>> {
        self.info
            .get(NEURON_IDS_KEY)?
            .as_array()?
            .iter()
            .map(Value::as_i64)
            .collect()
    }
}

impl Dataset for HubDataset {
    fn kind(&self) -> DatasetKind {
        DatasetKind::Hub
    }

    fn len(&self) -> usize {
        self.images.len()
    }

    fn sample(
        &self,
        index: usize,
    ) -> Result<Sample, DatasetError> {
        if index >= self.len() {
            return Err(DatasetError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        let mut fields = Vec::with_capacity(self.columns.len() + 1);
        fields.push((INPUTS_FIELD.to_string(), self.images.row(index)?));
        for (name, column) in &self.columns {
            fields.push((name.clone(), column.row(index)?));
        }
        Ok(Sample::new(fields))
    }

    fn collate(
        &self,
        samples: Vec<Sample>,
    ) -> Result<Batch, DatasetError> {
        let fields: BTreeMap<String, Array> = stack_samples(samples)?.into_iter().collect();
        Ok(Batch::Mapping(fields))
    }

    fn evaluation_metadata(&self) -> Result<EvaluationMetadata, MetadataError> {
        hub_metadata(self)
    }
}

fn read_info(path: &Path) -> Result<Map<String, Value>, DatasetError> {
    let file = File::open(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| DatasetError::InvalidInfo {
        path: path.to_path_buf(),
        source,
    })
}

fn read_column(
    directory: &Path,
    file_name: &str,
) -> Result<Array, DatasetError> {
    let path = directory.join(file_name);
    npy::read_array(&path).map_err(|source| DatasetError::Npy {
        path,
        source,
    })
}
