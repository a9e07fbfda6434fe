pub mod batch;
pub mod dataset;
pub mod file_tree;
pub mod hub;
pub mod loader;
mod normalization;
pub mod npy;
pub mod static_loaders;

pub use batch::{Batch, BatchContext, BatchError, INPUTS_FIELD, Sample};
pub use dataset::{Dataset, DatasetError, DatasetKind};
pub use file_tree::{FileTreeDataset, NeuronInfo, TrialInfo};
pub use hub::HubDataset;
pub use loader::DataLoader;
pub use normalization::Normalizer;
pub use static_loaders::{
    LoaderConfig, Loaders, STATIC_LOADERS_FN, Split, get_data, static_loaders,
};
