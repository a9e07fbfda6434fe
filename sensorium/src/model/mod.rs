mod mean_response;

pub use mean_response::MeanResponseModel;
use thiserror::Error;

use crate::{
    Array,
    array::ArrayError,
    data::{BatchContext, DatasetError},
    device::{DeviceError, DevicePlacement},
};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Array(#[from] ArrayError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error("Unknown data key \"{0}\"")]
    UnknownDataKey(String),
    #[error("A data key is required, the model has {0:?}")]
    DataKeyRequired(Vec<String>),
    #[error("Batch has no \"{0}\" field")]
    MissingField(String),
    #[error("No training data for data key \"{0}\"")]
    NoTrainingData(String),
    #[error("Forward pass failed: {0}")]
    Forward(String),
}

/// A trained response predictor.
pub trait Model: DevicePlacement {
    /// Predicts responses for a batch, shape `(trials, neurons)`.
    ///
    /// `context` holds every batch field other than `inputs`, such as
    /// behavior or eye position, already placed on the model's device.
    fn forward(
        &self,
        inputs: &Array,
        data_key: Option<&str>,
        context: &BatchContext<'_>,
    ) -> Result<Array, ModelError>;
}
