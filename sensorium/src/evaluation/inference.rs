use thiserror::Error;

use crate::{
    Array, DataType,
    array::ArrayError,
    data::{BatchError, DataLoader, DatasetError},
    device::{Device, DeviceError, DeviceState},
    model::{Model, ModelError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferenceProgress {
    pub batch_index: usize,
    pub batches_total: usize,
    pub trials: usize,
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("Predictions do not line up across batches")]
    Array(#[from] ArrayError),
    #[error("Forward pass failed on batch {batch_index}")]
    Forward {
        batch_index: usize,
        #[source]
        source: ModelError,
    },
}

/// Predictions of `model` for every trial of `loader`, in loader order, as a
/// host array of shape `(trials, neurons)`. An empty loader yields an empty
/// array of shape `(0,)`.
pub fn model_predictions<M: Model + ?Sized>(
    model: &mut M,
    loader: &DataLoader,
    data_key: Option<&str>,
    device: Device,
) -> Result<Array, InferenceError> {
    model_predictions_with_progress(model, loader, data_key, device, None::<fn(InferenceProgress)>)
}

pub fn model_predictions_with_progress<M, F>(
    model: &mut M,
    loader: &DataLoader,
    data_key: Option<&str>,
    device: Device,
    progress: Option<F>,
) -> Result<Array, InferenceError>
where
    M: Model + ?Sized,
    F: Fn(InferenceProgress),
{
    let batches_total = loader.len();
    let mut outputs: Vec<Array> = Vec::with_capacity(batches_total);
    let mut trials = 0;

    for (batch_index, batch) in loader.iter().enumerate() {
        let batch = batch?.to_device(device);
        let inputs = batch.inputs()?;
        let context = batch.context();

        let output = {
            let state = DeviceState::acquire(&mut *model, device)?;
            state.forward(inputs, data_key, &context).map_err(|source| InferenceError::Forward {
                batch_index,
                source,
            })?
        };
        let output = output.to_host();
        trials += output.len();
        outputs.push(output);

        if let Some(progress) = &progress {
            progress(InferenceProgress {
                batch_index,
                batches_total,
                trials,
            });
        }
    }

    if outputs.is_empty() {
        return Ok(Array::empty(DataType::F32, "prediction"));
    }
    let predictions = Array::concatenate(&outputs, "prediction")?;
    log::debug!(
        "Ran {} batches on {}, predictions {:?}",
        batches_total,
        device,
        predictions.shape()
    );
    Ok(predictions)
}
