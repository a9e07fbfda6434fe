use thiserror::Error;

use super::{inference::InferenceError, metadata::MetadataError, table::TableError};

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("Inference failed")]
    Inference(#[from] InferenceError),
    #[error("Failed to extract evaluation metadata")]
    Metadata(#[from] MetadataError),
    #[error("Failed to build the evaluation table")]
    Table(#[from] TableError),
}
