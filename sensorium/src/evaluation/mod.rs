mod error;
pub mod inference;
pub mod metadata;
pub mod submission;
pub mod table;

pub use error::EvaluationError;
pub use inference::{
    InferenceError, InferenceProgress, model_predictions, model_predictions_with_progress,
};
pub use metadata::{
    EvaluationMetadata, GroundTruth, MetadataError, TEST_TIER, file_tree_ground_truth,
    file_tree_ground_truth_from_path, file_tree_metadata, hub_metadata, select_data_key,
};
pub use submission::{
    DEFAULT_GROUND_TRUTH_PATH, DEFAULT_SUBMISSION_PATH, GroundTruthConfig, SubmissionConfig,
    WriteSummary, generate_ground_truth_file, generate_ground_truth_file_from_dataset,
    generate_submission_file, generate_submission_file_with_progress,
};
pub use table::{EvaluationRow, EvaluationTable, TableError, ValueColumn};
