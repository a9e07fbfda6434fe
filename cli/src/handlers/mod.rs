mod ground_truth;
mod inspect;
mod submission;

use std::path::Path;

use anyhow::Context;
pub use ground_truth::handle_ground_truth;
pub use inspect::handle_inspect;
use sensorium::{config::EvaluationConfig, env_utils::EnvVar};
pub use submission::handle_submission;

/// Settings from `config_path` (or defaults), with `SENSORIUM_DEVICE` applied.
pub fn load_config(config_path: Option<&Path>) -> anyhow::Result<EvaluationConfig> {
    let mut config = match config_path {
        Some(path) => EvaluationConfig::load(path)?,
        None => EvaluationConfig::default(),
    };
    if EnvVar::Device.is_set() {
        let value = EnvVar::Device.value();
        config.device = value
            .parse()
            .with_context(|| format!("Invalid {} \"{}\"", EnvVar::Device.key(), value))?;
    }
    Ok(config)
}
