use std::path::PathBuf;

use anyhow::Context;
use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use sensorium::{config::EvaluationConfig, evaluation::generate_ground_truth_file};

pub fn handle_ground_truth(
    config: EvaluationConfig,
    dataset_path: PathBuf,
) -> anyhow::Result<()> {
    let style_bold = Style::new().bold();

    let progress_bar = ProgressBar::new_spinner();
    progress_bar.enable_steady_tick(std::time::Duration::from_millis(100));
    progress_bar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} Extracting: {msg}")
            .unwrap(),
    );
    progress_bar.set_message(dataset_path.display().to_string());

    let summary = generate_ground_truth_file(&dataset_path, &config.ground_truth_config());
    progress_bar.finish_and_clear();
    let summary = summary
        .with_context(|| format!("Failed to extract ground truth from {:?}", dataset_path))?;

    println!(
        "Saved {} rows x {} neurons to {}",
        summary.rows,
        summary.neurons,
        style_bold.apply_to(summary.path.display())
    );
    Ok(())
}
