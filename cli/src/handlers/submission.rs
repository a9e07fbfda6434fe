use std::{path::PathBuf, rc::Rc};

use anyhow::{Context, anyhow};
use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use sensorium::{
    config::EvaluationConfig,
    data::{DataLoader, HubDataset, STATIC_LOADERS_FN, Split, get_data},
    evaluation::{InferenceProgress, generate_submission_file_with_progress, select_data_key},
    model::MeanResponseModel,
};

pub fn handle_submission(
    config: EvaluationConfig,
    dataset_path: PathBuf,
    hub_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let loader_config = config.loader_config(vec![dataset_path.clone()]);
    let loaders = get_data(STATIC_LOADERS_FN, &loader_config)
        .with_context(|| format!("Failed to load {:?}", dataset_path))?;
    let data_key = select_data_key(&loaders, config.data_key.as_deref())?;

    let train = loaders.get(&Split::Train).ok_or_else(|| anyhow!("No train split"))?;
    let mut model = MeanResponseModel::fit(train).context("Failed to fit the mean response model")?;

    let loader = match hub_path {
        Some(hub_path) => {
            let hub = HubDataset::open(&hub_path)
                .with_context(|| format!("Failed to open hub dataset {:?}", hub_path))?;
            DataLoader::new(Rc::new(hub), config.batch_size)
        },
        None => loaders
            .get(&Split::Test)
            .and_then(|test| test.get(&data_key))
            .cloned()
            .ok_or_else(|| anyhow!("No test loader for \"{}\"", data_key))?,
    };

    let style_bold = Style::new().bold();
    println!("Data key: {}", style_bold.apply_to(&data_key));
    println!("Device: {}", style_bold.apply_to(config.device));

    let progress_bar = ProgressBar::new(loader.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.green} {pos}/{len} batches, {msg}")
            .unwrap(),
    );
    progress_bar.set_position(0);
    let progress = |progress: InferenceProgress| {
        progress_bar.set_position((progress.batch_index + 1) as u64);
        progress_bar.set_message(format!("{} trials", progress.trials));
    };

    let mut submission_config = config.submission_config();
    submission_config.data_key = Some(data_key);
    let summary = generate_submission_file_with_progress(
        &mut model,
        &loader,
        &submission_config,
        Some(progress),
    );
    progress_bar.finish_and_clear();
    let summary = summary.context("Failed to generate the submission file")?;

    println!(
        "Saved {} rows x {} neurons to {}",
        summary.rows,
        summary.neurons,
        style_bold.apply_to(summary.path.display())
    );
    Ok(())
}
