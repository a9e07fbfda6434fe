use std::path::PathBuf;

use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use cli::{
    handlers::{handle_ground_truth, handle_inspect, handle_submission, load_config},
    logger,
};
use console::Style;
use sensorium::Device;

#[derive(Parser)]
#[command(version, about = "Evaluation files for neural response predictions")]
struct Cli {
    /// JSON file with evaluation settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log more (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict the test trials with the mean response baseline and write a submission file
    Submission {
        /// Folder of the file-tree dataset
        dataset_path: PathBuf,
        /// Folder of a hub dataset to predict instead of the test split
        #[arg(long)]
        hub: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        device: Option<Device>,
        #[arg(long)]
        data_key: Option<String>,
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        no_normalize: bool,
    },
    /// Write the recorded test responses of a file-tree dataset
    GroundTruth {
        /// Folder of the file-tree dataset
        dataset_path: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        data_key: Option<String>,
        #[arg(long)]
        no_normalize: bool,
    },
    /// Summarize a submission or ground truth file
    Inspect {
        path: PathBuf,
        /// Number of rows to print
        #[arg(long, default_value_t = 5)]
        rows: usize,
    },
}

fn main() {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    let result = match cli.command {
        Some(Commands::Submission {
            dataset_path,
            hub,
            output,
            device,
            data_key,
            batch_size,
            no_normalize,
        }) => load_config(cli.config.as_deref()).and_then(|mut config| {
            if let Some(output) = output {
                config.submission_path = output;
            }
            if let Some(device) = device {
                config.device = device;
            }
            if let Some(batch_size) = batch_size {
                config.batch_size = batch_size;
            }
            config.data_key = data_key.or(config.data_key);
            config.normalize &= !no_normalize;
            handle_submission(config, dataset_path, hub)
        }),
        Some(Commands::GroundTruth {
            dataset_path,
            output,
            data_key,
            no_normalize,
        }) => load_config(cli.config.as_deref()).and_then(|mut config| {
            if let Some(output) = output {
                config.ground_truth_path = output;
            }
            config.data_key = data_key.or(config.data_key);
            config.normalize &= !no_normalize;
            handle_ground_truth(config, dataset_path)
        }),
        Some(Commands::Inspect {
            path,
            rows,
        }) => handle_inspect(path, rows),
        None => {
            let mut cmd = Cli::command();
            cmd.print_help().unwrap();
            Ok(())
        },
    };

    if let Err(error) = result {
        let style_error = Style::new().red().bold();
        eprintln!("{} {:#}", style_error.apply_to("error:"), error);
        std::process::exit(1);
    }
}
