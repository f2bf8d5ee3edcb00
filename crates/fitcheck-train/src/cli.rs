use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fitcheck-train")]
#[command(
    author,
    version,
    about = "Train per-category fit models and generate synthetic datasets"
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train one model per fit category from a unified CSV dataset
    Train {
        /// Training configuration file (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Dataset CSV path
        #[arg(short, long)]
        dataset: Option<PathBuf>,

        /// Output directory for model artifacts
        #[arg(short, long)]
        models_dir: Option<PathBuf>,

        /// Random seed for the forests
        #[arg(short, long)]
        seed: Option<u64>,

        /// Number of trees per forest
        #[arg(long)]
        n_estimators: Option<usize>,

        /// Only train these categories (repeatable)
        #[arg(long = "category")]
        categories: Vec<String>,

        /// Fail when the dataset contains a category without a feature schema
        #[arg(long)]
        strict: bool,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Write a synthetic labeled dataset
    Generate {
        /// Output CSV path
        #[arg(short, long, default_value = "fit_dataset.csv")]
        output: PathBuf,

        /// Number of rows
        #[arg(short = 'n', long, default_value = "20000")]
        samples: usize,

        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
}
