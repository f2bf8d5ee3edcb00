use anyhow::{bail, Context};
use clap::Parser;
use fitcheck_classifiers::{
    ArtifactDir, Dataset, SchemaRegistry, TrainingConfig, TrainingPipeline, TrainingReport,
};
use fitcheck_train::cli::{Cli, Commands};
use fitcheck_train::DatasetGenerator;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            config,
            dataset,
            models_dir,
            seed,
            n_estimators,
            categories,
            strict,
            verbose,
        } => {
            init_logging(verbose);

            let mut config = match config {
                Some(path) => TrainingConfig::from_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => TrainingConfig::default(),
            };

            // Apply CLI overrides
            if let Some(dataset) = dataset {
                config.dataset_path = dataset;
            }
            if let Some(models_dir) = models_dir {
                config.models_dir = models_dir;
            }
            if let Some(seed) = seed {
                config.forest.seed = seed;
            }
            if let Some(n) = n_estimators {
                config.forest.n_estimators = n;
            }
            if !categories.is_empty() {
                config.categories = Some(categories);
            }
            config.strict |= strict;

            let report = train(&config)?;
            print_report(&report);

            if report.trained.is_empty() {
                bail!("no category could be trained");
            }
        }

        Commands::Generate {
            output,
            samples,
            seed,
            verbose,
        } => {
            init_logging(verbose);

            info!("Generating {} samples (seed {})", samples, seed);
            DatasetGenerator::with_seed(seed).write_file(&output, samples)?;
            println!("Wrote {} samples to {}", samples, output.display());
        }
    }

    Ok(())
}

fn train(config: &TrainingConfig) -> anyhow::Result<TrainingReport> {
    let registry = SchemaRegistry::standard();

    info!("Loading dataset from {}", config.dataset_path.display());
    let dataset = Dataset::from_path(&config.dataset_path, &config.layout(&registry))?;
    info!("Loaded {} rows", dataset.len());

    let mut pipeline = TrainingPipeline::new(
        &registry,
        ArtifactDir::new(&config.models_dir),
        config.forest.clone(),
    )
    .with_strict(config.strict);
    if let Some(categories) = &config.categories {
        pipeline = pipeline.with_categories(categories.clone());
    }

    Ok(pipeline.run(&dataset)?)
}

fn print_report(report: &TrainingReport) {
    println!();
    for trained in &report.trained {
        println!(
            "  trained  {:<14} {:>6} samples  accuracy {:.3}  -> {}",
            trained.category,
            trained.samples,
            trained.training_accuracy,
            trained.artifact_path.display()
        );
        if trained.dropped > 0 {
            println!("           {} incomplete rows dropped", trained.dropped);
        }
    }
    for category in &report.skipped {
        println!("  skipped  {:<14} no feature schema", category);
    }
    for (category, error) in &report.failed {
        println!("  failed   {:<14} {}", category, error);
    }
    println!();
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        "fitcheck=debug"
    } else {
        "fitcheck=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
