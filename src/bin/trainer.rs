use anyhow::{Context, Result};
use clap::Parser;
use mfrec::data::movielens::load_dataset;
use mfrec::services::reporting::{JsonLinesSink, ProgressSink, TracingSink};
use mfrec::services::training::evaluate_partition;
use mfrec::{init_tracing, Config, TrainingContext, TrainingService};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Overrides `data.ratings_path`.
    #[arg(short, long)]
    ratings: Option<PathBuf>,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[arg(long)]
    rank: Option<usize>,

    #[arg(long)]
    regularization: Option<f64>,

    #[arg(long)]
    epochs: Option<f64>,

    /// Write the best factors as JSON.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the convergence trace as JSON lines.
    #[arg(long)]
    trace: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    info!("Starting mfrec trainer");

    let mut config = if std::path::Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, using default configuration");
        Config::default()
    };
    if let Some(ratings) = args.ratings {
        config.data.ratings_path = ratings;
    }
    if let Some(rank) = args.rank {
        config.training.rank = rank;
    }
    if let Some(regularization) = args.regularization {
        config.training.regularization = regularization;
    }
    if let Some(epochs) = args.epochs {
        config.training.epochs = epochs;
    }
    config.validate()?;
    info!("Training configuration loaded: {:?}", config.training);

    let dataset = load_dataset(&config.data.ratings_path).with_context(|| {
        format!("failed to load ratings from {}", config.data.ratings_path.display())
    })?;
    let partitions = dataset.split_with(&config.data)?;
    let context = TrainingContext::from_partitions(&dataset, &partitions);
    let service = TrainingService::new(config.training.clone())?;

    let outcome = match &args.trace {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create trace file {}", path.display()))?;
            let mut sink = (TracingSink, JsonLinesSink::new(BufWriter::new(file)));
            service.train(&context, None, &mut sink as &mut dyn ProgressSink)?
        }
        None => service.train(&context, None, &mut TracingSink)?,
    };

    info!(
        "Best checkpoint at iteration {} (epoch {:.3}): train RMSE {:.4}, validation RMSE {:.4}",
        outcome.best.iteration,
        outcome.best.epoch,
        outcome.best.train_rmse,
        outcome.best.validation_rmse
    );

    let report = evaluate_partition(&outcome.factors, &partitions.test)?;
    info!(
        "Test set: {} ratings, RMSE {:.4}, MAE {:.4}",
        report.count, report.rmse, report.mae
    );

    if let Some(path) = &args.output {
        let mut writer = BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        );
        serde_json::to_writer(&mut writer, &outcome.factors)?;
        writer.flush()?;
        info!("Factors written to {}", path.display());
    }

    Ok(())
}
