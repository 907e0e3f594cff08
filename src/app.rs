//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - turns arguments into explicit config structs
//! - runs the requested pipeline stage
//! - prints reports and writes optional exports

use clap::Parser;

use crate::cli::{BucketArgs, CleanArgs, Command, TrainArgs};
use crate::domain::{BucketConfig, CleanConfig, MlpParams, TrainConfig};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `aq` binary.
pub fn run() -> Result<(), AppError> {
    // Path flags may come from a local `.env`; a missing file is fine.
    dotenvy::dotenv().ok();
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Clean(args) => handle_clean(&args),
        Command::Bucket(args) => handle_bucket(&args),
        Command::Train(args) => handle_train(&args),
    }
}

fn handle_clean(args: &CleanArgs) -> Result<(), AppError> {
    let config = clean_config_from_args(args);
    let run = pipeline::run_clean(&config)?;
    println!("{}", crate::report::format_clean_summary(&run, &config));
    Ok(())
}

fn handle_bucket(args: &BucketArgs) -> Result<(), AppError> {
    let config = bucket_config_from_args(args);
    let buckets = pipeline::run_bucket(&config)?;
    println!("{}", crate::report::format_buckets(&buckets, &config));
    Ok(())
}

fn handle_train(args: &TrainArgs) -> Result<(), AppError> {
    let config = train_config_from_args(args);
    let run = pipeline::run_train(&config)?;

    println!("{}", crate::report::format_train_summary(&run, &config));

    if let Some(path) = &config.export_predictions {
        crate::io::export::write_predictions_csv(path, &run.predictions)?;
    }
    if let Some(path) = &config.export_metrics {
        crate::io::export::write_metrics_json(path, &run.metrics)?;
    }

    Ok(())
}

pub fn clean_config_from_args(args: &CleanArgs) -> CleanConfig {
    CleanConfig {
        air_quality: args.air_quality.clone(),
        weather: args.weather.clone(),
        stations: args.stations.clone(),
        output: args.output.clone(),
    }
}

pub fn bucket_config_from_args(args: &BucketArgs) -> BucketConfig {
    BucketConfig {
        data: args.data.clone(),
        station: crate::io::ingest::normalize_station_id(&args.station),
        pollutant: args.pollutant,
        mode: args.mode,
        filter: args.filter,
        reducer: args.reducer,
    }
}

pub fn train_config_from_args(args: &TrainArgs) -> TrainConfig {
    TrainConfig {
        data: args.data.clone(),
        stations: args.stations.clone(),
        pollutant: args.pollutant,
        x_size: args.x_size,
        y_size: args.y_size,
        step: args.step,
        train_until: args.train_until,
        valid_until: args.valid_until,
        test_until: args.test_until,
        time_features: args.time_features,
        model: args.model,
        mlp: MlpParams {
            hidden: args.hidden,
            epochs: args.epochs,
            learning_rate: args.learning_rate,
            batch_size: args.batch_size,
            patience: args.patience,
            seed: args.seed,
        },
        export_predictions: args.export.clone(),
        export_metrics: args.export_metrics.clone(),
    }
}
