//! Command-line parsing for the air-quality forecasting pipeline.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the windowing/aggregation and learning code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::{BucketMode, ModelSpec, Pollutant, Reducer, Timestamp};
use crate::io::ingest::parse_timestamp;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "aq", version, about = "Air-quality time-series preparation and forecasting")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Merge raw air-quality and weather exports into one cleaned table.
    Clean(CleanArgs),
    /// Aggregate one station's pollutant series into calendar buckets.
    Bucket(BucketArgs),
    /// Window the prediction stations' series, train a forecaster, and report
    /// test-period errors.
    Train(TrainArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct CleanArgs {
    /// Raw air-quality CSV (stationId,utc_time,PM2.5,...).
    #[arg(long, env = "AQ_AIR_QUALITY", value_name = "CSV")]
    pub air_quality: PathBuf,

    /// Raw weather CSV (station_id,longitude,latitude,utc_time,...).
    #[arg(long, env = "AQ_WEATHER", value_name = "CSV")]
    pub weather: PathBuf,

    /// Station table (station_id,longitude,latitude,predict).
    #[arg(long, env = "AQ_STATIONS", value_name = "CSV")]
    pub stations: PathBuf,

    /// Where to write the `;`-separated cleaned table.
    #[arg(short = 'o', long, env = "AQ_CLEAN_DATA", value_name = "CSV")]
    pub output: PathBuf,
}

#[derive(Debug, Parser, Clone)]
pub struct BucketArgs {
    /// Cleaned table produced by `aq clean`.
    #[arg(long, env = "AQ_CLEAN_DATA", value_name = "CSV")]
    pub data: PathBuf,

    /// Station id (after normalization, e.g. `dongsi`).
    #[arg(short = 's', long)]
    pub station: String,

    /// Pollutant column to aggregate.
    #[arg(short = 'p', long, value_enum, default_value_t = Pollutant::Pm25)]
    pub pollutant: Pollutant,

    /// Bucket mode: h, 3h, 6h, dw, m or s.
    #[arg(short = 'm', long, value_parser = parse_mode)]
    pub mode: BucketMode,

    /// Keep only buckets whose hour / weekday / month / season equals this value.
    #[arg(long)]
    pub filter: Option<u32>,

    /// How to reduce the samples of each bucket.
    #[arg(long, value_enum, default_value_t = Reducer::Mean)]
    pub reducer: Reducer,
}

#[derive(Debug, Parser, Clone)]
pub struct TrainArgs {
    /// Cleaned table produced by `aq clean`.
    #[arg(long, env = "AQ_CLEAN_DATA", value_name = "CSV")]
    pub data: PathBuf,

    /// Station table; only stations with `predict` set are trained on.
    #[arg(long, env = "AQ_STATIONS", value_name = "CSV")]
    pub stations: PathBuf,

    /// Pollutant to forecast.
    #[arg(short = 'p', long, value_enum, default_value_t = Pollutant::Pm25)]
    pub pollutant: Pollutant,

    /// Input window length (hours of history).
    #[arg(long, default_value_t = 48)]
    pub x_size: usize,

    /// Output window length (hours ahead).
    #[arg(long, default_value_t = 24)]
    pub y_size: usize,

    /// Stride between consecutive windows.
    #[arg(long, default_value_t = 1)]
    pub step: usize,

    /// Which forecaster to train.
    #[arg(long, value_enum, default_value_t = ModelSpec::Mlp)]
    pub model: ModelSpec,

    /// Hidden layer width (MLP).
    #[arg(long, default_value_t = 64)]
    pub hidden: usize,

    /// Maximum training epochs (MLP).
    #[arg(long, default_value_t = 200)]
    pub epochs: usize,

    /// Adam learning rate (MLP).
    #[arg(long, default_value_t = 0.01)]
    pub learning_rate: f64,

    /// Mini-batch size (MLP).
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Epochs without validation improvement before stopping (0 disables).
    #[arg(long, default_value_t = 10)]
    pub patience: usize,

    /// Random seed for weight init and shuffling.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// End of the training period (exclusive).
    #[arg(long, value_parser = parse_time, value_name = "TIME")]
    pub train_until: Option<Timestamp>,

    /// End of the validation period (exclusive).
    #[arg(long, value_parser = parse_time, value_name = "TIME")]
    pub valid_until: Option<Timestamp>,

    /// End of the test period (exclusive).
    #[arg(long, value_parser = parse_time, value_name = "TIME")]
    pub test_until: Option<Timestamp>,

    /// Append (day of week, hour) of the first forecast step to each input window.
    #[arg(long)]
    pub time_features: bool,

    /// Export per-step test predictions to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Export run metrics to JSON.
    #[arg(long = "export-metrics", value_name = "JSON")]
    pub export_metrics: Option<PathBuf>,
}

fn parse_mode(s: &str) -> Result<BucketMode, String> {
    s.parse::<BucketMode>().map_err(|e| e.to_string())
}

fn parse_time(s: &str) -> Result<Timestamp, String> {
    parse_timestamp(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bucket_command() {
        let cli = Cli::try_parse_from([
            "aq", "bucket", "--data", "clean.csv", "--station", "dongsi", "--pollutant", "NO2",
            "--mode", "3h", "--filter", "6", "--reducer", "max",
        ])
        .unwrap();
        let Command::Bucket(args) = cli.command else {
            panic!("expected bucket command");
        };
        assert_eq!(args.mode, BucketMode::Hour3);
        assert_eq!(args.pollutant, Pollutant::No2);
        assert_eq!(args.filter, Some(6));
        assert_eq!(args.reducer, Reducer::Max);
    }

    #[test]
    fn rejects_unknown_mode() {
        let res = Cli::try_parse_from([
            "aq", "bucket", "--data", "clean.csv", "--station", "x", "--mode", "2h",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn train_defaults_and_time_bounds() {
        let cli = Cli::try_parse_from([
            "aq", "train", "--data", "clean.csv", "--stations", "stations.csv",
            "--train-until", "2018-01-01", "--model", "linear",
        ])
        .unwrap();
        let Command::Train(args) = cli.command else {
            panic!("expected train command");
        };
        assert_eq!(args.x_size, 48);
        assert_eq!(args.y_size, 24);
        assert_eq!(args.model, ModelSpec::Linear);
        assert_eq!(
            args.train_until.map(|t| t.to_string()).as_deref(),
            Some("2018-01-01 00:00:00")
        );
        assert!(args.valid_until.is_none());
        assert!(!args.time_features);
    }
}
