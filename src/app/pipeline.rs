//! Shared pipeline logic behind the `aq` subcommands.
//!
//! - clean: ingest -> merge/clean -> cleaned CSV
//! - bucket: cleaned CSV -> one station series -> calendar buckets
//! - train: cleaned CSV -> per-station series -> period split -> windows ->
//!   fit -> predict -> metrics
//!
//! The CLI handlers in `app` only print and export what these return.

use std::collections::BTreeMap;

use chrono::Duration;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::domain::{
    Bucket, BucketConfig, CleanConfig, MergedRecord, ModelSpec, Prediction, Station, TimeSeries,
    Timestamp, TrainConfig, TrainMetrics, WindowPairs,
};
use crate::error::{AppError, PrepError};
use crate::io::ingest::{
    Ingested, RowError, open_csv, read_air_quality, read_cleaned, read_stations, read_weather,
};
use crate::math::error_metrics;
use crate::models::{FitReport, Forecaster, LinearForecaster, Mlp};
use crate::prep::{MergeSummary, group_by_station, merge_sources, station_series};
use crate::times::{bucket_by, calendar_features, select};
use crate::window::split_windows;

/// Outputs of `aq clean`.
#[derive(Debug, Clone)]
pub struct CleanOutput {
    pub summary: MergeSummary,
    /// Rows read per input file (air quality, weather, stations).
    pub rows_read: [usize; 3],
    /// Rows skipped because they failed to parse.
    pub skipped_rows: usize,
}

/// Read the three raw inputs, merge them, and write the cleaned table.
pub fn run_clean(config: &CleanConfig) -> Result<CleanOutput, AppError> {
    let air_quality = read_air_quality(open_csv(&config.air_quality)?)?;
    log_row_errors("air quality", &air_quality);
    let weather = read_weather(open_csv(&config.weather)?)?;
    log_row_errors("weather", &weather);
    let stations = read_stations(open_csv(&config.stations)?)?;
    log_row_errors("stations", &stations);

    let (records, summary) = merge_sources(&air_quality.rows, &weather.rows, &stations.rows);
    info!(
        rows = summary.rows,
        invalid_weather_values = summary.invalid_weather_values,
        weather_only_stations = summary.weather_only_stations.len(),
        "merged sources"
    );

    crate::io::export::write_cleaned_csv(&config.output, &records)?;
    info!(path = %config.output.display(), "wrote cleaned table");

    Ok(CleanOutput {
        summary,
        rows_read: [air_quality.rows_read, weather.rows_read, stations.rows_read],
        skipped_rows: air_quality.row_errors.len()
            + weather.row_errors.len()
            + stations.row_errors.len(),
    })
}

/// Bucket one station's series.
pub fn run_bucket(config: &BucketConfig) -> Result<Vec<Bucket>, AppError> {
    let records = load_cleaned(config)?;
    let series = station_series(&records, &config.station, config.pollutant)?;
    if series.is_empty() {
        return Err(AppError::new(
            3,
            format!(
                "No {} readings for station '{}'.",
                config.pollutant.column_name(),
                config.station
            ),
        ));
    }

    let buckets = bucket_by(&series, config.mode, config.filter, config.reducer)?;
    info!(
        station = %config.station,
        mode = %config.mode,
        samples = series.len(),
        buckets = buckets.len(),
        "bucketed series"
    );
    Ok(buckets)
}

/// Period boundaries used to split each station series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Periods {
    pub start: Timestamp,
    pub train_until: Timestamp,
    pub valid_until: Timestamp,
    pub test_until: Timestamp,
}

/// Window counts contributed by one station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationSamples {
    pub station: String,
    pub train: usize,
    pub valid: usize,
    pub test: usize,
}

/// All computed outputs of a single `aq train` run.
#[derive(Debug, Clone)]
pub struct TrainOutput {
    pub periods: Periods,
    pub stations: Vec<StationSamples>,
    pub fit: FitReport,
    pub metrics: TrainMetrics,
    pub predictions: Vec<Prediction>,
}

/// Load the cleaned table and station list, then train and evaluate.
pub fn run_train(config: &TrainConfig) -> Result<TrainOutput, AppError> {
    let records = read_cleaned(open_csv(&config.data)?)?;
    log_row_errors("cleaned data", &records);
    let stations = read_stations(open_csv(&config.stations)?)?;
    log_row_errors("stations", &stations);

    train_on_records(&records.rows, &stations.rows, config)
}

/// Train and evaluate on already-loaded rows.
pub fn train_on_records(
    records: &[MergedRecord],
    stations: &[Station],
    config: &TrainConfig,
) -> Result<TrainOutput, AppError> {
    let series = group_by_station(records, stations, config.pollutant)?;
    if series.is_empty() {
        return Err(AppError::new(
            3,
            format!(
                "No prediction station has {} readings.",
                config.pollutant.column_name()
            ),
        ));
    }
    info!(stations = series.len(), pollutant = config.pollutant.column_name(), "grouped series");
    train_on_series(&series, config)
}

/// Train and evaluate on per-station series.
pub fn train_on_series(
    series: &BTreeMap<String, TimeSeries>,
    config: &TrainConfig,
) -> Result<TrainOutput, AppError> {
    if config.x_size == 0 || config.y_size == 0 || config.step == 0 {
        return Err(PrepError::InvalidWindowSpec(
            "x-size, y-size and step must all be >= 1".to_string(),
        )
        .into());
    }
    let periods = resolve_periods(series, config)?;
    info!(
        start = %periods.start,
        train_until = %periods.train_until,
        valid_until = %periods.valid_until,
        test_until = %periods.test_until,
        "periods"
    );

    let windows: Vec<StationWindows> = series
        .par_iter()
        .map(|(station, s)| window_station(station, s, &periods, config))
        .collect::<Result<_, PrepError>>()?;

    let train = concat(windows.iter().map(|w| &w.train.pairs));
    let valid = concat(windows.iter().map(|w| &w.valid.pairs));
    let test = concat(windows.iter().map(|w| &w.test.pairs));
    info!(train = train.0.len(), valid = valid.0.len(), test = test.0.len(), "windowed series");

    if train.0.is_empty() {
        return Err(AppError::new(
            3,
            format!(
                "No training windows: every station has fewer than {} readings before {}.",
                config.x_size + config.y_size,
                periods.train_until
            ),
        ));
    }
    if test.0.is_empty() {
        return Err(AppError::new(
            3,
            format!(
                "No test windows between {} and {}.",
                periods.valid_until, periods.test_until
            ),
        ));
    }

    let mut model = build_model(config);
    let valid_set = (!valid.0.is_empty()).then_some((valid.0.as_slice(), valid.1.as_slice()));
    let fit = model.fit(&train.0, &train.1, valid_set)?;
    info!(
        model = model.name(),
        epochs = fit.epochs_run,
        train_loss = fit.final_train_loss,
        "fitted forecaster"
    );

    let valid_metrics = match valid_set {
        Some((vx, vy)) => Some(error_metrics(&model.predict(vx)?, vy)),
        None => None,
    };
    let test_forecast = model.predict(&test.0)?;
    let test_metrics = error_metrics(&test_forecast, &test.1);
    if !test_metrics.rmse.is_finite() {
        return Err(AppError::new(4, "Non-finite forecast on the test period."));
    }

    let predictions = build_predictions(&windows, &test_forecast);

    let metrics = TrainMetrics {
        model: config.model,
        pollutant: config.pollutant,
        stations: windows.len(),
        train_samples: train.0.len(),
        valid_samples: valid.0.len(),
        test_samples: test.0.len(),
        epochs_run: fit.epochs_run,
        final_train_loss: fit.final_train_loss,
        best_valid_loss: fit.best_valid_loss,
        valid: valid_metrics,
        test: test_metrics,
    };

    let stations = windows
        .iter()
        .map(|w| StationSamples {
            station: w.station.clone(),
            train: w.train.pairs.len(),
            valid: w.valid.pairs.len(),
            test: w.test.pairs.len(),
        })
        .collect();

    Ok(TrainOutput {
        periods,
        stations,
        fit,
        metrics,
        predictions,
    })
}

fn build_model(config: &TrainConfig) -> Box<dyn Forecaster> {
    match config.model {
        ModelSpec::Mlp => Box::new(Mlp::new(config.mlp.clone())),
        ModelSpec::Linear => Box::new(LinearForecaster::new()),
    }
}

/// Fill unset period bounds from the overall data span.
pub fn resolve_periods(
    series: &BTreeMap<String, TimeSeries>,
    config: &TrainConfig,
) -> Result<Periods, AppError> {
    let start = series.values().filter_map(|s| s.times().first()).min().copied();
    let end = series.values().filter_map(|s| s.times().last()).max().copied();
    let (Some(start), Some(end)) = (start, end) else {
        return Err(AppError::new(3, "No readings to split into periods."));
    };

    let span = end - start;
    let train_until = config.train_until.unwrap_or(start + span * 7 / 10);
    let valid_until = config.valid_until.unwrap_or(start + span * 85 / 100);
    // exclusive bound, so step past the last reading
    let test_until = config.test_until.unwrap_or(end + Duration::seconds(1));

    if !(start < train_until && train_until <= valid_until && valid_until <= test_until) {
        return Err(AppError::new(
            2,
            format!(
                "Periods must satisfy start < train-until <= valid-until <= test-until \
                 (got {start}, {train_until}, {valid_until}, {test_until})."
            ),
        ));
    }

    Ok(Periods {
        start,
        train_until,
        valid_until,
        test_until,
    })
}

/// Windows of one period plus the timestamp of every output value.
#[derive(Debug, Clone)]
struct PeriodWindows {
    pairs: WindowPairs<f64>,
    y_times: Vec<Vec<Timestamp>>,
}

#[derive(Debug, Clone)]
struct StationWindows {
    station: String,
    train: PeriodWindows,
    valid: PeriodWindows,
    test: PeriodWindows,
}

fn window_station(
    station: &str,
    series: &TimeSeries,
    periods: &Periods,
    config: &TrainConfig,
) -> Result<StationWindows, PrepError> {
    let period = |from: Timestamp, to: Timestamp| {
        window_period(&select(series, Some(from), Some(to)), config)
    };
    let windows = StationWindows {
        station: station.to_string(),
        train: period(periods.start, periods.train_until)?,
        valid: period(periods.train_until, periods.valid_until)?,
        test: period(periods.valid_until, periods.test_until)?,
    };
    debug!(
        station,
        train = windows.train.pairs.len(),
        valid = windows.valid.pairs.len(),
        test = windows.test.pairs.len(),
        "windowed station"
    );
    Ok(windows)
}

fn window_period(series: &TimeSeries, config: &TrainConfig) -> Result<PeriodWindows, PrepError> {
    if series.len() < config.x_size + config.y_size {
        return Ok(PeriodWindows {
            pairs: WindowPairs {
                times: Vec::new(),
                x: Vec::new(),
                y: Vec::new(),
            },
            y_times: Vec::new(),
        });
    }

    let (x_size, y_size, step) = (config.x_size, config.y_size, config.step);
    let mut pairs = split_windows(series.times(), series.values(), x_size, y_size, step)?;
    let y_times = split_windows(series.times(), series.times(), x_size, y_size, step)?.y;

    if config.time_features {
        for (x, t) in pairs.x.iter_mut().zip(&pairs.times) {
            let (day_of_week, hour) = calendar_features(*t);
            x.push(f64::from(day_of_week));
            x.push(f64::from(hour));
        }
    }

    Ok(PeriodWindows { pairs, y_times })
}

fn concat<'a>(parts: impl Iterator<Item = &'a WindowPairs<f64>>) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
    let mut x = Vec::new();
    let mut y = Vec::new();
    for p in parts {
        x.extend(p.x.iter().cloned());
        y.extend(p.y.iter().cloned());
    }
    (x, y)
}

/// One `Prediction` per forecast step, in station then window order.
fn build_predictions(windows: &[StationWindows], forecast: &[Vec<f64>]) -> Vec<Prediction> {
    let mut out = Vec::new();
    let mut rows = forecast.iter();
    for w in windows {
        for (actual, times) in w.test.pairs.y.iter().zip(&w.test.y_times) {
            let Some(pred) = rows.next() else {
                return out;
            };
            for (h, ((&a, &f), &time)) in actual.iter().zip(pred).zip(times).enumerate() {
                out.push(Prediction {
                    station: w.station.clone(),
                    time,
                    horizon: h + 1,
                    forecast: f,
                    actual: a,
                });
            }
        }
    }
    out
}

fn log_row_errors<T>(label: &str, ingested: &Ingested<T>) {
    if ingested.row_errors.is_empty() {
        debug!(input = label, rows = ingested.rows.len(), "loaded");
        return;
    }
    warn!(
        input = label,
        rows = ingested.rows.len(),
        skipped = ingested.row_errors.len(),
        "skipped invalid rows"
    );
    for RowError { line, message } in ingested.row_errors.iter().take(5) {
        debug!(input = label, line, %message, "row error");
    }
}

fn load_cleaned(config: &BucketConfig) -> Result<Vec<MergedRecord>, AppError> {
    let records = read_cleaned(open_csv(&config.data)?)?;
    log_row_errors("cleaned data", &records);
    Ok(records.rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MlpParams, Pollutant};
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn t0() -> Timestamp {
        NaiveDate::from_ymd_opt(2018, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    fn hourly(n: i64, f: impl Fn(i64) -> f64) -> TimeSeries {
        TimeSeries::from_pairs((0..n).map(|i| (t0() + Duration::hours(i), f(i)))).unwrap()
    }

    fn config(model: ModelSpec) -> TrainConfig {
        TrainConfig {
            data: PathBuf::from("unused.csv"),
            stations: PathBuf::from("unused.csv"),
            pollutant: Pollutant::Pm25,
            x_size: 4,
            y_size: 2,
            step: 1,
            train_until: None,
            valid_until: None,
            test_until: None,
            time_features: false,
            model,
            mlp: MlpParams {
                epochs: 5,
                ..MlpParams::default()
            },
            export_predictions: None,
            export_metrics: None,
        }
    }

    #[test]
    fn linear_model_fits_linear_series() {
        let mut series = BTreeMap::new();
        series.insert("a".to_string(), hourly(100, |i| 10.0 + i as f64));
        series.insert("b".to_string(), hourly(100, |i| 50.0 + 2.0 * i as f64));

        let run = train_on_series(&series, &config(ModelSpec::Linear)).unwrap();

        assert_eq!(run.stations.len(), 2);
        assert_eq!(run.metrics.stations, 2);
        let per_station_test: usize = run.stations.iter().map(|s| s.test).sum();
        assert_eq!(run.metrics.test_samples, per_station_test);
        assert_eq!(run.predictions.len(), run.metrics.test_samples * 2);
        assert!(run.metrics.test.mae < 1e-4);
        assert!(run.metrics.valid.is_some());

        // first prediction belongs to station "a" and carries the output time
        let first = &run.predictions[0];
        assert_eq!(first.station, "a");
        assert_eq!(first.horizon, 1);
        assert!(first.time >= run.periods.valid_until);
    }

    #[test]
    fn explicit_periods_are_respected() {
        let mut series = BTreeMap::new();
        series.insert("a".to_string(), hourly(48, |i| (i % 5) as f64));
        let mut cfg = config(ModelSpec::Linear);
        cfg.train_until = Some(t0() + Duration::hours(24));
        cfg.valid_until = Some(t0() + Duration::hours(24));
        cfg.test_until = Some(t0() + Duration::hours(48));

        let run = train_on_series(&series, &cfg).unwrap();
        // 24 points per period, x + y = 6: 24 - 6 + 1 windows
        assert_eq!(run.metrics.train_samples, 19);
        assert_eq!(run.metrics.valid_samples, 0);
        assert_eq!(run.metrics.test_samples, 19);
        assert!(run.metrics.valid.is_none());
    }

    #[test]
    fn inverted_periods_are_rejected() {
        let mut series = BTreeMap::new();
        series.insert("a".to_string(), hourly(48, |i| i as f64));
        let mut cfg = config(ModelSpec::Linear);
        cfg.train_until = Some(t0() + Duration::hours(30));
        cfg.valid_until = Some(t0() + Duration::hours(20));

        let err = train_on_series(&series, &cfg).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn too_short_series_has_no_training_windows() {
        let mut series = BTreeMap::new();
        series.insert("a".to_string(), hourly(5, |i| i as f64));
        let err = train_on_series(&series, &config(ModelSpec::Linear)).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn time_features_extend_inputs() {
        let series = hourly(10, |i| i as f64);
        let mut cfg = config(ModelSpec::Mlp);
        cfg.time_features = true;

        let windows = window_period(&series, &cfg).unwrap();
        assert_eq!(windows.pairs.len(), 5);
        // 2018-01-01 is a Monday; first output starts at 04:00
        assert_eq!(windows.pairs.x[0], vec![0.0, 1.0, 2.0, 3.0, 1.0, 4.0]);
        assert_eq!(windows.y_times[0], vec![t0() + Duration::hours(4), t0() + Duration::hours(5)]);
    }

    #[test]
    fn mlp_runs_end_to_end() {
        let mut series = BTreeMap::new();
        series.insert("a".to_string(), hourly(120, |i| (i as f64 * 0.3).sin() * 10.0 + 20.0));
        let run = train_on_series(&series, &config(ModelSpec::Mlp)).unwrap();
        assert_eq!(run.fit.epochs_run, run.fit.history.len());
        assert!(run.metrics.test.smape.is_finite());
    }
}
