use crate::app::pipeline::{CleanOutput, TrainOutput};
use crate::domain::{Bucket, BucketConfig, CleanConfig, ErrorMetrics, TrainConfig};

/// Summary of an `aq clean` run.
pub fn format_clean_summary(run: &CleanOutput, config: &CleanConfig) -> String {
    let mut out = String::new();
    let s = &run.summary;

    out.push_str("=== aq clean ===\n");
    out.push_str(&format!(
        "Read: air quality={} | weather={} | stations={} (skipped {} invalid rows)\n",
        run.rows_read[0], run.rows_read[1], run.rows_read[2], run.skipped_rows
    ));
    out.push_str(&format!(
        "Merged: rows={} | from air quality={} | from weather={}\n",
        s.rows, s.aq_rows, s.weather_rows
    ));
    out.push_str(&format!("Invalid weather values removed: {}\n", s.invalid_weather_values));
    if s.weather_only_stations.is_empty() {
        out.push_str("Weather-only stations: none\n");
    } else {
        out.push_str(&format!(
            "Weather-only stations ({}): {}\n",
            s.weather_only_stations.len(),
            s.weather_only_stations.join(", ")
        ));
    }
    out.push_str(&format!("Output: {}\n", config.output.display()));

    out
}

/// Bucket table: key, reduced value, sample count.
pub fn format_buckets(buckets: &[Bucket], config: &BucketConfig) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Station: {} | {} | mode={} | reducer={:?}",
        config.station,
        config.pollutant.column_name(),
        config.mode,
        config.reducer
    ));
    if let Some(filter) = config.filter {
        out.push_str(&format!(" | filter={filter}"));
    }
    out.push_str("\n\n");

    out.push_str(format!("{:<20} {:>12} {:>8}", "bucket", "value", "count").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<20} {:-<12} {:-<8}", "", "", "").trim_end());
    out.push('\n');

    for b in buckets {
        let line = format!("{:<20} {:>12.3} {:>8}", b.key.to_string(), b.value, b.count);
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out.push_str(&format!("({} buckets)\n", buckets.len()));

    out
}

/// Summary of an `aq train` run: config, per-split sample counts, training
/// history, and error metrics.
pub fn format_train_summary(run: &TrainOutput, config: &TrainConfig) -> String {
    let mut out = String::new();
    let m = &run.metrics;

    out.push_str("=== aq train ===\n");
    out.push_str(&format!(
        "Pollutant: {} | model: {}\n",
        config.pollutant.column_name(),
        config.model.display_name()
    ));
    out.push_str(&format!(
        "Windows: x={} y={} step={}{}\n",
        config.x_size,
        config.y_size,
        config.step,
        if config.time_features { " (+ time features)" } else { "" }
    ));
    out.push_str(&format!(
        "Periods: train [{}, {}) | valid [{}, {}) | test [{}, {})\n",
        run.periods.start,
        run.periods.train_until,
        run.periods.train_until,
        run.periods.valid_until,
        run.periods.valid_until,
        run.periods.test_until
    ));
    out.push_str(&format!(
        "Samples: train={} valid={} test={} over {} stations\n",
        m.train_samples, m.valid_samples, m.test_samples, m.stations
    ));

    out.push_str("\nPer station:\n");
    let header = format!("{:<16} {:>8} {:>8} {:>8}", "station", "train", "valid", "test");
    out.push_str(header.trim_end());
    out.push('\n');
    out.push_str(format!("{:-<16} {:-<8} {:-<8} {:-<8}", "", "", "", "").trim_end());
    out.push('\n');
    for s in &run.stations {
        out.push_str(
            format!("{:<16} {:>8} {:>8} {:>8}", truncate(&s.station, 16), s.train, s.valid, s.test)
                .trim_end(),
        );
        out.push('\n');
    }

    out.push_str("\nTraining:\n");
    out.push_str(&format!("- epochs run: {}\n", run.fit.epochs_run));
    if let (Some(first), Some(last)) = (run.fit.history.first(), run.fit.history.last()) {
        out.push_str(&format!("- train loss: {first:.6} -> {last:.6}\n"));
    }
    out.push_str(&format!("- final train loss: {:.6}\n", run.fit.final_train_loss));
    if let Some(best) = run.fit.best_valid_loss {
        out.push_str(&format!("- best valid loss: {best:.6}\n"));
    }

    out.push_str("\nErrors:\n");
    if let Some(valid) = &m.valid {
        out.push_str(&format!("  valid {}\n", fmt_metrics(valid)));
    }
    out.push_str(&format!("  test  {}\n", fmt_metrics(&m.test)));

    out
}

fn fmt_metrics(m: &ErrorMetrics) -> String {
    format!("SMAPE={:.3}% RMSE={:.3} MAE={:.3}", m.smape, m.rmse, m.mae)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::{Periods, StationSamples};
    use crate::domain::{
        BucketKey, BucketMode, MlpParams, ModelSpec, Pollutant, Reducer, TrainMetrics,
    };
    use crate::models::FitReport;
    use crate::prep::MergeSummary;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    #[test]
    fn bucket_table_lists_keys() {
        let config = BucketConfig {
            data: PathBuf::from("clean.csv"),
            station: "dongsi".to_string(),
            pollutant: Pollutant::Pm10,
            mode: BucketMode::Month,
            filter: None,
            reducer: Reducer::Mean,
        };
        let buckets = vec![
            Bucket { key: BucketKey::Month { year: 2018, month: 1 }, value: 12.5, count: 744 },
            Bucket { key: BucketKey::Month { year: 2018, month: 2 }, value: 9.0, count: 672 },
        ];
        let text = format_buckets(&buckets, &config);
        assert!(text.contains("dongsi | PM10 | mode=m"));
        assert!(text.contains("2018-01"));
        assert!(text.contains("12.500"));
        assert!(text.contains("(2 buckets)"));
        assert!(text.lines().all(|l| l == l.trim_end()));
    }

    #[test]
    fn clean_summary_names_weather_only_stations() {
        let run = CleanOutput {
            summary: MergeSummary {
                rows: 10,
                aq_rows: 8,
                weather_rows: 6,
                invalid_weather_values: 1,
                weather_only_stations: vec!["beijing".to_string()],
            },
            rows_read: [8, 6, 2],
            skipped_rows: 0,
        };
        let config = CleanConfig {
            air_quality: PathBuf::from("aq.csv"),
            weather: PathBuf::from("meo.csv"),
            stations: PathBuf::from("stations.csv"),
            output: PathBuf::from("clean.csv"),
        };
        let text = format_clean_summary(&run, &config);
        assert!(text.contains("Weather-only stations (1): beijing"));
        assert!(text.contains("Output: clean.csv"));
    }

    #[test]
    fn train_summary_shows_metrics() {
        let t = |d| NaiveDate::from_ymd_opt(2018, 1, d).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let metrics = ErrorMetrics { smape: 12.3456, rmse: 4.0, mae: 3.0 };
        let run = TrainOutput {
            periods: Periods {
                start: t(1),
                train_until: t(10),
                valid_until: t(12),
                test_until: t(14),
            },
            stations: vec![StationSamples {
                station: "a_very_long_station_name".to_string(),
                train: 5,
                valid: 2,
                test: 1,
            }],
            fit: FitReport {
                epochs_run: 3,
                final_train_loss: 0.5,
                best_valid_loss: Some(0.6),
                history: vec![1.0, 0.7, 0.5],
            },
            metrics: TrainMetrics {
                model: ModelSpec::Mlp,
                pollutant: Pollutant::Pm25,
                stations: 1,
                train_samples: 5,
                valid_samples: 2,
                test_samples: 1,
                epochs_run: 3,
                final_train_loss: 0.5,
                best_valid_loss: Some(0.6),
                valid: None,
                test: metrics,
            },
            predictions: Vec::new(),
        };
        let config = TrainConfig {
            data: PathBuf::from("clean.csv"),
            stations: PathBuf::from("stations.csv"),
            pollutant: Pollutant::Pm25,
            x_size: 48,
            y_size: 24,
            step: 1,
            train_until: None,
            valid_until: None,
            test_until: None,
            time_features: false,
            model: ModelSpec::Mlp,
            mlp: MlpParams::default(),
            export_predictions: None,
            export_metrics: None,
        };

        let text = format_train_summary(&run, &config);
        assert!(text.contains("model: MLP"));
        assert!(text.contains("train loss: 1.000000 -> 0.500000"));
        assert!(text.contains("test  SMAPE=12.346%"));
        assert!(text.contains("a_very_long_sta."));
        assert!(!text.contains("valid SMAPE"));
    }
}
