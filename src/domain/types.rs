//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - built once from cleaned CSV data and shared read-only by the core
//! - exported to CSV/JSON
//! - passed explicitly through the pipeline (no global state)

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::PrepError;

/// Timestamps are UTC wall-clock times without a zone.
pub type Timestamp = NaiveDateTime;

/// Pollutant columns present in the air-quality data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum Pollutant {
    #[serde(rename = "PM2.5")]
    #[value(name = "PM2.5", alias = "pm2.5", alias = "pm25")]
    Pm25,
    #[serde(rename = "PM10")]
    #[value(name = "PM10", alias = "pm10")]
    Pm10,
    #[serde(rename = "NO2")]
    #[value(name = "NO2", alias = "no2")]
    No2,
    #[serde(rename = "CO")]
    #[value(name = "CO", alias = "co")]
    Co,
    #[serde(rename = "O3")]
    #[value(name = "O3", alias = "o3")]
    O3,
    #[serde(rename = "SO2")]
    #[value(name = "SO2", alias = "so2")]
    So2,
}

impl Pollutant {
    pub const ALL: [Pollutant; 6] = [
        Pollutant::Pm25,
        Pollutant::Pm10,
        Pollutant::No2,
        Pollutant::Co,
        Pollutant::O3,
        Pollutant::So2,
    ];

    /// Column header used in the raw and cleaned CSV files.
    pub fn column_name(self) -> &'static str {
        match self {
            Pollutant::Pm25 => "PM2.5",
            Pollutant::Pm10 => "PM10",
            Pollutant::No2 => "NO2",
            Pollutant::Co => "CO",
            Pollutant::O3 => "O3",
            Pollutant::So2 => "SO2",
        }
    }

    fn index(self) -> usize {
        match self {
            Pollutant::Pm25 => 0,
            Pollutant::Pm10 => 1,
            Pollutant::No2 => 2,
            Pollutant::Co => 3,
            Pollutant::O3 => 4,
            Pollutant::So2 => 5,
        }
    }
}

/// Per-row pollutant readings, indexed by `Pollutant`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Readings([Option<f64>; 6]);

impl Readings {
    pub fn get(&self, pollutant: Pollutant) -> Option<f64> {
        self.0[pollutant.index()]
    }

    pub fn set(&mut self, pollutant: Pollutant, value: Option<f64>) {
        self.0[pollutant.index()] = value;
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }
}

/// Weather measurements attached to a station/time row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Weather {
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_direction: Option<f64>,
    pub wind_speed: Option<f64>,
    pub weather: Option<String>,
}

/// A raw air-quality row after station id normalization.
#[derive(Debug, Clone)]
pub struct AirQualityRow {
    pub station_id: String,
    pub time: Timestamp,
    pub readings: Readings,
}

/// A raw weather row after station id normalization.
#[derive(Debug, Clone)]
pub struct WeatherRow {
    pub station_id: String,
    pub time: Timestamp,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub weather: Weather,
}

/// A sensor location.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub id: String,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    /// Whether this station's series are forecast targets.
    pub predict: bool,
}

/// One row of the cleaned, merged table.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRecord {
    pub station_id: String,
    pub time: Timestamp,
    pub readings: Readings,
    pub weather: Weather,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    /// `true` for air-quality stations, `false` for weather-only stations.
    pub aq: bool,
}

/// An ordered `(timestamp, value)` sequence for one station and pollutant.
///
/// Timestamps are strictly increasing. Gaps are allowed and never filled here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    times: Vec<Timestamp>,
    values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(times: Vec<Timestamp>, values: Vec<f64>) -> Result<Self, PrepError> {
        if times.len() != values.len() {
            return Err(PrepError::InvalidWindowSpec(format!(
                "time and value lengths differ ({} vs {})",
                times.len(),
                values.len()
            )));
        }
        if let Some(idx) = times.windows(2).position(|w| w[1] <= w[0]) {
            return Err(PrepError::UnsortedSeries { index: idx + 1 });
        }
        Ok(Self { times, values })
    }

    pub fn from_pairs(
        pairs: impl IntoIterator<Item = (Timestamp, f64)>,
    ) -> Result<Self, PrepError> {
        let (times, values) = pairs.into_iter().unzip();
        Self::new(times, values)
    }

    pub fn times(&self) -> &[Timestamp] {
        &self.times
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Timestamp, f64)> + '_ {
        self.times.iter().copied().zip(self.values.iter().copied())
    }
}

/// Aligned supervised samples: `x[i]` is the history right before `y[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowPairs<T> {
    /// Timestamp attached to each pair (see the producing function).
    pub times: Vec<Timestamp>,
    pub x: Vec<Vec<T>>,
    pub y: Vec<Vec<T>>,
}

impl<T> WindowPairs<T> {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Calendar unit used to bucket a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BucketMode {
    /// Hour of day.
    #[serde(rename = "h")]
    Hour,
    /// 3-hour block.
    #[serde(rename = "3h")]
    Hour3,
    /// 6-hour block.
    #[serde(rename = "6h")]
    Hour6,
    /// Day of week (Sunday = 0).
    #[serde(rename = "dw")]
    DayOfWeek,
    /// Month of year.
    #[serde(rename = "m")]
    Month,
    /// `(year*100 + month) mod 4`. Not a calendar season.
    #[serde(rename = "s")]
    Season,
}

impl BucketMode {
    pub fn as_str(self) -> &'static str {
        match self {
            BucketMode::Hour => "h",
            BucketMode::Hour3 => "3h",
            BucketMode::Hour6 => "6h",
            BucketMode::DayOfWeek => "dw",
            BucketMode::Month => "m",
            BucketMode::Season => "s",
        }
    }

    /// Block width in hours for the hour-family modes.
    pub fn hours(self) -> Option<u32> {
        match self {
            BucketMode::Hour => Some(1),
            BucketMode::Hour3 => Some(3),
            BucketMode::Hour6 => Some(6),
            _ => None,
        }
    }
}

impl FromStr for BucketMode {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "h" => Ok(BucketMode::Hour),
            "3h" => Ok(BucketMode::Hour3),
            "6h" => Ok(BucketMode::Hour6),
            "dw" => Ok(BucketMode::DayOfWeek),
            "m" => Ok(BucketMode::Month),
            "s" => Ok(BucketMode::Season),
            _ => Err(PrepError::UnsupportedMode(s.to_string())),
        }
    }
}

impl fmt::Display for BucketMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse time key produced by bucketing.
///
/// Variants order the same way their string forms sort, so sorting keys gives
/// the same output order as sorting the formatted strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BucketKey {
    /// Start of an hour / 3-hour / 6-hour block.
    Hour(Timestamp),
    /// `%Y-%W-%w`: Monday-first week number and Sunday = 0 weekday.
    WeekDay { year: i32, week: u32, weekday: u32 },
    /// `%Y-%m`.
    Month { year: i32, month: u32 },
    /// `(year*100 + month) mod 4`.
    Season(u32),
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketKey::Hour(t) => write!(f, "{}", t.format("%Y-%m-%d %H:00:00")),
            BucketKey::WeekDay { year, week, weekday } => write!(f, "{year}-{week:02}-{weekday}"),
            BucketKey::Month { year, month } => write!(f, "{year}-{month:02}"),
            BucketKey::Season(s) => write!(f, "{s}"),
        }
    }
}

/// One aggregated bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub key: BucketKey,
    pub value: f64,
    /// Number of samples that contributed to `value`.
    pub count: usize,
}

/// Aggregation applied to each bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    #[default]
    Mean,
    Sum,
    Min,
    Max,
    Median,
    Count,
}

/// Which forecaster to train.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelSpec {
    /// One-hidden-layer feed-forward network.
    Mlp,
    /// Least-squares linear map (baseline).
    Linear,
}

impl ModelSpec {
    pub fn display_name(self) -> &'static str {
        match self {
            ModelSpec::Mlp => "MLP",
            ModelSpec::Linear => "Linear",
        }
    }
}

/// Configuration for `aq clean`.
#[derive(Debug, Clone)]
pub struct CleanConfig {
    pub air_quality: PathBuf,
    pub weather: PathBuf,
    pub stations: PathBuf,
    pub output: PathBuf,
}

/// Configuration for `aq bucket`.
#[derive(Debug, Clone)]
pub struct BucketConfig {
    pub data: PathBuf,
    pub station: String,
    pub pollutant: Pollutant,
    pub mode: BucketMode,
    pub filter: Option<u32>,
    pub reducer: Reducer,
}

/// Hyper-parameters for the feed-forward network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpParams {
    pub hidden: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub batch_size: usize,
    pub patience: usize,
    pub seed: u64,
}

impl Default for MlpParams {
    fn default() -> Self {
        Self {
            hidden: 64,
            epochs: 200,
            learning_rate: 0.01,
            batch_size: 32,
            patience: 10,
            seed: 42,
        }
    }
}

/// Configuration for `aq train`, derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub data: PathBuf,
    pub stations: PathBuf,
    pub pollutant: Pollutant,

    pub x_size: usize,
    pub y_size: usize,
    pub step: usize,

    /// Exclusive upper bound of the training period.
    ///
    /// Unset bounds are derived from the data span (70% / 85% / end).
    pub train_until: Option<Timestamp>,
    /// Exclusive upper bound of the validation period.
    pub valid_until: Option<Timestamp>,
    /// Exclusive upper bound of the test period.
    pub test_until: Option<Timestamp>,

    /// Append (day of week, hour) of the first forecast step to each input.
    pub time_features: bool,

    pub model: ModelSpec,
    pub mlp: MlpParams,

    pub export_predictions: Option<PathBuf>,
    pub export_metrics: Option<PathBuf>,
}

/// Forecast error summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub smape: f64,
    pub rmse: f64,
    pub mae: f64,
}

/// Summary of a training run (exported as JSON with `--export-metrics`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainMetrics {
    pub model: ModelSpec,
    pub pollutant: Pollutant,
    pub stations: usize,
    pub train_samples: usize,
    pub valid_samples: usize,
    pub test_samples: usize,
    pub epochs_run: usize,
    pub final_train_loss: f64,
    pub best_valid_loss: Option<f64>,
    pub valid: Option<ErrorMetrics>,
    pub test: ErrorMetrics,
}

/// A single forecast value for export.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub station: String,
    /// Timestamp of the forecast step.
    pub time: Timestamp,
    /// 1-based step ahead within the output window.
    pub horizon: usize,
    pub forecast: f64,
    pub actual: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t(h: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2018, 1, 1).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn time_series_rejects_unsorted() {
        let err = TimeSeries::new(vec![t(1), t(0)], vec![1.0, 2.0]).unwrap_err();
        assert_eq!(err, PrepError::UnsortedSeries { index: 1 });

        let err = TimeSeries::new(vec![t(1), t(1)], vec![1.0, 2.0]).unwrap_err();
        assert_eq!(err, PrepError::UnsortedSeries { index: 1 });
    }

    #[test]
    fn bucket_mode_parses_known_modes() {
        assert_eq!("3h".parse::<BucketMode>().unwrap(), BucketMode::Hour3);
        assert_eq!("DW".parse::<BucketMode>().unwrap(), BucketMode::DayOfWeek);
        assert_eq!(
            "w".parse::<BucketMode>().unwrap_err(),
            PrepError::UnsupportedMode("w".to_string())
        );
    }

    #[test]
    fn bucket_key_display_matches_string_keys() {
        assert_eq!(BucketKey::Hour(t(6)).to_string(), "2018-01-01 06:00:00");
        assert_eq!(
            BucketKey::WeekDay { year: 2018, week: 2, weekday: 1 }.to_string(),
            "2018-02-1"
        );
        assert_eq!(BucketKey::Month { year: 2018, month: 3 }.to_string(), "2018-03");
        assert_eq!(BucketKey::Season(1).to_string(), "1");
    }

    #[test]
    fn readings_get_set() {
        let mut r = Readings::default();
        assert!(r.is_empty());
        r.set(Pollutant::O3, Some(12.0));
        assert_eq!(r.get(Pollutant::O3), Some(12.0));
        assert_eq!(r.get(Pollutant::Pm25), None);
        assert!(!r.is_empty());
    }
}
