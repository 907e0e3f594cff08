//! CSV ingest and normalization.
//!
//! This module is responsible for turning raw station exports into typed rows:
//!
//! - air-quality readings (`stationId,utc_time,PM2.5,PM10,NO2,CO,O3,SO2`)
//! - weather readings (`station_id,longitude,latitude,utc_time,temperature,...`)
//! - the station table (`station_id,longitude,latitude,predict`)
//! - the `;`-separated cleaned table written by `aq clean`
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **No cleaning logic here** (see `prep::merge`)

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use csv::StringRecord;

use crate::domain::{
    AirQualityRow, MergedRecord, Pollutant, Readings, Station, Timestamp, Weather, WeatherRow,
};
use crate::error::AppError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: parsed rows + row errors.
#[derive(Debug, Clone)]
pub struct Ingested<T> {
    pub rows: Vec<T>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

type HeaderMap = HashMap<String, usize>;

/// Open a CSV file for one of the `read_*` functions.
pub fn open_csv(path: &Path) -> Result<File, AppError> {
    File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))
}

pub fn read_air_quality<R: Read>(reader: R) -> Result<Ingested<AirQualityRow>, AppError> {
    read_records(
        reader,
        b',',
        "air quality",
        |record, headers| {
            let station_id = station_column(record, headers)?;
            let time = parse_timestamp(get_required(record, headers, "utc_time")?)?;
            Ok(AirQualityRow {
                station_id,
                time,
                readings: parse_readings(record, headers),
            })
        },
        |headers| {
            require_any(headers, &["stationid", "station_id"])?;
            require_any(headers, &["utc_time"])
        },
    )
}

pub fn read_weather<R: Read>(reader: R) -> Result<Ingested<WeatherRow>, AppError> {
    read_records(
        reader,
        b',',
        "weather",
        |record, headers| {
            let station_id = station_column(record, headers)?;
            let time = parse_timestamp(get_required(record, headers, "utc_time")?)?;
            Ok(WeatherRow {
                station_id,
                time,
                longitude: parse_opt_f64(get_optional(record, headers, "longitude")),
                latitude: parse_opt_f64(get_optional(record, headers, "latitude")),
                weather: parse_weather(record, headers),
            })
        },
        |headers| {
            require_any(headers, &["station_id", "stationid"])?;
            require_any(headers, &["utc_time"])
        },
    )
}

pub fn read_stations<R: Read>(reader: R) -> Result<Ingested<Station>, AppError> {
    read_records(
        reader,
        b',',
        "stations",
        |record, headers| {
            let id = match get_optional(record, headers, "station_id") {
                Some(id) => normalize_station_id(id),
                None => normalize_station_id(get_required(record, headers, "id")?),
            };
            Ok(Station {
                id,
                longitude: parse_opt_f64(get_optional(record, headers, "longitude")),
                latitude: parse_opt_f64(get_optional(record, headers, "latitude")),
                predict: get_optional(record, headers, "predict")
                    .map(parse_flag)
                    .transpose()?
                    .unwrap_or(false),
            })
        },
        |headers| require_any(headers, &["station_id", "id"]),
    )
}

/// Read the `;`-separated table written by `io::export::write_cleaned_csv`.
pub fn read_cleaned<R: Read>(reader: R) -> Result<Ingested<MergedRecord>, AppError> {
    read_records(
        reader,
        b';',
        "cleaned data",
        |record, headers| {
            Ok(MergedRecord {
                station_id: get_required(record, headers, "station_id")?.to_string(),
                time: parse_timestamp(get_required(record, headers, "utc_time")?)?,
                readings: parse_readings(record, headers),
                weather: parse_weather(record, headers),
                longitude: parse_opt_f64(get_optional(record, headers, "longitude")),
                latitude: parse_opt_f64(get_optional(record, headers, "latitude")),
                aq: get_optional(record, headers, "aq")
                    .map(parse_flag)
                    .transpose()?
                    .unwrap_or(true),
            })
        },
        |headers| {
            require_any(headers, &["station_id"])?;
            require_any(headers, &["utc_time"])
        },
    )
}

/// Parse a timestamp in one of the accepted layouts.
///
/// `YYYY-MM-DD` alone means midnight.
pub fn parse_timestamp(s: &str) -> Result<Timestamp, String> {
    const FMTS: [&str; 4] =
        ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M"];
    let s = s.trim();
    for fmt in FMTS {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(t);
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d.and_time(NaiveTime::MIN));
    }
    Err(format!(
        "Invalid timestamp '{s}'. Expected one of: YYYY-MM-DD HH:MM:SS, YYYY-MM-DD HH:MM, YYYY-MM-DDTHH:MM:SS, YYYY-MM-DD."
    ))
}

/// Strip the `_aq` / `_meo` style postfix: `dongsi_aq` -> `dongsi`.
pub fn normalize_station_id(raw: &str) -> String {
    raw.trim().split('_').next().unwrap_or_default().to_string()
}

fn read_records<R, T, P, V>(
    reader: R,
    delimiter: u8,
    label: &str,
    parse: P,
    validate: V,
) -> Result<Ingested<T>, AppError>
where
    R: Read,
    P: Fn(&StringRecord, &HeaderMap) -> Result<T, String>,
    V: Fn(&HeaderMap) -> Result<(), String>,
{
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read {label} CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    validate(&header_map).map_err(|e| AppError::new(2, format!("{label} CSV: {e}")))?;

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: records start after the header and lines are 1-based
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse(&record, &header_map) {
            Ok(row) => rows.push(row),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    if rows.is_empty() {
        return Err(AppError::new(3, format!("No valid rows in {label} CSV.")));
    }

    Ok(Ingested {
        rows,
        row_errors,
        rows_read,
    })
}

fn build_header_map(headers: &StringRecord) -> HeaderMap {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Strip a UTF-8 BOM on the first header so schema checks still match.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn require_any(headers: &HeaderMap, names: &[&str]) -> Result<(), String> {
    if names.iter().any(|n| headers.contains_key(*n)) {
        Ok(())
    } else {
        Err(format!("Missing required column: `{}`", names[0]))
    }
}

fn station_column(record: &StringRecord, headers: &HeaderMap) -> Result<String, String> {
    let raw = get_optional(record, headers, "stationid")
        .or_else(|| get_optional(record, headers, "station_id"))
        .ok_or_else(|| "Missing required value: `station_id`".to_string())?;
    Ok(normalize_station_id(raw))
}

fn parse_readings(record: &StringRecord, headers: &HeaderMap) -> Readings {
    let mut readings = Readings::default();
    for pollutant in Pollutant::ALL {
        let name = pollutant.column_name().to_ascii_lowercase();
        readings.set(pollutant, parse_opt_f64(get_optional(record, headers, &name)));
    }
    readings
}

fn parse_weather(record: &StringRecord, headers: &HeaderMap) -> Weather {
    Weather {
        temperature: parse_opt_f64(get_optional(record, headers, "temperature")),
        pressure: parse_opt_f64(get_optional(record, headers, "pressure")),
        humidity: parse_opt_f64(get_optional(record, headers, "humidity")),
        wind_direction: parse_opt_f64(get_optional(record, headers, "wind_direction")),
        wind_speed: parse_opt_f64(get_optional(record, headers, "wind_speed")),
        weather: get_optional(record, headers, "weather").map(str::to_string),
    }
}

fn parse_flag(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(format!("Invalid flag '{s}' (expected 1/0/true/false).")),
    }
}

fn get_required<'a>(
    record: &'a StringRecord,
    headers: &HeaderMap,
    name: &str,
) -> Result<&'a str, String> {
    let idx = headers
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional<'a>(record: &'a StringRecord, headers: &HeaderMap, name: &str) -> Option<&'a str> {
    let idx = headers.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_opt_f64(s: Option<&str>) -> Option<f64> {
    let v = s?.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}
