//! Exports: the cleaned table, per-step predictions, and run metrics.
//!
//! The cleaned table is `;`-separated (it opens cleanly in spreadsheet tools
//! configured with `;` as list separator) and round-trips through
//! `io::ingest::read_cleaned`.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{MergedRecord, Pollutant, Prediction, TrainMetrics};
use crate::error::AppError;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Write the cleaned table to a file.
pub fn write_cleaned_csv(path: &Path, records: &[MergedRecord]) -> Result<(), AppError> {
    let file = create(path, "cleaned CSV")?;
    write_cleaned(file, records)
}

/// Write the cleaned table to any writer.
pub fn write_cleaned<W: Write>(writer: W, records: &[MergedRecord]) -> Result<(), AppError> {
    let mut out = csv::WriterBuilder::new().delimiter(b';').from_writer(writer);

    let mut header: Vec<&str> = vec!["station_id", "utc_time"];
    header.extend(Pollutant::ALL.iter().map(|p| p.column_name()));
    header.extend([
        "temperature",
        "pressure",
        "humidity",
        "wind_direction",
        "wind_speed",
        "weather",
        "longitude",
        "latitude",
        "aq",
    ]);
    out.write_record(&header)
        .map_err(|e| AppError::new(2, format!("Failed to write cleaned CSV header: {e}")))?;

    for r in records {
        let mut row: Vec<String> =
            vec![r.station_id.clone(), r.time.format(TIME_FORMAT).to_string()];
        row.extend(Pollutant::ALL.iter().map(|p| fmt_opt(r.readings.get(*p))));
        row.extend([
            fmt_opt(r.weather.temperature),
            fmt_opt(r.weather.pressure),
            fmt_opt(r.weather.humidity),
            fmt_opt(r.weather.wind_direction),
            fmt_opt(r.weather.wind_speed),
            r.weather.weather.clone().unwrap_or_default(),
            fmt_opt(r.longitude),
            fmt_opt(r.latitude),
            if r.aq { "1" } else { "0" }.to_string(),
        ]);
        out.write_record(&row)
            .map_err(|e| AppError::new(2, format!("Failed to write cleaned CSV row: {e}")))?;
    }

    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush cleaned CSV: {e}")))?;
    Ok(())
}

/// Write per-step predictions to a CSV file.
pub fn write_predictions_csv(path: &Path, predictions: &[Prediction]) -> Result<(), AppError> {
    let file = create(path, "export CSV")?;
    write_predictions(file, predictions)
}

/// Write per-step predictions to any writer. Fields are quoted as needed.
pub fn write_predictions<W: Write>(writer: W, predictions: &[Prediction]) -> Result<(), AppError> {
    let mut out = csv::Writer::from_writer(writer);

    out.write_record(["station", "time", "horizon", "forecast", "actual"])
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for p in predictions {
        out.write_record([
            p.station.clone(),
            p.time.format(TIME_FORMAT).to_string(),
            p.horizon.to_string(),
            format!("{:.4}", p.forecast),
            format!("{:.4}", p.actual),
        ])
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}

/// Write run metrics as pretty JSON.
pub fn write_metrics_json(path: &Path, metrics: &TrainMetrics) -> Result<(), AppError> {
    let file = create(path, "metrics JSON")?;
    serde_json::to_writer_pretty(file, metrics)
        .map_err(|e| AppError::new(2, format!("Failed to write metrics JSON: {e}")))?;
    Ok(())
}

fn create(path: &Path, label: &str) -> Result<File, AppError> {
    File::create(path).map_err(|e| {
        AppError::new(2, format!("Failed to create {label} '{}': {e}", path.display()))
    })
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Readings, Weather};
    use crate::io::ingest::read_cleaned;
    use chrono::NaiveDate;

    #[test]
    fn cleaned_table_reads_back() {
        let mut readings = Readings::default();
        readings.set(Pollutant::Pm25, Some(35.5));
        let record = MergedRecord {
            station_id: "dongsi".to_string(),
            time: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap().and_hms_opt(3, 0, 0).unwrap(),
            readings,
            weather: Weather {
                temperature: Some(-3.5),
                weather: Some("Haze".to_string()),
                ..Weather::default()
            },
            longitude: Some(116.417),
            latitude: None,
            aq: true,
        };

        let mut buf = Vec::new();
        write_cleaned(&mut buf, std::slice::from_ref(&record)).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("station_id;utc_time;PM2.5;"));

        let back = read_cleaned(buf.as_slice()).unwrap();
        assert_eq!(back.rows, vec![record]);
    }

    #[test]
    fn prediction_fields_are_quoted() {
        let prediction = Prediction {
            station: "dongsi,east".to_string(),
            time: NaiveDate::from_ymd_opt(2018, 1, 2).unwrap().and_hms_opt(5, 0, 0).unwrap(),
            horizon: 3,
            forecast: 41.23456,
            actual: 40.0,
        };

        let mut buf = Vec::new();
        write_predictions(&mut buf, &[prediction]).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert_eq!(
            text,
            "station,time,horizon,forecast,actual\n\
             \"dongsi,east\",2018-01-02 05:00:00,3,41.2346,40.0000\n"
        );

        let mut reader = csv::Reader::from_reader(buf.as_slice());
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(row.len(), 5);
        assert_eq!(&row[0], "dongsi,east");
    }
}
