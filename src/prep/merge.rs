//! Merge air-quality and weather readings into one cleaned table.
//!
//! Steps:
//! 1. null out physically impossible weather values
//! 2. outer-join air-quality and weather rows on `(station_id, utc_time)`
//! 3. attach coordinates (station table first, then weather rows)
//! 4. flag stations that only report weather (`aq = false`)

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use crate::domain::{AirQualityRow, MergedRecord, Readings, Station, Timestamp, Weather, WeatherRow};

/// Upper bounds above which a weather reading is treated as missing.
pub const MAX_TEMPERATURE: f64 = 100.0; // observed max ~40 C
pub const MAX_WIND_SPEED: f64 = 100.0; // observed max ~15 m/s
pub const MAX_WIND_DIRECTION: f64 = 360.0; // degrees
pub const MAX_HUMIDITY: f64 = 100.0; // percent

/// What the merge produced, for logging and the terminal summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeSummary {
    pub rows: usize,
    pub aq_rows: usize,
    pub weather_rows: usize,
    pub invalid_weather_values: usize,
    pub weather_only_stations: Vec<String>,
}

/// Replace out-of-range weather readings with `None`. Returns how many
/// values were dropped.
pub fn clean_weather(weather: &mut Weather) -> usize {
    let mut dropped = 0;
    for (value, max) in [
        (&mut weather.temperature, MAX_TEMPERATURE),
        (&mut weather.wind_speed, MAX_WIND_SPEED),
        (&mut weather.wind_direction, MAX_WIND_DIRECTION),
        (&mut weather.humidity, MAX_HUMIDITY),
    ] {
        if value.is_some_and(|v| v > max) {
            *value = None;
            dropped += 1;
        }
    }
    dropped
}

/// Outer-join air-quality and weather rows.
///
/// Output is sorted by station id, then time, with one row per key. When a
/// key appears more than once in the same source, the first non-missing value
/// of each field wins. Stations that appear only in the station table have no
/// timestamps and produce no rows.
pub fn merge_sources(
    air_quality: &[AirQualityRow],
    weather: &[WeatherRow],
    stations: &[Station],
) -> (Vec<MergedRecord>, MergeSummary) {
    let station_coords: HashMap<&str, (Option<f64>, Option<f64>)> = stations
        .iter()
        .map(|s| (s.id.as_str(), (s.longitude, s.latitude)))
        .collect();

    let aq_ids: BTreeSet<&str> = air_quality.iter().map(|r| r.station_id.as_str()).collect();
    let weather_ids: BTreeSet<&str> = weather.iter().map(|r| r.station_id.as_str()).collect();
    let weather_only: BTreeSet<&str> = weather_ids.difference(&aq_ids).copied().collect();

    let mut merged: BTreeMap<(String, Timestamp), MergedRecord> = BTreeMap::new();
    let mut summary = MergeSummary::default();

    for row in air_quality {
        summary.aq_rows += 1;
        let record = merged
            .entry((row.station_id.clone(), row.time))
            .or_insert_with(|| empty_record(&row.station_id, row.time));
        fill_readings(&mut record.readings, &row.readings);
    }

    for row in weather {
        summary.weather_rows += 1;
        let mut cleaned = row.weather.clone();
        summary.invalid_weather_values += clean_weather(&mut cleaned);

        let record = merged
            .entry((row.station_id.clone(), row.time))
            .or_insert_with(|| empty_record(&row.station_id, row.time));
        fill_weather(&mut record.weather, cleaned);
        record.longitude = record.longitude.or(row.longitude);
        record.latitude = record.latitude.or(row.latitude);
    }

    let records: Vec<MergedRecord> = merged
        .into_values()
        .map(|mut r| {
            if let Some((lon, lat)) = station_coords.get(r.station_id.as_str()) {
                r.longitude = lon.or(r.longitude);
                r.latitude = lat.or(r.latitude);
            }
            r.aq = !weather_only.contains(r.station_id.as_str());
            r
        })
        .collect();

    summary.rows = records.len();
    summary.weather_only_stations = weather_only.iter().map(|s| s.to_string()).collect();
    debug!(
        rows = summary.rows,
        invalid = summary.invalid_weather_values,
        "merged air quality and weather rows"
    );

    (records, summary)
}

fn empty_record(station_id: &str, time: Timestamp) -> MergedRecord {
    MergedRecord {
        station_id: station_id.to_string(),
        time,
        readings: Readings::default(),
        weather: Weather::default(),
        longitude: None,
        latitude: None,
        aq: true,
    }
}

fn fill_readings(target: &mut Readings, source: &Readings) {
    for pollutant in crate::domain::Pollutant::ALL {
        if target.get(pollutant).is_none() {
            target.set(pollutant, source.get(pollutant));
        }
    }
}

fn fill_weather(target: &mut Weather, source: Weather) {
    target.temperature = target.temperature.or(source.temperature);
    target.pressure = target.pressure.or(source.pressure);
    target.humidity = target.humidity.or(source.humidity);
    target.wind_direction = target.wind_direction.or(source.wind_direction);
    target.wind_speed = target.wind_speed.or(source.wind_speed);
    if target.weather.is_none() {
        target.weather = source.weather;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Pollutant;
    use chrono::NaiveDate;

    fn at(h: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2018, 1, 1).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    fn aq_row(id: &str, h: u32, pm25: f64) -> AirQualityRow {
        let mut readings = Readings::default();
        readings.set(Pollutant::Pm25, Some(pm25));
        AirQualityRow {
            station_id: id.to_string(),
            time: at(h),
            readings,
        }
    }

    fn weather_row(id: &str, h: u32, temperature: f64) -> WeatherRow {
        WeatherRow {
            station_id: id.to_string(),
            time: at(h),
            longitude: Some(116.0),
            latitude: Some(40.0),
            weather: Weather {
                temperature: Some(temperature),
                wind_direction: Some(999017.0),
                ..Weather::default()
            },
        }
    }

    #[test]
    fn clean_weather_drops_impossible_values() {
        let mut w = Weather {
            temperature: Some(999.0),
            humidity: Some(55.0),
            wind_direction: Some(361.0),
            wind_speed: Some(3.0),
            ..Weather::default()
        };
        assert_eq!(clean_weather(&mut w), 2);
        assert_eq!(w.temperature, None);
        assert_eq!(w.wind_direction, None);
        assert_eq!(w.humidity, Some(55.0));
        assert_eq!(w.wind_speed, Some(3.0));
    }

    #[test]
    fn outer_join_on_station_and_time() {
        let aq = vec![aq_row("dongsi", 0, 10.0), aq_row("dongsi", 1, 11.0)];
        let weather = vec![weather_row("dongsi", 1, -2.0), weather_row("shunyi", 0, -4.0)];
        let stations = vec![Station {
            id: "dongsi".to_string(),
            longitude: Some(116.417),
            latitude: Some(39.929),
            predict: true,
        }];

        let (records, summary) = merge_sources(&aq, &weather, &stations);
        assert_eq!(records.len(), 3);
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.weather_only_stations, vec!["shunyi".to_string()]);
        assert_eq!(summary.invalid_weather_values, 2);

        let dongsi_1 = &records[1];
        assert_eq!(dongsi_1.station_id, "dongsi");
        assert_eq!(dongsi_1.time, at(1));
        assert_eq!(dongsi_1.readings.get(Pollutant::Pm25), Some(11.0));
        assert_eq!(dongsi_1.weather.temperature, Some(-2.0));
        assert_eq!(dongsi_1.weather.wind_direction, None);
        // station table coordinates win over weather-row coordinates
        assert_eq!(dongsi_1.longitude, Some(116.417));
        assert!(dongsi_1.aq);

        let shunyi = &records[2];
        assert_eq!(shunyi.station_id, "shunyi");
        assert_eq!(shunyi.longitude, Some(116.0));
        assert!(!shunyi.aq);
        assert!(shunyi.readings.is_empty());
    }

    #[test]
    fn duplicate_keys_keep_first_value() {
        let aq = vec![aq_row("dongsi", 0, 10.0), aq_row("dongsi", 0, 99.0)];
        let (records, _) = merge_sources(&aq, &[], &[]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].readings.get(Pollutant::Pm25), Some(10.0));
    }
}
