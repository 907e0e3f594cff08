//! Per-station series extraction.

use std::collections::BTreeMap;

use tracing::warn;

use crate::domain::{MergedRecord, Pollutant, Station, TimeSeries, Timestamp};
use crate::error::PrepError;

/// Group cleaned rows into one `pollutant` series per prediction station.
///
/// Only stations with `predict = true` are kept. Rows with a missing reading
/// are dropped; duplicate timestamps keep the first reading. Stations without
/// any usable row are skipped.
pub fn group_by_station(
    records: &[MergedRecord],
    stations: &[Station],
    pollutant: Pollutant,
) -> Result<BTreeMap<String, TimeSeries>, PrepError> {
    let mut per_station: BTreeMap<&str, BTreeMap<Timestamp, f64>> = stations
        .iter()
        .filter(|s| s.predict)
        .map(|s| (s.id.as_str(), BTreeMap::new()))
        .collect();

    for r in records {
        let Some(points) = per_station.get_mut(r.station_id.as_str()) else {
            continue;
        };
        if let Some(v) = r.readings.get(pollutant) {
            points.entry(r.time).or_insert(v);
        }
    }

    let mut grouped = BTreeMap::new();
    for (id, points) in per_station {
        if points.is_empty() {
            warn!(
                station = id,
                pollutant = pollutant.column_name(),
                "no readings for station; skipping"
            );
            continue;
        }
        grouped.insert(id.to_string(), TimeSeries::from_pairs(points)?);
    }
    Ok(grouped)
}

/// The `pollutant` series of a single station (any `predict` flag).
pub fn station_series(
    records: &[MergedRecord],
    station_id: &str,
    pollutant: Pollutant,
) -> Result<TimeSeries, PrepError> {
    let mut points = BTreeMap::new();
    for r in records.iter().filter(|r| r.station_id == station_id) {
        if let Some(v) = r.readings.get(pollutant) {
            points.entry(r.time).or_insert(v);
        }
    }
    TimeSeries::from_pairs(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Readings, Weather};
    use chrono::NaiveDate;

    fn record(id: &str, h: u32, pm25: Option<f64>) -> MergedRecord {
        let mut readings = Readings::default();
        readings.set(Pollutant::Pm25, pm25);
        MergedRecord {
            station_id: id.to_string(),
            time: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap().and_hms_opt(h, 0, 0).unwrap(),
            readings,
            weather: Weather::default(),
            longitude: None,
            latitude: None,
            aq: true,
        }
    }

    fn station(id: &str, predict: bool) -> Station {
        Station {
            id: id.to_string(),
            longitude: None,
            latitude: None,
            predict,
        }
    }

    #[test]
    fn only_prediction_stations_are_grouped() {
        let records = vec![
            record("a", 2, Some(3.0)),
            record("a", 0, Some(1.0)),
            record("a", 1, None),
            record("b", 0, Some(9.0)),
            record("c", 0, Some(7.0)),
        ];
        let stations = vec![station("a", true), station("b", false), station("d", true)];

        let grouped = group_by_station(&records, &stations, Pollutant::Pm25).unwrap();
        assert_eq!(grouped.keys().collect::<Vec<_>>(), vec!["a"]);
        let a = &grouped["a"];
        assert_eq!(a.values(), &[1.0, 3.0]);
        assert!(a.times()[0] < a.times()[1]);
    }

    #[test]
    fn single_station_series_is_sorted() {
        let records = vec![record("b", 5, Some(2.0)), record("b", 1, Some(1.0))];
        let s = station_series(&records, "b", Pollutant::Pm25).unwrap();
        assert_eq!(s.values(), &[1.0, 2.0]);
    }
}
