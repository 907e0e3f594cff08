//! Time-range selection and calendar features.

use chrono::{Datelike, Timelike};

use crate::domain::{TimeSeries, Timestamp};

/// Keep the rows with `from <= t < to`.
pub fn select(series: &TimeSeries, from: Option<Timestamp>, to: Option<Timestamp>) -> TimeSeries {
    let times = series.times();
    let start = from.map_or(0, |f| times.partition_point(|t| *t < f));
    let end = to.map_or(times.len(), |t_to| times.partition_point(|t| *t < t_to));
    let end = end.max(start);

    // sorted sub-slices of a valid series are valid
    TimeSeries::new(times[start..end].to_vec(), series.values()[start..end].to_vec())
        .unwrap_or_default()
}

/// `(day_of_week, hour)` for `t`, with day of week 0 = Sunday.
pub fn calendar_features(t: Timestamp) -> (u32, u32) {
    let day_of_week = (t.weekday().num_days_from_monday() + 1) % 7;
    (day_of_week, t.hour())
}
