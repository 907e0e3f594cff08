//! Calendar bucketing.
//!
//! Groups a series into coarse time units and reduces each group to a scalar.
//! Optionally only rows whose calendar category equals a filter value are kept
//! (e.g. "only hour == 6").
//!
//! Mode summary:
//! - `h`: hour of day [0, 23]
//! - `3h` / `6h`: hour rounded down to the block start
//! - `dw`: day of week [0, 6], where 0 = Sunday
//! - `m`: month of year [1, 12]
//! - `s`: `(year*100 + month) mod 4` in [0, 3]

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Timelike};

use crate::domain::{Bucket, BucketKey, BucketMode, Reducer, TimeSeries, Timestamp};
use crate::error::PrepError;

impl Reducer {
    /// Reduce a non-empty group of values.
    pub fn apply(self, values: &[f64]) -> f64 {
        match self {
            Reducer::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Reducer::Sum => values.iter().sum(),
            Reducer::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Reducer::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Reducer::Median => median(values),
            Reducer::Count => values.len() as f64,
        }
    }
}

/// `t` with its hour rounded down to a multiple of `hours`; minutes and
/// seconds are zeroed.
pub fn round_hour(t: Timestamp, hours: u32) -> Timestamp {
    let hours = hours.max(1);
    let hour = t.hour() - t.hour() % hours;
    t.date()
        .and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or_default())
}

/// Bucket `series` by `mode` and reduce each bucket with `reducer`.
pub fn bucket_by(
    series: &TimeSeries,
    mode: BucketMode,
    filter: Option<u32>,
    reducer: Reducer,
) -> Result<Vec<Bucket>, PrepError> {
    bucket_by_with(series, mode, filter, |values| reducer.apply(values))
}

/// Bucket `series` by `mode` and reduce each bucket with an arbitrary function.
///
/// Rows are filtered first, then grouped by key equality. Output is sorted
/// ascending by key with one entry per surviving key.
pub fn bucket_by_with<F>(
    series: &TimeSeries,
    mode: BucketMode,
    filter: Option<u32>,
    reduce: F,
) -> Result<Vec<Bucket>, PrepError>
where
    F: Fn(&[f64]) -> f64,
{
    if let Some(value) = filter {
        validate_filter(mode, value)?;
    }

    let mut groups: BTreeMap<BucketKey, Vec<f64>> = BTreeMap::new();
    for (t, v) in series.iter() {
        if let Some(value) = filter {
            if !matches_filter(t, mode, value) {
                continue;
            }
        }
        groups.entry(bucket_key(t, mode)).or_default().push(v);
    }

    Ok(groups
        .into_iter()
        .map(|(key, values)| Bucket {
            key,
            value: reduce(&values),
            count: values.len(),
        })
        .collect())
}

/// The bucket key a timestamp falls into.
pub fn bucket_key(t: Timestamp, mode: BucketMode) -> BucketKey {
    match mode {
        BucketMode::Hour | BucketMode::Hour3 | BucketMode::Hour6 => {
            BucketKey::Hour(round_hour(t, mode.hours().unwrap_or(1)))
        }
        BucketMode::DayOfWeek => BucketKey::WeekDay {
            year: t.year(),
            week: monday_week(t.date()),
            weekday: t.weekday().num_days_from_sunday(),
        },
        BucketMode::Month => BucketKey::Month {
            year: t.year(),
            month: t.month(),
        },
        BucketMode::Season => BucketKey::Season(season(t)),
    }
}

/// Turn bucket output back into a series keyed by each bucket's start time.
///
/// Rows are ordered by start time, not by key: `dw` keys put Sunday (`-0`)
/// ahead of the Monday of the same week. Feeding the result to `bucket_by`
/// with the same mode maps every row onto itself. Season keys carry no time
/// and are rejected.
pub fn buckets_to_series(buckets: &[Bucket]) -> Result<TimeSeries, PrepError> {
    let mut pairs = Vec::with_capacity(buckets.len());
    for b in buckets {
        let start = match b.key {
            BucketKey::Hour(t) => t,
            BucketKey::WeekDay { year, week, weekday } => week_day_start(year, week, weekday)?,
            BucketKey::Month { year, month } => NaiveDate::from_ymd_opt(year, month, 1)
                .ok_or_else(|| {
                    PrepError::InvalidWindowSpec(format!("invalid month key {}", b.key))
                })?
                .and_time(NaiveTime::MIN),
            BucketKey::Season(_) => {
                return Err(PrepError::UnsupportedMode(BucketMode::Season.to_string()));
            }
        };
        pairs.push((start, b.value));
    }
    pairs.sort_by_key(|(start, _)| *start);
    TimeSeries::from_pairs(pairs)
}

fn validate_filter(mode: BucketMode, value: u32) -> Result<(), PrepError> {
    let valid = match mode {
        BucketMode::Hour | BucketMode::Hour3 | BucketMode::Hour6 => value < 24,
        BucketMode::DayOfWeek => value < 7,
        BucketMode::Month => (1..=12).contains(&value),
        BucketMode::Season => value < 4,
    };
    if valid {
        Ok(())
    } else {
        Err(PrepError::InvalidFilter {
            mode: mode.to_string(),
            value,
        })
    }
}

fn matches_filter(t: Timestamp, mode: BucketMode, value: u32) -> bool {
    match mode {
        BucketMode::Hour | BucketMode::Hour3 | BucketMode::Hour6 => {
            round_hour(t, mode.hours().unwrap_or(1)).hour() == value
        }
        // The filter value is Sunday = 0; weekday numbering here is Monday = 0.
        BucketMode::DayOfWeek => t.weekday().num_days_from_monday() == (value + 6) % 7,
        BucketMode::Month => t.month() == value,
        BucketMode::Season => season(t) == value,
    }
}

fn season(t: Timestamp) -> u32 {
    (t.year() * 100 + t.month() as i32).rem_euclid(4) as u32
}

/// `%W`: week of the year with Monday as the first day; days before the first
/// Monday are in week 0.
fn monday_week(date: NaiveDate) -> u32 {
    (date.ordinal0() + 7 - date.weekday().num_days_from_monday()) / 7
}

fn week_day_start(year: i32, week: u32, weekday: u32) -> Result<Timestamp, PrepError> {
    let jan1 = NaiveDate::from_ymd_opt(year, 1, 1)
        .ok_or_else(|| PrepError::InvalidWindowSpec(format!("invalid year {year}")))?;
    let lead = (7 - jan1.weekday().num_days_from_monday()) % 7;
    let first_monday = jan1 + Duration::days(lead as i64);
    let monday0 = (weekday + 6) % 7;
    let date = first_monday + Duration::days((week as i64 - 1) * 7 + monday0 as i64);
    Ok(date.and_time(NaiveTime::MIN))
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}
