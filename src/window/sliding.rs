//! Sliding and offset window extraction.
//!
//! Both functions share one trimming policy: a trailing remainder that cannot
//! form a complete, step-aligned window is dropped, never padded.

use crate::domain::Timestamp;
use crate::error::PrepError;

/// Convert `values` into overlapping blocks of `window_size`, advancing by `step`.
///
/// `[1, 2, 3, 4, 5, 6]` with `window_size = 3`, `step = 2` gives
/// `[[1, 2, 3], [3, 4, 5]]`: the length must be `k * step + window_size` for
/// some `k`, so the remainder (`6`) is trimmed first.
pub fn sliding_window<T: Clone>(
    values: &[T],
    window_size: usize,
    step: usize,
) -> Result<Vec<Vec<T>>, PrepError> {
    if window_size == 0 {
        return Err(PrepError::InvalidWindowSpec("window size must be >= 1".to_string()));
    }
    if step == 0 {
        return Err(PrepError::InvalidWindowSpec("step must be >= 1".to_string()));
    }
    if window_size > values.len() {
        return Err(PrepError::InvalidWindowSpec(format!(
            "window size {window_size} exceeds series length {}",
            values.len()
        )));
    }

    let remainder = (values.len() - window_size) % step;
    let trimmed = &values[..values.len() - remainder];
    let count = (trimmed.len() - window_size) / step + 1;

    Ok((0..count)
        .map(|i| trimmed[i * step..i * step + window_size].to_vec())
        .collect())
}

/// Split `values` into `unit`-sized windows starting at `i * step` for
/// `i ∈ [offset, split_count + offset)`.
///
/// `split_count` is derived from the effective length `len - unit + offset`
/// rounded down to a multiple of `step`. Candidates that would run past the
/// end of `values` are dropped.
///
/// Each window is paired with the timestamp at its start index, `time[i * step]`.
/// This is not the leading slice `time[..split_count]`, which only lines up
/// with the windows when `step == 1` and `offset == 0`.
pub fn offset_split<T: Clone>(
    time: &[Timestamp],
    values: &[T],
    unit: usize,
    step: usize,
    offset: usize,
) -> Result<(Vec<Timestamp>, Vec<Vec<T>>), PrepError> {
    if time.len() != values.len() {
        return Err(PrepError::InvalidWindowSpec(format!(
            "time and value lengths differ ({} vs {})",
            time.len(),
            values.len()
        )));
    }
    if unit == 0 {
        return Err(PrepError::InvalidWindowSpec("unit must be >= 1".to_string()));
    }
    if step == 0 {
        return Err(PrepError::InvalidWindowSpec("step must be >= 1".to_string()));
    }
    if unit > values.len() {
        return Err(PrepError::InvalidWindowSpec(format!(
            "unit {unit} exceeds series length {}",
            values.len()
        )));
    }

    let length = values.len() - unit + offset;
    let split_count = length - length % step;

    let mut times = Vec::new();
    let mut windows = Vec::new();
    for i in offset..split_count + offset {
        let start = i * step;
        let end = start + unit;
        if end > values.len() {
            break;
        }
        times.push(time[start]);
        windows.push(values[start..end].to_vec());
    }

    Ok((times, windows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn hours(n: usize) -> Vec<Timestamp> {
        let t0 = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        (0..n).map(|i| t0 + Duration::hours(i as i64)).collect()
    }

    #[test]
    fn sliding_window_drops_trailing_remainder() {
        let w = sliding_window(&[1, 2, 3, 4, 5, 6], 3, 2).unwrap();
        assert_eq!(w, vec![vec![1, 2, 3], vec![3, 4, 5]]);
    }

    #[test]
    fn sliding_window_step_one_covers_every_start() {
        let w = sliding_window(&[1, 2, 3, 4], 2, 1).unwrap();
        assert_eq!(w, vec![vec![1, 2], vec![2, 3], vec![3, 4]]);
    }

    #[test]
    fn sliding_window_full_length_is_single_window() {
        let w = sliding_window(&[1.0, 2.0, 3.0], 3, 5).unwrap();
        assert_eq!(w, vec![vec![1.0, 2.0, 3.0]]);
    }

    #[test]
    fn sliding_window_lengths_and_strides() {
        let values: Vec<usize> = (0..37).collect();
        for window_size in 1..=10 {
            for step in 1..=7 {
                let windows = sliding_window(&values, window_size, step).unwrap();
                let remainder = (values.len() - window_size) % step;
                let expected = (values.len() - remainder - window_size) / step + 1;
                assert_eq!(windows.len(), expected);
                for (i, w) in windows.iter().enumerate() {
                    assert_eq!(w.len(), window_size);
                    // values are their own indices, so w[0] is the start index
                    assert_eq!(w[0], i * step);
                }
            }
        }
    }

    #[test]
    fn sliding_window_rejects_invalid_sizes() {
        assert!(matches!(
            sliding_window(&[1, 2], 3, 1),
            Err(PrepError::InvalidWindowSpec(_))
        ));
        assert!(matches!(
            sliding_window(&[1, 2], 1, 0),
            Err(PrepError::InvalidWindowSpec(_))
        ));
        assert!(matches!(
            sliding_window(&[1, 2], 0, 1),
            Err(PrepError::InvalidWindowSpec(_))
        ));
    }

    #[test]
    fn offset_split_step_one() {
        let time = hours(5);
        let (t, w) = offset_split(&time, &[1, 2, 3, 4, 5], 2, 1, 0).unwrap();
        // effective length = 5 - 2 = 3 splits
        assert_eq!(w, vec![vec![1, 2], vec![2, 3], vec![3, 4]]);
        assert_eq!(t, time[0..3].to_vec());
    }

    #[test]
    fn offset_split_skips_leading_units() {
        let time = hours(6);
        let (t, w) = offset_split(&time, &[1, 2, 3, 4, 5, 6], 2, 1, 2).unwrap();
        assert_eq!(w, vec![vec![3, 4], vec![4, 5], vec![5, 6]]);
        assert_eq!(t, vec![time[2], time[3], time[4]]);
    }

    #[test]
    fn offset_split_non_overlapping_drops_partial_windows() {
        let time = hours(7);
        let (t, w) = offset_split(&time, &[1, 2, 3, 4, 5, 6, 7], 2, 2, 0).unwrap();
        assert_eq!(w, vec![vec![1, 2], vec![3, 4], vec![5, 6]]);
        assert_eq!(t, vec![time[0], time[2], time[4]]);
    }

    #[test]
    fn offset_split_strided_with_offset() {
        let time = hours(7);
        let (t, w) = offset_split(&time, &[1, 2, 3, 4, 5, 6, 7], 2, 2, 1).unwrap();
        // starts at 2 and 4; the window at 6 would run past the end
        assert_eq!(w, vec![vec![3, 4], vec![5, 6]]);
        assert_eq!(t, vec![time[2], time[4]]);
    }

    #[test]
    fn offset_split_rejects_mismatched_lengths() {
        let time = hours(3);
        assert!(offset_split(&time, &[1, 2], 1, 1, 0).is_err());
    }
}
