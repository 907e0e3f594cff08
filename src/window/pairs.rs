//! Supervised `(x, y)` window pairing.

use tracing::debug;

use crate::domain::{Timestamp, WindowPairs};
use crate::error::PrepError;
use crate::window::sliding::sliding_window;

/// Convert a series into windowed `(x, y)` samples.
///
/// `values = [1, 2, 3, 4]`, `x_size = 2`, `y_size = 1`, `step = 1` gives
/// `x = [[1, 2], [2, 3]]`, `y = [[3], [4]]`.
///
/// The input windows come from `values[..len - y_size]` and the output windows
/// from `values[x_size..]`. Both slices are trimmed independently, so the two
/// sequences are cut to the shorter length before pairing. `times[i]` is the
/// timestamp of the first value of `y[i]`.
pub fn split_windows<T: Clone>(
    time: &[Timestamp],
    values: &[T],
    x_size: usize,
    y_size: usize,
    step: usize,
) -> Result<WindowPairs<T>, PrepError> {
    if time.len() != values.len() {
        return Err(PrepError::InvalidWindowSpec(format!(
            "time and value lengths differ ({} vs {})",
            time.len(),
            values.len()
        )));
    }
    if x_size == 0 || y_size == 0 {
        return Err(PrepError::InvalidWindowSpec(
            "input and output sizes must be >= 1".to_string(),
        ));
    }
    if step == 0 {
        return Err(PrepError::InvalidWindowSpec("step must be >= 1".to_string()));
    }
    let len = values.len();
    if x_size + y_size > len {
        return Err(PrepError::InvalidWindowSpec(format!(
            "input size {x_size} + output size {y_size} exceeds series length {len}"
        )));
    }

    // last input index right before the last output
    let last_input = len - y_size - 1;
    // first output index right after the first input
    let first_output = x_size;

    let mut x = sliding_window(&values[..=last_input], x_size, step)?;
    let mut y = sliding_window(&values[first_output..], y_size, step)?;

    if x.len() != y.len() {
        debug!(x = x.len(), y = y.len(), "input/output window counts differ; truncating");
    }
    let n = x.len().min(y.len());
    x.truncate(n);
    y.truncate(n);

    let times = (0..n).map(|i| time[first_output + i * step]).collect();

    Ok(WindowPairs { times, x, y })
}

/// Split a series into contiguous `(x, y)` pairs with a stride of one:
/// `x = values[i..i + unit_x]`, `y = values[i + unit_x..i + unit_x + unit_y]`.
///
/// `times[i]` is `time[i]`, the start of the input window. `unit_y = 0`
/// yields empty output windows.
pub fn split_pairs<T: Clone>(
    time: &[Timestamp],
    values: &[T],
    unit_x: usize,
    unit_y: usize,
) -> Result<WindowPairs<T>, PrepError> {
    if time.len() != values.len() {
        return Err(PrepError::InvalidWindowSpec(format!(
            "time and value lengths differ ({} vs {})",
            time.len(),
            values.len()
        )));
    }
    if unit_x == 0 {
        return Err(PrepError::InvalidWindowSpec("input unit must be >= 1".to_string()));
    }
    if unit_x + unit_y > values.len() {
        return Err(PrepError::InvalidWindowSpec(format!(
            "input unit {unit_x} + output unit {unit_y} exceeds series length {}",
            values.len()
        )));
    }

    let split_count = values.len() - unit_x - unit_y + 1;
    let mut out = WindowPairs {
        times: time[..split_count].to_vec(),
        x: Vec::with_capacity(split_count),
        y: Vec::with_capacity(split_count),
    };
    for i in 0..split_count {
        out.x.push(values[i..i + unit_x].to_vec());
        out.y.push(values[i + unit_x..i + unit_x + unit_y].to_vec());
    }
    Ok(out)
}
