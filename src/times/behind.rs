//! Backward grouping: aggregate the history behind one index into a fixed
//! number of coarse buckets.
//!
//! Used to build features like "mean of each of the last 4 six-hour blocks".
//! The output always has exactly `step` entries, oldest first.

use chrono::Duration;
use tracing::debug;

use crate::domain::Timestamp;
use crate::error::PrepError;
use crate::times::bucket::round_hour;

/// Running sum/count for one bucket slot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Slot {
    pub sum: f64,
    pub count: usize,
}

impl Slot {
    fn filled(value: f64) -> Self {
        Self { sum: value, count: 1 }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }
}

/// Group `value` into `step` buckets of `hours` hours each, ending with the
/// bucket that contains `time[index]`.
///
/// Walks backward from `index` until the walked timestamp is older than the
/// oldest bucket or index 0 is reached. When history runs out, the missing
/// older buckets hold the oldest populated bucket's sum with a count of one, so
/// they average to that sum rather than its mean; interior gaps carry
/// the previous bucket's mean forward.
///
/// `hours` must divide 24 so bucket boundaries line up across days. `time`
/// must be sorted ascending.
pub fn backward_group(
    time: &[Timestamp],
    value: &[f64],
    index: usize,
    step: usize,
    hours: u32,
) -> Result<Vec<f64>, PrepError> {
    if time.len() != value.len() {
        return Err(PrepError::InvalidWindowSpec(format!(
            "time and value lengths differ ({} vs {})",
            time.len(),
            value.len()
        )));
    }
    if index >= time.len() {
        return Err(PrepError::IndexOutOfRange {
            index,
            len: time.len(),
        });
    }
    if step == 0 {
        return Err(PrepError::InvalidWindowSpec("step must be >= 1".to_string()));
    }
    if hours == 0 || 24 % hours != 0 {
        return Err(PrepError::InvalidWindowSpec(format!(
            "hours per bucket must divide 24 (got {hours})"
        )));
    }

    let (mut slots, reached_start) = accumulate(time, value, index, step, hours)?;

    let populated = slots.iter().filter(|s| !s.is_empty()).count();
    if populated < step {
        if reached_start {
            debug!(index, populated, step, "insufficient history; holding oldest bucket constant");
        }
        hold_oldest(&mut slots);
        carry_forward(&mut slots);
    }

    Ok(slots.iter().map(Slot::mean).collect())
}

/// Sum values into slots ordered oldest to newest. Returns the slots and
/// whether the walk reached index 0.
fn accumulate(
    time: &[Timestamp],
    value: &[f64],
    index: usize,
    step: usize,
    hours: u32,
) -> Result<(Vec<Slot>, bool), PrepError> {
    let width = hours as i64;
    let newest = round_hour(time[index], hours);
    let oldest = newest - Duration::hours(width * (step as i64 - 1));

    let mut slots = vec![Slot::default(); step];
    let mut i = index;
    loop {
        let t = round_hour(time[i], hours);
        if t < oldest {
            return Ok((slots, false));
        }
        if t > newest {
            return Err(PrepError::UnsortedSeries { index: i + 1 });
        }
        let slot = ((t - oldest).num_hours() / width) as usize;
        slots[slot].sum += value[i];
        slots[slot].count += 1;

        if i == 0 {
            return Ok((slots, true));
        }
        i -= 1;
    }
}

/// Fill every slot older than the oldest populated one with that slot's sum
/// (count = 1).
pub fn hold_oldest(slots: &mut [Slot]) {
    let Some(first) = slots.iter().position(|s| !s.is_empty()) else {
        return;
    };
    let held = slots[first].sum;
    for slot in &mut slots[..first] {
        *slot = Slot::filled(held);
    }
}

/// Fill empty slots with the mean of the nearest older slot.
fn carry_forward(slots: &mut [Slot]) {
    let mut last = None;
    for slot in slots.iter_mut() {
        if slot.is_empty() {
            if let Some(v) = last {
                *slot = Slot::filled(v);
            }
        } else {
            last = Some(slot.mean());
        }
    }
}
