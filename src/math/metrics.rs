//! Forecast error metrics.

use crate::domain::ErrorMetrics;

/// Symmetric mean absolute percentage error, in percent.
///
/// Each pair contributes `2|f - a| / (|f| + |a|)`; pairs where both values are
/// zero contribute zero. Returns `NaN` for empty input.
pub fn smape(forecast: &[f64], actual: &[f64]) -> f64 {
    let n = forecast.len().min(actual.len());
    if n == 0 {
        return f64::NAN;
    }
    let total: f64 = forecast
        .iter()
        .zip(actual)
        .map(|(&f, &a)| {
            let denom = f.abs() + a.abs();
            if denom == 0.0 { 0.0 } else { 2.0 * (f - a).abs() / denom }
        })
        .sum();
    100.0 * total / n as f64
}

pub fn rmse(forecast: &[f64], actual: &[f64]) -> f64 {
    let n = forecast.len().min(actual.len());
    if n == 0 {
        return f64::NAN;
    }
    let sse: f64 = forecast.iter().zip(actual).map(|(f, a)| (f - a) * (f - a)).sum();
    (sse / n as f64).sqrt()
}

pub fn mae(forecast: &[f64], actual: &[f64]) -> f64 {
    let n = forecast.len().min(actual.len());
    if n == 0 {
        return f64::NAN;
    }
    forecast.iter().zip(actual).map(|(f, a)| (f - a).abs()).sum::<f64>() / n as f64
}

/// All three metrics over flattened windows.
pub fn error_metrics(forecast: &[Vec<f64>], actual: &[Vec<f64>]) -> ErrorMetrics {
    let f: Vec<f64> = forecast.iter().flatten().copied().collect();
    let a: Vec<f64> = actual.iter().flatten().copied().collect();
    ErrorMetrics {
        smape: smape(&f, &a),
        rmse: rmse(&f, &a),
        mae: mae(&f, &a),
    }
}
