//! Error types.
//!
//! - `PrepError`: precondition violations in the windowing/aggregation core
//! - `ModelError`: learner failures
//! - `AppError`: what the binary reports (message + process exit code)

use thiserror::Error;

/// Errors raised by the windowing and temporal aggregation core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrepError {
    /// Window/step/unit sizes that cannot produce a window.
    #[error("Invalid window spec: {0}")]
    InvalidWindowSpec(String),

    /// Index outside the series.
    #[error("Index {index} out of range for series of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Bucket mode string that is not one of h, 3h, 6h, dw, m, s.
    #[error("Unsupported aggregation mode: '{0}' (expected h, 3h, 6h, dw, m or s)")]
    UnsupportedMode(String),

    /// Filter value outside the domain of the bucket mode.
    #[error("Invalid filter value {value} for mode '{mode}'")]
    InvalidFilter { mode: String, value: u32 },

    /// Timestamps not strictly increasing at `index`.
    #[error("Timestamps must be strictly increasing (violated at index {index})")]
    UnsortedSeries { index: usize },
}

/// Errors raised by forecasters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Empty training set")]
    EmptyTrainingSet,

    #[error("Model has not been fitted")]
    NotFitted,

    #[error("Numerical failure: {0}")]
    Numerical(String),
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<PrepError> for AppError {
    fn from(err: PrepError) -> Self {
        AppError::new(2, err.to_string())
    }
}

impl From<ModelError> for AppError {
    fn from(err: ModelError) -> Self {
        let code = match err {
            ModelError::EmptyTrainingSet => 3,
            ModelError::Numerical(_) => 4,
            ModelError::ShapeMismatch(_) | ModelError::NotFitted => 2,
        };
        AppError::new(code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prep_error_messages() {
        let err = PrepError::IndexOutOfRange { index: 5, len: 3 };
        assert_eq!(err.to_string(), "Index 5 out of range for series of length 3");

        let err = PrepError::UnsupportedMode("2h".to_string());
        assert!(err.to_string().contains("'2h'"));
    }

    #[test]
    fn prep_error_maps_to_input_exit_code() {
        let app: AppError = PrepError::InvalidWindowSpec("step must be >= 1".to_string()).into();
        assert_eq!(app.exit_code(), 2);
        assert_eq!(app.to_string(), "Invalid window spec: step must be >= 1");
    }

    #[test]
    fn model_error_exit_codes() {
        assert_eq!(AppError::from(ModelError::EmptyTrainingSet).exit_code(), 3);
        assert_eq!(AppError::from(ModelError::Numerical("nan".into())).exit_code(), 4);
        assert_eq!(AppError::from(ModelError::NotFitted).exit_code(), 2);
    }
}
