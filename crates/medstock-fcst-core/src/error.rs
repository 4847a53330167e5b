//! Error types for the forecasting engine.

use thiserror::Error;

/// Result type for forecast operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Terminal failures of a forecasting request.
///
/// Degraded fits are not errors; they are reported through
/// [`crate::forecast::ForecastConfidence`] on a successful report.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    #[error("Insufficient data: need at least {needed} distinct days, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Invalid configuration '{param}' = '{value}': {reason}")]
    Configuration {
        param: String,
        value: String,
        reason: String,
    },

    #[error("Unknown medicine: {0}")]
    UnknownMedicine(String),

    #[error("Consumption source error: {0}")]
    Source(String),
}

impl ForecastError {
    /// Shorthand for a [`ForecastError::Configuration`] error.
    pub fn configuration(
        param: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        ForecastError::Configuration {
            param: param.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Convert to an error code for FFI.
    pub fn to_code(&self) -> i32 {
        match self {
            ForecastError::InsufficientData { .. } => 1,
            ForecastError::DataIntegrity(_) => 2,
            ForecastError::Configuration { .. } => 3,
            ForecastError::UnknownMedicine(_) => 4,
            ForecastError::Source(_) => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_conversion() {
        assert_eq!(
            ForecastError::InsufficientData { needed: 2, got: 1 }.to_code(),
            1
        );
        assert_eq!(ForecastError::DataIntegrity("x".into()).to_code(), 2);
        assert_eq!(
            ForecastError::configuration("horizon_days", 0, "must be positive").to_code(),
            3
        );
        assert_eq!(ForecastError::UnknownMedicine("x".into()).to_code(), 4);
        assert_eq!(ForecastError::Source("x".into()).to_code(), 5);
    }

    #[test]
    fn test_error_display() {
        let err = ForecastError::InsufficientData { needed: 2, got: 1 };
        assert_eq!(
            format!("{}", err),
            "Insufficient data: need at least 2 distinct days, got 1"
        );

        let err = ForecastError::configuration("confidence_level", 1.5, "must be in (0, 1)");
        assert_eq!(
            format!("{}", err),
            "Invalid configuration 'confidence_level' = '1.5': must be in (0, 1)"
        );

        let err = ForecastError::DataIntegrity("negative quantity -1 on 2024-01-03".into());
        assert_eq!(
            format!("{}", err),
            "Data integrity error: negative quantity -1 on 2024-01-03"
        );
    }

    #[test]
    fn test_error_construction() {
        let err = ForecastError::configuration("horizon_days", -3, "must be positive");
        if let ForecastError::Configuration {
            param,
            value,
            reason,
        } = err
        {
            assert_eq!(param, "horizon_days");
            assert_eq!(value, "-3");
            assert_eq!(reason, "must be positive");
        } else {
            panic!("Expected Configuration variant");
        }
    }
}
