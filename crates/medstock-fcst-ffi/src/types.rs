//! C-compatible type definitions for the FFI boundary.
//!
//! Dates cross the boundary as days since 1970-01-01.

use libc::{c_char, c_double, c_int, size_t};
use medstock_fcst_core::ForecastError;

/// Error codes for FFI boundary.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Success = 0,
    NullPointer = 1,
    InvalidInput = 2,
    InsufficientData = 3,
    DataIntegrity = 4,
    InvalidConfiguration = 5,
    UnknownMedicine = 6,
    SourceError = 7,
    AllocationError = 8,
    SerializationError = 9,
    PanicCaught = 10,
}

impl From<&ForecastError> for ErrorCode {
    fn from(err: &ForecastError) -> Self {
        match err.to_code() {
            1 => ErrorCode::InsufficientData,
            2 => ErrorCode::DataIntegrity,
            3 => ErrorCode::InvalidConfiguration,
            4 => ErrorCode::UnknownMedicine,
            5 => ErrorCode::SourceError,
            _ => ErrorCode::InvalidInput,
        }
    }
}

/// Error structure with message buffer for FFI.
#[repr(C)]
pub struct MedstockError {
    pub code: ErrorCode,
    pub message: [c_char; 256],
}

impl MedstockError {
    /// Create a success error (no error).
    pub fn success() -> Self {
        Self {
            code: ErrorCode::Success,
            message: [0; 256],
        }
    }

    /// Set an error with code and message.
    pub fn set_error(&mut self, code: ErrorCode, msg: &str) {
        self.code = code;
        let bytes = msg.as_bytes();
        let len = bytes.len().min(255);
        for (i, &b) in bytes[..len].iter().enumerate() {
            self.message[i] = b as c_char;
        }
        self.message[len] = 0; // Null terminator
    }

    /// The message as a Rust string, up to the first NUL.
    pub fn message_str(&self) -> String {
        let bytes: Vec<u8> = self
            .message
            .iter()
            .take_while(|&&c| c != 0)
            .map(|&c| c as u8)
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Default for MedstockError {
    fn default() -> Self {
        Self::success()
    }
}

/// Forecast options.
///
/// Optional knobs use sentinels: 0 or a negative value selects the engine
/// default, except `ensemble_size` where only a negative value does (0
/// requests point forecasts without intervals).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastOptions {
    /// Number of future days to forecast (must be positive)
    pub horizon_days: c_int,
    /// Confidence level of the intervals, in (0, 1)
    pub confidence_level: c_double,
    /// Seasonal period in days
    pub seasonality_period: c_int,
    /// Number of simulated trend trajectories
    pub ensemble_size: c_int,
    /// Seed of the trajectory sampler
    pub seed: u64,
    /// Whether `today_days` is set; otherwise the system date is used
    pub has_today: bool,
    /// Today as days since 1970-01-01
    pub today_days: i32,
}

impl Default for ForecastOptions {
    fn default() -> Self {
        Self {
            horizon_days: 14,
            confidence_level: 0.0,
            seasonality_period: 0,
            ensemble_size: -1,
            seed: 0,
            has_today: false,
            today_days: 0,
        }
    }
}

/// Forecast and depletion result.
///
/// Arrays are allocated with `malloc` and released by
/// `medstock_free_forecast_result`.
#[repr(C)]
pub struct ForecastResult {
    /// Forecast dates as days since 1970-01-01
    pub dates: *mut i32,
    /// Point forecasts array
    pub point_estimates: *mut c_double,
    /// Lower confidence bounds
    pub lower_bounds: *mut c_double,
    /// Upper confidence bounds
    pub upper_bounds: *mut c_double,
    /// Number of forecast points
    pub n_points: size_t,
    /// Whether a depletion date was found within the horizon
    pub has_depletion_date: bool,
    pub depletion_date: i32,
    pub has_confidence_low_date: bool,
    pub confidence_low_date: i32,
    pub has_confidence_high_date: bool,
    pub confidence_high_date: i32,
    /// Days from today until depletion (valid with `has_depletion_date`)
    pub days_until_depletion: c_int,
    /// 0 = NONE, 1 = LOW, 2 = MEDIUM, 3 = HIGH, 4 = CRITICAL
    pub urgency_tier: c_int,
    /// Non-finite forecast values were counted as zero consumption
    pub low_confidence: bool,
    /// Any degradation occurred
    pub degraded: bool,
    /// The changepoint fit fell back to a global linear trend
    pub trend_fallback: bool,
    /// Intervals collapsed onto the point estimate
    pub interval_collapsed: bool,
}

impl Default for ForecastResult {
    fn default() -> Self {
        Self {
            dates: std::ptr::null_mut(),
            point_estimates: std::ptr::null_mut(),
            lower_bounds: std::ptr::null_mut(),
            upper_bounds: std::ptr::null_mut(),
            n_points: 0,
            has_depletion_date: false,
            depletion_date: 0,
            has_confidence_low_date: false,
            confidence_low_date: 0,
            has_confidence_high_date: false,
            confidence_high_date: 0,
            days_until_depletion: 0,
            urgency_tier: 0,
            low_confidence: false,
            degraded: false,
            trend_fallback: false,
            interval_collapsed: false,
        }
    }
}
