//! Standardized error handling utilities for FFI functions.

use crate::types::{ErrorCode, MedstockError};
use medstock_fcst_core::ForecastError;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Failure inside an FFI call before it can be reported to the caller.
#[derive(Debug)]
pub enum FfiFailure {
    Forecast(ForecastError),
    Boundary(ErrorCode, String),
}

impl From<ForecastError> for FfiFailure {
    fn from(err: ForecastError) -> Self {
        FfiFailure::Forecast(err)
    }
}

/// Initialize error output to success state.
///
/// # Safety
/// The error pointer must be valid if non-null.
#[inline]
pub unsafe fn init_error(out_error: *mut MedstockError) {
    if !out_error.is_null() {
        *out_error = MedstockError::success();
    }
}

/// Set an error on the output error pointer.
///
/// # Safety
/// The error pointer must be valid if non-null.
#[inline]
pub unsafe fn set_error(out_error: *mut MedstockError, code: ErrorCode, message: &str) {
    if !out_error.is_null() {
        (*out_error).set_error(code, message);
    }
}

/// Check if any of the given pointers are null, and set an error if so.
///
/// # Safety
/// The error pointer must be valid if non-null.
#[inline]
pub unsafe fn check_null_pointers(
    out_error: *mut MedstockError,
    ptrs: &[*const core::ffi::c_void],
) -> bool {
    for ptr in ptrs {
        if ptr.is_null() {
            set_error(out_error, ErrorCode::NullPointer, "Null pointer argument");
            return true;
        }
    }
    false
}

/// Execute an FFI function body, catching panics and reporting errors.
///
/// Returns `Some(value)` on success, `None` after filling `out_error`.
///
/// # Safety
/// The error pointer must be valid if non-null.
pub unsafe fn ffi_try<F, T>(out_error: *mut MedstockError, f: F) -> Option<T>
where
    F: FnOnce() -> Result<T, FfiFailure>,
{
    init_error(out_error);

    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(FfiFailure::Forecast(e))) => {
            tracing::debug!(error = %e, "forecast request rejected");
            set_error(out_error, ErrorCode::from(&e), &e.to_string());
            None
        }
        Ok(Err(FfiFailure::Boundary(code, message))) => {
            set_error(out_error, code, &message);
            None
        }
        Err(_) => {
            tracing::error!("panic caught at FFI boundary");
            set_error(out_error, ErrorCode::PanicCaught, "Panic in Rust code");
            None
        }
    }
}
