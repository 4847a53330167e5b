//! Parameter conversion utilities for FFI functions.
//!
//! This module provides helper functions for converting C types to Rust types
//! with common patterns like "0 or negative means None".

use chrono::{Datelike, NaiveDate};
use core::ffi::{c_char, c_double, c_int};
use std::ffi::CStr;

/// Days from 0001-01-01 (day 1 of the common era) to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Convert a `c_int` to `Option<usize>`, where values <= 0 become None.
#[inline]
pub fn to_option_usize(value: c_int) -> Option<usize> {
    if value > 0 {
        Some(value as usize)
    } else {
        None
    }
}

/// Convert a `c_int` to `Option<usize>`, where values < 0 become None.
#[inline]
pub fn to_option_usize_nonnegative(value: c_int) -> Option<usize> {
    if value >= 0 {
        Some(value as usize)
    } else {
        None
    }
}

/// Convert a `c_double` to `Option<f64>`, where values <= 0.0 become None.
#[inline]
pub fn to_option_f64_positive(value: c_double) -> Option<f64> {
    if value > 0.0 {
        Some(value)
    } else {
        None
    }
}

/// Convert a C string pointer to a Rust `&str` with a default value.
///
/// # Safety
/// The pointer must be null or point to a valid null-terminated string.
#[inline]
pub unsafe fn c_str_to_str<'a>(ptr: *const c_char, default: &'a str) -> &'a str {
    if ptr.is_null() {
        default
    } else {
        CStr::from_ptr(ptr).to_str().unwrap_or(default)
    }
}

/// Convert days since 1970-01-01 to a date.
#[inline]
pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
}

/// Convert a date to days since 1970-01-01.
#[inline]
pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}
