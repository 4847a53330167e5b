//! Memory allocation utilities for FFI functions.
//!
//! Everything handed to C is allocated with `malloc` so the caller may
//! release it with the matching `medstock_free_*` function.

use core::ffi::c_char;
use libc::{free, malloc};
use std::ptr;

/// Copy a Rust slice to a newly allocated C array.
///
/// # Safety
/// Returns null on allocation failure or if slice is empty.
pub unsafe fn slice_to_c_array<T: Copy>(slice: &[T]) -> *mut T {
    if slice.is_empty() {
        return ptr::null_mut();
    }

    let ptr = malloc(std::mem::size_of_val(slice)) as *mut T;
    if !ptr.is_null() {
        ptr::copy_nonoverlapping(slice.as_ptr(), ptr, slice.len());
    }
    ptr
}

/// Copy a string into a newly allocated null-terminated C string.
///
/// Returns null on allocation failure or if `s` contains an interior NUL.
///
/// # Safety
/// The returned pointer must be released with [`free_ptr`].
pub unsafe fn alloc_c_string(s: &str) -> *mut c_char {
    if s.as_bytes().contains(&0) {
        return ptr::null_mut();
    }
    let ptr = malloc(s.len() + 1) as *mut c_char;
    if ptr.is_null() {
        return ptr;
    }
    ptr::copy_nonoverlapping(s.as_ptr() as *const c_char, ptr, s.len());
    *ptr.add(s.len()) = 0; // Null terminator
    ptr
}

/// Free a C pointer allocated by this module.
///
/// # Safety
/// ptr must be either null or a valid pointer allocated by malloc.
#[inline]
pub unsafe fn free_ptr(ptr: *mut core::ffi::c_void) {
    if !ptr.is_null() {
        free(ptr);
    }
}

/// Macro to free multiple struct fields.
///
/// Usage:
/// ```ignore
/// free_fields!(result, field1, field2, field3);
/// ```
#[macro_export]
macro_rules! free_fields {
    ($result:expr, $($field:ident),+ $(,)?) => {{
        $(
            if !$result.$field.is_null() {
                $crate::allocation::free_ptr($result.$field as *mut core::ffi::c_void);
                $result.$field = std::ptr::null_mut();
            }
        )+
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn test_slice_to_c_array() {
        unsafe {
            let values = vec![1.0_f64, 2.0, 3.0];
            let ptr = slice_to_c_array(&values);
            assert!(!ptr.is_null());
            assert_eq!(*ptr, 1.0);
            assert_eq!(*ptr.add(2), 3.0);
            free_ptr(ptr as *mut core::ffi::c_void);

            let empty: [i32; 0] = [];
            assert!(slice_to_c_array(&empty).is_null());
        }
    }

    #[test]
    fn test_alloc_c_string() {
        unsafe {
            let ptr = alloc_c_string("{\"medicine_id\":\"x\"}");
            assert!(!ptr.is_null());
            assert_eq!(
                CStr::from_ptr(ptr).to_str().unwrap(),
                "{\"medicine_id\":\"x\"}"
            );
            free_ptr(ptr as *mut core::ffi::c_void);

            assert!(alloc_c_string("a\0b").is_null());
        }
    }
}
