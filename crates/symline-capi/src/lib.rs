//! # symline C ABI
//!
//! C bindings for `symline-core`: buffer-based demangling, handle-based
//! symbolization, and the debug-info reader. The matching declarations live
//! in `include/symline.h`.
//!
//! ## Ownership
//!
//! Every pointer this library returns is owned by the caller and must be
//! handed back to the matching release function exactly once:
//!
//! | returned by | release with |
//! |-------------|--------------|
//! | `symline_symbolizer_new*` | `symline_symbolizer_free` |
//! | `symline_symbolizer_symbolize` | `symline_symbol_free` |
//! | `symline_symbolizer_symbolize_inlined` | `symline_symbol_list_free` |
//! | `symline_symbolizer_symbolize_inlined_array` | `symline_bulk_symbol_free` |
//! | `symline_debug_info_open_path` | `symline_debug_info_free` |
//! | `symline_debug_info_get_variants` | `symline_debug_free_variants` |
//! | strings and `symline_error.message` | `symline_buffer_free` |
//!
//! All release functions accept `NULL`. Callback variants allocate nothing;
//! pointers passed to callbacks are only valid for the duration of the call.
//!
//! ## Panics
//!
//! No panic crosses the boundary. A panic inside an entry point is caught and
//! reported the same way as an error (`false`, `NULL`, an error record, or
//! `symline_error` code 1).

#![allow(unsafe_code)] // Required to expose a C ABI
#![allow(non_camel_case_types)]
#![deny(unsafe_op_in_unsafe_fn)]

mod debug_info;
mod demangle;
mod symbolize;

use std::ffi::{CStr, CString};
use std::panic::{self, UnwindSafe};
use std::ptr;

pub use debug_info::*;
pub use demangle::*;
use libc::{c_char, c_int};
pub use symbolize::*;
use symline_core::error::{Result, SymlineError};

/// Error details reported by the debug-info entry points.
///
/// Initialize to all zeroes before the first call. On failure `failed` is set,
/// `code` holds one of the `SYMLINE_ERROR_*` codes, and `message` an owned
/// string. Passing the struct to another call releases the previous message;
/// release the last one with [`symline_error_clear`].
#[repr(C)]
#[derive(Debug)]
pub struct symline_error
{
    /// Human-readable message, `NULL` on success.
    pub message: *mut c_char,
    /// Whether the call failed.
    pub failed: bool,
    /// Stable error code, `0` on success.
    pub code: c_int,
}

impl Default for symline_error
{
    fn default() -> Self
    {
        Self {
            message: ptr::null_mut(),
            failed: false,
            code: 0,
        }
    }
}

/// Free a string returned by this library.
///
/// # Safety
/// `buffer` must be `NULL` or a string returned by this library that has not
/// been freed yet.
#[no_mangle]
pub unsafe extern "C" fn symline_buffer_free(buffer: *mut c_char)
{
    // SAFETY: The caller guarantees the pointer came from `into_raw_string`.
    unsafe { free_raw_string(buffer) };
}

/// Release the message held by `err` and reset it to the success state.
///
/// # Safety
/// `err` must be `NULL` or point to a valid [`symline_error`].
#[no_mangle]
pub unsafe extern "C" fn symline_error_clear(err: *mut symline_error)
{
    // SAFETY: The caller guarantees `err` is valid or NULL.
    let Some(err) = (unsafe { err.as_mut() }) else {
        return;
    };
    // SAFETY: `message` is either NULL or was set by `report_error`.
    unsafe { free_raw_string(err.message) };
    *err = symline_error::default();
}

/// Convert text to an owned C string, dropping interior NUL bytes.
pub(crate) fn to_c_string(text: &str) -> CString
{
    CString::new(text).unwrap_or_else(|err| {
        let mut bytes = err.into_vec();
        bytes.retain(|byte| *byte != 0);
        CString::new(bytes).unwrap_or_default()
    })
}

/// Hand an owned string to the caller.
pub(crate) fn into_raw_string(text: &str) -> *mut c_char
{
    to_c_string(text).into_raw()
}

/// Hand an optional string to the caller, `NULL` when absent.
pub(crate) fn into_raw_optional(text: Option<&str>) -> *mut c_char
{
    text.map_or(ptr::null_mut(), into_raw_string)
}

/// Take back a string produced by [`into_raw_string`].
///
/// # Safety
/// `text` must be `NULL` or a pointer from [`into_raw_string`] not yet freed.
pub(crate) unsafe fn free_raw_string(text: *mut c_char)
{
    if !text.is_null() {
        // SAFETY: The caller guarantees the pointer came from `CString::into_raw`.
        drop(unsafe { CString::from_raw(text) });
    }
}

/// Borrow a caller-provided C string as UTF-8.
///
/// # Safety
/// `text` must be `NULL` or point to a NUL-terminated string valid for `'a`.
pub(crate) unsafe fn str_from_ptr<'a>(text: *const c_char, what: &str) -> Result<&'a str>
{
    if text.is_null() {
        return Err(SymlineError::InvalidArgument(format!("{what} is NULL")));
    }
    // SAFETY: The caller guarantees a valid NUL-terminated string.
    unsafe { CStr::from_ptr(text) }
        .to_str()
        .map_err(|_| SymlineError::InvalidArgument(format!("{what} is not valid UTF-8")))
}

/// Run `f`, turning a panic into `fallback`.
pub(crate) fn guard<T, F>(fallback: T, f: F) -> T
where
    F: FnOnce() -> T + UnwindSafe,
{
    panic::catch_unwind(f).unwrap_or_else(|_| {
        tracing::error!("panic caught at the C boundary");
        fallback
    })
}

/// Run `f`, reporting errors and panics through `err`.
///
/// Returns `None` on any failure; `err` (when non-NULL) says why. A message
/// left in `err` by an earlier call is released first.
///
/// # Safety
/// `err` must be `NULL` or point to a valid [`symline_error`] whose `message`
/// is `NULL` or owned by this library.
pub(crate) unsafe fn landingpad<T, F>(err: *mut symline_error, f: F) -> Option<T>
where
    F: FnOnce() -> Result<T> + UnwindSafe,
{
    let outcome = panic::catch_unwind(f).unwrap_or_else(|_| {
        tracing::error!("panic caught at the C boundary");
        Err(SymlineError::Internal)
    });
    // SAFETY: Forwarded from the caller.
    let Some(err) = (unsafe { err.as_mut() }) else {
        return outcome.ok();
    };
    // SAFETY: `message` is NULL or was set by an earlier call.
    unsafe { free_raw_string(err.message) };
    match outcome {
        Ok(value) => {
            *err = symline_error::default();
            Some(value)
        }
        Err(error) => {
            *err = symline_error {
                message: into_raw_string(&error.to_string()),
                failed: true,
                code: error.code(),
            };
            None
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_interior_nul_is_dropped()
    {
        assert_eq!(to_c_string("a\0b").as_bytes(), b"ab");
        assert_eq!(to_c_string("plain").as_bytes(), b"plain");
    }

    #[test]
    fn test_str_from_ptr_rejects_null_and_bad_utf8()
    {
        let err = unsafe { str_from_ptr(ptr::null(), "module") }.unwrap_err();
        assert_eq!(err.to_string(), "invalid argument: module is NULL");

        let bad = b"\xff\xfe\0";
        let err = unsafe { str_from_ptr(bad.as_ptr().cast(), "module") }.unwrap_err();
        assert_eq!(err.code(), 8);
    }

    #[test]
    fn test_landingpad_reports_errors_and_panics()
    {
        let mut err = symline_error::default();

        let value = unsafe { landingpad(&mut err, || Ok(7)) };
        assert_eq!(value, Some(7));
        assert!(!err.failed);

        let value: Option<u32> = unsafe { landingpad(&mut err, || Err(SymlineError::NoSuchArch("armv7".into()))) };
        assert_eq!(value, None);
        assert!(err.failed);
        assert_eq!(err.code, 2);
        let message = unsafe { CStr::from_ptr(err.message) }.to_str().unwrap().to_string();
        assert_eq!(message, "no such architecture: armv7");
        unsafe { symline_error_clear(&mut err) };
        assert!(err.message.is_null());

        let value: Option<u32> = unsafe { landingpad(&mut err, || panic!("boom")) };
        assert_eq!(value, None);
        assert_eq!(err.code, 1);
        unsafe { symline_error_clear(&mut err) };

        let value = unsafe { landingpad(ptr::null_mut(), || Ok(1)) };
        assert_eq!(value, Some(1));
    }

    #[test]
    fn test_landingpad_replaces_previous_message()
    {
        let mut err = symline_error::default();

        let _: Option<u32> = unsafe { landingpad(&mut err, || Err(SymlineError::NoSuchSection("__debug_info".into()))) };
        let _: Option<u32> = unsafe { landingpad(&mut err, || Err(SymlineError::NoSuchArch("armv7".into()))) };
        let message = unsafe { CStr::from_ptr(err.message) }.to_str().unwrap().to_string();
        assert_eq!(message, "no such architecture: armv7");
        assert_eq!(err.code, 2);

        let value = unsafe { landingpad(&mut err, || Ok(3)) };
        assert_eq!(value, Some(3));
        assert!(!err.failed);
        assert!(err.message.is_null());
    }

    #[test]
    fn test_guard_catches_panics()
    {
        assert!(!guard(false, || panic!("boom")));
        assert!(guard(false, || true));
    }

    #[test]
    fn test_release_functions_accept_null()
    {
        unsafe {
            symline_buffer_free(ptr::null_mut());
            symline_error_clear(ptr::null_mut());
        }
    }
}
