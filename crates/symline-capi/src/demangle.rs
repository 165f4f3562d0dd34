//! Buffer-based demangling entry points.
//!
//! Each function writes the demangled name plus a NUL terminator into the
//! caller's buffer and returns `true`, or returns `false` and leaves the
//! buffer untouched. `false` covers every failure alike: `NULL` arguments, a
//! zero-length buffer, a symbol the scheme does not recognize, malformed
//! mangling, and a result that does not fit.

use std::ffi::CStr;
use std::panic::AssertUnwindSafe;
use std::slice;

use libc::c_char;
use symline_core::demangle::{demangle_any_into, demangle_into, DemangleOptions, Scheme};

use crate::guard;

/// # Safety
/// `symbol` must be `NULL` or NUL-terminated; `buffer` must be `NULL` or
/// valid for writes of `buffer_length` bytes.
unsafe fn demangle_to_buffer(
    symbol: *const c_char,
    buffer: *mut c_char,
    buffer_length: usize,
    scheme: Option<Scheme>,
    options: DemangleOptions,
) -> bool
{
    if symbol.is_null() || buffer.is_null() || buffer_length == 0 {
        return false;
    }
    // SAFETY: The caller guarantees a NUL-terminated symbol.
    let symbol = unsafe { CStr::from_ptr(symbol) }.to_bytes();
    // SAFETY: The caller guarantees `buffer_length` writable bytes.
    let out = unsafe { slice::from_raw_parts_mut(buffer.cast::<u8>(), buffer_length) };

    guard(
        false,
        AssertUnwindSafe(|| match scheme {
            Some(scheme) => demangle_into(symbol, scheme, options, out),
            None => demangle_any_into(symbol, options, out),
        }),
    )
}

/// Demangle a Swift symbol with full type information.
///
/// # Safety
/// `symbol` must be `NULL` or a NUL-terminated string. `buffer` must be `NULL`
/// or valid for writes of `buffer_length` bytes.
#[no_mangle]
pub unsafe extern "C" fn symline_demangle_swift(
    symbol: *const c_char,
    buffer: *mut c_char,
    buffer_length: usize,
) -> bool
{
    // SAFETY: Forwarded from the caller.
    unsafe { demangle_to_buffer(symbol, buffer, buffer_length, Some(Scheme::Swift), DemangleOptions::Full) }
}

/// Demangle a Swift symbol in the shorter, UI-oriented form.
///
/// # Safety
/// Same as [`symline_demangle_swift`].
#[no_mangle]
pub unsafe extern "C" fn symline_demangle_swift_simplified(
    symbol: *const c_char,
    buffer: *mut c_char,
    buffer_length: usize,
) -> bool
{
    // SAFETY: Forwarded from the caller.
    unsafe { demangle_to_buffer(symbol, buffer, buffer_length, Some(Scheme::Swift), DemangleOptions::Simplified) }
}

/// Demangle an Itanium C++ symbol.
///
/// # Safety
/// Same as [`symline_demangle_swift`].
#[no_mangle]
pub unsafe extern "C" fn symline_demangle_cpp(symbol: *const c_char, buffer: *mut c_char, buffer_length: usize) -> bool
{
    // SAFETY: Forwarded from the caller.
    unsafe { demangle_to_buffer(symbol, buffer, buffer_length, Some(Scheme::Cpp), DemangleOptions::Full) }
}

/// Demangle a Rust symbol (legacy or v0), keeping the hash.
///
/// # Safety
/// Same as [`symline_demangle_swift`].
#[no_mangle]
pub unsafe extern "C" fn symline_demangle_rust(symbol: *const c_char, buffer: *mut c_char, buffer_length: usize) -> bool
{
    // SAFETY: Forwarded from the caller.
    unsafe { demangle_to_buffer(symbol, buffer, buffer_length, Some(Scheme::Rust), DemangleOptions::Full) }
}

/// Demangle with whichever scheme recognizes the symbol.
///
/// # Safety
/// Same as [`symline_demangle_swift`].
#[no_mangle]
pub unsafe extern "C" fn symline_demangle_any(symbol: *const c_char, buffer: *mut c_char, buffer_length: usize) -> bool
{
    // SAFETY: Forwarded from the caller.
    unsafe { demangle_to_buffer(symbol, buffer, buffer_length, None, DemangleOptions::Full) }
}
