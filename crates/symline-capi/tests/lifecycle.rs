//! Tests for `symline_symbolizer_lib_init` / `symline_symbolizer_lib_cleanup`
//!
//! The runtime is process-wide, so the whole sequence is one test in its own
//! test binary.

use std::ffi::{CStr, CString};
use std::ptr;

use symline::*;

#[test]
fn test_runtime_lifecycle_through_c_abi()
{
    let module = CString::new("/definitely/not/here.so").unwrap();

    // Nothing works before init, and cleanup is a no-op.
    symline_symbolizer_lib_cleanup();
    assert!(symline_symbolizer_new().is_null());
    let opts = symline_symbolizer_opts::default();
    assert!(unsafe { symline_symbolizer_new_opts(&opts) }.is_null());

    symline_symbolizer_lib_init();
    symline_symbolizer_lib_init();
    let symbolizer = symline_symbolizer_new();
    assert!(!symbolizer.is_null());

    let symbol = unsafe { symline_symbolizer_symbolize(symbolizer, module.as_ptr(), 0, false) };
    let message = unsafe { CStr::from_ptr((*symbol).error) }.to_str().unwrap().to_string();
    assert!(message.contains("here.so"), "{message}");
    unsafe { symline_symbol_free(symbol) };

    symline_symbolizer_lib_cleanup();

    // The handle outlives the runtime; it reports errors and can still be freed.
    let symbol = unsafe { symline_symbolizer_symbolize(symbolizer, module.as_ptr(), 0, false) };
    let message = unsafe { CStr::from_ptr((*symbol).error) }.to_str().unwrap();
    assert_eq!(message, "symbolizer runtime is not initialized");
    unsafe { symline_symbol_free(symbol) };

    let mut count = 0;
    let symbols = unsafe { symline_symbolizer_symbolize_inlined_array(symbolizer, module.as_ptr(), 0, &mut count) };
    assert_eq!(count, 1);
    unsafe { symline_bulk_symbol_free(symbols, count) };
    unsafe { symline_symbolizer_free(symbolizer) };

    // No restart within the process.
    symline_symbolizer_lib_init();
    assert!(symline_symbolizer_new().is_null());
    symline_symbolizer_lib_cleanup();
    assert!(unsafe { symline_symbolizer_new_opts(ptr::null()) }.is_null());
}
