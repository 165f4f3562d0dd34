//! Tests for the process-wide runtime slot
//!
//! The slot is global to the process, so the whole sequence runs as one test
//! in its own test binary.

use symline_core::lifecycle::{cleanup_global, global_symbolizer, init_global, is_global_initialized};
use symline_core::{ModuleQuery, SymbolizerOptions, SymlineError};

#[test]
fn test_global_runtime_lifecycle()
{
    // Cleanup before init is a no-op.
    assert!(!cleanup_global());
    assert!(!is_global_initialized());
    assert!(matches!(global_symbolizer(SymbolizerOptions::default()), Err(SymlineError::Unavailable)));

    assert!(init_global());
    assert!(!init_global());
    assert!(is_global_initialized());

    let mut symbolizer = global_symbolizer(SymbolizerOptions::default()).unwrap();
    let record = symbolizer.symbolize(&ModuleQuery::code("/definitely/not/here.so", 0));
    assert!(record.error.as_deref().unwrap().contains("here.so"));

    assert!(cleanup_global());
    assert!(!cleanup_global());

    // The handle survives cleanup but can no longer resolve anything.
    let record = symbolizer.symbolize(&ModuleQuery::code("/definitely/not/here.so", 0));
    assert_eq!(record.error.as_deref(), Some("symbolizer runtime is not initialized"));

    // No re-initialization within the same process.
    assert!(!init_global());
    assert!(!is_global_initialized());
    assert!(global_symbolizer(SymbolizerOptions::default()).is_err());
}
