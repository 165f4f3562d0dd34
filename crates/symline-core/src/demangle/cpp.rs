//! Itanium C++ demangling via `cpp_demangle`.
//!
//! Unlike the other engines, C++ reports *why* a symbol did not demangle.
//! [`demangle_status`] keeps that distinction for diagnostics; the boundary
//! only ever sees success or failure.

use std::fmt;

use cpp_demangle::{DemangleOptions as EngineOptions, Symbol};

use super::DemangleOptions;

/// Outcome of a C++ demangling attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CppStatus
{
    /// Demangled text
    Demangled(String),
    /// The symbol does not use Itanium mangling at all
    NotMangled,
    /// The symbol looks mangled but could not be parsed or printed
    Malformed(String),
}

impl fmt::Display for CppStatus
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            CppStatus::Demangled(name) => write!(f, "{name}"),
            CppStatus::NotMangled => write!(f, "not a mangled name"),
            CppStatus::Malformed(reason) => write!(f, "malformed mangled name: {reason}"),
        }
    }
}

/// Demangle an Itanium symbol, reporting the failure kind.
///
/// Mach-O symbols carry one extra leading underscore (`__Z...`); it is
/// stripped before parsing.
#[must_use]
pub fn demangle_status(symbol: &str, options: DemangleOptions) -> CppStatus
{
    let symbol = symbol.strip_prefix('_').filter(|rest| rest.starts_with("_Z")).unwrap_or(symbol);
    if !symbol.starts_with("_Z") {
        return CppStatus::NotMangled;
    }

    let parsed = match Symbol::new(symbol.as_bytes()) {
        Ok(parsed) => parsed,
        Err(err) => return CppStatus::Malformed(err.to_string()),
    };

    let engine_options = match options {
        DemangleOptions::Full => EngineOptions::new(),
        DemangleOptions::Simplified => EngineOptions::new().no_params().no_return_type(),
    };

    match parsed.demangle(&engine_options) {
        Ok(name) if !name.is_empty() => CppStatus::Demangled(name),
        Ok(_) => CppStatus::Malformed("empty output".to_string()),
        Err(err) => CppStatus::Malformed(err.to_string()),
    }
}

pub(super) fn demangle(symbol: &str, options: DemangleOptions) -> Option<String>
{
    match demangle_status(symbol, options) {
        CppStatus::Demangled(name) => Some(name),
        CppStatus::NotMangled | CppStatus::Malformed(_) => None,
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_status_distinguishes_failure_kinds()
    {
        assert_eq!(demangle_status("some_other_name", DemangleOptions::Full), CppStatus::NotMangled);
        assert_eq!(demangle_status("_some_name", DemangleOptions::Full), CppStatus::NotMangled);
        assert!(matches!(demangle_status("_Z", DemangleOptions::Full), CppStatus::Malformed(_)));
    }

    #[test]
    fn test_macho_extra_underscore()
    {
        assert_eq!(demangle("__ZN3foo3barEv", DemangleOptions::Full).as_deref(), Some("foo::bar()"));
    }

    #[test]
    fn test_simplified_drops_parameters()
    {
        let raw = "_ZN6google8protobuf2io25CopyingInputStreamAdaptor4SkipEi";
        assert_eq!(
            demangle(raw, DemangleOptions::Simplified).as_deref(),
            Some("google::protobuf::io::CopyingInputStreamAdaptor::Skip")
        );
    }
}
