//! Rust demangling via `rustc-demangle`.

use super::DemangleOptions;

pub(super) fn demangle(symbol: &str, options: DemangleOptions) -> Option<String>
{
    let demangled = rustc_demangle::try_demangle(symbol).ok()?;
    Some(match options {
        DemangleOptions::Full => demangled.to_string(),
        // Alternate formatting drops the trailing `::h<hash>`.
        DemangleOptions::Simplified => format!("{demangled:#}"),
    })
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_legacy_symbol_with_and_without_hash()
    {
        let raw = "_ZN4test4main17h0123456789abcdefE";
        assert_eq!(demangle(raw, DemangleOptions::Full).as_deref(), Some("test::main::h0123456789abcdef"));
        assert_eq!(demangle(raw, DemangleOptions::Simplified).as_deref(), Some("test::main"));
    }

    #[test]
    fn test_cpp_symbol_is_not_rust()
    {
        assert_eq!(demangle("_ZN3foo3barEv", DemangleOptions::Full), None);
        assert_eq!(demangle("plain", DemangleOptions::Full), None);
    }
}
