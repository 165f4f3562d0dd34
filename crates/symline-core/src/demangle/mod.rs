//! # Symbol Demangling
//!
//! Adapters over the external demangling engines. Every engine's output is
//! turned into an owned `String` before it leaves this module, so callers see
//! one ownership convention regardless of which engine ran.
//!
//! ## Schemes
//!
//! - **Swift**: `symbolic-demangle` for Swift 4+ manglings (vendored Swift
//!   demangler, `swift` feature); pre-Swift-4 `_T` manglings are parsed
//!   by a pure-Rust parser and need no feature
//! - **C++**: `cpp_demangle` (Itanium ABI)
//! - **Rust**: `rustc-demangle` (legacy and v0)
//!
//! ## Buffer contract
//!
//! [`demangle_into`] writes into a caller-owned buffer. It never writes more
//! than `capacity - 1` payload bytes plus a terminating NUL, and it leaves the
//! buffer untouched on every failure path (not mangled, malformed, or too
//! small). Those failures are deliberately indistinguishable at this level.

pub mod cpp;
mod rust;
#[cfg(feature = "swift")]
mod swift;
mod swift_legacy;

use std::fmt;
use std::str::FromStr;

use tracing::trace;

use crate::types::SymbolLanguage;

/// Mangling scheme to demangle with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme
{
    Swift,
    Cpp,
    Rust,
}

impl Scheme
{
    /// All schemes, in the order `demangle_any` falls back through them.
    pub const ALL: [Scheme; 3] = [Scheme::Swift, Scheme::Cpp, Scheme::Rust];

    fn for_language(language: SymbolLanguage) -> Option<Self>
    {
        match language {
            SymbolLanguage::Swift => Some(Scheme::Swift),
            SymbolLanguage::Cpp => Some(Scheme::Cpp),
            SymbolLanguage::Rust => Some(Scheme::Rust),
            SymbolLanguage::C | SymbolLanguage::Unknown => None,
        }
    }
}

impl fmt::Display for Scheme
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            Scheme::Swift => "swift",
            Scheme::Cpp => "cpp",
            Scheme::Rust => "rust",
        };
        write!(f, "{label}")
    }
}

impl FromStr for Scheme
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "swift" => Ok(Scheme::Swift),
            "cpp" | "c++" | "itanium" => Ok(Scheme::Cpp),
            "rust" => Ok(Scheme::Rust),
            _ => Err(format!("Unknown mangling scheme: {s}. Use 'swift', 'cpp', or 'rust'")),
        }
    }
}

/// Rendering verbosity.
///
/// Options change how much of a symbol is printed, never which symbol matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DemangleOptions
{
    /// Everything the engine can print: parameters, return types, hashes.
    #[default]
    Full,
    /// UI-friendly rendering without parameter lists or hashes.
    Simplified,
}

impl FromStr for DemangleOptions
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "full" | "complete" => Ok(DemangleOptions::Full),
            "simplified" | "simple" | "short" => Ok(DemangleOptions::Simplified),
            _ => Err(format!("Unknown demangle options: {s}. Use 'full' or 'simplified'")),
        }
    }
}

/// Demangle `symbol` with a specific scheme.
///
/// Returns `None` when the engine does not recognize the symbol, when the
/// mangling is malformed, or when the engine produces nothing.
///
/// ```rust
/// use symline_core::demangle::{demangle, DemangleOptions, Scheme};
///
/// let name = demangle("_ZN6google8protobuf2io25CopyingInputStreamAdaptor4SkipEi", Scheme::Cpp, DemangleOptions::Full);
/// assert_eq!(name.as_deref(), Some("google::protobuf::io::CopyingInputStreamAdaptor::Skip(int)"));
///
/// assert_eq!(demangle("some_other_name", Scheme::Cpp, DemangleOptions::Full), None);
/// ```
#[must_use]
pub fn demangle(symbol: &str, scheme: Scheme, options: DemangleOptions) -> Option<String>
{
    if symbol.is_empty() {
        return None;
    }

    let demangled = match scheme {
        Scheme::Swift => demangle_swift(symbol, options),
        Scheme::Cpp => cpp::demangle(symbol, options),
        Scheme::Rust => rust::demangle(symbol, options),
    };
    trace!(%scheme, symbol, recognized = demangled.is_some(), "demangle");
    demangled.filter(|name| !name.is_empty())
}

/// Demangle with whichever scheme recognizes the symbol.
///
/// The scheme suggested by the mangling prefix is tried first, then the rest
/// in [`Scheme::ALL`] order.
#[must_use]
pub fn demangle_any(symbol: &str, options: DemangleOptions) -> Option<(Scheme, String)>
{
    let preferred = Scheme::for_language(SymbolLanguage::detect(symbol));
    preferred
        .into_iter()
        .chain(Scheme::ALL.into_iter().filter(|scheme| Some(*scheme) != preferred))
        .find_map(|scheme| demangle(symbol, scheme, options).map(|name| (scheme, name)))
}

/// Demangle raw symbol bytes into a caller-owned buffer.
///
/// Returns `true` and writes the demangled text plus a NUL terminator on
/// success. Returns `false` with `out` untouched when the symbol is empty or
/// not UTF-8, when the scheme does not recognize it, or when the result plus
/// terminator does not fit.
///
/// ```rust
/// use symline_core::demangle::{demangle_into, DemangleOptions, Scheme};
///
/// let mut buffer = [0xffu8; 64];
/// assert!(demangle_into(b"_ZN3foo3barEv", Scheme::Cpp, DemangleOptions::Full, &mut buffer));
/// assert_eq!(&buffer[..14], b"foo::bar()\0\xff\xff\xff");
///
/// let mut tiny = [0xffu8; 4];
/// assert!(!demangle_into(b"_ZN3foo3barEv", Scheme::Cpp, DemangleOptions::Full, &mut tiny));
/// assert_eq!(tiny, [0xff; 4]);
/// ```
pub fn demangle_into(symbol: &[u8], scheme: Scheme, options: DemangleOptions, out: &mut [u8]) -> bool
{
    let Ok(symbol) = std::str::from_utf8(symbol) else {
        return false;
    };
    match demangle(symbol, scheme, options) {
        Some(name) => copy_terminated(&name, out),
        None => false,
    }
}

/// [`demangle_into`] with scheme detection.
pub fn demangle_any_into(symbol: &[u8], options: DemangleOptions, out: &mut [u8]) -> bool
{
    let Ok(symbol) = std::str::from_utf8(symbol) else {
        return false;
    };
    match demangle_any(symbol, options) {
        Some((_, name)) => copy_terminated(&name, out),
        None => false,
    }
}

/// Copy `text` plus a NUL into `out`, or leave `out` alone if it does not fit.
fn copy_terminated(text: &str, out: &mut [u8]) -> bool
{
    let bytes = text.as_bytes();
    if bytes.len() >= out.len() {
        return false;
    }
    out[..bytes.len()].copy_from_slice(bytes);
    out[bytes.len()] = 0;
    true
}

fn demangle_swift(symbol: &str, options: DemangleOptions) -> Option<String>
{
    if swift_legacy::is_legacy_mangling(symbol) {
        return swift_legacy::demangle(symbol, options);
    }
    demangle_modern_swift(symbol, options)
}

#[cfg(feature = "swift")]
fn demangle_modern_swift(symbol: &str, options: DemangleOptions) -> Option<String>
{
    swift::demangle(symbol, options)
}

#[cfg(not(feature = "swift"))]
fn demangle_modern_swift(_symbol: &str, _options: DemangleOptions) -> Option<String>
{
    None
}

/// Demangle a name coming out of debug info or a symbol table.
///
/// Falls back to the raw name when no engine recognizes it.
pub(crate) fn demangle_for_display(raw: &str, options: DemangleOptions) -> String
{
    demangle_any(raw, options).map_or_else(|| raw.to_string(), |(_, name)| name)
}

#[cfg(test)]
mod tests
{
    use super::*;

    const CPP: &[u8] = b"_ZN6google8protobuf2io25CopyingInputStreamAdaptor4SkipEi";
    const CPP_DEMANGLED: &str = "google::protobuf::io::CopyingInputStreamAdaptor::Skip(int)";

    #[test]
    fn test_buffer_sizes_around_exact_fit()
    {
        let exact = CPP_DEMANGLED.len() + 1;
        for capacity in [0, 1, exact - 1, exact, exact + 1] {
            let mut buffer = vec![0xaau8; capacity];
            let ok = demangle_into(CPP, Scheme::Cpp, DemangleOptions::Full, &mut buffer);
            if capacity >= exact {
                assert!(ok, "capacity {capacity} should fit");
                assert_eq!(&buffer[..exact - 1], CPP_DEMANGLED.as_bytes());
                assert_eq!(buffer[exact - 1], 0);
                assert!(buffer[exact..].iter().all(|b| *b == 0xaa));
            } else {
                assert!(!ok, "capacity {capacity} should not fit");
                assert!(buffer.iter().all(|b| *b == 0xaa));
            }
        }
    }

    #[test]
    fn test_empty_and_invalid_utf8_symbols()
    {
        let mut buffer = [0u8; 32];
        assert!(!demangle_into(b"", Scheme::Cpp, DemangleOptions::Full, &mut buffer));
        assert!(!demangle_into(b"_Z\xff\xfe", Scheme::Cpp, DemangleOptions::Full, &mut buffer));
        assert_eq!(buffer, [0u8; 32]);
    }

    #[test]
    fn test_demangled_text_does_not_demangle_again()
    {
        let name = demangle(std::str::from_utf8(CPP).unwrap(), Scheme::Cpp, DemangleOptions::Full).unwrap();
        assert_eq!(demangle(&name, Scheme::Cpp, DemangleOptions::Full), None);
        assert_eq!(demangle(&name, Scheme::Rust, DemangleOptions::Full), None);
    }

    #[test]
    fn test_demangle_any_prefers_detected_scheme()
    {
        let (scheme, name) = demangle_any("_ZN4core3ptr13drop_in_place17h0123456789abcdefE", DemangleOptions::Simplified).unwrap();
        assert_eq!(scheme, Scheme::Rust);
        assert_eq!(name, "core::ptr::drop_in_place");

        let (scheme, _) = demangle_any(std::str::from_utf8(CPP).unwrap(), DemangleOptions::Full).unwrap();
        assert_eq!(scheme, Scheme::Cpp);

        assert_eq!(demangle_any("main", DemangleOptions::Full), None);
        assert_eq!(demangle_any("_some_name", DemangleOptions::Full), None);
    }

    #[test]
    fn test_swift_rejects_unmangled_names()
    {
        for symbol in ["_some_name", "some_other_name", "main"] {
            assert_eq!(demangle(symbol, Scheme::Swift, DemangleOptions::Full), None, "{symbol}");
            assert_eq!(demangle(symbol, Scheme::Swift, DemangleOptions::Simplified), None, "{symbol}");
        }
    }

    #[test]
    fn test_old_swift_mangling_without_engine_feature()
    {
        let raw = "_TFC12Swift_Tester14ViewController11doSomethingfS0_FT_T_";
        assert_eq!(
            demangle(raw, Scheme::Swift, DemangleOptions::Full).as_deref(),
            Some("Swift_Tester.ViewController.doSomething (Swift_Tester.ViewController) -> () -> ()")
        );
        assert_eq!(
            demangle_any("_TtC4Test7MyClass", DemangleOptions::Full),
            Some((Scheme::Swift, "Test.MyClass".to_string()))
        );
    }

    #[test]
    fn test_display_fallback_keeps_raw_name()
    {
        assert_eq!(demangle_for_display("main", DemangleOptions::Full), "main");
        assert_eq!(demangle_for_display("_ZN3foo3barEv", DemangleOptions::Full), "foo::bar()");
    }

    #[test]
    fn test_scheme_and_options_from_str()
    {
        assert_eq!("swift".parse::<Scheme>().unwrap(), Scheme::Swift);
        assert_eq!("C++".parse::<Scheme>().unwrap(), Scheme::Cpp);
        assert_eq!("rust".parse::<Scheme>().unwrap(), Scheme::Rust);
        assert!("java".parse::<Scheme>().is_err());
        assert_eq!("simplified".parse::<DemangleOptions>().unwrap(), DemangleOptions::Simplified);
        assert!("loud".parse::<DemangleOptions>().is_err());
    }
}
