//! Swift demangling via `symbolic-demangle`.
//!
//! The vendored demangler echoes its input back when it cannot parse it, so
//! only symbols with a Swift 4+ prefix are handed over, and an echo counts as
//! not recognized.

use symbolic_common::{Language, Name, NameMangling};
use symbolic_demangle::{Demangle, DemangleOptions as EngineOptions};

use super::DemangleOptions;

/// Manglings the vendored demangler understands.
const PREFIXES: [&str; 6] = ["_T0", "$S", "_$S", "$s", "_$s", "@__swiftmacro_"];

/// Whether `symbol` carries a Swift 4+ mangling prefix.
fn has_modern_prefix(symbol: &str) -> bool
{
    let symbol = symbol.strip_prefix('_').filter(|rest| rest.starts_with("_T0") || rest.starts_with("_$")).unwrap_or(symbol);
    PREFIXES.iter().any(|prefix| symbol.starts_with(prefix))
}

pub(super) fn demangle(symbol: &str, options: DemangleOptions) -> Option<String>
{
    if !has_modern_prefix(symbol) {
        return None;
    }
    let engine_options = match options {
        DemangleOptions::Full => EngineOptions::complete(),
        DemangleOptions::Simplified => EngineOptions::name_only(),
    };
    Name::new(symbol, NameMangling::Mangled, Language::Swift)
        .demangle(engine_options)
        .filter(|name| name != symbol)
}
