//! Symbolizer configuration.
//!
//! A [`SymbolizerOptions`] value is snapshotted into every symbolizer at
//! construction; changing the environment afterwards does not affect
//! existing handles.

use std::fmt;
use std::str::FromStr;

use crate::demangle::{demangle_for_display, DemangleOptions};
use crate::error::{Result, SymlineError};

/// Which name to report for a resolved function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FunctionNameKind
{
    /// Report no name at all (location only).
    None,
    /// Demangled name without parameters or hashes.
    ShortName,
    /// Linkage (mangled) name, demangled in full when demangling is on.
    #[default]
    LinkageName,
}

impl fmt::Display for FunctionNameKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            FunctionNameKind::None => "none",
            FunctionNameKind::ShortName => "short",
            FunctionNameKind::LinkageName => "linkage",
        };
        write!(f, "{label}")
    }
}

impl FromStr for FunctionNameKind
{
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "none" => Ok(FunctionNameKind::None),
            "short" | "short_name" | "shortname" => Ok(FunctionNameKind::ShortName),
            "linkage" | "linkage_name" | "linkagename" => Ok(FunctionNameKind::LinkageName),
            _ => Err(format!("Unknown function name kind: {s}. Use 'none', 'short', or 'linkage'")),
        }
    }
}

/// Environment variable selecting [`FunctionNameKind`].
pub const ENV_NAME_KIND: &str = "SYMLINE_NAME_KIND";
/// Environment variable toggling demangle-on-resolve.
pub const ENV_DEMANGLE: &str = "SYMLINE_DEMANGLE";
/// Environment variable toggling the symbol-table fallback.
pub const ENV_USE_SYMBOL_TABLE: &str = "SYMLINE_USE_SYMBOL_TABLE";
/// Environment variable naming the default architecture for fat files.
pub const ENV_DEFAULT_ARCH: &str = "SYMLINE_DEFAULT_ARCH";

/// Configuration snapshot for a symbolizer.
///
/// ## Example
///
/// ```rust
/// use symline_core::symbols::{FunctionNameKind, SymbolizerOptions};
///
/// let options = SymbolizerOptions {
///     name_kind: FunctionNameKind::ShortName,
///     ..SymbolizerOptions::default()
/// };
/// assert!(options.demangle);
/// assert!(options.use_symbol_table);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolizerOptions
{
    /// Which function name to report.
    pub name_kind: FunctionNameKind,
    /// Demangle linkage names before reporting them.
    pub demangle: bool,
    /// Fall back to the symbol table when debug info has no answer.
    pub use_symbol_table: bool,
    /// Architecture used for fat files when the module carries no `:arch` suffix.
    pub default_arch: Option<String>,
}

impl Default for SymbolizerOptions
{
    fn default() -> Self
    {
        Self {
            name_kind: FunctionNameKind::LinkageName,
            demangle: true,
            use_symbol_table: true,
            default_arch: None,
        }
    }
}

impl SymbolizerOptions
{
    /// Defaults overridden by the `SYMLINE_*` environment variables.
    ///
    /// ## Errors
    ///
    /// Returns `InvalidArgument` when a variable is set to an unparseable value.
    pub fn from_env() -> Result<Self>
    {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    ///
    /// ## Errors
    ///
    /// Returns `InvalidArgument` when a value cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();

        if let Some(value) = lookup(ENV_NAME_KIND) {
            options.name_kind = value
                .parse()
                .map_err(|err: String| SymlineError::InvalidArgument(format!("{ENV_NAME_KIND}: {err}")))?;
        }
        if let Some(value) = lookup(ENV_DEMANGLE) {
            options.demangle = parse_flag(ENV_DEMANGLE, &value)?;
        }
        if let Some(value) = lookup(ENV_USE_SYMBOL_TABLE) {
            options.use_symbol_table = parse_flag(ENV_USE_SYMBOL_TABLE, &value)?;
        }
        if let Some(value) = lookup(ENV_DEFAULT_ARCH) {
            let value = value.trim();
            if !value.is_empty() {
                options.default_arch = Some(value.to_string());
            }
        }

        Ok(options)
    }

    /// Apply the naming rules to a raw (linkage or short) name.
    pub(crate) fn render_name(&self, raw: &str) -> Option<String>
    {
        match self.name_kind {
            FunctionNameKind::None => None,
            FunctionNameKind::ShortName => Some(demangle_for_display(raw, DemangleOptions::Simplified)),
            FunctionNameKind::LinkageName if self.demangle => Some(demangle_for_display(raw, DemangleOptions::Full)),
            FunctionNameKind::LinkageName => Some(raw.to_string()),
        }
    }

    /// Data symbols are always named; only the demangle flag applies.
    pub(crate) fn render_data_name(&self, raw: &str) -> String
    {
        if self.demangle {
            demangle_for_display(raw, DemangleOptions::Full)
        } else {
            raw.to_string()
        }
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool>
{
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(SymlineError::InvalidArgument(format!("{key}: expected a boolean, found '{other}'"))),
    }
}

#[cfg(test)]
mod tests
{
    use std::collections::HashMap;

    use super::*;

    fn lookup_in(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String>
    {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_empty_environment_gives_defaults()
    {
        let options = SymbolizerOptions::from_lookup(lookup_in(&[])).unwrap();
        assert_eq!(options, SymbolizerOptions::default());
    }

    #[test]
    fn test_environment_overrides()
    {
        let options = SymbolizerOptions::from_lookup(lookup_in(&[
            (ENV_NAME_KIND, "short"),
            (ENV_DEMANGLE, "no"),
            (ENV_USE_SYMBOL_TABLE, "0"),
            (ENV_DEFAULT_ARCH, "arm64"),
        ]))
        .unwrap();
        assert_eq!(options.name_kind, FunctionNameKind::ShortName);
        assert!(!options.demangle);
        assert!(!options.use_symbol_table);
        assert_eq!(options.default_arch.as_deref(), Some("arm64"));
    }

    #[test]
    fn test_bad_values_are_invalid_arguments()
    {
        let err = SymbolizerOptions::from_lookup(lookup_in(&[(ENV_DEMANGLE, "maybe")])).unwrap_err();
        assert_eq!(err.code(), 8);
        assert!(err.to_string().contains(ENV_DEMANGLE));

        let err = SymbolizerOptions::from_lookup(lookup_in(&[(ENV_NAME_KIND, "mangled")])).unwrap_err();
        assert!(matches!(err, SymlineError::InvalidArgument(_)));
    }

    #[test]
    fn test_render_name_per_kind()
    {
        let raw = "_ZN4test4main17h0123456789abcdefE";
        let mut options = SymbolizerOptions::default();
        assert_eq!(options.render_name(raw).as_deref(), Some("test::main::h0123456789abcdef"));

        options.demangle = false;
        assert_eq!(options.render_name(raw).as_deref(), Some(raw));

        options.name_kind = FunctionNameKind::ShortName;
        assert_eq!(options.render_name(raw).as_deref(), Some("test::main"));

        options.name_kind = FunctionNameKind::None;
        assert_eq!(options.render_name(raw), None);
    }
}
