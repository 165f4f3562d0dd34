//! Symbol and source location types.

use std::fmt;

/// Programming language associated with a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolLanguage
{
    /// Rust symbol (legacy `_ZN...17h<hash>E` or v0 `_R` mangling).
    Rust,
    /// C++ symbol (Itanium mangling without Rust extensions).
    Cpp,
    /// Swift symbol (`_T`, `$s`, `_$s` and friends).
    Swift,
    /// C symbol or unmangled global.
    C,
    /// Unknown or mixed language.
    Unknown,
}

impl SymbolLanguage
{
    /// Guess the language from the mangling prefix.
    ///
    /// This is a prefix check only; it does not validate the mangling.
    #[must_use]
    pub fn detect(raw: &str) -> Self
    {
        let unprefixed = raw.strip_prefix('_').unwrap_or(raw);
        if raw.starts_with("_R") || (raw.starts_with("_ZN") && raw.ends_with('E') && raw.contains("17h")) {
            SymbolLanguage::Rust
        } else if raw.starts_with("_Z") || raw.starts_with("__Z") {
            SymbolLanguage::Cpp
        } else if raw.starts_with("_T") || unprefixed.starts_with("$s") || unprefixed.starts_with("$S") {
            SymbolLanguage::Swift
        } else if raw.is_empty() {
            SymbolLanguage::Unknown
        } else {
            SymbolLanguage::C
        }
    }
}

impl fmt::Display for SymbolLanguage
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            SymbolLanguage::Rust => "rust",
            SymbolLanguage::Cpp => "c++",
            SymbolLanguage::Swift => "swift",
            SymbolLanguage::C => "c",
            SymbolLanguage::Unknown => "unknown",
        };
        write!(f, "{label}")
    }
}

/// Source code location for a symbol or frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation
{
    /// Absolute or compilation-directory-relative path.
    pub file: String,
    /// Line number, if known.
    pub line: Option<u32>,
    /// Column number, if known.
    pub column: Option<u32>,
}

impl SourceLocation
{
    /// Helper to build a location when only a file is known.
    pub fn from_file(file: impl Into<String>) -> Self
    {
        Self {
            file: file.into(),
            line: None,
            column: None,
        }
    }
}

impl fmt::Display for SourceLocation
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}:{}:{}", self.file, self.line.unwrap_or(0), self.column.unwrap_or(0))
    }
}

/// One frame of a code resolution.
///
/// A plain (non-inlined) address resolves to exactly one frame. An address
/// inside inlined code resolves to a chain of frames, innermost first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedFrame
{
    /// Function name after the symbolizer's naming and demangling rules.
    pub name: Option<String>,
    /// Where the frame's code (or its inlined call) lives.
    pub location: Option<SourceLocation>,
}

/// A data symbol covering the queried offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSymbol
{
    /// Symbol name after demangling rules.
    pub name: String,
    /// Start address of the symbol in the module's address space.
    pub address: u64,
    /// Size in bytes, zero when the symbol table does not record one.
    pub size: u64,
}
