//! Module queries.

use std::path::PathBuf;

use super::arch::is_known_cpu_name;

/// What kind of symbol a query is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryKind
{
    /// Code address: resolves to function name and source location.
    #[default]
    Code,
    /// Data address: resolves to a bare symbol name.
    Data,
}

impl QueryKind
{
    /// Convert the C-style `is_data` flag.
    #[must_use]
    pub fn from_is_data(is_data: bool) -> Self
    {
        if is_data {
            QueryKind::Data
        } else {
            QueryKind::Code
        }
    }
}

/// Identifies what to resolve: a module, an offset inside it, and the query kind.
///
/// Queries are consumed per call; nothing about them is cached.
///
/// ## Example
///
/// ```rust
/// use symline_core::types::{ModuleQuery, QueryKind};
///
/// let query = ModuleQuery::code("/usr/lib/libfoo.so", 0x1234);
/// assert_eq!(query.kind, QueryKind::Code);
/// assert_eq!(query.offset, 0x1234);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleQuery
{
    /// Module identifier, optionally suffixed with `:arch`.
    pub module: String,
    /// Address in the module's own address space (file virtual address).
    pub offset: u64,
    /// Code or data lookup.
    pub kind: QueryKind,
}

impl ModuleQuery
{
    pub fn new(module: impl Into<String>, offset: u64, kind: QueryKind) -> Self
    {
        Self {
            module: module.into(),
            offset,
            kind,
        }
    }

    /// Query for a code address.
    pub fn code(module: impl Into<String>, offset: u64) -> Self
    {
        Self::new(module, offset, QueryKind::Code)
    }

    /// Query for a data address.
    pub fn data(module: impl Into<String>, offset: u64) -> Self
    {
        Self::new(module, offset, QueryKind::Data)
    }

    /// Split the module identifier into path and architecture.
    #[must_use]
    pub fn spec(&self) -> ModuleSpec
    {
        ModuleSpec::parse(&self.module)
    }
}

/// A module identifier split into its path and optional architecture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleSpec
{
    pub path: PathBuf,
    pub arch: Option<String>,
}

impl ModuleSpec
{
    /// Parse `path` or `path:arch`.
    ///
    /// The suffix is only split off when it names a known CPU, so paths that
    /// legitimately contain a colon (`C:\...`, `a:b/c`) stay intact.
    ///
    /// ```rust
    /// use symline_core::types::ModuleSpec;
    ///
    /// let spec = ModuleSpec::parse("Foo.dSYM/Contents/Resources/DWARF/Foo:arm64");
    /// assert_eq!(spec.arch.as_deref(), Some("arm64"));
    ///
    /// let spec = ModuleSpec::parse("weird:name");
    /// assert_eq!(spec.arch, None);
    /// assert_eq!(spec.path.to_str(), Some("weird:name"));
    /// ```
    #[must_use]
    pub fn parse(module: &str) -> Self
    {
        if let Some((path, arch)) = module.rsplit_once(':') {
            if !path.is_empty() && is_known_cpu_name(arch) {
                return Self {
                    path: PathBuf::from(path),
                    arch: Some(arch.to_string()),
                };
            }
        }

        Self {
            path: PathBuf::from(module),
            arch: None,
        }
    }
}
