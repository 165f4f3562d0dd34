//! # Error Types
//!
//! General error handling for demangling, symbolization, and debug-info reads.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages. The display text is what ends up in the `error`
//! field of a symbol record, so messages are written for the caller on the
//! other side of the C ABI.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Main error type for symline operations
///
/// ## Error Categories
///
/// 1. **Module errors**: ModuleNotFound, ObjectFile, NoSuchArch
/// 2. **Debug info errors**: NoSuchSection, NoSuchAttribute, Dwarf
/// 3. **Lookup errors**: AddressNotFound
/// 4. **Lifecycle errors**: Unavailable
/// 5. **Boundary errors**: InvalidArgument, Internal
/// 6. **I/O errors**: Io
#[derive(Error, Debug)]
pub enum SymlineError
{
    /// The module path could not be opened
    ///
    /// This happens when:
    /// - The path does not exist or is not readable
    /// - A relative path was given and the working directory changed
    #[error("{}: {source}", path.display())]
    ModuleNotFound
    {
        /// Path as given by the caller (without any `:arch` suffix)
        path: PathBuf,
        /// Underlying I/O failure
        source: io::Error,
    },

    /// The file is not an object file we understand, or it is truncated
    #[error("invalid object file: {0}")]
    ObjectFile(String),

    /// The requested architecture is not present in the file
    ///
    /// Fat Mach-O files carry one slice per architecture; asking for an
    /// architecture that has no slice (or an unknown CPU name) ends up here.
    #[error("no such architecture: {0}")]
    NoSuchArch(String),

    /// A required section is missing from the object file
    #[error("no such section: {0}")]
    NoSuchSection(String),

    /// A required DWARF attribute is missing
    #[error("no such attribute: {0}")]
    NoSuchAttribute(String),

    /// The DWARF data is malformed
    #[error("{context}: {source}")]
    Dwarf
    {
        /// What we were doing when the DWARF reader failed
        context: String,
        /// Error reported by gimli
        source: gimli::Error,
    },

    /// Neither debug info nor the symbol table describes this address
    #[error("no symbol found at 0x{0:x}")]
    AddressNotFound(u64),

    /// The runtime backing a symbolizer has been shut down
    ///
    /// Returned when a symbolizer outlives the runtime it was created from.
    #[error("symbolizer runtime is not initialized")]
    Unavailable,

    /// Invalid argument passed across the boundary
    ///
    /// Examples:
    /// - Module path that is not valid UTF-8
    /// - Null pointer where a string was required
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A panic was caught at the C boundary
    #[error("internal error")]
    Internal,

    /// I/O error (for file operations, etc.)
    #[error("{0}")]
    Io(#[from] io::Error),
}

impl SymlineError
{
    /// Stable numeric code reported through `symline_error.code`.
    ///
    /// | code | meaning |
    /// |------|---------|
    /// | 1 | internal error |
    /// | 2 | no such architecture |
    /// | 3 | no such section |
    /// | 4 | no such attribute |
    /// | 5 | object file error |
    /// | 6 | I/O error |
    /// | 7 | DWARF error |
    /// | 8 | invalid argument |
    #[must_use]
    pub fn code(&self) -> i32
    {
        match self {
            SymlineError::Internal | SymlineError::Unavailable | SymlineError::AddressNotFound(_) => 1,
            SymlineError::NoSuchArch(_) => 2,
            SymlineError::NoSuchSection(_) => 3,
            SymlineError::NoSuchAttribute(_) => 4,
            SymlineError::ObjectFile(_) => 5,
            SymlineError::ModuleNotFound { .. } | SymlineError::Io(_) => 6,
            SymlineError::Dwarf { .. } => 7,
            SymlineError::InvalidArgument(_) => 8,
        }
    }

    pub(crate) fn dwarf(context: &str, source: gimli::Error) -> Self
    {
        SymlineError::Dwarf {
            context: context.to_string(),
            source,
        }
    }
}

impl From<object::Error> for SymlineError
{
    fn from(err: object::Error) -> Self
    {
        SymlineError::ObjectFile(err.to_string())
    }
}

/// Convenience type alias for `Result<T, SymlineError>`
///
/// ```rust
/// use symline_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, SymlineError>;
