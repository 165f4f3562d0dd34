//! # Symbolization
//!
//! Address-to-symbol resolution for object files on disk.
//!
//! - [`SymbolizerOptions`]: configuration snapshot (name kind, demangling,
//!   symbol-table fallback, default architecture)
//! - [`Symbolizer`]: resolves `(module, offset)` queries to frames, data
//!   symbols, or flat [`SymbolRecord`](crate::record::SymbolRecord)s
//!
//! Code addresses are resolved through DWARF line tables and inline info
//! (`addr2line` over `gimli`), with the object's symbol table (`object`) as a
//! fallback. Data addresses are resolved through the symbol table only.

pub(crate) mod module;
pub mod options;
pub mod symbolizer;

pub use options::{FunctionNameKind, SymbolizerOptions};
pub use symbolizer::{FrameChain, Symbolizer};
