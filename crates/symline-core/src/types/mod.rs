//! # Types
//!
//! Plain data types shared by the demanglers, the symbolizer, and the C ABI.
//!
//! Nothing in here talks to an engine; these are the values that flow in and
//! out of one.

pub mod arch;
pub mod query;
pub mod symbols;

// Re-export all public types
pub use query::{ModuleQuery, ModuleSpec, QueryKind};
pub use symbols::{DataSymbol, ResolvedFrame, SourceLocation, SymbolLanguage};
