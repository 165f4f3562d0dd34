//! # symline-core
//!
//! Demangling and address symbolization engines for symline, behind a small
//! safe API that the C ABI crate (`symline-capi`) wraps.
//!
//! This crate provides:
//! - Buffer-based and owned-string demangling for Swift, C++, and Rust
//! - A [`Runtime`] holding parsed modules, shared by every [`Symbolizer`]
//! - Code, data, and inlined-chain resolution of `(module, offset)` queries
//! - Flat [`SymbolRecord`] results where failures are data, not control flow
//! - A [`DebugInfo`] reader for architecture slices and compilation directories
//!
//! ## Engines
//!
//! - **Swift**: `symbolic-demangle` (behind the default `swift` feature)
//! - **C++**: `cpp_demangle`
//! - **Rust**: `rustc-demangle`
//! - **Object files and DWARF**: `object`, `gimli`, `addr2line`
//!
//! ## Example
//!
//! ```rust
//! use symline_core::demangle::{demangle, DemangleOptions, Scheme};
//!
//! let name = demangle("_ZN3foo3barEv", Scheme::Cpp, DemangleOptions::Full);
//! assert_eq!(name.as_deref(), Some("foo::bar()"));
//! ```

pub mod debug_info;
pub mod demangle;
pub mod error;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod lifecycle;
pub mod prelude;
pub mod record;
pub mod symbols;
pub mod types;

pub use debug_info::{DebugInfo, Variant};
// Re-export commonly used types
pub use error::{Result, SymlineError};
pub use lifecycle::Runtime;
pub use record::SymbolRecord;
pub use symbols::{FunctionNameKind, Symbolizer, SymbolizerOptions};
pub use types::{ModuleQuery, QueryKind};
