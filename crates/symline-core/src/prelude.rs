//! Common module for library exports

pub use crate::debug_info::{DebugInfo, Variant};
pub use crate::demangle::{demangle, demangle_any, demangle_into, DemangleOptions, Scheme};
pub use crate::error::{Result, SymlineError};
pub use crate::lifecycle::{cleanup_global, global_symbolizer, init_global, is_global_initialized, Runtime};
pub use crate::record::{chain_records, SymbolRecord};
pub use crate::symbols::{FrameChain, FunctionNameKind, Symbolizer, SymbolizerOptions};
pub use crate::types::{DataSymbol, ModuleQuery, ModuleSpec, QueryKind, ResolvedFrame, SourceLocation, SymbolLanguage};
