//! Handle-based address symbolization.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use addr2line::Context;
use once_cell::unsync::OnceCell;
use smallvec::SmallVec;
use tracing::{debug, warn};

use super::module::{LoadedModule, ModuleKey, OwnedReader};
use super::options::SymbolizerOptions;
use crate::error::{Result, SymlineError};
use crate::lifecycle::RuntimeInner;
use crate::record::{chain_records, SymbolRecord};
use crate::types::{DataSymbol, ModuleQuery, ModuleSpec, QueryKind, ResolvedFrame, SourceLocation};

/// An inlined call chain, innermost frame first.
///
/// Most chains are shallow; four frames stay on the stack.
pub type FrameChain = SmallVec<[ResolvedFrame; 4]>;

/// Per-symbolizer view of a shared module.
struct ModuleContext
{
    module: Arc<LoadedModule>,
    lines: OnceCell<Option<Context<OwnedReader>>>,
}

impl ModuleContext
{
    fn new(module: Arc<LoadedModule>) -> Self
    {
        Self {
            module,
            lines: OnceCell::new(),
        }
    }

    /// The line-table context, built on first use.
    ///
    /// `None` when the module has no debug info or the debug info cannot be
    /// read; lookups then go straight to the symbol table.
    fn lines(&self) -> Option<&Context<OwnedReader>>
    {
        self.lines
            .get_or_init(|| {
                let sections = self.module.debug();
                if !sections.has_debug_info() {
                    return None;
                }
                match sections.line_context() {
                    Ok(context) => Some(context),
                    Err(err) => {
                        warn!(error = %err, "ignoring unreadable debug info");
                        None
                    }
                }
            })
            .as_ref()
    }
}

/// Resolves module offsets to names and source locations.
///
/// A symbolizer is a single-threaded object: lookups take `&mut self`, and
/// line-table contexts are cached per symbolizer. Parsed module data is shared
/// through the [`Runtime`](crate::Runtime) the symbolizer was created from.
///
/// ## Example
///
/// ```rust,no_run
/// use symline_core::{ModuleQuery, Runtime, SymbolizerOptions};
///
/// let runtime = Runtime::new();
/// let mut symbolizer = runtime.symbolizer(SymbolizerOptions::default());
///
/// for record in symbolizer.symbolize_inlined(&ModuleQuery::code("/usr/lib/libfoo.so", 0x1234)) {
///     match record.error {
///         Some(message) => eprintln!("error: {message}"),
///         None => println!("{:?} at {:?}:{:?}", record.name, record.filename, record.line),
///     }
/// }
/// ```
pub struct Symbolizer
{
    runtime: Weak<RuntimeInner>,
    options: SymbolizerOptions,
    modules: HashMap<ModuleKey, ModuleContext>,
}

impl Symbolizer
{
    pub(crate) fn new(runtime: Weak<RuntimeInner>, options: SymbolizerOptions) -> Self
    {
        Self {
            runtime,
            options,
            modules: HashMap::new(),
        }
    }

    /// The configuration snapshot this symbolizer was created with.
    #[must_use]
    pub fn options(&self) -> &SymbolizerOptions
    {
        &self.options
    }

    /// Resolve a code address to its innermost frame.
    ///
    /// ## Errors
    ///
    /// - `Unavailable` when the runtime is gone
    /// - Module load errors (`ModuleNotFound`, `ObjectFile`, `NoSuchArch`)
    /// - `AddressNotFound` when neither debug info nor the symbol table
    ///   describes the address, or when the innermost frame would carry
    ///   neither a name nor a location
    pub fn symbolize_code(&mut self, module: &str, offset: u64) -> Result<ResolvedFrame>
    {
        let mut chain = self.symbolize_chain(module, offset)?;
        Ok(chain.remove(0))
    }

    /// Resolve a code address to its full inlined call chain, innermost first.
    ///
    /// A non-inlined address yields exactly one frame.
    ///
    /// ## Errors
    ///
    /// Same as [`symbolize_code`](Self::symbolize_code).
    pub fn symbolize_chain(&mut self, module: &str, offset: u64) -> Result<FrameChain>
    {
        let options = self.options.clone();
        let context = self.context_for(module)?;

        let mut chain = FrameChain::new();
        if let Some(lines) = context.lines() {
            chain = dwarf_frames(lines, offset, &options)?;
        }

        let needs_name = !matches!(chain.first(), Some(ResolvedFrame { name: Some(_), .. }));
        if needs_name && options.use_symbol_table {
            if let Some(symbol) = context.module.functions().lookup(offset) {
                let name = options.render_name(&symbol.name);
                match chain.first_mut() {
                    Some(innermost) => innermost.name = name,
                    None => chain.push(ResolvedFrame { name, location: None }),
                }
            }
        }

        // A hit must name the function or locate it.
        if !chain.first().is_some_and(|innermost| innermost.name.is_some() || innermost.location.is_some()) {
            return Err(SymlineError::AddressNotFound(offset));
        }

        debug!(module, offset = format_args!("{offset:#x}"), frames = chain.len(), "resolved code address");
        Ok(chain)
    }

    /// Resolve a data address to the symbol covering it.
    ///
    /// ## Errors
    ///
    /// Same as [`symbolize_code`](Self::symbolize_code).
    pub fn symbolize_data(&mut self, module: &str, offset: u64) -> Result<DataSymbol>
    {
        let options = self.options.clone();
        let context = self.context_for(module)?;

        let symbol = context
            .module
            .data()
            .lookup(offset)
            .ok_or(SymlineError::AddressNotFound(offset))?;

        debug!(module, offset = format_args!("{offset:#x}"), symbol = %symbol.name, "resolved data address");
        Ok(DataSymbol {
            name: options.render_data_name(&symbol.name),
            address: symbol.address,
            size: symbol.size,
        })
    }

    /// Resolve a query to exactly one record.
    ///
    /// Failures come back as an error record; this never fails.
    pub fn symbolize(&mut self, query: &ModuleQuery) -> SymbolRecord
    {
        match query.kind {
            QueryKind::Code => SymbolRecord::from(self.symbolize_code(&query.module, query.offset)),
            QueryKind::Data => SymbolRecord::from(self.symbolize_data(&query.module, query.offset)),
        }
    }

    /// Resolve a query to its inlined chain of records, innermost first.
    ///
    /// The result is never empty: a failure is a single error record. Data
    /// queries have no inlining and yield one record.
    pub fn symbolize_inlined(&mut self, query: &ModuleQuery) -> Vec<SymbolRecord>
    {
        match query.kind {
            QueryKind::Code => chain_records(self.symbolize_chain(&query.module, query.offset)),
            QueryKind::Data => vec![SymbolRecord::from(self.symbolize_data(&query.module, query.offset))],
        }
    }

    fn context_for(&mut self, module: &str) -> Result<&ModuleContext>
    {
        let runtime = self.runtime.upgrade().ok_or(SymlineError::Unavailable)?;
        let key = ModuleKey::new(&ModuleSpec::parse(module), self.options.default_arch.as_deref());

        if !self.modules.contains_key(&key) {
            let loaded = runtime.module(&key)?;
            debug!(path = %key.path.display(), arch = loaded.arch().unwrap_or("-"), "attached module");
            self.modules.insert(key.clone(), ModuleContext::new(loaded));
        }
        self.modules.get(&key).ok_or(SymlineError::Internal)
    }
}

impl std::fmt::Debug for Symbolizer
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("Symbolizer")
            .field("options", &self.options)
            .field("modules", &self.modules.len())
            .finish_non_exhaustive()
    }
}

fn dwarf_frames(lines: &Context<OwnedReader>, offset: u64, options: &SymbolizerOptions) -> Result<FrameChain>
{
    let mut frames = lines
        .find_frames(offset)
        .skip_all_loads()
        .map_err(|err| SymlineError::dwarf("failed to read inline frames", err))?;

    let mut chain = FrameChain::new();
    while let Some(frame) = frames
        .next()
        .map_err(|err| SymlineError::dwarf("failed to read inline frames", err))?
    {
        let name = frame
            .function
            .as_ref()
            .and_then(|function| function.raw_name().ok())
            .and_then(|raw| options.render_name(&raw));
        let location = frame.location.and_then(|location| {
            location.file.map(|file| SourceLocation {
                file: file.to_string(),
                line: location.line,
                column: location.column,
            })
        });
        chain.push(ResolvedFrame { name, location });
    }

    Ok(chain)
}
