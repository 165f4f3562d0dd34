//! # Runtime Lifecycle
//!
//! A [`Runtime`] owns the state shared by every symbolizer created from it:
//! the store of parsed modules. Symbolizers keep only a weak reference, so a
//! symbolizer that outlives its runtime reports
//! [`SymlineError::Unavailable`] instead of touching freed state.
//!
//! ## Process-wide slot
//!
//! The C ABI needs exactly one runtime per process. [`init_global`] and
//! [`cleanup_global`] manage it through a mutex-guarded slot with three
//! states:
//!
//! ```text
//! Uninit --init--> Live --cleanup--> Retired
//! ```
//!
//! A second init while live and a cleanup while uninitialized are no-ops.
//! Init after cleanup is refused: once retired, the slot stays retired for
//! the rest of the process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::error::{Result, SymlineError};
use crate::symbols::module::{LoadedModule, ModuleKey};
use crate::symbols::{Symbolizer, SymbolizerOptions};

/// Shared state behind a [`Runtime`].
pub(crate) struct RuntimeInner
{
    modules: Mutex<HashMap<ModuleKey, Arc<LoadedModule>>>,
}

impl RuntimeInner
{
    /// The parsed module for `key`, loading and caching it on first use.
    ///
    /// Failed loads are not cached; a module that appears later is picked up
    /// on the next query.
    pub(crate) fn module(&self, key: &ModuleKey) -> Result<Arc<LoadedModule>>
    {
        if let Some(existing) = lock(&self.modules).get(key) {
            return Ok(existing.clone());
        }

        let loaded = match LoadedModule::load(key) {
            Ok(loaded) => Arc::new(loaded),
            Err(err) => {
                warn!(path = %key.path.display(), error = %err, "failed to load module");
                return Err(err);
            }
        };
        Ok(lock(&self.modules).entry(key.clone()).or_insert(loaded).clone())
    }
}

/// Shared engine context for symbolizers.
///
/// ## Example
///
/// ```rust
/// use symline_core::{Runtime, SymbolizerOptions};
///
/// let runtime = Runtime::new();
/// let mut symbolizer = runtime.symbolizer(SymbolizerOptions::default());
/// let record = symbolizer.symbolize(&symline_core::ModuleQuery::code("/no/such/module", 0x10));
/// assert!(record.is_error());
/// ```
pub struct Runtime
{
    inner: Arc<RuntimeInner>,
}

impl Runtime
{
    #[must_use]
    pub fn new() -> Self
    {
        Self {
            inner: Arc::new(RuntimeInner {
                modules: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Create a symbolizer bound to this runtime.
    #[must_use]
    pub fn symbolizer(&self, options: SymbolizerOptions) -> Symbolizer
    {
        Symbolizer::new(Arc::downgrade(&self.inner), options)
    }

    /// Number of modules currently parsed and cached.
    #[must_use]
    pub fn cached_modules(&self) -> usize
    {
        lock(&self.inner.modules).len()
    }
}

impl Default for Runtime
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("Runtime").field("cached_modules", &self.cached_modules()).finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T>
{
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

enum GlobalSlot
{
    Uninit,
    Live(Runtime),
    Retired,
}

static GLOBAL: Mutex<GlobalSlot> = Mutex::new(GlobalSlot::Uninit);

/// Initialize the process-wide runtime.
///
/// Returns `true` only when this call created it.
pub fn init_global() -> bool
{
    let mut slot = lock(&GLOBAL);
    match *slot {
        GlobalSlot::Uninit => {
            *slot = GlobalSlot::Live(Runtime::new());
            info!("symbolizer runtime initialized");
            true
        }
        GlobalSlot::Live(_) => {
            debug!("symbolizer runtime already initialized");
            false
        }
        GlobalSlot::Retired => {
            warn!("refusing to initialize symbolizer runtime after cleanup");
            false
        }
    }
}

/// Tear down the process-wide runtime.
///
/// Returns `true` only when this call destroyed it. Symbolizers created from
/// it stay valid as objects but resolve to `Unavailable` from now on.
pub fn cleanup_global() -> bool
{
    let mut slot = lock(&GLOBAL);
    match std::mem::replace(&mut *slot, GlobalSlot::Retired) {
        GlobalSlot::Live(runtime) => {
            drop(runtime);
            info!("symbolizer runtime cleaned up");
            true
        }
        GlobalSlot::Uninit => {
            *slot = GlobalSlot::Uninit;
            debug!("symbolizer runtime cleanup without init");
            false
        }
        GlobalSlot::Retired => false,
    }
}

/// Whether the process-wide runtime is live.
#[must_use]
pub fn is_global_initialized() -> bool
{
    matches!(*lock(&GLOBAL), GlobalSlot::Live(_))
}

/// Create a symbolizer from the process-wide runtime.
///
/// ## Errors
///
/// Returns `Unavailable` when the runtime is not live.
pub fn global_symbolizer(options: SymbolizerOptions) -> Result<Symbolizer>
{
    match &*lock(&GLOBAL) {
        GlobalSlot::Live(runtime) => Ok(runtime.symbolizer(options)),
        GlobalSlot::Uninit | GlobalSlot::Retired => Err(SymlineError::Unavailable),
    }
}
