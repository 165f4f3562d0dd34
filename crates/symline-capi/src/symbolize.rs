//! Symbolizer lifecycle, resolution, and release entry points.

use std::panic::AssertUnwindSafe;
use std::ptr;

use libc::{c_char, c_int, c_void};
use symline_core::error::{Result, SymlineError};
use symline_core::lifecycle::{cleanup_global, global_symbolizer, init_global};
use symline_core::{FunctionNameKind, ModuleQuery, QueryKind, SymbolRecord, Symbolizer, SymbolizerOptions};
use tracing::{debug, warn};

use crate::{free_raw_string, guard, into_raw_optional, str_from_ptr, to_c_string};

/// Opaque symbolizer handle.
pub type symline_symbolizer = Symbolizer;

/// Report no function names.
pub const SYMLINE_NAME_KIND_NONE: c_int = 0;
/// Report demangled names without parameters.
pub const SYMLINE_NAME_KIND_SHORT: c_int = 1;
/// Report linkage names (demangled when `demangle` is set).
pub const SYMLINE_NAME_KIND_LINKAGE: c_int = 2;

/// Options for [`symline_symbolizer_new_opts`].
#[repr(C)]
#[derive(Debug)]
pub struct symline_symbolizer_opts
{
    /// One of the `SYMLINE_NAME_KIND_*` constants.
    pub name_kind: c_int,
    /// Demangle names before reporting them.
    pub demangle: bool,
    /// Fall back to the symbol table when debug info has no answer.
    pub use_symbol_table: bool,
    /// CPU name selecting the slice of fat files without a `:arch` suffix,
    /// or `NULL`.
    pub default_arch: *const c_char,
}

impl Default for symline_symbolizer_opts
{
    fn default() -> Self
    {
        Self {
            name_kind: SYMLINE_NAME_KIND_LINKAGE,
            demangle: true,
            use_symbol_table: true,
            default_arch: ptr::null(),
        }
    }
}

/// One resolved symbol or inlined frame.
///
/// On failure only `error` is set. On success `error` is `NULL`; data queries
/// set only `name`. `line` and `column` are `0` when unknown.
#[repr(C)]
#[derive(Debug)]
pub struct symline_symbol
{
    pub name: *mut c_char,
    pub filename: *mut c_char,
    pub line: u32,
    pub column: u32,
    pub error: *mut c_char,
}

/// An inlined call chain, innermost frame first.
///
/// `count` is at least one. All records and the array are released together
/// by [`symline_symbol_list_free`].
#[repr(C)]
#[derive(Debug)]
pub struct symline_symbol_list
{
    pub symbols: *mut *mut symline_symbol,
    pub count: usize,
}

/// Called with a successful resolution. Any pointer may be `NULL`.
pub type symline_symbol_cb = Option<
    unsafe extern "C" fn(
        name: *const c_char,
        filename: *const c_char,
        line: u32,
        column: u32,
        ctx: *mut c_void,
    ),
>;

/// Called with the error message of a failed resolution.
pub type symline_error_cb = Option<unsafe extern "C" fn(message: *const c_char, ctx: *mut c_void)>;

impl symline_symbol
{
    fn from_record(record: SymbolRecord) -> Self
    {
        Self {
            name: into_raw_optional(record.name.as_deref()),
            filename: into_raw_optional(record.filename.as_deref()),
            line: record.line.unwrap_or(0),
            column: record.column.unwrap_or(0),
            error: into_raw_optional(record.error.as_deref()),
        }
    }
}

fn into_raw_symbol(record: SymbolRecord) -> *mut symline_symbol
{
    Box::into_raw(Box::new(symline_symbol::from_record(record)))
}

/// Boxed array of boxed records, as handed to the caller.
fn into_raw_array(records: Vec<SymbolRecord>) -> (*mut *mut symline_symbol, usize)
{
    let array: Box<[*mut symline_symbol]> = records.into_iter().map(into_raw_symbol).collect();
    let count = array.len();
    (Box::into_raw(array).cast::<*mut symline_symbol>(), count)
}

fn error_record(err: &SymlineError) -> SymbolRecord
{
    SymbolRecord::from_error(err)
}

/// Initialize the process-wide symbolizer runtime.
///
/// Calling it again before [`symline_symbolizer_lib_cleanup`] does nothing.
/// Calling it after cleanup does nothing either: the runtime cannot be
/// restarted within a process.
#[no_mangle]
pub extern "C" fn symline_symbolizer_lib_init()
{
    guard((), || {
        init_global();
    });
}

/// Tear down the process-wide symbolizer runtime.
///
/// Existing handles stay valid to free, but every resolution through them
/// reports an error from now on. Without a prior init this does nothing.
#[no_mangle]
pub extern "C" fn symline_symbolizer_lib_cleanup()
{
    guard((), || {
        cleanup_global();
    });
}

fn new_symbolizer(options: SymbolizerOptions) -> *mut symline_symbolizer
{
    match global_symbolizer(options) {
        Ok(symbolizer) => Box::into_raw(Box::new(symbolizer)),
        Err(err) => {
            warn!(error = %err, "symbolizer not created");
            ptr::null_mut()
        }
    }
}

/// Create a symbolizer with default options.
///
/// Returns `NULL` when the runtime is not initialized. Release the handle with
/// [`symline_symbolizer_free`].
#[no_mangle]
pub extern "C" fn symline_symbolizer_new() -> *mut symline_symbolizer
{
    guard(ptr::null_mut(), || new_symbolizer(SymbolizerOptions::default()))
}

/// Create a symbolizer with explicit options.
///
/// Returns `NULL` when the runtime is not initialized, `opts` is `NULL`, or an
/// option value is invalid.
///
/// # Safety
/// `opts` must be `NULL` or point to a valid [`symline_symbolizer_opts`];
/// its `default_arch` must be `NULL` or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn symline_symbolizer_new_opts(opts: *const symline_symbolizer_opts) -> *mut symline_symbolizer
{
    // SAFETY: The caller guarantees `opts` is valid or NULL.
    let Some(opts) = (unsafe { opts.as_ref() }) else {
        return ptr::null_mut();
    };

    guard(
        ptr::null_mut(),
        AssertUnwindSafe(|| {
            // SAFETY: Forwarded from the caller.
            match unsafe { options_from_c(opts) } {
                Ok(options) => new_symbolizer(options),
                Err(err) => {
                    warn!(error = %err, "invalid symbolizer options");
                    ptr::null_mut()
                }
            }
        }),
    )
}

/// # Safety
/// `opts.default_arch` must be `NULL` or NUL-terminated.
unsafe fn options_from_c(opts: &symline_symbolizer_opts) -> Result<SymbolizerOptions>
{
    let name_kind = match opts.name_kind {
        SYMLINE_NAME_KIND_NONE => FunctionNameKind::None,
        SYMLINE_NAME_KIND_SHORT => FunctionNameKind::ShortName,
        SYMLINE_NAME_KIND_LINKAGE => FunctionNameKind::LinkageName,
        other => return Err(SymlineError::InvalidArgument(format!("unknown name kind {other}"))),
    };
    let default_arch = if opts.default_arch.is_null() {
        None
    } else {
        // SAFETY: Forwarded from the caller.
        Some(unsafe { str_from_ptr(opts.default_arch, "default_arch") }?.to_string())
    };

    Ok(SymbolizerOptions {
        name_kind,
        demangle: opts.demangle,
        use_symbol_table: opts.use_symbol_table,
        default_arch,
    })
}

/// Free a symbolizer.
///
/// # Safety
/// `symbolizer` must be `NULL` or a handle returned by
/// [`symline_symbolizer_new`] or [`symline_symbolizer_new_opts`] that has not
/// been freed yet.
#[no_mangle]
pub unsafe extern "C" fn symline_symbolizer_free(symbolizer: *mut symline_symbolizer)
{
    if !symbolizer.is_null() {
        // SAFETY: The caller guarantees the handle came from `Box::into_raw`.
        drop(unsafe { Box::from_raw(symbolizer) });
    }
}

/// Validate handle and module, then run `resolve`.
///
/// # Safety
/// `symbolizer` must be `NULL` or a live handle; `module` must be `NULL` or
/// NUL-terminated.
unsafe fn with_query<T, F>(
    symbolizer: *mut symline_symbolizer,
    module: *const c_char,
    offset: u64,
    is_data: bool,
    resolve: F,
) -> Result<T>
where
    F: FnOnce(&mut Symbolizer, &ModuleQuery) -> T,
{
    // SAFETY: The caller guarantees the handle is live or NULL.
    let Some(symbolizer) = (unsafe { symbolizer.as_mut() }) else {
        return Err(SymlineError::InvalidArgument("symbolizer is NULL".to_string()));
    };
    // SAFETY: Forwarded from the caller.
    let module = unsafe { str_from_ptr(module, "module") }?;
    let query = ModuleQuery::new(module, offset, QueryKind::from_is_data(is_data));
    debug!(module, offset = format_args!("{offset:#x}"), is_data, "symbolize request");
    Ok(resolve(symbolizer, &query))
}

/// Resolve one address to a single record.
///
/// Never returns `NULL`: failures (including `NULL` arguments and a shut-down
/// runtime) produce a record with only `error` set. Release the record with
/// [`symline_symbol_free`].
///
/// # Safety
/// `symbolizer` must be `NULL` or a live handle not used concurrently;
/// `module` must be `NULL` or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn symline_symbolizer_symbolize(
    symbolizer: *mut symline_symbolizer,
    module: *const c_char,
    offset: u64,
    is_data: bool,
) -> *mut symline_symbol
{
    let record = guard(
        error_record(&SymlineError::Internal),
        AssertUnwindSafe(|| {
            // SAFETY: Forwarded from the caller.
            unsafe { with_query(symbolizer, module, offset, is_data, |symbolizer, query| symbolizer.symbolize(query)) }
                .unwrap_or_else(|err| error_record(&err))
        }),
    );
    into_raw_symbol(record)
}

/// # Safety
/// Same as [`with_query`].
unsafe fn inlined_records(symbolizer: *mut symline_symbolizer, module: *const c_char, offset: u64) -> Vec<SymbolRecord>
{
    guard(
        vec![error_record(&SymlineError::Internal)],
        AssertUnwindSafe(|| {
            // SAFETY: Forwarded from the caller.
            unsafe {
                with_query(symbolizer, module, offset, false, |symbolizer, query| {
                    symbolizer.symbolize_inlined(query)
                })
            }
            .unwrap_or_else(|err| vec![error_record(&err)])
        }),
    )
}

/// Resolve a code address to its inlined call chain, innermost frame first.
///
/// Never returns `NULL`. On failure the list holds exactly one error record.
/// Release the list and all its records with [`symline_symbol_list_free`].
///
/// # Safety
/// Same as [`symline_symbolizer_symbolize`].
#[no_mangle]
pub unsafe extern "C" fn symline_symbolizer_symbolize_inlined(
    symbolizer: *mut symline_symbolizer,
    module: *const c_char,
    offset: u64,
) -> *mut symline_symbol_list
{
    // SAFETY: Forwarded from the caller.
    let records = unsafe { inlined_records(symbolizer, module, offset) };
    let (symbols, count) = into_raw_array(records);
    Box::into_raw(Box::new(symline_symbol_list { symbols, count }))
}

/// Like [`symline_symbolizer_symbolize_inlined`], returning a bare array.
///
/// The number of records is stored in `count_out` (when non-`NULL`). Release
/// the array with [`symline_bulk_symbol_free`] and the same count.
///
/// # Safety
/// Same as [`symline_symbolizer_symbolize`]; `count_out` must be `NULL` or
/// valid for writes.
#[no_mangle]
pub unsafe extern "C" fn symline_symbolizer_symbolize_inlined_array(
    symbolizer: *mut symline_symbolizer,
    module: *const c_char,
    offset: u64,
    count_out: *mut usize,
) -> *mut *mut symline_symbol
{
    // SAFETY: Forwarded from the caller.
    let records = unsafe { inlined_records(symbolizer, module, offset) };
    let (symbols, count) = into_raw_array(records);
    // SAFETY: The caller guarantees `count_out` is writable or NULL.
    if let Some(count_out) = unsafe { count_out.as_mut() } {
        *count_out = count;
    }
    symbols
}

/// Resolve one address and deliver the result through callbacks.
///
/// Exactly one of `on_symbol` and `on_error` is invoked (if non-`NULL`),
/// synchronously, before this returns. The strings passed to it are only valid
/// during the call. Nothing is allocated for the caller. Returns `true` when
/// resolution succeeded.
///
/// # Safety
/// Same as [`symline_symbolizer_symbolize`]; the callbacks must be safe to
/// call with `ctx`.
#[no_mangle]
pub unsafe extern "C" fn symline_symbolizer_symbolize_cb(
    symbolizer: *mut symline_symbolizer,
    module: *const c_char,
    offset: u64,
    is_data: bool,
    on_symbol: symline_symbol_cb,
    on_error: symline_error_cb,
    ctx: *mut c_void,
) -> bool
{
    let record = guard(
        error_record(&SymlineError::Internal),
        AssertUnwindSafe(|| {
            // SAFETY: Forwarded from the caller.
            unsafe { with_query(symbolizer, module, offset, is_data, |symbolizer, query| symbolizer.symbolize(query)) }
                .unwrap_or_else(|err| error_record(&err))
        }),
    );

    if let Some(message) = &record.error {
        if let Some(on_error) = on_error {
            let message = to_c_string(message);
            // SAFETY: The caller guarantees the callback is safe to call.
            unsafe { on_error(message.as_ptr(), ctx) };
        }
        return false;
    }

    if let Some(on_symbol) = on_symbol {
        let name = record.name.as_deref().map(to_c_string);
        let filename = record.filename.as_deref().map(to_c_string);
        // SAFETY: The caller guarantees the callback is safe to call.
        unsafe {
            on_symbol(
                name.as_ref().map_or(ptr::null(), |name| name.as_ptr()),
                filename.as_ref().map_or(ptr::null(), |filename| filename.as_ptr()),
                record.line.unwrap_or(0),
                record.column.unwrap_or(0),
                ctx,
            );
        }
    }
    true
}

/// # Safety
/// `symbol` must be `NULL` or a record from [`into_raw_symbol`] not yet freed.
unsafe fn free_symbol(symbol: *mut symline_symbol)
{
    if symbol.is_null() {
        return;
    }
    // SAFETY: The caller guarantees the record came from `Box::into_raw`.
    let symbol = unsafe { Box::from_raw(symbol) };
    // SAFETY: Every string in a record came from `into_raw_optional`.
    unsafe {
        free_raw_string(symbol.name);
        free_raw_string(symbol.filename);
        free_raw_string(symbol.error);
    }
}

/// Free a record returned by [`symline_symbolizer_symbolize`].
///
/// # Safety
/// `symbol` must be `NULL` or a record returned by this library that has not
/// been freed yet and is not part of a list.
#[no_mangle]
pub unsafe extern "C" fn symline_symbol_free(symbol: *mut symline_symbol)
{
    // SAFETY: Forwarded from the caller.
    unsafe { free_symbol(symbol) };
}

/// Free an array of records and every record in it.
///
/// `count` must be the count reported with the array. A `NULL` array or a
/// zero count is accepted.
///
/// # Safety
/// `symbols` must be `NULL` or an array returned by
/// [`symline_symbolizer_symbolize_inlined_array`] with exactly `count`
/// entries, not yet freed.
#[no_mangle]
pub unsafe extern "C" fn symline_bulk_symbol_free(symbols: *mut *mut symline_symbol, count: usize)
{
    if symbols.is_null() {
        return;
    }
    // SAFETY: The caller guarantees the array came from `into_raw_array` with `count` entries.
    let array = unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(symbols, count)) };
    for symbol in array.iter() {
        // SAFETY: Each entry came from `into_raw_symbol`.
        unsafe { free_symbol(*symbol) };
    }
}

/// Free a list returned by [`symline_symbolizer_symbolize_inlined`].
///
/// # Safety
/// `list` must be `NULL` or a list returned by this library not yet freed.
#[no_mangle]
pub unsafe extern "C" fn symline_symbol_list_free(list: *mut symline_symbol_list)
{
    if list.is_null() {
        return;
    }
    // SAFETY: The caller guarantees the list came from `Box::into_raw`.
    let list = unsafe { Box::from_raw(list) };
    // SAFETY: `symbols` and `count` were produced together by `into_raw_array`.
    unsafe { symline_bulk_symbol_free(list.symbols, list.count) };
}
