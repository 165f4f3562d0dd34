//! Debug-info reader entry points.
//!
//! Every function here reports failures through an optional
//! [`symline_error`] out-parameter; a `NULL` or `false` return alone does not
//! say why.

use std::ptr;

use libc::c_char;
use symline_core::error::SymlineError;
use symline_core::types::arch::{cpu_name, cpu_type};
use symline_core::{DebugInfo, Variant};

use crate::{free_raw_string, into_raw_optional, into_raw_string, landingpad, str_from_ptr, symline_error};

/// Opaque debug-info handle.
pub type symline_debug_info = DebugInfo;

/// One architecture slice of a debug-info file.
#[repr(C)]
#[derive(Debug)]
pub struct symline_variant
{
    /// CPU name, e.g. `arm64`.
    pub cpu_name: *mut c_char,
    /// Hyphenated upper-case UUID, `NULL` when the slice has none.
    pub uuid: *mut c_char,
    /// File name of the image.
    pub name: *mut c_char,
    /// Start of the `__TEXT` segment.
    pub vmaddr: u64,
    /// Size of the `__TEXT` segment.
    pub vmsize: u64,
}

impl symline_variant
{
    fn from_variant(variant: &Variant) -> Self
    {
        let uuid = variant.uuid.map(|uuid| uuid.hyphenated().to_string().to_uppercase());
        Self {
            cpu_name: into_raw_string(&variant.cpu_name),
            uuid: into_raw_optional(uuid.as_deref()),
            name: into_raw_string(&variant.name),
            vmaddr: variant.vmaddr,
            vmsize: variant.vmsize,
        }
    }
}

/// Open a debug-info file.
///
/// Returns `NULL` on failure. Release the handle with
/// [`symline_debug_info_free`].
///
/// # Safety
/// `path` must be `NULL` or NUL-terminated; `err` must be `NULL` or point to
/// a valid [`symline_error`].
#[no_mangle]
pub unsafe extern "C" fn symline_debug_info_open_path(
    path: *const c_char,
    err: *mut symline_error,
) -> *mut symline_debug_info
{
    // SAFETY: Forwarded from the caller.
    unsafe {
        landingpad(err, || {
            let path = str_from_ptr(path, "path")?;
            DebugInfo::open_path(path)
        })
    }
    .map_or(ptr::null_mut(), |info| Box::into_raw(Box::new(info)))
}

/// Free a debug-info handle.
///
/// # Safety
/// `di` must be `NULL` or a handle from [`symline_debug_info_open_path`] not
/// yet freed.
#[no_mangle]
pub unsafe extern "C" fn symline_debug_info_free(di: *mut symline_debug_info)
{
    if !di.is_null() {
        // SAFETY: The caller guarantees the handle came from `Box::into_raw`.
        drop(unsafe { Box::from_raw(di) });
    }
}

/// Look up the compilation directory of the unit that compiled `filename`
/// in the slice named `cpu_name`.
///
/// Returns `NULL` with `err.failed == false` when no unit matches. Release the
/// returned string with [`symline_buffer_free`](crate::symline_buffer_free).
///
/// # Safety
/// `di` must be `NULL` or a live handle; `cpu_name` and `filename` must be
/// `NULL` or NUL-terminated; `err` must be `NULL` or valid.
#[no_mangle]
pub unsafe extern "C" fn symline_debug_info_get_compilation_dir(
    di: *const symline_debug_info,
    cpu_name: *const c_char,
    filename: *const c_char,
    err: *mut symline_error,
) -> *mut c_char
{
    // SAFETY: Forwarded from the caller.
    unsafe {
        landingpad(err, || {
            let di = di
                .as_ref()
                .ok_or_else(|| SymlineError::InvalidArgument("debug info is NULL".to_string()))?;
            let cpu_name = str_from_ptr(cpu_name, "cpu_name")?;
            let filename = str_from_ptr(filename, "filename")?;
            di.compilation_dir(cpu_name, filename)
        })
    }
    .flatten()
    .map_or(ptr::null_mut(), |dir| into_raw_string(&dir))
}

/// List the architecture slices of a debug-info file.
///
/// Stores the number of entries in `count_out` and returns the array, or
/// `NULL` on failure. Release it with [`symline_debug_free_variants`].
///
/// # Safety
/// `di` must be `NULL` or a live handle; `count_out` must be `NULL` or
/// writable; `err` must be `NULL` or valid.
#[no_mangle]
pub unsafe extern "C" fn symline_debug_info_get_variants(
    di: *const symline_debug_info,
    count_out: *mut usize,
    err: *mut symline_error,
) -> *mut symline_variant
{
    // SAFETY: Forwarded from the caller.
    let variants = unsafe {
        landingpad(err, || {
            let di = di
                .as_ref()
                .ok_or_else(|| SymlineError::InvalidArgument("debug info is NULL".to_string()))?;
            di.variants()
        })
    };
    let Some(variants) = variants else {
        return ptr::null_mut();
    };

    let array: Box<[symline_variant]> = variants.iter().map(symline_variant::from_variant).collect();
    // SAFETY: The caller guarantees `count_out` is writable or NULL.
    if let Some(count_out) = unsafe { count_out.as_mut() } {
        *count_out = array.len();
    }
    Box::into_raw(array).cast::<symline_variant>()
}

/// Free an array returned by [`symline_debug_info_get_variants`].
///
/// # Safety
/// `variants` must be `NULL` or an array from
/// [`symline_debug_info_get_variants`] with exactly `count` entries, not yet
/// freed.
#[no_mangle]
pub unsafe extern "C" fn symline_debug_free_variants(variants: *mut symline_variant, count: usize)
{
    if variants.is_null() {
        return;
    }
    // SAFETY: The caller guarantees the array and its count belong together.
    let array = unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(variants, count)) };
    for variant in array.iter() {
        // SAFETY: Every string in a variant came from `into_raw_string`/`into_raw_optional`.
        unsafe {
            free_raw_string(variant.cpu_name);
            free_raw_string(variant.uuid);
            free_raw_string(variant.name);
        }
    }
}

/// Name of the Mach-O CPU `(cputype, cpusubtype)`, e.g. `(12, 9)` is `armv7`.
///
/// Returns `NULL` with `err` set (code 2) for unknown pairs. Release the
/// string with [`symline_buffer_free`](crate::symline_buffer_free).
///
/// # Safety
/// `err` must be `NULL` or point to a valid [`symline_error`].
#[no_mangle]
pub unsafe extern "C" fn symline_get_cpu_name(cputype: u32, cpusubtype: u32, err: *mut symline_error) -> *mut c_char
{
    // SAFETY: Forwarded from the caller.
    unsafe {
        landingpad(err, || {
            cpu_name(cputype, cpusubtype)
                .ok_or_else(|| SymlineError::NoSuchArch(format!("cputype {cputype} subtype {cpusubtype}")))
        })
    }
    .map_or(ptr::null_mut(), into_raw_string)
}

/// Mach-O `(cputype, cpusubtype)` of a CPU name.
///
/// Returns `false` with `err` set for unknown names; the out-parameters are
/// only written on success.
///
/// # Safety
/// `cpu_name` must be `NULL` or NUL-terminated; the out-parameters must be
/// `NULL` or writable; `err` must be `NULL` or valid.
#[no_mangle]
pub unsafe extern "C" fn symline_get_cpu_type(
    cpu_name: *const c_char,
    cputype_out: *mut u32,
    cpusubtype_out: *mut u32,
    err: *mut symline_error,
) -> bool
{
    // SAFETY: Forwarded from the caller.
    let found = unsafe {
        landingpad(err, || {
            let name = str_from_ptr(cpu_name, "cpu_name")?;
            cpu_type(name).ok_or_else(|| SymlineError::NoSuchArch(name.to_string()))
        })
    };
    let Some((cputype, cpusubtype)) = found else {
        return false;
    };
    // SAFETY: The caller guarantees the out-parameters are writable or NULL.
    unsafe {
        if let Some(out) = cputype_out.as_mut() {
            *out = cputype;
        }
        if let Some(out) = cpusubtype_out.as_mut() {
            *out = cpusubtype;
        }
    }
    true
}
