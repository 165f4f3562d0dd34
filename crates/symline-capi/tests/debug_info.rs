//! Tests for the debug-info and CPU table entry points

use std::ffi::{CStr, CString};
use std::ptr;

use libc::c_char;
use symline::*;
use symline_core::fixtures::{fat_inline_macho, inline_elf, write_temp};

fn c(text: &str) -> CString
{
    CString::new(text).unwrap()
}

/// Copy and free a returned string.
fn take(text: *mut c_char) -> Option<String>
{
    if text.is_null() {
        return None;
    }
    let owned = unsafe { CStr::from_ptr(text) }.to_str().unwrap().to_string();
    unsafe { symline_buffer_free(text) };
    Some(owned)
}

fn message(err: &symline_error) -> &str
{
    unsafe { CStr::from_ptr(err.message) }.to_str().unwrap()
}

#[test]
fn test_fat_file_variants_and_comp_dirs()
{
    let (_dir, path) = write_temp("Universal", &fat_inline_macho().unwrap()).unwrap();
    let path = c(path.to_str().unwrap());
    let mut err = symline_error::default();

    let di = unsafe { symline_debug_info_open_path(path.as_ptr(), &mut err) };
    assert!(!di.is_null());
    assert!(!err.failed);

    let mut count = 0;
    let variants = unsafe { symline_debug_info_get_variants(di, &mut count, &mut err) };
    assert!(!variants.is_null());
    assert_eq!(count, 2);
    let slice = unsafe { std::slice::from_raw_parts(variants, count) };
    let cpus: Vec<_> = slice
        .iter()
        .map(|variant| unsafe { CStr::from_ptr(variant.cpu_name) }.to_str().unwrap())
        .collect();
    assert_eq!(cpus, ["x86_64", "arm64"]);
    assert!(slice.iter().all(|variant| !variant.name.is_null()));
    unsafe { symline_debug_free_variants(variants, count) };

    let arm64 = c("arm64");
    let main = c("main.c");
    let dir = unsafe { symline_debug_info_get_compilation_dir(di, arm64.as_ptr(), main.as_ptr(), &mut err) };
    assert_eq!(take(dir).as_deref(), Some("/src/arm64"));
    assert!(!err.failed);

    let other = c("other.c");
    let dir = unsafe { symline_debug_info_get_compilation_dir(di, arm64.as_ptr(), other.as_ptr(), &mut err) };
    assert!(dir.is_null());
    assert!(!err.failed);

    let armv7 = c("armv7");
    let dir = unsafe { symline_debug_info_get_compilation_dir(di, armv7.as_ptr(), main.as_ptr(), &mut err) };
    assert!(dir.is_null());
    assert!(err.failed);
    assert_eq!(err.code, 2);
    unsafe { symline_error_clear(&mut err) };

    unsafe { symline_debug_info_free(di) };
}

#[test]
fn test_thin_file_single_variant()
{
    let (_dir, path) = write_temp("inline.o", &inline_elf().unwrap()).unwrap();
    let path = c(path.to_str().unwrap());
    let mut err = symline_error::default();

    let di = unsafe { symline_debug_info_open_path(path.as_ptr(), &mut err) };
    let mut count = 0;
    let variants = unsafe { symline_debug_info_get_variants(di, &mut count, &mut err) };
    assert_eq!(count, 1);
    let variant = unsafe { &*variants };
    assert_eq!(unsafe { CStr::from_ptr(variant.name) }.to_str().unwrap(), "inline.o");
    assert!(variant.uuid.is_null());
    unsafe { symline_debug_free_variants(variants, count) };

    let cpu = c("x86_64");
    let main = c("main.c");
    let dir = unsafe { symline_debug_info_get_compilation_dir(di, cpu.as_ptr(), main.as_ptr(), &mut err) };
    assert_eq!(take(dir).as_deref(), Some("/src"));

    unsafe { symline_debug_info_free(di) };
}

#[test]
fn test_open_failures_set_error()
{
    let mut err = symline_error::default();

    let missing = c("/definitely/not/here.dSYM");
    assert!(unsafe { symline_debug_info_open_path(missing.as_ptr(), &mut err) }.is_null());
    assert!(err.failed);
    assert_eq!(err.code, 6);
    assert!(message(&err).contains("here.dSYM"));
    unsafe { symline_error_clear(&mut err) };

    let (_dir, path) = write_temp("notes.txt", b"just some text").unwrap();
    let path = c(path.to_str().unwrap());
    assert!(unsafe { symline_debug_info_open_path(path.as_ptr(), &mut err) }.is_null());
    assert_eq!(err.code, 5);
    unsafe { symline_error_clear(&mut err) };

    assert!(unsafe { symline_debug_info_open_path(ptr::null(), &mut err) }.is_null());
    assert_eq!(err.code, 8);
    unsafe { symline_error_clear(&mut err) };

    // A NULL error pointer is allowed.
    assert!(unsafe { symline_debug_info_open_path(missing.as_ptr(), ptr::null_mut()) }.is_null());
}

#[test]
fn test_null_handles()
{
    let mut err = symline_error::default();
    let mut count = 7;
    assert!(unsafe { symline_debug_info_get_variants(ptr::null(), &mut count, &mut err) }.is_null());
    assert_eq!(count, 7);
    assert_eq!(err.code, 8);
    unsafe { symline_error_clear(&mut err) };

    unsafe {
        symline_debug_info_free(ptr::null_mut());
        symline_debug_free_variants(ptr::null_mut(), 3);
    }
}

#[test]
fn test_cpu_tables()
{
    let mut err = symline_error::default();

    assert_eq!(take(unsafe { symline_get_cpu_name(12, 9, &mut err) }).as_deref(), Some("armv7"));
    assert_eq!(take(unsafe { symline_get_cpu_name(0x0100_000c, 0, &mut err) }).as_deref(), Some("arm64"));
    assert!(!err.failed);

    assert!(unsafe { symline_get_cpu_name(0xdead, 0xbeef, &mut err) }.is_null());
    assert!(err.failed);
    assert_eq!(err.code, 2);
    unsafe { symline_error_clear(&mut err) };

    let (mut cputype, mut cpusubtype) = (0, 0);
    let name = c("x86_64");
    assert!(unsafe { symline_get_cpu_type(name.as_ptr(), &mut cputype, &mut cpusubtype, &mut err) });
    assert_eq!((cputype, cpusubtype), (0x0100_0007, 3));

    let unknown = c("pdp11");
    let (mut cputype, mut cpusubtype) = (1, 1);
    assert!(!unsafe { symline_get_cpu_type(unknown.as_ptr(), &mut cputype, &mut cpusubtype, &mut err) });
    assert_eq!((cputype, cpusubtype), (1, 1));
    assert_eq!(err.code, 2);
    assert_eq!(message(&err), "no such architecture: pdp11");
    unsafe { symline_error_clear(&mut err) };
}
