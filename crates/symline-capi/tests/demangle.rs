//! Tests for the buffer-based demangling entry points

use std::ffi::{CStr, CString};
use std::ptr;

use libc::c_char;
use symline::{
    symline_demangle_any, symline_demangle_cpp, symline_demangle_rust, symline_demangle_swift,
    symline_demangle_swift_simplified,
};

type DemangleFn = unsafe extern "C" fn(*const c_char, *mut c_char, usize) -> bool;

fn call(f: DemangleFn, symbol: &str, buffer: &mut [u8]) -> bool
{
    let symbol = CString::new(symbol).unwrap();
    unsafe { f(symbol.as_ptr(), buffer.as_mut_ptr().cast(), buffer.len()) }
}

fn text(buffer: &[u8]) -> &str
{
    CStr::from_bytes_until_nul(buffer).unwrap().to_str().unwrap()
}

#[test]
fn test_cpp_into_buffer()
{
    let mut buffer = [0u8; 128];
    assert!(call(symline_demangle_cpp, "_ZN6google8protobuf2io25CopyingInputStreamAdaptor4SkipEi", &mut buffer));
    assert_eq!(text(&buffer), "google::protobuf::io::CopyingInputStreamAdaptor::Skip(int)");
}

#[test]
fn test_buffer_boundaries()
{
    // "foo::bar()" is 10 bytes and needs 11 with the terminator.
    let symbol = "_ZN3foo3barEv";

    let mut exact = [0u8; 11];
    assert!(call(symline_demangle_cpp, symbol, &mut exact));
    assert_eq!(text(&exact), "foo::bar()");

    let mut short = [0xaau8; 10];
    assert!(!call(symline_demangle_cpp, symbol, &mut short));
    assert_eq!(short, [0xaau8; 10]);

    let mut one = [0xaau8; 1];
    assert!(!call(symline_demangle_cpp, symbol, &mut one));
    assert_eq!(one, [0xaa]);
}

#[test]
fn test_null_and_empty_arguments()
{
    let symbol = CString::new("_ZN3foo3barEv").unwrap();
    let mut buffer = [0u8; 32];
    unsafe {
        assert!(!symline_demangle_cpp(ptr::null(), buffer.as_mut_ptr().cast(), buffer.len()));
        assert!(!symline_demangle_cpp(symbol.as_ptr(), ptr::null_mut(), 32));
        assert!(!symline_demangle_cpp(symbol.as_ptr(), buffer.as_mut_ptr().cast(), 0));
        assert!(!symline_demangle_any(ptr::null(), ptr::null_mut(), 0));
    }
}

#[test]
fn test_unmangled_input_is_rejected()
{
    let mut buffer = [0u8; 64];
    for f in [
        symline_demangle_swift as DemangleFn,
        symline_demangle_swift_simplified,
        symline_demangle_cpp,
        symline_demangle_rust,
        symline_demangle_any,
    ] {
        assert!(!call(f, "_some_name", &mut buffer));
        assert!(!call(f, "some_other_name", &mut buffer));
        assert!(!call(f, "", &mut buffer));
    }
}

#[test]
fn test_rust_keeps_hash()
{
    let mut buffer = [0u8; 64];
    assert!(call(symline_demangle_rust, "_ZN4core3fmt5write17h0123456789abcdefE", &mut buffer));
    assert_eq!(text(&buffer), "core::fmt::write::h0123456789abcdef");
}

const SWIFT_METHOD: &str = "_TFC12Swift_Tester14ViewController11doSomethingfS0_FT_T_";

#[test]
fn test_swift_class()
{
    let mut buffer = [0u8; 256];
    assert!(call(symline_demangle_swift, "_TtC4Test7MyClass", &mut buffer));
    assert_eq!(text(&buffer), "Test.MyClass");

    let mut tiny = [0xaau8; 1];
    assert!(!call(symline_demangle_swift, "_TtC4Test7MyClass", &mut tiny));
    assert_eq!(tiny, [0xaa]);
}

#[test]
fn test_swift_full_and_simplified()
{
    let mut full = [0u8; 256];
    let mut simplified = [0u8; 256];
    assert!(call(symline_demangle_swift, SWIFT_METHOD, &mut full));
    assert!(call(symline_demangle_swift_simplified, SWIFT_METHOD, &mut simplified));
    assert_eq!(
        text(&full),
        "Swift_Tester.ViewController.doSomething (Swift_Tester.ViewController) -> () -> ()"
    );
    assert_eq!(text(&simplified), "ViewController.doSomething");
}

#[test]
fn test_any_picks_swift()
{
    let mut buffer = [0u8; 256];
    assert!(call(symline_demangle_any, "_TtC4Test7MyClass", &mut buffer));
    assert_eq!(text(&buffer), "Test.MyClass");
}

#[cfg(feature = "swift")]
#[test]
fn test_modern_swift_symbol()
{
    let mut buffer = [0u8; 256];
    assert!(call(symline_demangle_swift_simplified, "$s4main3FooV3baryyF", &mut buffer));
    assert!(text(&buffer).contains("bar"), "{}", text(&buffer));
    assert!(!text(&buffer).starts_with('$'));
}
