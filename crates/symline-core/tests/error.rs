//! Tests for error handling

use std::io;
use std::path::PathBuf;

use symline_core::error::{Result, SymlineError};

#[test]
fn test_error_codes_are_stable()
{
    let cases: Vec<(SymlineError, i32)> = vec![
        (SymlineError::Internal, 1),
        (SymlineError::Unavailable, 1),
        (SymlineError::AddressNotFound(0x10), 1),
        (SymlineError::NoSuchArch("armv7".to_string()), 2),
        (SymlineError::NoSuchSection("debug_info".to_string()), 3),
        (SymlineError::NoSuchAttribute("DW_AT_comp_dir".to_string()), 4),
        (SymlineError::ObjectFile("truncated".to_string()), 5),
        (SymlineError::Io(io::Error::new(io::ErrorKind::Other, "disk")), 6),
        (SymlineError::InvalidArgument("null".to_string()), 8),
    ];
    for (error, code) in cases {
        assert_eq!(error.code(), code, "{error}");
    }
}

#[test]
fn test_module_not_found_names_the_path()
{
    let error = SymlineError::ModuleNotFound {
        path: PathBuf::from("/lib/libmissing.so"),
        source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
    };
    let message = format!("{error}");
    assert!(message.starts_with("/lib/libmissing.so: "));
    assert_eq!(error.code(), 6);
}

#[test]
fn test_address_not_found_message()
{
    let error = SymlineError::AddressNotFound(0xdead_beef);
    assert_eq!(error.to_string(), "no symbol found at 0xdeadbeef");
}

#[test]
fn test_io_error_conversion()
{
    fn read() -> Result<()>
    {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))?;
        Ok(())
    }

    let error = read().unwrap_err();
    assert!(matches!(error, SymlineError::Io(_)));
    assert_eq!(error.to_string(), "denied");
}

#[test]
fn test_unavailable_message()
{
    assert_eq!(SymlineError::Unavailable.to_string(), "symbolizer runtime is not initialized");
}
