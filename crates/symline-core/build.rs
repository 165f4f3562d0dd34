//! Build script for symline-core
//!
//! Checks the minimum Rust version before compilation. The crate uses
//! `let ... else` and `usize::div_ceil`, which need Rust 1.73 or newer.

fn main()
{
    if let Ok(rustc_version) = rustc_version::version() {
        let min_rust_version = rustc_version::Version::new(1, 73, 0);

        assert!(
            rustc_version >= min_rust_version,
            "symline-core requires Rust {min_rust_version} or newer, found {rustc_version}"
        );
    } else {
        // If we can't get version (e.g., in some build environments), just warn
        println!("cargo:warning=could not verify Rust version");
    }
}
