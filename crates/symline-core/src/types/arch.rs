//! Mach-O CPU names.
//!
//! Module identifiers may carry an architecture suffix (`path:arm64`), and the
//! debug-info reader reports architecture slices by name. Both use this table.

/// Capability bits stored in the top byte of `cpusubtype`.
const CPU_SUBTYPE_MASK: u32 = 0xff00_0000;

const CPU_TYPE_X86: u32 = 7;
const CPU_TYPE_X86_64: u32 = CPU_TYPE_X86 | 0x0100_0000;
const CPU_TYPE_ARM: u32 = 12;
const CPU_TYPE_ARM64: u32 = CPU_TYPE_ARM | 0x0100_0000;
const CPU_TYPE_ARM64_32: u32 = CPU_TYPE_ARM | 0x0200_0000;
const CPU_TYPE_POWERPC: u32 = 18;
const CPU_TYPE_POWERPC64: u32 = CPU_TYPE_POWERPC | 0x0100_0000;

/// `(name, cputype, cpusubtype)`; the first entry for a name is canonical.
const CPU_TABLE: &[(&str, u32, u32)] = &[
    ("i386", CPU_TYPE_X86, 3),
    ("x86_64", CPU_TYPE_X86_64, 3),
    ("x86_64h", CPU_TYPE_X86_64, 8),
    ("armv4t", CPU_TYPE_ARM, 5),
    ("armv6", CPU_TYPE_ARM, 6),
    ("armv5", CPU_TYPE_ARM, 7),
    ("xscale", CPU_TYPE_ARM, 8),
    ("armv7", CPU_TYPE_ARM, 9),
    ("armv7f", CPU_TYPE_ARM, 10),
    ("armv7s", CPU_TYPE_ARM, 11),
    ("armv7k", CPU_TYPE_ARM, 12),
    ("armv6m", CPU_TYPE_ARM, 14),
    ("armv7m", CPU_TYPE_ARM, 15),
    ("armv7em", CPU_TYPE_ARM, 16),
    ("arm64", CPU_TYPE_ARM64, 0),
    ("arm64v8", CPU_TYPE_ARM64, 1),
    ("arm64e", CPU_TYPE_ARM64, 2),
    ("arm64_32", CPU_TYPE_ARM64_32, 1),
    ("ppc", CPU_TYPE_POWERPC, 0),
    ("ppc64", CPU_TYPE_POWERPC64, 0),
];

/// Look up the CPU name for a Mach-O `(cputype, cpusubtype)` pair.
///
/// Capability bits in the subtype are ignored, so `arm64e` slices that carry
/// pointer-authentication flags still resolve.
///
/// ```rust
/// use symline_core::types::arch::cpu_name;
///
/// assert_eq!(cpu_name(12, 9), Some("armv7"));
/// assert_eq!(cpu_name(0x0100_000c, 0x8000_0002), Some("arm64e"));
/// assert_eq!(cpu_name(99, 0), None);
/// ```
#[must_use]
pub fn cpu_name(cputype: u32, cpusubtype: u32) -> Option<&'static str>
{
    let subtype = cpusubtype & !CPU_SUBTYPE_MASK;
    CPU_TABLE
        .iter()
        .find(|(_, ty, sub)| *ty == cputype && *sub == subtype)
        .map(|(name, _, _)| *name)
}

/// Look up the Mach-O `(cputype, cpusubtype)` pair for a CPU name.
#[must_use]
pub fn cpu_type(name: &str) -> Option<(u32, u32)>
{
    CPU_TABLE
        .iter()
        .find(|(candidate, _, _)| *candidate == name)
        .map(|(_, ty, sub)| (*ty, *sub))
}

/// Whether `name` is a CPU name this table knows.
#[must_use]
pub fn is_known_cpu_name(name: &str) -> bool
{
    cpu_type(name).is_some()
}

/// Best-effort CPU name for an `object` architecture.
///
/// Used for thin (non-fat) files, where only the coarse architecture is known.
#[must_use]
pub fn cpu_name_for_architecture(arch: object::Architecture) -> Option<&'static str>
{
    match arch {
        object::Architecture::I386 => Some("i386"),
        object::Architecture::X86_64 => Some("x86_64"),
        object::Architecture::Arm => Some("armv7"),
        object::Architecture::Aarch64 => Some("arm64"),
        object::Architecture::Aarch64_Ilp32 => Some("arm64_32"),
        object::Architecture::PowerPc => Some("ppc"),
        object::Architecture::PowerPc64 => Some("ppc64"),
        _ => None,
    }
}

/// Whether a slice described by `(cputype, cpusubtype)` satisfies a request for `name`.
///
/// Exact matches win; a request for a generic name (`arm64`, `x86_64`) also
/// accepts any subtype of the same CPU type.
pub(crate) fn slice_matches(name: &str, cputype: u32, cpusubtype: u32) -> bool
{
    let Some((want_type, want_sub)) = cpu_type(name) else {
        return false;
    };
    if want_type != cputype {
        return false;
    }
    let subtype = cpusubtype & !CPU_SUBTYPE_MASK;
    subtype == want_sub || cpu_name(cputype, cpusubtype).is_none()
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_cpu_name_round_trip_for_common_slices()
    {
        for name in ["armv7", "armv7s", "arm64", "arm64e", "x86_64", "i386"] {
            let (ty, sub) = cpu_type(name).unwrap();
            assert_eq!(cpu_name(ty, sub), Some(name));
        }
    }

    #[test]
    fn test_unknown_names()
    {
        assert!(!is_known_cpu_name("mips"));
        assert!(!is_known_cpu_name(""));
        assert_eq!(cpu_type("sparc"), None);
    }

    #[test]
    fn test_slice_matches_masks_capability_bits()
    {
        assert!(slice_matches("arm64e", 0x0100_000c, 0x8000_0002));
        assert!(!slice_matches("arm64", 0x0100_000c, 0x8000_0002));
        assert!(!slice_matches("armv7", 0x0100_000c, 0));
        assert!(!slice_matches("bogus", 12, 9));
    }
}
