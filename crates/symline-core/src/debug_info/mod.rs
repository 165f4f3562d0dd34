//! # Debug-Info Reader
//!
//! Read-only questions about a debug-info file as a whole, as opposed to the
//! per-address lookups of the [symbolizer](crate::symbols):
//!
//! - which architecture slices it carries ([`DebugInfo::variants`])
//! - which compilation directory a source file was built in
//!   ([`DebugInfo::compilation_dir`])
//!
//! Works on thin object files and fat Mach-O files alike.

use std::fs;
use std::path::{Path, PathBuf};

use gimli::Reader;
use object::read::macho::{FatArch, MachOFatFile32, MachOFatFile64};
use object::{FileKind, Object, ObjectSegment};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, SymlineError};
use crate::symbols::module::{check_thin_arch, select_slice, DebugSections};
use crate::types::arch::{cpu_name, cpu_name_for_architecture};

/// One architecture slice of a debug-info file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant
{
    /// CPU name (`arm64`, `x86_64`, ...), `unknown` when unrecognized.
    pub cpu_name: String,
    /// Mach-O `LC_UUID`, when present.
    pub uuid: Option<Uuid>,
    /// File name of the image.
    pub name: String,
    /// Start of the `__TEXT` segment, zero when there is none.
    pub vmaddr: u64,
    /// Size of the `__TEXT` segment, zero when there is none.
    pub vmsize: u64,
}

/// An opened debug-info file.
///
/// The file is read into memory once on open; every query parses from that
/// copy.
#[derive(Debug)]
pub struct DebugInfo
{
    path: PathBuf,
    data: Vec<u8>,
}

impl DebugInfo
{
    /// Open and validate a debug-info file.
    ///
    /// ## Errors
    ///
    /// - `ModuleNotFound` when the file cannot be read
    /// - `ObjectFile` when it is not an object file
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self>
    {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| SymlineError::ModuleNotFound {
            path: path.to_path_buf(),
            source,
        })?;

        let kind = FileKind::parse(&*data)?;
        debug!(path = %path.display(), ?kind, "opened debug info");

        Ok(Self {
            path: path.to_path_buf(),
            data,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path
    {
        &self.path
    }

    /// List the architecture slices in the file.
    ///
    /// A thin file yields exactly one variant.
    ///
    /// ## Errors
    ///
    /// Returns `ObjectFile` when a slice cannot be parsed.
    pub fn variants(&self) -> Result<Vec<Variant>>
    {
        match FileKind::parse(&*self.data)? {
            FileKind::MachOFat32 => self.fat_variants(MachOFatFile32::parse(&*self.data)?.arches()),
            FileKind::MachOFat64 => self.fat_variants(MachOFatFile64::parse(&*self.data)?.arches()),
            _ => Ok(vec![self.variant(&self.data, None)?]),
        }
    }

    fn fat_variants<A: FatArch>(&self, arches: &[A]) -> Result<Vec<Variant>>
    {
        arches
            .iter()
            .map(|arch| {
                let slice = arch.data(&*self.data)?;
                self.variant(slice, cpu_name(arch.cputype(), arch.cpusubtype()))
            })
            .collect()
    }

    fn variant(&self, bytes: &[u8], cpu: Option<&str>) -> Result<Variant>
    {
        let file = object::File::parse(bytes)?;
        let cpu = cpu.or_else(|| cpu_name_for_architecture(file.architecture())).unwrap_or("unknown");
        let uuid = file.mach_uuid()?.map(Uuid::from_bytes);
        let (vmaddr, vmsize) = file
            .segments()
            .find(|segment| matches!(segment.name(), Ok(Some("__TEXT"))))
            .map_or((0, 0), |segment| (segment.address(), segment.size()));

        Ok(Variant {
            cpu_name: cpu.to_string(),
            uuid,
            name: self
                .path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            vmaddr,
            vmsize,
        })
    }

    /// Find the compilation directory of the unit that compiled `filename`.
    ///
    /// `filename` matches a unit whose `DW_AT_name` equals it or ends with it
    /// on a path-component boundary. Returns `Ok(None)` when no unit matches.
    ///
    /// ## Errors
    ///
    /// - `NoSuchArch` when `cpu_name` selects no slice
    /// - `NoSuchSection` when the slice has no debug info
    /// - `NoSuchAttribute` when the matching unit has no `DW_AT_comp_dir`
    /// - `Dwarf` when the unit headers cannot be parsed
    pub fn compilation_dir(&self, cpu_name: &str, filename: &str) -> Result<Option<String>>
    {
        let slice = select_slice(&self.data, Some(cpu_name))?;
        let file = object::File::parse(slice)?;
        check_thin_arch(&file, Some(cpu_name))?;

        let sections = DebugSections::load(&file)?;
        if !sections.has_debug_info() {
            return Err(SymlineError::NoSuchSection("debug_info".to_string()));
        }
        let dwarf = sections.dwarf()?;

        let mut units = dwarf.units();
        while let Some(header) = units
            .next()
            .map_err(|err| SymlineError::dwarf("failed to read unit header", err))?
        {
            let unit = dwarf
                .unit(header)
                .map_err(|err| SymlineError::dwarf("failed to parse unit", err))?;
            let Some(name) = unit.name.as_ref() else {
                continue;
            };
            let name = name
                .to_string_lossy()
                .map_err(|err| SymlineError::dwarf("failed to read unit name", err))?;
            if !unit_matches(&name, filename) {
                continue;
            }

            let comp_dir = unit
                .comp_dir
                .as_ref()
                .ok_or_else(|| SymlineError::NoSuchAttribute("DW_AT_comp_dir".to_string()))?;
            let comp_dir = comp_dir
                .to_string_lossy()
                .map_err(|err| SymlineError::dwarf("failed to read compilation directory", err))?;
            return Ok(Some(comp_dir.into_owned()));
        }

        Ok(None)
    }
}

fn unit_matches(unit_name: &str, filename: &str) -> bool
{
    unit_name == filename || (!filename.is_empty() && Path::new(unit_name).ends_with(filename))
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::fixtures::{fat_inline_macho, inline_elf, write_temp};

    #[test]
    fn test_unit_name_matching()
    {
        assert!(unit_matches("main.c", "main.c"));
        assert!(unit_matches("/src/app/main.c", "main.c"));
        assert!(unit_matches("/src/app/main.c", "app/main.c"));
        assert!(!unit_matches("/src/app/domain.c", "main.c"));
        assert!(!unit_matches("/src/app/main.c", ""));
    }

    #[test]
    fn test_thin_file_has_one_variant()
    {
        let (_dir, path) = write_temp("inline.o", &inline_elf().unwrap()).unwrap();
        let info = DebugInfo::open_path(&path).unwrap();
        let variants = info.variants().unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].cpu_name, "x86_64");
        assert_eq!(variants[0].name, "inline.o");
        assert_eq!(variants[0].uuid, None);
    }

    #[test]
    fn test_fat_file_variants_in_slice_order()
    {
        let (_dir, path) = write_temp("Universal", &fat_inline_macho().unwrap()).unwrap();
        let info = DebugInfo::open_path(&path).unwrap();
        let cpus: Vec<_> = info.variants().unwrap().into_iter().map(|variant| variant.cpu_name).collect();
        assert_eq!(cpus, ["x86_64", "arm64"]);
    }

    #[test]
    fn test_compilation_dir_per_slice()
    {
        let (_dir, path) = write_temp("Universal", &fat_inline_macho().unwrap()).unwrap();
        let info = DebugInfo::open_path(&path).unwrap();
        assert_eq!(info.compilation_dir("arm64", "main.c").unwrap().as_deref(), Some("/src/arm64"));
        assert_eq!(info.compilation_dir("x86_64", "main.c").unwrap().as_deref(), Some("/src/x86_64"));
        assert_eq!(info.compilation_dir("arm64", "other.c").unwrap(), None);
        assert_eq!(info.compilation_dir("armv7", "main.c").unwrap_err().code(), 2);
    }

    #[test]
    fn test_thin_file_rejects_other_cpu()
    {
        let (_dir, path) = write_temp("inline.o", &inline_elf().unwrap()).unwrap();
        let info = DebugInfo::open_path(&path).unwrap();
        assert_eq!(info.compilation_dir("x86_64", "main.c").unwrap().as_deref(), Some("/src"));
        assert!(matches!(info.compilation_dir("arm64", "main.c"), Err(SymlineError::NoSuchArch(_))));
    }

    #[test]
    fn test_not_an_object_file()
    {
        let (_dir, path) = write_temp("notes.txt", b"just some text").unwrap();
        let err = DebugInfo::open_path(&path).unwrap_err();
        assert_eq!(err.code(), 5);
    }

    #[test]
    fn test_open_missing_file()
    {
        let err = DebugInfo::open_path("/definitely/not/here.dSYM").unwrap_err();
        assert_eq!(err.code(), 6);
    }
}
