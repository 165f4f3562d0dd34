//! Module parsing and DWARF section loading.
//!
//! A [`LoadedModule`] is the parsed, immutable form of one object file (or
//! one slice of a fat Mach-O file): its debug sections as shared byte blobs
//! and its function and data symbol tables sorted by address. It is `Send +
//! Sync` so a runtime can hand the same module to every symbolizer.
//!
//! The line-table context built on top of it (`addr2line::Context`) is not
//! `Sync` and lives in each symbolizer instead.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use addr2line::Context;
use gimli::{Dwarf, EndianArcSlice, RunTimeEndian, SectionId};
use object::read::macho::{FatArch, MachOFatFile32, MachOFatFile64};
use object::{FileKind, Object, ObjectSection, ObjectSymbol, SymbolKind};
use tracing::debug;

use crate::error::{Result, SymlineError};
use crate::types::arch::{cpu_name_for_architecture, cpu_type, slice_matches};
use crate::types::ModuleSpec;

pub(crate) type OwnedReader = EndianArcSlice<RunTimeEndian>;
pub(crate) type OwnedDwarf = Dwarf<OwnedReader>;

/// Cache key: a module path plus the architecture slice to select.
///
/// `explicit` is false when `arch` came from the symbolizer's default rather
/// than a `:arch` suffix. A default only steers fat files; a thin file of a
/// different architecture is used as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ModuleKey
{
    pub path: PathBuf,
    pub arch: Option<String>,
    pub explicit: bool,
}

impl ModuleKey
{
    /// Key for `spec`, falling back to `default_arch` when no suffix was given.
    pub(crate) fn new(spec: &ModuleSpec, default_arch: Option<&str>) -> Self
    {
        match &spec.arch {
            Some(arch) => Self {
                path: spec.path.clone(),
                arch: Some(arch.clone()),
                explicit: true,
            },
            None => Self {
                path: spec.path.clone(),
                arch: default_arch.map(str::to_string),
                explicit: false,
            },
        }
    }
}

const DWARF_SECTIONS: &[(SectionId, &[&str])] = &[
    (SectionId::DebugAbbrev, &[".debug_abbrev", "__debug_abbrev"]),
    (SectionId::DebugAddr, &[".debug_addr", "__debug_addr"]),
    (SectionId::DebugAranges, &[".debug_aranges", "__debug_aranges"]),
    (SectionId::DebugInfo, &[".debug_info", "__debug_info"]),
    (SectionId::DebugLine, &[".debug_line", "__debug_line"]),
    (SectionId::DebugLineStr, &[".debug_line_str", "__debug_line_str"]),
    (SectionId::DebugRanges, &[".debug_ranges", "__debug_ranges"]),
    (SectionId::DebugRngLists, &[".debug_rnglists", "__debug_rnglists"]),
    (SectionId::DebugStr, &[".debug_str", "__debug_str"]),
    (SectionId::DebugStrOffsets, &[".debug_str_offsets", "__debug_str_offs"]),
    (SectionId::DebugTypes, &[".debug_types", "__debug_types"]),
    (SectionId::DebugLoc, &[".debug_loc", "__debug_loc"]),
    (SectionId::DebugLocLists, &[".debug_loclists", "__debug_loclists"]),
];

/// Debug sections of one object file, keyed by DWARF section id.
pub(crate) struct DebugSections
{
    endian: RunTimeEndian,
    sections: HashMap<SectionId, Arc<[u8]>>,
}

impl DebugSections
{
    pub(crate) fn load(file: &object::File<'_>) -> Result<Self>
    {
        let endian = if file.is_little_endian() {
            RunTimeEndian::Little
        } else {
            RunTimeEndian::Big
        };

        let mut sections = HashMap::new();
        for (id, aliases) in DWARF_SECTIONS {
            if let Some(data) = load_section_bytes(file, aliases)? {
                sections.insert(*id, data);
            }
        }

        Ok(Self { endian, sections })
    }

    /// Whether there is any debug info to read at all.
    pub(crate) fn has_debug_info(&self) -> bool
    {
        self.sections.get(&SectionId::DebugInfo).is_some_and(|data| !data.is_empty())
    }

    pub(crate) fn dwarf(&self) -> Result<OwnedDwarf>
    {
        Dwarf::load(|id| Ok::<_, gimli::Error>(self.section_reader(id)))
            .map_err(|err| SymlineError::dwarf("failed to load DWARF", err))
    }

    pub(crate) fn line_context(&self) -> Result<Context<OwnedReader>>
    {
        Context::from_dwarf(self.dwarf()?).map_err(|err| SymlineError::dwarf("failed to build line context", err))
    }

    fn section_reader(&self, id: SectionId) -> OwnedReader
    {
        let data = self
            .sections
            .get(&id)
            .cloned()
            .unwrap_or_else(|| Arc::<[u8]>::from(Vec::new()));
        EndianArcSlice::new(data, self.endian)
    }
}

fn load_section_bytes(file: &object::File<'_>, names: &[&str]) -> Result<Option<Arc<[u8]>>>
{
    for name in names {
        if let Some(section) = file.section_by_name(name) {
            let data = section
                .uncompressed_data()
                .map_err(|err| SymlineError::ObjectFile(format!("failed to read {name}: {err}")))?;
            return Ok(Some(match data {
                Cow::Borrowed(bytes) => Arc::<[u8]>::from(bytes),
                Cow::Owned(vec) => vec.into(),
            }));
        }
    }

    Ok(None)
}

/// A symbol table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TableSymbol
{
    pub name: String,
    pub address: u64,
    pub size: u64,
}

/// Symbols of one kind, sorted by address.
#[derive(Debug, Default)]
pub(crate) struct SymbolTable
{
    symbols: Vec<TableSymbol>,
}

impl SymbolTable
{
    fn from_unsorted(mut symbols: Vec<TableSymbol>) -> Self
    {
        symbols.sort_by(|a, b| a.address.cmp(&b.address).then_with(|| a.name.cmp(&b.name)));
        symbols.dedup_by(|a, b| a.address == b.address && a.name == b.name);
        Self { symbols }
    }

    /// The symbol covering `address`.
    ///
    /// The greatest start address not above `address` wins. A sized symbol
    /// covers `[address, address + size)`; an unsized one (common in Mach-O)
    /// extends to the next symbol's start, or covers only its own address
    /// when it is the last one.
    pub(crate) fn lookup(&self, address: u64) -> Option<&TableSymbol>
    {
        let index = self.symbols.partition_point(|symbol| symbol.address <= address);
        let candidate = self.symbols.get(index.checked_sub(1)?)?;
        let end = if candidate.size > 0 {
            candidate.address.saturating_add(candidate.size)
        } else {
            self.symbols
                .get(index)
                .map_or(candidate.address.saturating_add(1), |next| next.address)
        };
        (address < end).then_some(candidate)
    }

    pub(crate) fn len(&self) -> usize
    {
        self.symbols.len()
    }
}

/// A parsed object file (or fat slice) ready for lookups.
pub(crate) struct LoadedModule
{
    arch: Option<String>,
    debug: DebugSections,
    functions: SymbolTable,
    data: SymbolTable,
}

impl LoadedModule
{
    /// Read and parse the module named by `key`.
    ///
    /// ## Errors
    ///
    /// - `ModuleNotFound` when the file cannot be read
    /// - `ObjectFile` when it is not an object file
    /// - `NoSuchArch` when the requested slice is absent
    pub(crate) fn load(key: &ModuleKey) -> Result<Self>
    {
        let bytes = fs::read(&key.path).map_err(|source| SymlineError::ModuleNotFound {
            path: key.path.clone(),
            source,
        })?;
        let slice = select_slice(&bytes, key.arch.as_deref())?;
        let file = object::File::parse(slice)?;
        let arch = check_thin_arch(&file, key.arch.as_deref().filter(|_| key.explicit))?;

        let sections = DebugSections::load(&file)?;
        let (functions, data) = symbol_tables(&file);
        let has_debug_info = sections.has_debug_info();

        debug!(
            path = %key.path.display(),
            arch = arch.as_deref().unwrap_or("-"),
            functions = functions.len(),
            data = data.len(),
            debug_info = has_debug_info,
            "loaded module"
        );

        Ok(Self {
            arch,
            debug: sections,
            functions,
            data,
        })
    }

    /// CPU name of the selected slice, when known.
    pub(crate) fn arch(&self) -> Option<&str>
    {
        self.arch.as_deref()
    }

    pub(crate) fn debug(&self) -> &DebugSections
    {
        &self.debug
    }

    pub(crate) fn functions(&self) -> &SymbolTable
    {
        &self.functions
    }

    pub(crate) fn data(&self) -> &SymbolTable
    {
        &self.data
    }
}

/// Pick the bytes of the requested architecture out of a fat file.
///
/// Thin files are returned whole. A fat file with a single slice needs no
/// architecture; one with several does.
pub(crate) fn select_slice<'data>(data: &'data [u8], arch: Option<&str>) -> Result<&'data [u8]>
{
    match FileKind::parse(data)? {
        FileKind::MachOFat32 => pick_fat_arch(MachOFatFile32::parse(data)?.arches(), data, arch),
        FileKind::MachOFat64 => pick_fat_arch(MachOFatFile64::parse(data)?.arches(), data, arch),
        _ => Ok(data),
    }
}

fn pick_fat_arch<'data, A: FatArch>(arches: &[A], data: &'data [u8], arch: Option<&str>) -> Result<&'data [u8]>
{
    let selected = match (arch, arches) {
        (Some(name), _) => arches
            .iter()
            .find(|slice| slice_matches(name, slice.cputype(), slice.cpusubtype()))
            .ok_or_else(|| SymlineError::NoSuchArch(name.to_string()))?,
        (None, [only]) => only,
        (None, _) => {
            return Err(SymlineError::NoSuchArch(format!(
                "fat file has {} slices; select one with a ':arch' suffix",
                arches.len()
            )));
        }
    };
    Ok(selected.data(data)?)
}

/// For a thin file, make sure an explicit architecture request matches it.
pub(crate) fn check_thin_arch(file: &object::File<'_>, requested: Option<&str>) -> Result<Option<String>>
{
    let actual = cpu_name_for_architecture(file.architecture());
    let Some(requested) = requested else {
        return Ok(actual.map(str::to_string));
    };

    let same_cpu = match (cpu_type(requested), actual.and_then(cpu_type)) {
        (Some((want, _)), Some((have, _))) => want == have,
        (None, _) => false,
        // Unknown architecture on our side: trust the caller.
        (Some(_), None) => true,
    };
    if same_cpu {
        Ok(Some(requested.to_string()))
    } else {
        Err(SymlineError::NoSuchArch(requested.to_string()))
    }
}

fn symbol_tables(file: &object::File<'_>) -> (SymbolTable, SymbolTable)
{
    let mut functions = Vec::new();
    let mut data = Vec::new();

    for symbol in file.symbols().chain(file.dynamic_symbols()) {
        if !symbol.is_definition() {
            continue;
        }
        let Ok(name) = symbol.name() else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        let entry = TableSymbol {
            name: name.to_string(),
            address: symbol.address(),
            size: symbol.size(),
        };
        match symbol.kind() {
            SymbolKind::Text => functions.push(entry),
            SymbolKind::Data | SymbolKind::Tls => data.push(entry),
            _ => {}
        }
    }

    (SymbolTable::from_unsorted(functions), SymbolTable::from_unsorted(data))
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn table(entries: &[(&str, u64, u64)]) -> SymbolTable
    {
        SymbolTable::from_unsorted(
            entries
                .iter()
                .map(|(name, address, size)| TableSymbol {
                    name: (*name).to_string(),
                    address: *address,
                    size: *size,
                })
                .collect(),
        )
    }

    #[test]
    fn test_sized_lookup_respects_end()
    {
        let symbols = table(&[("b", 0x20, 0x10), ("a", 0x00, 0x08)]);
        assert_eq!(symbols.lookup(0x04).map(|s| s.name.as_str()), Some("a"));
        assert_eq!(symbols.lookup(0x08), None);
        assert_eq!(symbols.lookup(0x2f).map(|s| s.name.as_str()), Some("b"));
        assert_eq!(symbols.lookup(0x30), None);
    }

    #[test]
    fn test_unsized_lookup_extends_to_next_symbol()
    {
        let symbols = table(&[("first", 0x100, 0), ("second", 0x180, 0)]);
        assert_eq!(symbols.lookup(0x17f).map(|s| s.name.as_str()), Some("first"));
        assert_eq!(symbols.lookup(0x180).map(|s| s.name.as_str()), Some("second"));
        assert_eq!(symbols.lookup(0x181), None);
        assert_eq!(symbols.lookup(0xff), None);
    }

    #[test]
    fn test_duplicate_entries_collapse()
    {
        let symbols = table(&[("x", 0x10, 4), ("x", 0x10, 4)]);
        assert_eq!(symbols.len(), 1);
    }

    #[test]
    fn test_module_key_prefers_suffix_over_default()
    {
        let spec = ModuleSpec::parse("/lib/Foo:arm64");
        let key = ModuleKey::new(&spec, Some("x86_64"));
        assert_eq!(key.arch.as_deref(), Some("arm64"));
        assert!(key.explicit);

        let spec = ModuleSpec::parse("/lib/Foo");
        let key = ModuleKey::new(&spec, Some("x86_64"));
        assert_eq!(key.arch.as_deref(), Some("x86_64"));
        assert!(!key.explicit);
        assert_eq!(ModuleKey::new(&spec, None).arch, None);
    }

    #[test]
    fn test_missing_file_is_module_not_found()
    {
        let key = ModuleKey {
            path: PathBuf::from("/definitely/not/here.so"),
            arch: None,
            explicit: false,
        };
        let err = LoadedModule::load(&key).err().unwrap();
        assert!(matches!(err, SymlineError::ModuleNotFound { .. }));
        assert_eq!(err.code(), 6);
    }
}
