//! Object-file fixtures for tests.
//!
//! Builds small relocatable objects with `object::write` and hand-encoded
//! DWARF 4, so tests do not depend on a compiler being installed.
//!
//! The inline fixture describes one compilation unit, `main.c` built in
//! `comp_dir`, with this layout:
//!
//! ```text
//! 0x00..0x40  outer
//! 0x10..0x30    middle  (inlined into outer, called at line 20 col 5)
//! 0x18..0x20      inner (inlined into middle, called at line 12 col 9)
//! 0x40..0x50  helper    (symbol table only, no debug info)
//! ```
//!
//! Line table rows: `0x00 -> 18`, `0x10 -> 10`, `0x18 -> 5:3`, `0x20 -> 13`,
//! `0x30 -> 22`. The data section holds `global_counter` (8 bytes at 0).

use std::fs;
use std::path::PathBuf;

use object::write::{Object, Symbol, SymbolSection};
use object::{Architecture, BinaryFormat, Endianness, SectionKind, SymbolFlags, SymbolKind, SymbolScope};
use tempfile::TempDir;

use crate::error::{Result, SymlineError};

/// Address inside `inner`, three frames deep.
pub const INNER_ADDRESS: u64 = 0x1c;
/// Address inside `middle` but outside `inner`, two frames deep.
pub const MIDDLE_ADDRESS: u64 = 0x14;
/// Address in `outer` only.
pub const OUTER_ADDRESS: u64 = 0x38;
/// Address covered by the `helper` symbol but not by debug info.
pub const HELPER_ADDRESS: u64 = 0x44;
/// Address past every symbol.
pub const UNMAPPED_ADDRESS: u64 = 0x1000;
/// Address of `global_counter` in the data section.
pub const DATA_ADDRESS: u64 = 0x0;

const TEXT_SIZE: usize = 0x50;

/// Raw contents of the three DWARF sections.
struct DwarfSections
{
    abbrev: Vec<u8>,
    info: Vec<u8>,
    line: Vec<u8>,
}

fn uleb(out: &mut Vec<u8>, mut value: u64)
{
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn sleb(out: &mut Vec<u8>, mut value: i64)
{
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
        if done {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn cstr(out: &mut Vec<u8>, text: &str)
{
    out.extend_from_slice(text.as_bytes());
    out.push(0);
}

// Tags, attributes, and forms used below.
const TAG_COMPILE_UNIT: u64 = 0x11;
const TAG_SUBPROGRAM: u64 = 0x2e;
const TAG_INLINED_SUBROUTINE: u64 = 0x1d;
const AT_NAME: u64 = 0x03;
const AT_STMT_LIST: u64 = 0x10;
const AT_LOW_PC: u64 = 0x11;
const AT_HIGH_PC: u64 = 0x12;
const AT_LANGUAGE: u64 = 0x13;
const AT_COMP_DIR: u64 = 0x1b;
const AT_INLINE: u64 = 0x20;
const AT_PRODUCER: u64 = 0x25;
const AT_ABSTRACT_ORIGIN: u64 = 0x31;
const AT_CALL_COLUMN: u64 = 0x57;
const AT_CALL_FILE: u64 = 0x58;
const AT_CALL_LINE: u64 = 0x59;
const FORM_ADDR: u64 = 0x01;
const FORM_DATA2: u64 = 0x05;
const FORM_DATA4: u64 = 0x06;
const FORM_STRING: u64 = 0x08;
const FORM_DATA1: u64 = 0x0b;
const FORM_REF4: u64 = 0x13;
const FORM_SEC_OFFSET: u64 = 0x17;

const ABBREV_CU: u64 = 1;
const ABBREV_ABSTRACT: u64 = 2;
const ABBREV_CONCRETE: u64 = 3;
const ABBREV_INLINED_PARENT: u64 = 4;
const ABBREV_INLINED_LEAF: u64 = 5;

fn abbrev_section() -> Vec<u8>
{
    let entries: [(u64, u64, bool, &[(u64, u64)]); 5] = [
        (
            ABBREV_CU,
            TAG_COMPILE_UNIT,
            true,
            &[
                (AT_PRODUCER, FORM_STRING),
                (AT_LANGUAGE, FORM_DATA2),
                (AT_NAME, FORM_STRING),
                (AT_COMP_DIR, FORM_STRING),
                (AT_LOW_PC, FORM_ADDR),
                (AT_HIGH_PC, FORM_DATA4),
                (AT_STMT_LIST, FORM_SEC_OFFSET),
            ],
        ),
        (ABBREV_ABSTRACT, TAG_SUBPROGRAM, false, &[(AT_NAME, FORM_STRING), (AT_INLINE, FORM_DATA1)]),
        (
            ABBREV_CONCRETE,
            TAG_SUBPROGRAM,
            true,
            &[(AT_NAME, FORM_STRING), (AT_LOW_PC, FORM_ADDR), (AT_HIGH_PC, FORM_DATA4)],
        ),
        (ABBREV_INLINED_PARENT, TAG_INLINED_SUBROUTINE, true, INLINED_ATTRIBUTES),
        (ABBREV_INLINED_LEAF, TAG_INLINED_SUBROUTINE, false, INLINED_ATTRIBUTES),
    ];

    let mut out = Vec::new();
    for (code, tag, children, attributes) in entries {
        uleb(&mut out, code);
        uleb(&mut out, tag);
        out.push(u8::from(children));
        for (name, form) in attributes {
            uleb(&mut out, *name);
            uleb(&mut out, *form);
        }
        out.extend_from_slice(&[0, 0]);
    }
    out.push(0);
    out
}

const INLINED_ATTRIBUTES: &[(u64, u64)] = &[
    (AT_ABSTRACT_ORIGIN, FORM_REF4),
    (AT_LOW_PC, FORM_ADDR),
    (AT_HIGH_PC, FORM_DATA4),
    (AT_CALL_FILE, FORM_DATA1),
    (AT_CALL_LINE, FORM_DATA1),
    (AT_CALL_COLUMN, FORM_DATA1),
];

fn inlined_die(out: &mut Vec<u8>, abbrev: u64, origin: u32, range: (u64, u32), call: (u8, u8))
{
    uleb(out, abbrev);
    out.extend_from_slice(&origin.to_le_bytes());
    out.extend_from_slice(&range.0.to_le_bytes());
    out.extend_from_slice(&range.1.to_le_bytes());
    out.push(1);
    out.push(call.0);
    out.push(call.1);
}

fn info_section(comp_dir: &str) -> Vec<u8>
{
    let mut out = Vec::new();
    // unit_length, patched below
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&4u16.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.push(8);

    uleb(&mut out, ABBREV_CU);
    cstr(&mut out, "symline fixtures");
    out.extend_from_slice(&0x000cu16.to_le_bytes());
    cstr(&mut out, "main.c");
    cstr(&mut out, comp_dir);
    out.extend_from_slice(&0u64.to_le_bytes());
    out.extend_from_slice(&0x40u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());

    let middle = out.len() as u32;
    uleb(&mut out, ABBREV_ABSTRACT);
    cstr(&mut out, "middle");
    out.push(3);

    let inner = out.len() as u32;
    uleb(&mut out, ABBREV_ABSTRACT);
    cstr(&mut out, "inner");
    out.push(3);

    uleb(&mut out, ABBREV_CONCRETE);
    cstr(&mut out, "outer");
    out.extend_from_slice(&0u64.to_le_bytes());
    out.extend_from_slice(&0x40u32.to_le_bytes());

    inlined_die(&mut out, ABBREV_INLINED_PARENT, middle, (0x10, 0x20), (20, 5));
    inlined_die(&mut out, ABBREV_INLINED_LEAF, inner, (0x18, 0x08), (12, 9));
    // end of middle's children, outer's children, unit's children
    out.extend_from_slice(&[0, 0, 0]);

    let unit_length = (out.len() - 4) as u32;
    out[..4].copy_from_slice(&unit_length.to_le_bytes());
    out
}

const LNS_COPY: u8 = 0x01;
const LNS_ADVANCE_PC: u8 = 0x02;
const LNS_ADVANCE_LINE: u8 = 0x03;
const LNS_SET_COLUMN: u8 = 0x05;
const LNE_END_SEQUENCE: u8 = 0x01;
const LNE_SET_ADDRESS: u8 = 0x02;

fn line_section() -> Vec<u8>
{
    let mut header = Vec::new();
    header.push(1); // minimum_instruction_length
    header.push(1); // maximum_operations_per_instruction
    header.push(1); // default_is_stmt
    header.push((-5i8).to_le_bytes()[0]); // line_base
    header.push(14); // line_range
    header.push(13); // opcode_base
    header.extend_from_slice(&[0, 1, 1, 1, 1, 0, 0, 0, 1, 0, 0, 1]);
    header.push(0); // no include_directories
    cstr(&mut header, "main.c");
    uleb(&mut header, 0);
    uleb(&mut header, 0);
    uleb(&mut header, 0);
    header.push(0);

    let mut program = vec![0, 9, LNE_SET_ADDRESS];
    program.extend_from_slice(&0u64.to_le_bytes());

    // (address advance, line advance, column) per row, starting at line 1
    let rows: [(u64, i64, Option<u64>); 5] = [
        (0x00, 17, None),
        (0x10, -8, None),
        (0x08, -5, Some(3)),
        (0x08, 8, Some(0)),
        (0x10, 9, None),
    ];
    for (advance_pc, advance_line, column) in rows {
        if advance_pc > 0 {
            program.push(LNS_ADVANCE_PC);
            uleb(&mut program, advance_pc);
        }
        program.push(LNS_ADVANCE_LINE);
        sleb(&mut program, advance_line);
        if let Some(column) = column {
            program.push(LNS_SET_COLUMN);
            uleb(&mut program, column);
        }
        program.push(LNS_COPY);
    }
    program.push(LNS_ADVANCE_PC);
    uleb(&mut program, 0x10);
    program.extend_from_slice(&[0, 1, LNE_END_SEQUENCE]);

    let mut out = Vec::new();
    let unit_length = (2 + 4 + header.len() + program.len()) as u32;
    out.extend_from_slice(&unit_length.to_le_bytes());
    out.extend_from_slice(&4u16.to_le_bytes());
    out.extend_from_slice(&(header.len() as u32).to_le_bytes());
    out.extend_from_slice(&header);
    out.extend_from_slice(&program);
    out
}

fn dwarf_sections(comp_dir: &str) -> DwarfSections
{
    DwarfSections {
        abbrev: abbrev_section(),
        info: info_section(comp_dir),
        line: line_section(),
    }
}

fn add_symbol(obj: &mut Object<'_>, name: &str, section: object::write::SectionId, value: u64, size: u64, kind: SymbolKind)
{
    obj.add_symbol(Symbol {
        name: name.as_bytes().to_vec(),
        value,
        size,
        kind,
        scope: SymbolScope::Linkage,
        weak: false,
        section: SymbolSection::Section(section),
        flags: SymbolFlags::None,
    });
}

/// Build the inline fixture as a relocatable object of the given format.
///
/// Mach-O symbol names get the usual leading underscore from the writer.
///
/// ## Errors
///
/// Returns `ObjectFile` when the writer rejects the object.
pub fn inline_object(format: BinaryFormat, arch: Architecture, comp_dir: &str) -> Result<Vec<u8>>
{
    let mut obj = Object::new(format, arch, Endianness::Little);

    let text = obj.section_id(object::write::StandardSection::Text);
    obj.append_section_data(text, &[0x90; TEXT_SIZE], 16);
    add_symbol(&mut obj, "outer", text, 0, 0x40, SymbolKind::Text);
    add_symbol(&mut obj, "helper", text, 0x40, 0x10, SymbolKind::Text);

    let data = obj.section_id(object::write::StandardSection::Data);
    obj.append_section_data(data, &[0; 16], 8);
    add_symbol(&mut obj, "global_counter", data, 0, 8, SymbolKind::Data);

    let dwarf = dwarf_sections(comp_dir);
    let segment = obj.segment_name(object::write::StandardSegment::Debug).to_vec();
    let prefix = if format == BinaryFormat::MachO { "__" } else { "." };
    for (name, bytes) in [("debug_abbrev", dwarf.abbrev), ("debug_info", dwarf.info), ("debug_line", dwarf.line)] {
        let id = obj.add_section(segment.clone(), format!("{prefix}{name}").into_bytes(), SectionKind::Debug);
        obj.append_section_data(id, &bytes, 1);
    }

    obj.write().map_err(|err| SymlineError::ObjectFile(err.to_string()))
}

/// The inline fixture as an x86-64 ELF object built in `/src`.
///
/// ## Errors
///
/// Returns `ObjectFile` when the writer rejects the object.
pub fn inline_elf() -> Result<Vec<u8>>
{
    inline_object(BinaryFormat::Elf, Architecture::X86_64, "/src")
}

/// Wrap thin Mach-O images into a fat (universal) file.
///
/// Each slice is `(cputype, cpusubtype, bytes)`; slices are page aligned.
#[must_use]
pub fn fat_macho(slices: &[(u32, u32, Vec<u8>)]) -> Vec<u8>
{
    const ALIGN_SHIFT: u32 = 12;
    let align = 1usize << ALIGN_SHIFT;

    let mut out = Vec::new();
    out.extend_from_slice(&0xcafe_babe_u32.to_be_bytes());
    out.extend_from_slice(&(slices.len() as u32).to_be_bytes());

    let mut offset = align;
    let mut placed = Vec::with_capacity(slices.len());
    for (cputype, cpusubtype, bytes) in slices {
        out.extend_from_slice(&cputype.to_be_bytes());
        out.extend_from_slice(&cpusubtype.to_be_bytes());
        out.extend_from_slice(&(offset as u32).to_be_bytes());
        out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        out.extend_from_slice(&ALIGN_SHIFT.to_be_bytes());
        placed.push((offset, bytes));
        offset += bytes.len().div_ceil(align) * align;
    }

    for (offset, bytes) in placed {
        out.resize(offset, 0);
        out.extend_from_slice(bytes);
    }
    out
}

/// A fat file with an x86-64 slice built in `/src/x86_64` and an arm64 slice
/// built in `/src/arm64`.
///
/// ## Errors
///
/// Returns `ObjectFile` when the writer rejects a slice.
pub fn fat_inline_macho() -> Result<Vec<u8>>
{
    let x86_64 = inline_object(BinaryFormat::MachO, Architecture::X86_64, "/src/x86_64")?;
    let arm64 = inline_object(BinaryFormat::MachO, Architecture::Aarch64, "/src/arm64")?;
    Ok(fat_macho(&[(0x0100_0007, 3, x86_64), (0x0100_000c, 0, arm64)]))
}

/// Write `bytes` to `name` inside a fresh temporary directory.
///
/// The file lives as long as the returned `TempDir`.
///
/// ## Errors
///
/// Returns `Io` when the directory or file cannot be created.
pub fn write_temp(name: &str, bytes: &[u8]) -> Result<(TempDir, PathBuf)>
{
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(name);
    fs::write(&path, bytes)?;
    Ok((dir, path))
}
