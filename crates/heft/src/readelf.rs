//! Symbol table, segment, and entry point parsing via `readelf`.

use std::path::Path;

use anyhow::{Context, Result};
use heft_core::ProgramSink;

use crate::pipe::{parse_hex, parse_size, read_lines};

/// Feeds the symbol table into the sink.
///
/// `readelf -sW` rows look like:
///
/// ```text
///     42: 0000000000401000    28 FUNC    GLOBAL DEFAULT   13 main
/// ```
///
/// Functions become code objects, `OBJECT` entries (vtables included)
/// become data objects; undefined and unnamed symbols are skipped.
pub fn parse_symbols(binary: &Path, sink: &mut ProgramSink) -> Result<()> {
    let lines = read_lines("readelf", &["-sW"], binary)?;
    for line in &lines {
        parse_symbol_line(line, sink);
    }
    Ok(())
}

fn parse_symbol_line(line: &str, sink: &mut ProgramSink) {
    let fields: Vec<&str> = line.split_whitespace().collect();
    // Num: Value Size Type Bind Vis Ndx Name
    if fields.len() < 8 || !fields[0].ends_with(':') {
        return;
    }
    let Some(vmaddr) = parse_hex(fields[1]) else { return };
    let Some(size) = parse_size(fields[2]) else { return };
    let is_data = match fields[3] {
        "FUNC" | "IFUNC" => false,
        "OBJECT" => true,
        _ => return,
    };
    if fields[6] == "UND" {
        return;
    }
    let name = fields[7];
    if name.is_empty() {
        return;
    }
    sink.add_object(name, vmaddr, size, is_data);
}

/// Feeds `LOAD` segment mappings into the sink.
///
/// `readelf -lW` program header rows look like:
///
/// ```text
///   LOAD           0x000000 0x0000000000400000 0x0000000000400000 0x000728 0x000728 R E 0x1000
/// ```
pub fn parse_file_mappings(binary: &Path, sink: &mut ProgramSink) -> Result<()> {
    let lines = read_lines("readelf", &["-lW"], binary)?;
    for line in &lines {
        parse_mapping_line(line, sink);
    }
    Ok(())
}

fn parse_mapping_line(line: &str, sink: &mut ProgramSink) {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 6 || fields[0] != "LOAD" {
        return;
    }
    let (Some(fileoff), Some(vmaddr), Some(filesize)) =
        (parse_hex(fields[1]), parse_hex(fields[2]), parse_hex(fields[4]))
    else {
        return;
    };
    sink.add_file_mapping(vmaddr, fileoff, filesize);
}

/// Resolves the entry point address to a symbol and designates it.
///
/// Returns the entry address even when no symbol covers it, so the caller
/// can warn; the weight and garbage reports will then fail cleanly.
pub fn parse_entry_point(binary: &Path, sink: &mut ProgramSink) -> Result<u64> {
    let lines = read_lines("readelf", &["-hW"], binary)?;
    let addr = lines
        .iter()
        .find_map(|line| entry_address(line))
        .context("no entry point address in ELF header")?;
    if let Some(entry) = sink.find_object_by_addr(addr) {
        sink.set_entry_point(entry);
    }
    Ok(addr)
}

fn entry_address(line: &str) -> Option<u64> {
    let rest = line.trim_start().strip_prefix("Entry point address:")?;
    parse_hex(rest.trim())
}
