//! Call edge extraction from `objdump` disassembly.

use std::path::Path;

use anyhow::Result;
use heft_core::{ObjectId, ProgramSink};

use crate::pipe::{parse_hex, read_lines};

/// Feeds direct call and jump edges into the sink.
///
/// `objdump -dw` interleaves function headers and instruction rows:
///
/// ```text
/// 0000000000401000 <main>:
///   401010:  e8 0b 00 00 00        call   401020 <foo>
///   401015:  eb f9                 jmp    401010 <main+0x5>
/// ```
///
/// Every direct target that resolves to a known symbol yields an edge
/// from the function currently being disassembled. Indirect calls have no
/// textual target and are left to the vtable scanner.
pub fn parse_call_edges(binary: &Path, sink: &mut ProgramSink) -> Result<()> {
    let lines = read_lines("objdump", &["-dw"], binary)?;
    let mut current: Option<ObjectId> = None;
    for line in &lines {
        parse_disassembly_line(line, &mut current, sink);
    }
    Ok(())
}

fn parse_disassembly_line(line: &str, current: &mut Option<ObjectId>, sink: &mut ProgramSink) {
    if let Some(function) = function_header(line) {
        *current = sink.find_object_by_addr(function);
        return;
    }
    let Some(from) = *current else { return };
    let Some(target) = branch_target(line) else { return };
    if let Some(to) = sink.find_object_by_addr(target) {
        sink.add_ref(from, to);
    }
}

/// Parses `<addr> <name>:` function headers, returning the address.
fn function_header(line: &str) -> Option<u64> {
    if !line.ends_with(">:") {
        return None;
    }
    let (addr, rest) = line.split_once(' ')?;
    if !rest.starts_with('<') {
        return None;
    }
    parse_hex(addr)
}

/// Returns the direct target of a call/jump instruction row, if any.
fn branch_target(line: &str) -> Option<u64> {
    let mut fields = line.split_whitespace().peekable();
    while let Some(field) = fields.next() {
        let is_branch = matches!(
            field,
            "call" | "callq" | "jmp" | "jmpq" | "bl" | "b" | "jal"
        );
        if !is_branch {
            continue;
        }
        // Direct targets are rendered as `401020 <foo>`; indirect operands
        // start with `*` or a register and parse as nothing.
        let target = fields.peek()?;
        return parse_hex(target);
    }
    None
}
