//! Source file provenance via `nm --line-numbers`.

use std::path::Path;

use anyhow::Result;
use heft_core::ProgramSink;

use crate::pipe::read_lines;

/// Attributes symbols to the source files debug info reports for them.
///
/// `nm -lS` rows carry the provenance after a tab:
///
/// ```text
/// 0000000000401000 000000000000001c T main\t/src/tool/main.cc:10
/// ```
///
/// Binaries without debug info simply produce no tabs, which leaves the
/// file table empty; the driver warns about that separately.
pub fn parse_source_files(binary: &Path, sink: &mut ProgramSink) -> Result<()> {
    let lines = read_lines("nm", &["-lS", "--defined-only"], binary)?;
    for line in &lines {
        parse_nm_line(line, sink);
    }
    Ok(())
}

fn parse_nm_line(line: &str, sink: &mut ProgramSink) {
    let Some((symbol_part, location)) = line.split_once('\t') else {
        return;
    };
    // addr [size] type name
    let Some(name) = symbol_part.split_whitespace().last() else {
        return;
    };
    let Some(id) = sink.find_object_by_name(name) else {
        return;
    };
    // Drop the trailing :line.
    let filename = match location.rsplit_once(':') {
        Some((file, line)) if line.chars().all(|c| c.is_ascii_digit()) => file,
        _ => location,
    };
    if filename.is_empty() {
        return;
    }
    sink.set_source_file(id, filename);
}

#[cfg(test)]
mod tests {
    use super::*;
    use heft_core::{Demangler, Program};

    struct Identity;

    impl Demangler for Identity {
        fn demangle(&mut self, symbol: &str) -> String {
            symbol.to_string()
        }
    }

    fn program() -> Program {
        let mut p = Program::new(Box::new(Identity));
        p.add_object("main", 0x401000, 0x1c, false);
        p
    }

    #[test]
    fn test_provenance_is_attached() {
        let mut p = program();
        let mut sink = ProgramSink::new(&mut p);
        parse_nm_line(
            "0000000000401000 000000000000001c T main\t/src/tool/main.cc:10",
            &mut sink,
        );

        let main = p.find_by_name("main").unwrap();
        let file = p.object(main).file.expect("file attached");
        assert_eq!(p.file(file).name, "/src/tool/main.cc");
        assert_eq!(p.file(file).source_line_weight, 0x1c);
    }

    #[test]
    fn test_rows_without_provenance_are_skipped() {
        let mut p = program();
        let mut sink = ProgramSink::new(&mut p);
        parse_nm_line("0000000000401000 000000000000001c T main", &mut sink);

        let main = p.find_by_name("main").unwrap();
        assert!(p.object(main).file.is_none());
    }

    #[test]
    fn test_unknown_symbols_are_skipped() {
        let mut p = program();
        let mut sink = ProgramSink::new(&mut p);
        parse_nm_line(
            "0000000000402000 0000000000000010 T other\t/src/other.cc:1",
            &mut sink,
        );

        assert_eq!(p.file_count(), 0);
    }

    #[test]
    fn test_windows_style_path_keeps_its_drive_colon() {
        let mut p = program();
        let mut sink = ProgramSink::new(&mut p);
        parse_nm_line(
            "0000000000401000 000000000000001c T main\tC:/src/main.cc:10",
            &mut sink,
        );

        let main = p.find_by_name("main").unwrap();
        let file = p.object(main).file.unwrap();
        assert_eq!(p.file(file).name, "C:/src/main.cc");
    }
}
