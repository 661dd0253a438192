//! Vtable scanning: synthesizes reference edges from raw data bytes.

use std::io::{Read, Seek, SeekFrom};

use heft_core::{Error, ObjectId, Program};

/// Scans data objects for embedded pointers.
///
/// A vtable is a run of function pointers, so every pointer-sized word of a
/// data object that resolves to a known symbol yields a reference edge from
/// the object to that symbol. Words that resolve to nothing are dropped
/// silently; the same mechanism also picks up plain data-to-data pointers.
///
/// Runs after the program is fully populated, since resolution goes through
/// the address index and the file-offset map.
pub struct VtableScanner {
    pointer_size: usize,
    trace: Option<String>,
}

impl VtableScanner {
    /// Creates a scanner reading native-endian words of `pointer_size`
    /// bytes.
    ///
    /// # Panics
    ///
    /// Panics unless `pointer_size` is 4 or 8.
    pub fn new(pointer_size: usize) -> Self {
        assert!(
            pointer_size == 4 || pointer_size == 8,
            "unsupported pointer size: {}",
            pointer_size
        );
        Self {
            pointer_size,
            trace: None,
        }
    }

    /// Traces every scanned word of the named symbol to standard error.
    pub fn with_trace(mut self, name: impl Into<String>) -> Self {
        self.trace = Some(name.into());
        self
    }

    /// Scans every data object of `program`, reading its bytes from
    /// `reader` at the offset the file-offset map reports.
    ///
    /// Objects whose address has no file mapping are skipped. Read
    /// failures are fatal: a mapped offset that cannot be read means the
    /// binary is truncated or the mapping is wrong.
    pub fn scan<R: Read + Seek>(&self, reader: &mut R, program: &mut Program) -> Result<(), Error> {
        let data_objects: Vec<(ObjectId, u64, u64)> = program
            .objects()
            .filter(|o| o.is_data)
            .map(|o| (o.id, o.vmaddr, o.size))
            .collect();

        for (id, vmaddr, size) in data_objects {
            let Some(offset) = program.try_file_offset(vmaddr) else {
                continue;
            };

            let traced = self.trace.as_deref() == Some(program.object(id).name.as_str());
            if traced {
                eprintln!("vtable scanning {}", program.object(id).name);
            }

            let words = (size / self.pointer_size as u64) as usize;
            if words == 0 {
                continue;
            }

            reader.seek(SeekFrom::Start(offset))?;
            let mut buf = vec![0u8; words * self.pointer_size];
            reader.read_exact(&mut buf)?;

            for chunk in buf.chunks_exact(self.pointer_size) {
                let addr = read_word(chunk);
                if traced {
                    eprintln!("  trying ref to {:#x}", addr);
                }
                program.try_add_ref(id, addr);
            }
        }

        Ok(())
    }
}

/// Decodes one native-endian pointer-sized word.
fn read_word(chunk: &[u8]) -> u64 {
    match chunk.len() {
        4 => u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as u64,
        8 => u64::from_ne_bytes([
            chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
        ]),
        len => unreachable!("pointer size {} already rejected", len),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use heft_demangle::BestEffortDemangler;

    fn program() -> Program {
        Program::new(Box::new(BestEffortDemangler::new()))
    }

    /// A binary image whose file offset 0x400 maps to vmaddr 0x1000.
    fn image_with_words(words: &[u64]) -> Cursor<Vec<u8>> {
        let mut bytes = vec![0u8; 0x400];
        for word in words {
            bytes.extend_from_slice(&word.to_ne_bytes());
        }
        Cursor::new(bytes)
    }

    #[test]
    fn test_scan_adds_edges_for_resolvable_words() {
        let mut p = program();
        let vtable = p.add_object("_ZTV6Widget", 0x1000, 16, true);
        let f1 = p.add_object("F1", 0x2000, 8, false);
        let f2 = p.add_object("F2", 0x3000, 8, false);
        p.add_file_mapping(0x1000, 0x400, 0x100);

        let mut image = image_with_words(&[0x2000, 0x3000]);
        VtableScanner::new(8).scan(&mut image, &mut p).unwrap();

        assert!(p.object(vtable).refs.contains(&f1));
        assert!(p.object(vtable).refs.contains(&f2));
        assert_eq!(p.object(vtable).refs.len(), 2);
    }

    #[test]
    fn test_unresolvable_word_adds_no_edge() {
        let mut p = program();
        let vtable = p.add_object("_ZTV6Widget", 0x1000, 24, true);
        p.add_object("F1", 0x2000, 8, false);
        p.add_object("F2", 0x3000, 8, false);
        p.add_file_mapping(0x1000, 0x400, 0x100);

        let mut image = image_with_words(&[0x2000, 0x3000, 0xDEAD]);
        VtableScanner::new(8).scan(&mut image, &mut p).unwrap();

        assert_eq!(p.object(vtable).refs.len(), 2);
    }

    #[test]
    fn test_code_objects_are_not_scanned() {
        let mut p = program();
        let func = p.add_object("F1", 0x1000, 16, false);
        p.add_object("F2", 0x2000, 8, false);
        p.add_file_mapping(0x1000, 0x400, 0x100);

        let mut image = image_with_words(&[0x2000, 0x2000]);
        VtableScanner::new(8).scan(&mut image, &mut p).unwrap();

        assert!(p.object(func).refs.is_empty());
    }

    #[test]
    fn test_unmapped_data_object_is_skipped() {
        let mut p = program();
        let vtable = p.add_object("v", 0x9000, 16, true);
        p.add_object("F1", 0x2000, 8, false);

        let mut image = image_with_words(&[0x2000, 0x2000]);
        VtableScanner::new(8).scan(&mut image, &mut p).unwrap();

        assert!(p.object(vtable).refs.is_empty());
    }

    #[test]
    fn test_trailing_partial_word_is_ignored() {
        // Size 12 with 8-byte pointers: one word read, the tail ignored.
        let mut p = program();
        let vtable = p.add_object("v", 0x1000, 12, true);
        let f1 = p.add_object("F1", 0x2000, 8, false);
        p.add_file_mapping(0x1000, 0x400, 0x100);

        let mut image = image_with_words(&[0x2000, 0x3000]);
        VtableScanner::new(8).scan(&mut image, &mut p).unwrap();

        assert_eq!(p.object(vtable).refs.len(), 1);
        assert!(p.object(vtable).refs.contains(&f1));
    }

    #[test]
    fn test_short_read_is_fatal() {
        let mut p = program();
        p.add_object("v", 0x1000, 32, true);
        p.add_file_mapping(0x1000, 0x400, 0x100);

        // Image ends after one word; reading four must fail.
        let mut image = image_with_words(&[0x2000]);
        let result = VtableScanner::new(8).scan(&mut image, &mut p);
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_four_byte_pointers() {
        let mut p = program();
        let vtable = p.add_object("v", 0x1000, 8, true);
        let f1 = p.add_object("F1", 0x2000, 4, false);
        let f2 = p.add_object("F2", 0x3000, 4, false);
        p.add_file_mapping(0x1000, 0x400, 0x100);

        let mut bytes = vec![0u8; 0x400];
        bytes.extend_from_slice(&0x2000u32.to_ne_bytes());
        bytes.extend_from_slice(&0x3000u32.to_ne_bytes());
        let mut image = Cursor::new(bytes);

        VtableScanner::new(4).scan(&mut image, &mut p).unwrap();

        assert!(p.object(vtable).refs.contains(&f1));
        assert!(p.object(vtable).refs.contains(&f2));
    }

    #[test]
    #[should_panic(expected = "unsupported pointer size")]
    fn test_odd_pointer_size_is_rejected() {
        VtableScanner::new(3);
    }
}
