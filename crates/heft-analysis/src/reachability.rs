//! Reachability and garbage detection.

use std::collections::HashSet;
use std::io::{self, Write};

use heft_core::{Error, FileId, ObjectId, Program};

/// File-level garbage numbers; present only when the entry point carries a
/// source file to root the file DFS at.
#[derive(Debug, Clone)]
pub struct FileGarbage {
    /// Total number of files known to the program.
    pub total: usize,
    /// Files not reachable from the entry's file.
    pub garbage: Vec<FileId>,
}

/// Result of the garbage analysis.
#[derive(Debug, Clone)]
pub struct GarbageReport {
    /// Total number of objects known to the program.
    pub object_total: usize,
    /// Objects not reachable from the entry point, in id order.
    pub object_garbage: Vec<ObjectId>,
    /// File-level numbers, when the entry point has a file.
    pub files: Option<FileGarbage>,
}

impl GarbageReport {
    /// Number of objects reachable from the entry point.
    pub fn objects_reachable(&self) -> usize {
        self.object_total - self.object_garbage.len()
    }

    /// Writes the summary counts in report form.
    pub fn write_summary<W: Write>(&self, mut writer: W) -> io::Result<()> {
        if let Some(files) = &self.files {
            writeln!(writer, "Total files: {}", files.total)?;
            writeln!(writer, "Garbage files: {}", files.garbage.len())?;
        }
        writeln!(writer, "Total objects: {}", self.object_total)?;
        writeln!(writer, "Garbage objects: {}", self.object_garbage.len())?;
        Ok(())
    }
}

/// Marks everything reachable from the entry point; the complement is
/// garbage. A second DFS over the promoted file edges computes file
/// garbage when the entry object carries a file.
///
/// When `trace` names a symbol, the reference path by which the DFS first
/// reaches it is printed to standard error.
pub fn collect_garbage(program: &Program, trace: Option<&str>) -> Result<GarbageReport, Error> {
    let entry = program.entry_point().ok_or(Error::MissingEntryPoint)?;

    struct Frame {
        id: ObjectId,
        children: Vec<ObjectId>,
        next: usize,
    }

    fn frame(program: &Program, id: ObjectId) -> Frame {
        Frame {
            id,
            children: program.object(id).refs.iter().copied().collect(),
            next: 0,
        }
    }

    fn trace_path(program: &Program, stack: &[Frame], reached: ObjectId) {
        let mut indent = String::new();
        for id in stack.iter().map(|f| f.id).chain([reached]) {
            indent.push_str("  ");
            eprintln!("{}-> {}", indent, program.object(id).name);
        }
    }

    let mut reachable = HashSet::new();
    reachable.insert(entry);
    let mut stack = Vec::new();
    if trace == Some(program.object(entry).name.as_str()) {
        trace_path(program, &stack, entry);
    }
    stack.push(frame(program, entry));

    loop {
        let Some(top) = stack.last_mut() else { break };
        if top.next >= top.children.len() {
            stack.pop();
            continue;
        }
        let child = top.children[top.next];
        top.next += 1;

        if reachable.insert(child) {
            if trace == Some(program.object(child).name.as_str()) {
                trace_path(program, &stack, child);
            }
            stack.push(frame(program, child));
        }
    }

    let object_garbage: Vec<ObjectId> = program
        .objects()
        .map(|o| o.id)
        .filter(|id| !reachable.contains(id))
        .collect();

    let files = program.object(entry).file.map(|entry_file| {
        let mut reachable_files = HashSet::new();
        let mut stack = vec![entry_file];
        while let Some(file) = stack.pop() {
            if !reachable_files.insert(file) {
                continue;
            }
            for &child in &program.file(file).refs {
                if !reachable_files.contains(&child) {
                    stack.push(child);
                }
            }
        }

        let garbage: Vec<FileId> = (0..program.file_count() as u32)
            .map(FileId)
            .filter(|id| !reachable_files.contains(id))
            .collect();
        FileGarbage {
            total: program.file_count(),
            garbage,
        }
    });

    Ok(GarbageReport {
        object_total: program.object_count(),
        object_garbage,
        files,
    })
}
