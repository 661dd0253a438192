//! The data sink parsers feed.

use crate::object::ObjectId;
use crate::program::Program;

/// Narrow facade over [`Program`] for executable parsers.
///
/// This is the only surface parsers may touch; it exists so the internal
/// program structure can evolve without churning every parser. The methods
/// are plain forwarders.
pub struct ProgramSink<'a> {
    program: &'a mut Program,
}

impl<'a> ProgramSink<'a> {
    /// Wraps a program.
    pub fn new(program: &'a mut Program) -> Self {
        Self { program }
    }

    /// Adds a symbol; idempotent on name.
    pub fn add_object(&mut self, name: &str, vmaddr: u64, size: u64, is_data: bool) -> ObjectId {
        self.program.add_object(name, vmaddr, size, is_data)
    }

    /// Looks a symbol up by its mangled name.
    pub fn find_object_by_name(&self, name: &str) -> Option<ObjectId> {
        self.program.find_by_name(name)
    }

    /// Looks a symbol up by an address inside its range.
    pub fn find_object_by_addr(&self, addr: u64) -> Option<ObjectId> {
        self.program.find_by_addr(addr)
    }

    /// Adds a reference edge between two known symbols.
    pub fn add_ref(&mut self, from: ObjectId, to: ObjectId) {
        self.program.add_ref(from, to);
    }

    /// Designates the root symbol.
    pub fn set_entry_point(&mut self, id: ObjectId) {
        self.program.set_entry_point(id);
    }

    /// Records a segment-to-file-offset mapping.
    pub fn add_file_mapping(&mut self, vmaddr: u64, fileoff: u64, filesize: u64) {
        self.program.add_file_mapping(vmaddr, fileoff, filesize);
    }

    /// Attributes a symbol to the source file debug info reported for it.
    pub fn set_source_file(&mut self, id: ObjectId, filename: &str) {
        let file = self.program.intern_file(filename);
        self.program.set_object_file(id, file);
    }
}
