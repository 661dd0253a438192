//! The program model: owns all objects and files.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use indexmap::IndexMap;

use crate::name::strip_params;
use crate::object::{FileId, Object, ObjectId, SourceFile};
use crate::range_map::RangeMap;
use crate::Demangler;

/// Owns every [`Object`] and [`SourceFile`] of one analyzed binary.
///
/// All other components refer to records by id; the arenas are append-only,
/// so ids stay valid for the life of the program. Objects are keyed by
/// (mangled) name; re-adding a name returns the existing record untouched.
pub struct Program {
    objects: Vec<Object>,
    by_name: HashMap<String, ObjectId>,
    by_addr: RangeMap<ObjectId>,
    /// Claim table for stripped pretty names. `Some(id)` means a single
    /// holder; `None` means the stripped form is ambiguous.
    stripped_names: HashMap<String, Option<ObjectId>>,
    files: IndexMap<String, SourceFile>,
    /// Maps vmaddr ranges to `vmaddr - fileoff` for the covering segment.
    file_offsets: RangeMap<u64>,
    entry: Option<ObjectId>,
    total_size: u64,
    demangler: Box<dyn Demangler>,
    trace: Option<String>,
}

impl Program {
    /// Creates an empty program that demangles names with `demangler`.
    ///
    /// The demangler is owned for the life of the program and dropped with
    /// it, releasing any external resources it holds.
    pub fn new(demangler: Box<dyn Demangler>) -> Self {
        Self {
            objects: Vec::new(),
            by_name: HashMap::new(),
            by_addr: RangeMap::new(),
            stripped_names: HashMap::new(),
            files: IndexMap::new(),
            file_offsets: RangeMap::new(),
            entry: None,
            total_size: 0,
            demangler,
            trace: None,
        }
    }

    /// Traces every add and edge insertion involving the named symbol to
    /// standard error.
    pub fn with_trace(mut self, name: impl Into<String>) -> Self {
        self.trace = Some(name.into());
        self
    }

    fn traced(&self, name: &str) -> bool {
        self.trace.as_deref() == Some(name)
    }

    /// Adds an object, or returns the existing one with the same name.
    ///
    /// The name is the primary key: the first add wins and later calls
    /// return the same id without altering any attribute. A first add
    /// assigns the next id, indexes the address range, and computes the
    /// pretty name: the stripped form while it is unambiguous, the fully
    /// demangled name once a second overload claims the same stripped form
    /// (the earlier holder is demoted to its full name at that point).
    pub fn add_object(&mut self, name: &str, vmaddr: u64, size: u64, is_data: bool) -> ObjectId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }

        if self.traced(name) {
            eprintln!("adding object {} addr={:#x} size={:#x}", name, vmaddr, size);
        }

        let id = ObjectId(self.objects.len() as u32 + 1);
        let demangled = self.demangler.demangle(name);

        let pretty_name = match strip_params(&demangled) {
            None => demangled.clone(),
            Some(stripped) => match self.stripped_names.get(stripped).copied() {
                None => {
                    self.stripped_names.insert(stripped.to_string(), Some(id));
                    stripped.to_string()
                }
                Some(claim) => {
                    if let Some(prev) = claim {
                        // First collision: restore the earlier holder's
                        // disambiguating parameter list and mark the
                        // stripped form ambiguous.
                        let prev_name = self.objects[prev.index()].name.clone();
                        self.objects[prev.index()].pretty_name =
                            self.demangler.demangle(&prev_name);
                        self.stripped_names.insert(stripped.to_string(), None);
                    }
                    demangled.clone()
                }
            },
        };

        self.by_name.insert(name.to_string(), id);
        self.by_addr.add(vmaddr, size, id);
        self.total_size += size;
        self.objects.push(Object {
            id,
            name: name.to_string(),
            pretty_name,
            vmaddr,
            size,
            is_data,
            file: None,
            refs: BTreeSet::new(),
            weight: 0,
            max_weight: 0,
        });
        id
    }

    /// Records that the segment at `vmaddr` (spanning `filesize` bytes)
    /// starts at `fileoff` in the binary file.
    pub fn add_file_mapping(&mut self, vmaddr: u64, fileoff: u64, filesize: u64) {
        self.file_offsets.add(vmaddr, filesize, vmaddr - fileoff);
    }

    /// Translates a virtual address to a file offset, if a mapping covers it.
    pub fn try_file_offset(&self, vmaddr: u64) -> Option<u64> {
        self.file_offsets.try_get(vmaddr).map(|diff| vmaddr - diff)
    }

    /// Designates the root symbol for dominator and reachability analysis.
    pub fn set_entry_point(&mut self, id: ObjectId) {
        self.entry = Some(id);
    }

    /// Returns the entry point, if one was set.
    pub fn entry_point(&self) -> Option<ObjectId> {
        self.entry
    }

    /// Resolves `vmaddr` through the address index and, on a hit, adds an
    /// edge from `from` to the resolved object. Misses are silent no-ops.
    ///
    /// Returns whether an edge was added.
    pub fn try_add_ref(&mut self, from: ObjectId, vmaddr: u64) -> bool {
        match self.by_addr.try_get(vmaddr) {
            Some(&to) => {
                self.add_ref(from, to);
                true
            }
            None => false,
        }
    }

    /// Adds a reference edge, plus the projected file edge when both
    /// endpoints carry a file.
    pub fn add_ref(&mut self, from: ObjectId, to: ObjectId) {
        let from_obj = &self.objects[from.index()];
        let to_obj = &self.objects[to.index()];
        if self.traced(&from_obj.name) || self.traced(&to_obj.name) {
            eprintln!("added ref {} -> {}", from_obj.name, to_obj.name);
        }
        let from_file = from_obj.file;
        let to_file = to_obj.file;

        self.objects[from.index()].refs.insert(to);
        if let (Some(ff), Some(tf)) = (from_file, to_file) {
            self.files[ff.index()].refs.insert(tf);
        }
    }

    /// Finds an object by its (mangled) name.
    pub fn find_by_name(&self, name: &str) -> Option<ObjectId> {
        self.by_name.get(name).copied()
    }

    /// Finds the object whose address range contains `addr`.
    pub fn find_by_addr(&self, addr: u64) -> Option<ObjectId> {
        self.by_addr.try_get(addr).copied()
    }

    /// Interns a source file, returning its id.
    pub fn intern_file(&mut self, name: &str) -> FileId {
        if let Some(index) = self.files.get_index_of(name) {
            return FileId(index as u32);
        }
        let id = FileId(self.files.len() as u32);
        self.files.insert(
            name.to_string(),
            SourceFile {
                name: name.to_string(),
                refs: BTreeSet::new(),
                source_line_weight: 0,
            },
        );
        id
    }

    /// Attributes an object's bytes to a source file.
    ///
    /// Moves the object's size into the file's `source_line_weight`
    /// (removing it from a previously assigned file first).
    pub fn set_object_file(&mut self, id: ObjectId, file: FileId) {
        let old = self.objects[id.index()].file;
        if old == Some(file) {
            return;
        }
        let size = self.objects[id.index()].size;
        if let Some(old) = old {
            self.files[old.index()].source_line_weight -= size;
        }
        self.objects[id.index()].file = Some(file);
        self.files[file.index()].source_line_weight += size;
    }

    /// Adds externally measured weight to a file (a proxy for binaries
    /// whose debug info reports line contributions directly).
    pub fn add_source_line_weight(&mut self, file: FileId, bytes: u64) {
        self.files[file.index()].source_line_weight += bytes;
    }

    /// Returns an object by id.
    pub fn object(&self, id: ObjectId) -> &Object {
        &self.objects[id.index()]
    }

    /// Returns an object by id, mutably.
    pub fn object_mut(&mut self, id: ObjectId) -> &mut Object {
        &mut self.objects[id.index()]
    }

    /// Iterates over all objects in id order.
    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.objects.iter()
    }

    /// Returns the number of objects.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Returns a file by id.
    pub fn file(&self, id: FileId) -> &SourceFile {
        &self.files[id.index()]
    }

    /// Iterates over all files in insertion order.
    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }

    /// Returns the number of files.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Returns true when debug info produced at least one file.
    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }

    /// Sum of all object sizes.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("objects", &self.objects.len())
            .field("files", &self.files.len())
            .field("total_size", &self.total_size)
            .field("entry", &self.entry)
            .finish()
    }
}
