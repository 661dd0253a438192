//! # heft-core
//!
//! Core data model for the heft binary size profiler. This crate defines
//! the address-indexed range map, the symbol/file arena with its reference
//! graph, and the narrow sink surface that executable parsers feed.

pub mod demangler;
pub mod error;
pub mod name;
pub mod object;
pub mod program;
pub mod range_map;
pub mod sink;

pub use demangler::Demangler;
pub use error::Error;
pub use name::strip_params;
pub use object::{FileId, Object, ObjectId, SourceFile};
pub use program::Program;
pub use range_map::RangeMap;
pub use sink::ProgramSink;
