//! Error types for heft-core.

use thiserror::Error;

/// Core error type.
#[derive(Error, Debug)]
pub enum Error {
    /// A fatal-path range map lookup missed.
    #[error("no mapping covers address {addr:#x}")]
    AddressNotMapped {
        /// The address that was looked up.
        addr: u64,
    },

    /// An analysis that needs a root symbol ran before one was set.
    #[error("no entry point has been set")]
    MissingEntryPoint,

    /// I/O failure while reading the binary.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
