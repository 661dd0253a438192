//! Output formats for analysis results.

pub mod dot;
