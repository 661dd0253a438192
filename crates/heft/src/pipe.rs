//! Line-oriented capture of external tool output.

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};

/// Runs `program` with `args` on `binary` and returns its stdout lines.
///
/// The binutils the parsers lean on all speak a stable line-oriented
/// format, so capturing lines is the whole interface. A missing tool or a
/// non-zero exit is fatal: without the tool there is nothing to analyze.
pub fn read_lines(program: &str, args: &[&str], binary: &Path) -> Result<Vec<String>> {
    let mut child = Command::new(program)
        .args(args)
        .arg(binary)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to run {}", program))?;

    let stdout = child
        .stdout
        .take()
        .context("child stdout not captured")?;
    let lines = BufReader::new(stdout)
        .lines()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("failed to read {} output", program))?;

    let status = child.wait().with_context(|| format!("{} did not exit", program))?;
    if !status.success() {
        bail!("{} {} failed with {}", program, args.join(" "), status);
    }
    Ok(lines)
}

/// Parses a hex field that may or may not carry a `0x` prefix.
pub fn parse_hex(field: &str) -> Option<u64> {
    let digits = field.strip_prefix("0x").unwrap_or(field);
    u64::from_str_radix(digits, 16).ok()
}

/// Parses a size field, which readelf prints in decimal but occasionally
/// as `0x`-prefixed hex for very large values.
pub fn parse_size(field: &str) -> Option<u64> {
    if let Some(digits) = field.strip_prefix("0x") {
        u64::from_str_radix(digits, 16).ok()
    } else {
        field.parse().ok()
    }
}
