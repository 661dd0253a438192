//! # heft-demangle
//!
//! Symbol demangling for heft.
//!
//! Two implementations of the [`Demangler`] capability:
//!
//! - [`BestEffortDemangler`] runs in-process and covers the common Itanium
//!   C++ ABI shapes (plain and nested names, simple parameter lists, the
//!   vtable/typeinfo special names) plus trivial Rust v0 paths.
//! - [`CxxFiltDemangler`] drives one `c++filt` child process over
//!   newline-framed pipes and handles everything `c++filt` does.
//!
//! Both leave unrecognized names unchanged, which also makes demangling
//! idempotent: an already-demangled name never parses as mangled.

use std::io::{self, BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use heft_core::Demangler;

/// Attempt to demangle a symbol name.
///
/// Returns the demangled name if successful, or None if the symbol is not
/// mangled or uses an unsupported scheme.
pub fn demangle(name: &str) -> Option<String> {
    if let Some(demangled) = demangle_itanium(name) {
        return Some(demangled);
    }

    if let Some(demangled) = demangle_rust_v0(name) {
        return Some(demangled);
    }

    None
}

/// Returns the demangled name or the original if demangling fails.
pub fn demangle_or_original(name: &str) -> String {
    demangle(name).unwrap_or_else(|| name.to_string())
}

/// Demangles an Itanium C++ ABI symbol (`_Z...`).
fn demangle_itanium(name: &str) -> Option<String> {
    let rest = name.strip_prefix("_Z")?;

    // Special names for the data objects this tool cares most about.
    for (prefix, label) in [("TV", "vtable for "), ("TI", "typeinfo for "), ("TS", "typeinfo name for ")] {
        if let Some(ty) = rest.strip_prefix(prefix) {
            let (qualified, left) = parse_source_name(ty)?;
            if left.is_empty() {
                return Some(format!("{}{}", label, qualified));
            }
            return None;
        }
    }

    let (qualified, rest) = parse_source_name(rest)?;
    if rest.is_empty() {
        // Data symbol or a name without an encoded signature.
        return Some(qualified);
    }

    let params = parse_params(rest)?;
    Some(format!("{}({})", qualified, params))
}

/// Parses a possibly nested source name: `<len><chars>` or `N (<len><chars>)+ E`.
fn parse_source_name(s: &str) -> Option<(String, &str)> {
    if let Some(mut rest) = s.strip_prefix('N') {
        let mut segments = Vec::new();
        loop {
            if let Some(tail) = rest.strip_prefix('E') {
                if segments.is_empty() {
                    return None;
                }
                return Some((segments.join("::"), tail));
            }
            let (segment, tail) = parse_length_prefixed(rest)?;
            segments.push(segment.to_string());
            rest = tail;
        }
    }

    let (segment, rest) = parse_length_prefixed(s)?;
    Some((segment.to_string(), rest))
}

/// Parses one `<decimal-length><chars>` component.
fn parse_length_prefixed(s: &str) -> Option<(&str, &str)> {
    let digits = s.len() - s.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let length: usize = s[..digits].parse().ok()?;
    if length == 0 {
        return None;
    }
    let rest = &s[digits..];
    if rest.len() < length {
        return None;
    }
    Some((&rest[..length], &rest[length..]))
}

/// Renders an encoded parameter list, without the surrounding parens.
fn parse_params(s: &str) -> Option<String> {
    if s == "v" {
        return Some(String::new());
    }
    let mut params = Vec::new();
    let mut rest = s;
    while !rest.is_empty() {
        let (ty, tail) = parse_type(rest)?;
        params.push(ty);
        rest = tail;
    }
    Some(params.join(", "))
}

/// Parses one encoded type.
fn parse_type(s: &str) -> Option<(String, &str)> {
    let first = s.chars().next()?;
    let builtin = match first {
        'v' => "void",
        'b' => "bool",
        'c' => "char",
        'a' => "signed char",
        'h' => "unsigned char",
        'w' => "wchar_t",
        's' => "short",
        't' => "unsigned short",
        'i' => "int",
        'j' => "unsigned int",
        'l' => "long",
        'm' => "unsigned long",
        'x' => "long long",
        'y' => "unsigned long long",
        'f' => "float",
        'd' => "double",
        'e' => "long double",
        'z' => "...",
        'P' => {
            let (inner, rest) = parse_type(&s[1..])?;
            return Some((format!("{}*", inner), rest));
        }
        'R' => {
            let (inner, rest) = parse_type(&s[1..])?;
            return Some((format!("{}&", inner), rest));
        }
        'K' => {
            let (inner, rest) = parse_type(&s[1..])?;
            return Some((format!("{} const", inner), rest));
        }
        c if c.is_ascii_digit() || c == 'N' => {
            let (qualified, rest) = parse_source_name(s)?;
            return Some((qualified, rest));
        }
        _ => return None,
    };
    Some((builtin.to_string(), &s[1..]))
}

/// Demangles a trivial Rust v0 path (`_RNvC<len>crate<len>item`).
///
/// Full v0 demangling is a grammar of its own; anything beyond a flat
/// crate-level item is left for an external demangler.
fn demangle_rust_v0(name: &str) -> Option<String> {
    let rest = name.strip_prefix("_RNvC")?;
    let (krate, rest) = parse_length_prefixed(rest)?;
    let (item, rest) = parse_length_prefixed(rest)?;
    if !rest.is_empty() {
        return None;
    }
    Some(format!("{}::{}", krate, item))
}

/// In-process best-effort demangler.
#[derive(Debug, Default)]
pub struct BestEffortDemangler;

impl BestEffortDemangler {
    /// Creates a best-effort demangler.
    pub fn new() -> Self {
        Self
    }
}

impl Demangler for BestEffortDemangler {
    fn demangle(&mut self, symbol: &str) -> String {
        demangle_or_original(symbol)
    }
}

/// Demangler backed by one `c++filt` child process.
///
/// Requests are newline-framed over the child's stdin/stdout and serialized
/// by `&mut self`. If the pipe breaks mid-run the demangler degrades to
/// passing names through unchanged rather than poisoning the whole run; the
/// child is terminated on drop.
pub struct CxxFiltDemangler {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    broken: bool,
}

impl CxxFiltDemangler {
    /// Spawns `c++filt`. Failure to start is a missing prerequisite the
    /// caller decides how to handle.
    pub fn spawn() -> io::Result<Self> {
        Self::spawn_program("c++filt")
    }

    /// Spawns a specific filter program with `c++filt` line semantics.
    pub fn spawn_program(program: &str) -> io::Result<Self> {
        let mut child = Command::new(program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "child stdin not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "child stdout not captured"))?;
        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            broken: false,
        })
    }

    fn round_trip(&mut self, symbol: &str) -> io::Result<String> {
        writeln!(self.stdin, "{}", symbol)?;
        self.stdin.flush()?;

        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "demangler closed its output",
            ));
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }
}

impl Demangler for CxxFiltDemangler {
    fn demangle(&mut self, symbol: &str) -> String {
        // Newlines would desynchronize the framing; such names are not
        // mangled anyway.
        if self.broken || symbol.is_empty() || symbol.contains('\n') {
            return symbol.to_string();
        }
        match self.round_trip(symbol) {
            Ok(demangled) => demangled,
            Err(err) => {
                eprintln!("warning: c++filt pipe failed ({}); names pass through unchanged", err);
                self.broken = true;
                symbol.to_string()
            }
        }
    }
}

impl Drop for CxxFiltDemangler {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
