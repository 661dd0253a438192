//! The demangler seam.

/// Turns mangled symbol names into human-readable ones.
///
/// Contract: the returned string is the readable form of the input, or the
/// input unchanged when the name is not recognized as mangled. Demangling
/// must be idempotent: feeding an already-demangled name back in yields the
/// same name. Implementations may run in-process or drive an external
/// process; requests are serialized by `&mut self`.
pub trait Demangler {
    /// Demangles a single symbol name.
    fn demangle(&mut self, symbol: &str) -> String;
}

impl<D: Demangler + ?Sized> Demangler for Box<D> {
    fn demangle(&mut self, symbol: &str) -> String {
        (**self).demangle(symbol)
    }
}
