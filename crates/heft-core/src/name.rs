//! Symbol name utilities.

/// Strips a parameter list from a demangled name.
///
/// Returns the prefix up to (not including) the first `'('`, or `None`
/// when the name carries no parameter list and is left unchanged. Used to
/// coalesce an overload set under a single short pretty name while the
/// stripped form is unambiguous.
pub fn strip_params(name: &str) -> Option<&str> {
    name.find('(').map(|paren| &name[..paren])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_at_first_paren() {
        assert_eq!(strip_params("foo(int)"), Some("foo"));
        assert_eq!(strip_params("ns::Widget::draw(Canvas&, bool)"), Some("ns::Widget::draw"));
    }

    #[test]
    fn test_nested_parens_stop_at_first() {
        assert_eq!(strip_params("f(g(int))"), Some("f"));
    }

    #[test]
    fn test_plain_name_is_unchanged() {
        assert_eq!(strip_params("main"), None);
        assert_eq!(strip_params("_ZTV6Widget"), None);
    }

    #[test]
    fn test_empty_prefix() {
        assert_eq!(strip_params("(anonymous)"), Some(""));
    }
}
