//! Property-based tests for demangling invariants.
//!
//! The program model relies on two properties of the demangler contract:
//! unrecognized names pass through unchanged, and demangling is idempotent
//! (a demangled name never parses as mangled again).

use proptest::prelude::*;

use heft_demangle::demangle_or_original;

/// Plain identifiers, optionally namespace-qualified. None of these carry
/// a mangling prefix.
fn arb_plain_name() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9_]{0,20}(::[A-Za-z][A-Za-z0-9_]{0,12}){0,3}"
}

/// Itanium-encoded function symbols over the builtin type codes the
/// in-process demangler understands.
fn arb_mangled_name() -> impl Strategy<Value = String> {
    let name = "[a-z][a-z0-9_]{0,11}";
    let params = proptest::collection::vec(
        prop_oneof![
            Just("i"), Just("j"), Just("l"), Just("d"), Just("f"),
            Just("b"), Just("c"), Just("Pc"), Just("PKc"), Just("Ri"),
        ],
        1..5,
    );
    (name, params).prop_map(|(name, params)| {
        format!("_Z{}{}{}", name.len(), name, params.concat())
    })
}

proptest! {
    #[test]
    fn plain_names_pass_through_unchanged(name in arb_plain_name()) {
        prop_assert_eq!(demangle_or_original(&name), name);
    }

    #[test]
    fn demangling_is_idempotent(name in arb_mangled_name()) {
        let once = demangle_or_original(&name);
        let twice = demangle_or_original(&once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn mangled_functions_produce_a_parameter_list(name in arb_mangled_name()) {
        let demangled = demangle_or_original(&name);
        prop_assert_ne!(&demangled, &name);
        prop_assert!(demangled.contains('('));
        prop_assert!(demangled.ends_with(')'));
    }
}
