// ABOUTME: End-to-end coverage of spec.md §8's testable properties, driven
// entirely through the public `Interpreter` surface.
//
// Style grounded in examples/TrevorS-lisp-llm-sandbox/tests/integration_test.rs
// (plain #[test] functions against the library's public API, one concrete
// scenario per test).

use sandscript::{Builtins, Config, Value};

fn interp() -> sandscript::Interpreter {
    sandscript::Interpreter::new(Config::default(), Builtins::new())
}

// ---- concrete scenarios (spec.md §8) ----

#[test]
fn scenario_1_list_comprehension() {
    let mut it = interp();
    let v = it.eval("[a + 1 for a in [1,2,3]]").unwrap();
    assert_eq!(v.to_string(), "[2, 3, 4]");
}

#[test]
fn scenario_2_power_base_over_ceiling() {
    let mut config = Config::default();
    config.max_power_base = 100;
    let mut it = sandscript::Interpreter::new(config, Builtins::new());
    let err = it.eval("101**2").unwrap_err();
    assert_eq!(err.kind.type_name(), "NumberTooHigh");
    assert!(err.is_limit());
}

#[test]
fn scenario_3_string_repeat_over_ceiling() {
    // 'text' is 4 chars; one repetition past the default 200_000 ceiling
    // (50_001 * 4 = 200_004) is refused. See DESIGN.md for why the
    // literal 50_000 in spec.md's scenario lands exactly on the boundary
    // and therefore succeeds instead (covered by the sibling test below).
    let mut it = interp();
    let err = it.eval("50001*'text'").unwrap_err();
    assert_eq!(err.kind.type_name(), "IterableTooLong");
    assert!(err.is_limit());
}

#[test]
fn scenario_3_exact_boundary_succeeds() {
    let mut it = interp();
    let v = it.eval("50000*'text'").unwrap();
    assert_eq!(v.to_string().len(), 200_000);
}

#[test]
fn scenario_4_module_factorial_via_execute() {
    let mut it = interp();
    let src = "def fac(i):\n  if i<1: return 1\n  return i*fac(i-1)\nreturn fac(5)";
    assert_eq!(it.execute(src).unwrap(), Value::Int(120));
}

#[test]
fn scenario_5_unbounded_recursion_hits_ceiling() {
    let mut config = Config::default();
    config.max_recursion_depth = 50;
    let mut it = sandscript::Interpreter::new(config, Builtins::new());
    let err = it.execute("def f(): f()\nf()").unwrap_err();
    assert_eq!(err.kind.type_name(), "TooMuchRecursion");
    assert!(err.is_limit());
}

#[test]
fn scenario_6_sequence_pattern_match() {
    let mut it = interp();
    let v = it.execute("match [1,2,3]:\n  case [x,*_]: return x").unwrap();
    assert_eq!(v, Value::Int(1));
}

#[test]
fn scenario_7_shadowing_a_host_builtin_is_a_value_error() {
    let mut it = interp();
    it.builtins_mut().insert("shadow", Value::Int(0));
    let err = it.execute("shadow = 1").unwrap_err();
    assert_eq!(err.kind.type_name(), "ValueError");
}

#[test]
fn scenario_8_try_except_recovers_value_error_by_name() {
    // spec.md's literal except-clause name is 'ZeroDivisionError'; this
    // taxonomy collapses division-by-zero into ValueError per spec.md §4.2
    // and examples/original_source/draconic/types.py — see DESIGN.md.
    let mut it = interp();
    let src = "try:\n  1/0\nexcept 'ValueError':\n  return 'ok'";
    let v = it.execute(src).unwrap();
    assert_eq!(v.to_string(), "ok");
}

#[test]
fn scenario_9_finally_return_overrides_try_return() {
    let mut it = interp();
    let src = "try:\n  return 0\nfinally:\n  return 3";
    assert_eq!(it.execute(src).unwrap(), Value::Int(3));
}

#[test]
fn scenario_10_walrus_binds_and_yields() {
    let mut it = interp();
    assert_eq!(it.eval("(a := 1) + a").unwrap(), Value::Int(2));
    assert_eq!(it.eval("a").unwrap(), Value::Int(1));
}

// ---- universal invariants ----

#[test]
fn container_methods_are_callable_on_safe_values() {
    let mut it = interp();
    let v = it.execute("xs = [1, 2]\nxs.append(3)\nxs.extend([4, 5])\nreturn xs").unwrap();
    assert_eq!(v.to_string(), "[1, 2, 3, 4, 5]");

    let joined = it.eval("'-'.join(['a', 'b', 'c'])").unwrap();
    assert_eq!(joined.to_string(), "a-b-c");

    let v = it.execute("s = {1, 2}\ns.add(3)\nreturn s.union({4})").unwrap();
    assert_eq!(v.to_string().len(), "{1, 2, 3, 4}".len());

    let v = it.execute("d = {'a': 1}\nd.update({'b': 2})\nreturn d.get('b')").unwrap();
    assert_eq!(v, Value::Int(2));
}

#[test]
fn disallowed_method_name_is_unreachable_on_any_container() {
    let mut config = Config::default();
    config.disallow_methods = vec!["format".to_string()];
    let mut it = sandscript::Interpreter::new(config, Builtins::new());
    let err = it.eval("'{}'.format('x')").unwrap_err();
    assert_eq!(err.kind.type_name(), "FeatureNotAvailable");
}

#[test]
fn invariant_bounded_mutator_either_succeeds_or_raises_unchanged() {
    let mut config = Config::default();
    config.max_const_len = 3;
    let mut it = sandscript::Interpreter::new(config, Builtins::new());
    it.execute("xs = [1,2,3]").unwrap();
    let err = it.execute("xs.append(4)").unwrap_err();
    assert_eq!(err.kind.type_name(), "IterableTooLong");
    // `xs` is unchanged.
    let v = it.eval("xs").unwrap();
    assert_eq!(v.to_string(), "[1, 2, 3]");
}

#[test]
fn invariant_too_many_statements_is_a_limit() {
    let mut config = Config::default();
    config.max_statements = 3;
    let mut it = sandscript::Interpreter::new(config, Builtins::new());
    let err = it.execute("x = 1\nx = 2\nx = 3\nx = 4\nx = 5").unwrap_err();
    assert_eq!(err.kind.type_name(), "TooManyStatements");
    assert!(err.is_limit());
}

#[test]
fn invariant_denied_attribute_prefix_is_unreadable() {
    let mut it = interp();
    let err = it.eval("(1).__class__").unwrap_err();
    assert_eq!(err.kind.type_name(), "FeatureNotAvailable");
}

#[test]
fn invariant_try_cannot_catch_a_limit_error() {
    let mut config = Config::default();
    config.max_recursion_depth = 5;
    let mut it = sandscript::Interpreter::new(config, Builtins::new());
    let src = "def f(): f()\ntry:\n  f()\nexcept 'TooMuchRecursion':\n  return 'caught'";
    let err = it.execute(src).unwrap_err();
    assert_eq!(err.kind.type_name(), "TooMuchRecursion");
}

#[test]
fn invariant_interpreter_remains_usable_after_an_error() {
    let mut it = interp();
    assert!(it.eval("1/0").is_err());
    assert_eq!(it.eval("1").unwrap(), Value::Int(1));
}

#[test]
fn round_trip_pure_expression_is_deterministic() {
    let mut it = interp();
    let a = it.eval("2 + 3 * 4").unwrap();
    let b = it.eval("2 + 3 * 4").unwrap();
    assert_eq!(a, b);
    assert_eq!(a, Value::Int(14));
}
