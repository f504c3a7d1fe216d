// quill-vm - VM execution tests
// Copyright (c) 2025 The Quill Authors. MIT licensed.

mod common;

use common::{assert_out, read_global, run_error, run_expect, run_script, run_script_with_modules};
use quill_core::Value;
use quill_vm::ModuleMap;

// ----------------------------------------------------------------------
// Literals, arithmetic, operators
// ----------------------------------------------------------------------

#[test]
fn test_arithmetic() {
    assert_out("out := 1 + 2", "3");
    assert_out("out := 10 - 2 * 3", "4");
    assert_out("out := (10 - 2) * 3", "24");
    assert_out("out := 7 / 2", "3");
    assert_out("out := 7 % 3", "1");
    assert_out("out := 7.0 / 2", "3.5");
    assert_out("out := 1 + 2.5", "3.5");
    assert_out("out := -5 + 2", "-3");
    assert_out("out := 2 << 4", "32");
    assert_out("out := 255 & 15", "15");
    assert_out("out := 8 | 1", "9");
    assert_out("out := 6 ^ 3", "5");
    assert_out("out := 6 &^ 3", "4");
}

#[test]
fn test_division_by_zero_is_infinity() {
    assert_out("out := 1 / 0", "+Inf");
    assert_out("out := 1.5 / 0", "+Inf");
    assert_out("out := bigint(7) / 0", "+Inf");
}

#[test]
fn test_quadratic_sum() {
    // x*x + y*y with x=2, y=3
    assert_out("x := 2; y := 3; out := x*x + y*y", "13");
}

#[test]
fn test_comparison_and_equality() {
    assert_out("out := 1 < 2", "true");
    assert_out("out := 2 <= 2", "true");
    assert_out("out := 3 > 4", "false");
    assert_out("out := 1 == 1", "true");
    assert_out("out := 1 == 1.0", "false"); // no cross-type equality
    assert_out(r#"out := "a" < "b""#, "true");
    assert_out("out := [1, 2] == [1, 2]", "true");
    assert_out(r#"out := {a: 1} == {a: 2}"#, "false");
}

#[test]
fn test_logical_short_circuit() {
    assert_out("out := true && 4", "4");
    assert_out("out := false && 4", "false");
    assert_out("out := 0 || 7", "7");
    assert_out(r#"out := "x" || 7"#, "\"x\"");
    // The right side must not run when short-circuited.
    assert_out("hits := 0; f := func() { hits = hits + 1; return true }; out := false && f(); out = hits", "0");
}

#[test]
fn test_string_concat() {
    assert_out(r#"out := "foo" + "bar""#, "\"foobar\"");
    assert_out(r#"out := "n=" + 42"#, "\"n=42\"");
    assert_out(r#"out := len("héllo")"#, "6"); // byte length
}

#[test]
fn test_char_arithmetic() {
    assert_out("out := 'a' + 1", "b");
    assert_out("out := 'b' - 'a'", "\u{1}");
    assert_out("out := 'a' < 'b'", "true");
}

// ----------------------------------------------------------------------
// Control flow
// ----------------------------------------------------------------------

#[test]
fn test_if_else() {
    assert_out("out := 0; if 1 < 2 { out = 1 } else { out = 2 }", "1");
    assert_out("out := 0; if 1 > 2 { out = 1 } else { out = 2 }", "2");
    assert_out(
        "out := 0; if x := 9; x > 5 { out = x } else { out = -x }",
        "9",
    );
    assert_out(
        "out := 0; if false { out = 1 } else if false { out = 2 } else { out = 3 }",
        "3",
    );
}

#[test]
fn test_for_loop() {
    assert_out(
        "sum := 0; for i := 0; i < 10; i += 1 { sum += i }; out := sum",
        "45",
    );
    assert_out(
        "n := 0; for n < 5 { n += 1 }; out := n",
        "5",
    );
}

#[test]
fn test_break_continue() {
    assert_out(
        "sum := 0; for i := 0; i < 10; i += 1 { if i % 2 == 0 { continue }; sum += i }; out := sum",
        "25",
    );
    assert_out(
        "sum := 0; for i := 0; ; i += 1 { if i == 4 { break }; sum += i }; out := sum",
        "6",
    );
}

#[test]
fn test_for_in_array() {
    assert_out(
        "sum := 0; for v in [1, 2, 3] { sum += v }; out := sum",
        "6",
    );
    assert_out(
        "keys := 0; for i, v in [5, 6] { keys += i; keys += v }; out := keys",
        "12",
    );
}

#[test]
fn test_for_in_string_and_bytes() {
    assert_out(
        r#"n := 0; for c in "abc" { n += 1 }; out := n"#,
        "3",
    );
    assert_out(
        "sum := 0; for b in bytes([1, 2, 3]) { sum += b }; out := sum",
        "6",
    );
}

// ----------------------------------------------------------------------
// Arrays, maps, indexing
// ----------------------------------------------------------------------

#[test]
fn test_append_scenario() {
    let out = run_expect(
        "a := [1, 2, 3]\nb := append(a, 4, 5)\nout := [len(a), len(b), b[4]]",
    );
    assert_eq!(out.to_string(), "[3, 5, 5]");
}

#[test]
fn test_array_attributes() {
    assert_out("a := [1, 2]; out := a.length", "2");
    assert_out("a := [1]; a.push(2, 3); out := [len(a), a[2]]", "[3, 3]");
    assert_out("a := [1, 2]; out := a[5]", "null");
    assert_out("a := [1, 2]; out := a[-1]", "null");
}

#[test]
fn test_index_assignment() {
    assert_out("a := [1, 2, 3]; a[1] = 9; out := a", "[1, 9, 3]");
    assert_out("m := {}; m[\"k\"] = 1; out := m.k", "1");
    assert_out("m := {}; m.k = 2; m.k += 3; out := m[\"k\"]", "5");
}

#[test]
fn test_index_out_of_bounds_write() {
    let err = run_error("a := [1]; a[3] = 0");
    assert!(err.contains("index out of bounds"), "{}", err);
}

#[test]
fn test_map_iteration_scenario() {
    let (vm, table) = run_script(
        "m := {a: 1, b: 2}\nm.c = 3\nkeys := []\nfor k, v in m { keys = append(keys, k) }\nout := [len(keys), m.c, m[\"a\"]]",
    )
    .expect("script runs");
    let out = read_global(&vm, &table, "out");
    let payload = out.as_array_payload().expect("array");
    assert!(payload[0].equals(&Value::Int(3)));
    assert!(payload[1].equals(&Value::Int(3)));
    assert!(payload[2].equals(&Value::Int(1)));
}

#[test]
fn test_string_indexing() {
    assert_out(r#"out := "héllo"[1]"#, "é");
    assert_out(r#"out := "abc"[9]"#, "null");
    assert_out(r#"s := "abc"; s[1] = 'X'; out := s"#, "\"aXc\"");
}

#[test]
fn test_multi_assignment() {
    assert_out("a, b := [1, 2]; out := [b, a]", "[2, 1]");
    assert_out(
        "f := func() { return [1, 2] }; a, b := f(); out := a + b",
        "3",
    );
    let err = run_error("a, b := [1, 2, 3]");
    assert!(err.contains("destructure"), "{}", err);
}

// ----------------------------------------------------------------------
// Functions and closures
// ----------------------------------------------------------------------

#[test]
fn test_fibonacci_scenario() {
    let out = run_expect(
        "f := func(n) {\n  if n < 2 { return n }\n  return f(n-1) + f(n-2)\n}\nout := f(10)",
    );
    assert!(out.equals(&Value::Int(55)));
}

#[test]
fn test_counter_closure_scenario() {
    let out = run_expect(
        "counter := func() {\n  i := 0\n  return func() { i = i + 1; return i }\n}\nc := counter()\nout := [c(), c(), c()]",
    );
    assert_eq!(out.to_string(), "[1, 2, 3]");
}

#[test]
fn test_closures_share_cells() {
    // Two closures over the same local observe each other's writes.
    assert_out(
        "make := func() {\n  n := 0\n  inc := func() { n = n + 1 }\n  get := func() { return n }\n  return [inc, get]\n}\npair := make()\npair[0]()\npair[0]()\nout := pair[1]()",
        "2",
    );
}

#[test]
fn test_function_without_return_yields_null() {
    assert_out("f := func() {}; out := f()", "null");
}

#[test]
fn test_wrong_arity() {
    let err = run_error("f := func(a, b) { return a }; f(1)");
    assert!(err.contains("wrong number of arguments"), "{}", err);
}

#[test]
fn test_variadic_function() {
    assert_out(
        "f := func(a, ...rest) { return [a, len(rest)] }; out := f(1)",
        "[1, 0]",
    );
    assert_out(
        "f := func(a, ...rest) { return [a, len(rest), rest[1]] }; out := f(1, 2, 3)",
        "[1, 2, 3]",
    );
    let err = run_error("f := func(a, ...rest) { return a }; f()");
    assert!(err.contains("wrong number of arguments"), "{}", err);
}

#[test]
fn test_spread_call() {
    assert_out(
        "f := func(a, b, c) { return a + b + c }; xs := [1, 2, 3]; out := f(xs...)",
        "6",
    );
    assert_out(
        "f := func(...xs) { return len(xs) }; out := f([1, 2, 3]...)",
        "3",
    );
    assert_out(
        "f := func(a, ...xs) { return [a, len(xs)] }; out := f(0, [1, 2]...)",
        "[0, 2]",
    );
}

#[test]
fn test_builtin_call() {
    assert_out("out := len([1, 2, 3])", "3");
    assert_out("out := typeof(1)", "\"int\"");
    assert_out("out := string(42) + \"!\"", "\"42!\"");
}

#[test]
fn test_not_callable() {
    let err = run_error("x := 1; x()");
    assert!(err.contains("not callable"), "{}", err);
}

// ----------------------------------------------------------------------
// Error values
// ----------------------------------------------------------------------

#[test]
fn test_error_values() {
    assert_out(r#"e := error("boom"); out := is_error(e)"#, "true");
    assert_out(r#"e := error("boom"); out := e.value"#, "\"boom\"");
    // Errors are always falsy.
    assert_out(
        r#"e := error(1); out := "t"; if e { out = "truthy" } else { out = "falsy" }"#,
        "\"falsy\"",
    );
}

#[test]
fn test_immutable_values() {
    assert_out("a := immutable([1, 2]); out := is_immutable_array(a)", "true");
    assert_out("m := immutable({a: 1}); out := m.a", "1");
    let err = run_error("a := immutable([1, 2]); a[0] = 9");
    assert!(err.contains("not index-assignable"), "{}", err);
    // Copying an immutable container yields a mutable one.
    assert_out(
        "a := immutable([1, 2]); b := copy(a); b[0] = 9; out := [a[0], b[0]]",
        "[1, 9]",
    );
}

// ----------------------------------------------------------------------
// Pointers
// ----------------------------------------------------------------------

#[test]
fn test_pointer_to_global() {
    let out = run_expect(
        "x := 10\np := pointer(x)\nset(p, 42)\nout := [deref(p), x]",
    );
    assert_eq!(out.to_string(), "[42, 42]");
}

#[test]
fn test_pointer_local_fallback() {
    // Local variables are not in the globals area: writes through the
    // pointer do not propagate.
    let out = run_expect(
        "f := func() {\n  x := 1234\n  p := pointer(x)\n  set(p, 42)\n  return [deref(p), x]\n}\nout := f()",
    );
    assert_eq!(out.to_string(), "[42, 1234]");
}

#[test]
fn test_pointer_predicate_and_global_rebind() {
    assert_out("x := 5; p := pointer(x); out := is_pointer(p)", "true");
    // Assigning the global writes the same cell the pointer holds.
    assert_out("x := 5; p := pointer(x); x = 7; out := deref(p)", "7");
}

// ----------------------------------------------------------------------
// Imports
// ----------------------------------------------------------------------

#[test]
fn test_builtin_module_import() {
    let mut modules = ModuleMap::new();
    modules.add_builtin(
        "mathx",
        [
            ("pi".to_string(), Value::Float(3.14159)),
            ("answer".to_string(), Value::Int(42)),
        ],
    );
    let (vm, table) = run_script_with_modules(
        "m := import(\"mathx\")\nout := [m.answer, is_immutable_map(m)]",
        modules,
    )
    .expect("script runs");
    assert_eq!(read_global(&vm, &table, "out").to_string(), "[42, true]");
}

#[test]
fn test_source_module_import() {
    let mut modules = ModuleMap::new();
    modules.add_source("twice", "export func(x) { return x * 2 }");
    let (vm, table) =
        run_script_with_modules("t := import(\"twice\")\nout := t(21)", modules)
            .expect("script runs");
    assert!(read_global(&vm, &table, "out").equals(&Value::Int(42)));
}

#[test]
fn test_missing_module_is_compile_error() {
    let err = match run_script("m := import(\"nosuch\")") {
        Ok(_) => panic!("import unexpectedly succeeded"),
        Err(e) => e,
    };
    assert!(err.contains("module 'nosuch' not found"), "{}", err);
}

// ----------------------------------------------------------------------
// Abort
// ----------------------------------------------------------------------

#[test]
fn test_abort_stops_loop() {
    use quill_parser::{Parser, SourceFile};
    use quill_vm::compiler::Compiler;
    use quill_vm::Vm;
    use std::rc::Rc;

    let src = "for {}";
    let source = Rc::new(SourceFile::new("<test>", src));
    let file = Parser::parse_file(src).expect("parses");
    let compiler = Compiler::with_builtins(Rc::new(ModuleMap::new()), source);
    let unit = compiler.compile(&file).expect("compiles");

    let mut vm = Vm::with_unit(unit);
    // Raise the flag up front: the first backward jump must observe
    // it, otherwise this test would never finish.
    vm.abort_handle().store(true, std::sync::atomic::Ordering::Relaxed);
    let err = vm.run().expect_err("aborted");
    assert_eq!(err.error, quill_core::RuntimeError::Aborted);
}

// ----------------------------------------------------------------------
// Runtime error positions
// ----------------------------------------------------------------------

#[test]
fn test_error_carries_position() {
    let err = run_error("x := 1\ny := x()");
    // The call is on line 2.
    assert!(err.contains("<test>:2"), "{}", err);
}
