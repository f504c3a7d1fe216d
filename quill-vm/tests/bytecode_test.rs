// quill-vm - Unit encode/decode tests
// Copyright (c) 2025 The Quill Authors. MIT licensed.

mod common;

use common::{compile_with_modules, read_global};
use quill_core::{RuntimeError, Value};
use quill_vm::{ModuleMap, SymbolTableRef, Unit, Vm};

/// Compile, round-trip through the serialized form, run both units
/// and compare `out`.
fn assert_roundtrip_runs_identically(src: &str) {
    let (unit, table) = compile_with_modules(src, ModuleMap::new()).expect("compiles");
    let encoded = unit.encode().expect("encodes");
    let decoded = Unit::decode(&encoded, &ModuleMap::new()).expect("decodes");

    let original = run_out(unit, &table);
    let revived = run_out(decoded, &table);
    assert!(
        original.equals(&revived),
        "{} != {} for: {}",
        original,
        revived,
        src
    );
}

fn run_out(unit: Unit, table: &SymbolTableRef) -> Value {
    let mut vm = Vm::with_unit(unit);
    vm.run().expect("runs");
    read_global(&vm, table, "out")
}

#[test]
fn test_roundtrip_scalars() {
    assert_roundtrip_runs_identically("out := 1 + 2");
    assert_roundtrip_runs_identically("out := 2.5 * 4.0");
    assert_roundtrip_runs_identically(r#"out := "concat" + "enation""#);
    assert_roundtrip_runs_identically("out := 'q'");
}

#[test]
fn test_roundtrip_functions() {
    assert_roundtrip_runs_identically(
        "f := func(n) { if n < 2 { return n }; return f(n-1) + f(n-2) }\nout := f(12)",
    );
    assert_roundtrip_runs_identically(
        "make := func() { i := 0; return func() { i += 1; return i } }\nc := make()\nc()\nout := c()",
    );
}

#[test]
fn test_roundtrip_collections_and_loops() {
    assert_roundtrip_runs_identically(
        "sum := 0\nfor i := 0; i < 20; i += 1 { sum += i }\nout := sum",
    );
    assert_roundtrip_runs_identically(
        "m := {a: 1, b: 2}\ntotal := 0\nfor k, v in m { total += v }\nout := total",
    );
}

#[test]
fn test_roundtrip_source_map() {
    let (unit, _) = compile_with_modules("a := 1\nb := a + 1\n", ModuleMap::new())
        .expect("compiles");
    let encoded = unit.encode().expect("encodes");
    let decoded = Unit::decode(&encoded, &ModuleMap::new()).expect("decodes");
    assert_eq!(unit.main.source_map, decoded.main.source_map);
    assert_eq!(unit.main.instructions, decoded.main.instructions);
    assert_eq!(unit.main.num_locals, decoded.main.num_locals);
}

#[test]
fn test_module_reference_rebinding() {
    let mut modules = ModuleMap::new();
    modules.add_builtin("cfg", [("mode".to_string(), Value::string("fast"))]);

    let (unit, table) =
        compile_with_modules("c := import(\"cfg\")\nout := c.mode", modules.clone())
            .expect("compiles");
    let encoded = unit.encode().expect("encodes");

    // Decoding with the module available rebinds the reference.
    let decoded = Unit::decode(&encoded, &modules).expect("decodes");
    let out = run_out(decoded, &table);
    assert_eq!(out.to_string(), "\"fast\"");

    // Decoding without it fails with a missing-module error.
    let err = Unit::decode(&encoded, &ModuleMap::new()).expect_err("missing module");
    assert_eq!(err, RuntimeError::MissingModule("cfg".to_string()));
}

#[test]
fn test_decode_rejects_garbage() {
    assert!(Unit::decode(b"not a unit", &ModuleMap::new()).is_err());
    assert!(Unit::decode(b"", &ModuleMap::new()).is_err());

    // Corrupt the version field.
    let (unit, _) = compile_with_modules("out := 1", ModuleMap::new()).expect("compiles");
    let mut encoded = unit.encode().expect("encodes");
    encoded[4] = 0xFF;
    assert!(Unit::decode(&encoded, &ModuleMap::new()).is_err());
}
