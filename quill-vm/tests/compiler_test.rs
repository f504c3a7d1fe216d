// quill-vm - Compiler emission tests
// Copyright (c) 2025 The Quill Authors. MIT licensed.

mod common;

use common::compile_with_modules;
use quill_vm::compiler::{disassemble, iterate_instructions};
use quill_vm::{ModuleMap, Opcode, Unit};

fn compile(src: &str) -> Unit {
    let (unit, _) = compile_with_modules(src, ModuleMap::new()).expect("compiles");
    unit
}

fn compile_err(src: &str) -> String {
    match compile_with_modules(src, ModuleMap::new()) {
        Ok(_) => panic!("compile unexpectedly succeeded"),
        Err(e) => e,
    }
}

fn opcodes(unit: &Unit) -> Vec<Opcode> {
    iterate_instructions(&unit.main.instructions)
        .map(|(_, op, _)| op)
        .collect()
}

#[test]
fn test_expression_statement_emission() {
    let unit = compile("1 + 2");
    assert_eq!(
        disassemble(&unit),
        "0000 CONST 0\n0003 CONST 1\n0006 BINOP 0\n0008 POP\n"
    );
}

#[test]
fn test_constant_dedup() {
    let unit = compile("1 + 1 + 1");
    // A single Int(1) constant, referenced three times.
    assert_eq!(unit.constants.len(), 1);

    let unit = compile(r#"a := "x"; b := "x"; c := "y""#);
    assert_eq!(unit.constants.len(), 2);
}

#[test]
fn test_functions_are_not_deduped() {
    let unit = compile("a := func() { return 1 }; b := func() { return 1 }");
    let funcs = unit
        .constants
        .iter()
        .filter(|c| matches!(c, quill_core::Value::CompiledFunction(_)))
        .count();
    assert_eq!(funcs, 2);
}

#[test]
fn test_if_jump_patching() {
    let unit = compile("if true { 1 } else { 2 }");
    let jumps: Vec<(usize, Vec<usize>)> = iterate_instructions(&unit.main.instructions)
        .filter(|(_, op, _)| matches!(op, Opcode::Jump | Opcode::JumpFalsy))
        .map(|(at, _, operands)| (at, operands))
        .collect();
    assert_eq!(jumps.len(), 2);
    let code_len = unit.main.instructions.len();
    for (_, operands) in jumps {
        assert!(operands[0] <= code_len, "jump target in range");
        assert_ne!(operands[0], 0, "jump was patched");
    }
}

#[test]
fn test_loop_emits_backward_jump() {
    let unit = compile("for i := 0; i < 3; i += 1 { }");
    let backward = iterate_instructions(&unit.main.instructions)
        .any(|(at, op, operands)| op == Opcode::Jump && operands[0] <= at);
    assert!(backward, "loop closes with a backward jump:\n{}", disassemble(&unit));
}

#[test]
fn test_closure_captures() {
    let unit = compile(
        "f := func() { x := 1; return func() { return x } }",
    );
    // The outer function's body contains GetLocalPtr + Closure(_, 1).
    let outer = unit
        .constants
        .iter()
        .find_map(|c| match c {
            quill_core::Value::CompiledFunction(f)
                if iterate_instructions(&f.proto.instructions)
                    .any(|(_, op, _)| op == Opcode::GetLocalPtr) =>
            {
                Some(f)
            }
            _ => None,
        })
        .expect("outer function in pool");
    let closure = iterate_instructions(&outer.proto.instructions)
        .find(|(_, op, _)| *op == Opcode::Closure)
        .expect("closure instruction");
    assert_eq!(closure.2[1], 1, "one captured variable");
}

#[test]
fn test_for_in_lowering() {
    let unit = compile("for v in [1, 2] { }");
    let ops = opcodes(&unit);
    for expected in [
        Opcode::IteratorInit,
        Opcode::IteratorNext,
        Opcode::IteratorValue,
    ] {
        assert!(ops.contains(&expected), "missing {:?}", expected);
    }
    // Single-name form does not read keys.
    assert!(!ops.contains(&Opcode::IteratorKey));
}

#[test]
fn test_selector_lowers_to_index() {
    let unit = compile("m := {a: 1}; m.a");
    let ops = opcodes(&unit);
    assert!(ops.contains(&Opcode::IndexGet));
}

#[test]
fn test_source_map_is_sorted() {
    let unit = compile("a := 1\nb := 2\nc := a + b\n");
    let offsets: Vec<u32> = unit.main.source_map.iter().map(|(o, _)| *o).collect();
    let mut sorted = offsets.clone();
    sorted.sort_unstable();
    assert_eq!(offsets, sorted);
    assert!(!offsets.is_empty());
}

// ----------------------------------------------------------------------
// Compile errors
// ----------------------------------------------------------------------

#[test]
fn test_unresolved_reference() {
    let err = compile_err("out := nope");
    assert!(err.contains("unresolved reference 'nope'"), "{}", err);
}

#[test]
fn test_redefinition_in_same_scope() {
    let err = compile_err("a := 1; a := 2");
    assert!(err.contains("already defined"), "{}", err);
    // Shadowing in an inner block is allowed.
    compile("a := 1; { a := 2 }");
}

#[test]
fn test_break_outside_loop() {
    let err = compile_err("break");
    assert!(err.contains("break outside loop"), "{}", err);
}

#[test]
fn test_export_outside_module() {
    let err = compile_err("export 1");
    assert!(err.contains("export outside module"), "{}", err);
}

#[test]
fn test_return_outside_function() {
    let err = compile_err("return 1");
    assert!(err.contains("return outside function"), "{}", err);
}

#[test]
fn test_cannot_assign_to_builtin() {
    let err = compile_err("len = 1");
    assert!(err.contains("cannot assign to builtin"), "{}", err);
}

#[test]
fn test_compile_error_carries_position() {
    let err = compile_err("a := 1\nb := nope");
    assert!(err.contains("<test>:2"), "{}", err);
}
