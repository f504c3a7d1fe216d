// quill-vm - Common test utilities
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! Shared helpers for quill-vm integration tests.
//!
//! Most tests compile a script, run it, and inspect the global named
//! `out`:
//!
//! ```ignore
//! let out = run_expect("out := 1 + 2");
//! assert!(out.equals(&Value::Int(3)));
//! ```

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::rc::Rc;

use quill_core::Value;
use quill_parser::{Parser, SourceFile};
use quill_vm::compiler::Compiler;
use quill_vm::{ModuleMap, SymbolTable, SymbolTableExt, SymbolTableRef, Unit, Vm};

/// Compile a script with the builtin registry and the given module
/// map. Returns the unit and the root symbol table for global
/// lookups.
pub fn compile_with_modules(
    src: &str,
    modules: ModuleMap,
) -> Result<(Unit, SymbolTableRef), String> {
    let source = Rc::new(SourceFile::new("<test>", src));
    let file = Parser::parse_file(src).map_err(|e| e.display_in(&source))?;

    let table = SymbolTable::new();
    for (index, builtin) in quill_core::BUILTINS.iter().enumerate() {
        table.define_builtin(index, builtin.name);
    }
    let compiler = Compiler::new(
        Rc::clone(&table),
        Vec::new(),
        Rc::new(modules),
        Rc::clone(&source),
    );
    let unit = compiler.compile(&file).map_err(|e| e.display_in(&source))?;
    Ok((unit, table))
}

/// Compile and run; on success returns the VM (for global reads) and
/// the symbol table.
pub fn run_script_with_modules(
    src: &str,
    modules: ModuleMap,
) -> Result<(Vm, SymbolTableRef), String> {
    let source = SourceFile::new("<test>", src);
    let (unit, table) = compile_with_modules(src, modules)?;
    let mut vm = Vm::with_unit(unit);
    vm.run().map_err(|e| e.display_in(&source))?;
    Ok((vm, table))
}

pub fn run_script(src: &str) -> Result<(Vm, SymbolTableRef), String> {
    run_script_with_modules(src, ModuleMap::new())
}

/// Run a script and read its `out` global.
pub fn run_expect(src: &str) -> Value {
    let (vm, table) = run_script(src).expect("script runs");
    read_global(&vm, &table, "out")
}

/// Run a script expected to fail at runtime; returns the rendered
/// error.
pub fn run_error(src: &str) -> String {
    match run_script(src) {
        Ok(_) => panic!("script unexpectedly succeeded"),
        Err(e) => e,
    }
}

/// Read a top-level global by name.
pub fn read_global(vm: &Vm, table: &SymbolTableRef, name: &str) -> Value {
    let symbol = table
        .resolve(name)
        .unwrap_or_else(|| panic!("global '{}' is not defined", name));
    vm.global(symbol.index)
        .unwrap_or_else(|| panic!("global '{}' was never set", name))
}

/// Shorthand: assert that `out` equals the expected rendering.
pub fn assert_out(src: &str, expected: &str) {
    let out = run_expect(src);
    assert_eq!(out.to_string(), expected, "script: {}", src);
}
