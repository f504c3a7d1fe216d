// quill-vm - Symbol table tests
// Copyright (c) 2025 The Quill Authors. MIT licensed.

use quill_vm::{SymbolScope, SymbolTable, SymbolTableExt};

#[test]
fn test_define_and_resolve_global() {
    let table = SymbolTable::new();
    let a = table.define("a").expect("fresh name");
    assert_eq!(a.scope, SymbolScope::Global);
    assert_eq!(a.index, 0);
    let b = table.define("b").expect("fresh name");
    assert_eq!(b.index, 1);

    let resolved = table.resolve("a").expect("resolves");
    assert_eq!(resolved, a);
    assert!(table.resolve("missing").is_none());
}

#[test]
fn test_redefinition_rejected() {
    let table = SymbolTable::new();
    table.define("a").expect("fresh name");
    assert!(table.define("a").is_none());
}

#[test]
fn test_builtin_symbols() {
    let table = SymbolTable::new();
    let b = table.define_builtin(7, "len");
    assert_eq!(b.scope, SymbolScope::Builtin);
    assert_eq!(b.index, 7);

    // Builtins registered at the root stay visible in children.
    let func = SymbolTable::fork(&table, false);
    let resolved = func.resolve("len").expect("resolves");
    assert_eq!(resolved.scope, SymbolScope::Builtin);
}

#[test]
fn test_block_scope_shares_local_index_space() {
    let root = SymbolTable::new();
    let func = SymbolTable::fork(&root, false);
    let a = func.define("a").expect("fresh");
    assert_eq!((a.scope, a.index), (SymbolScope::Local, 0));

    let block = SymbolTable::fork(&func, true);
    let b = block.define("b").expect("fresh");
    assert_eq!((b.scope, b.index), (SymbolScope::Local, 1));

    // Popping the block retires its names; the slot is reused.
    let block2 = SymbolTable::fork(&func, true);
    let c = block2.define("c").expect("fresh");
    assert_eq!(c.index, 1);

    // But the high-water mark covers every block.
    assert_eq!(func.max_definitions(), 2);
}

#[test]
fn test_top_level_blocks_define_globals() {
    let root = SymbolTable::new();
    let block = SymbolTable::fork(&root, true);
    let a = block.define("a").expect("fresh");
    assert_eq!(a.scope, SymbolScope::Global);
}

#[test]
fn test_free_variable_capture() {
    let root = SymbolTable::new();
    let outer = SymbolTable::fork(&root, false);
    outer.define("x").expect("fresh");

    let inner = SymbolTable::fork(&outer, false);
    let x = inner.resolve("x").expect("resolves");
    assert_eq!((x.scope, x.index), (SymbolScope::Free, 0));

    // Resolving again reuses the same capture slot.
    let again = inner.resolve("x").expect("resolves");
    assert_eq!(again.index, 0);
    assert_eq!(inner.free_symbols().len(), 1);
}

#[test]
fn test_transitive_capture_records_in_every_hop() {
    let root = SymbolTable::new();
    let level1 = SymbolTable::fork(&root, false);
    level1.define("x").expect("fresh");
    let level2 = SymbolTable::fork(&level1, false);
    let level3 = SymbolTable::fork(&level2, false);

    let x = level3.resolve("x").expect("resolves");
    assert_eq!(x.scope, SymbolScope::Free);

    // The middle function captured it too, as a local-of-parent.
    let mid_free = level2.free_symbols();
    assert_eq!(mid_free.len(), 1);
    assert_eq!(mid_free[0].scope, SymbolScope::Local);

    // The innermost captures the middle's capture.
    let inner_free = level3.free_symbols();
    assert_eq!(inner_free.len(), 1);
    assert_eq!(inner_free[0].scope, SymbolScope::Free);
}

#[test]
fn test_globals_are_not_captured() {
    let root = SymbolTable::new();
    root.define("g").expect("fresh");
    let func = SymbolTable::fork(&root, false);
    let g = func.resolve("g").expect("resolves");
    assert_eq!(g.scope, SymbolScope::Global);
    assert!(func.free_symbols().is_empty());
}
