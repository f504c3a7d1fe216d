// quill-vm - Bytecode compiler and virtual machine for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! Lexical scoping for the compiler.
//!
//! Names resolve to one of four locations: globals (top level),
//! locals (function frames), builtins (the registry), or free
//! variables (closure captures). Block scopes share the enclosing
//! function's local index space; function scopes start a fresh one.
//!
//! When a name defined in an outer function is resolved from an
//! inner one, every function boundary in between records it as a
//! free variable, so capture indices stay stable and match the order
//! the VM binds cells in `Closure`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Where a resolved symbol lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    Global,
    Local,
    Builtin,
    Free,
}

/// A resolved name.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

/// One scope level. Use through [`SymbolTableRef`].
#[derive(Debug, Default)]
pub struct SymbolTable {
    parent: Option<SymbolTableRef>,
    /// Block scopes extend their function's index space instead of
    /// starting a new one.
    block: bool,
    store: HashMap<String, Symbol>,
    num_definitions: usize,
    max_definitions: usize,
    /// Outer symbols captured by this function, in capture order.
    free_symbols: Vec<Symbol>,
}

/// Shared handle to a scope.
pub type SymbolTableRef = Rc<RefCell<SymbolTable>>;

impl SymbolTable {
    /// Create the root (global) table.
    pub fn new() -> SymbolTableRef {
        Rc::new(RefCell::new(SymbolTable::default()))
    }

    /// Create a child scope. `block` scopes share the enclosing
    /// function's locals; non-block scopes start a function.
    pub fn fork(parent: &SymbolTableRef, block: bool) -> SymbolTableRef {
        Rc::new(RefCell::new(SymbolTable {
            parent: Some(Rc::clone(parent)),
            block,
            ..SymbolTable::default()
        }))
    }
}

/// Operations on a scope handle.
pub trait SymbolTableExt {
    /// Introduce `name` in this scope. Returns `None` when the name
    /// is already defined in the same scope.
    fn define(&self, name: &str) -> Option<Symbol>;
    /// Register a builtin symbol (root table only).
    fn define_builtin(&self, index: usize, name: &str) -> Symbol;
    /// Resolve `name`, recording free-variable captures as needed.
    fn resolve(&self, name: &str) -> Option<Symbol>;
    /// The parent scope, if any.
    fn parent(&self) -> Option<SymbolTableRef>;
    /// True when definitions here land in the globals area.
    fn is_global_scope(&self) -> bool;
    /// Next local index, accounting for enclosing block scopes.
    fn next_index(&self) -> usize;
    /// High-water mark of local slots for the current function.
    fn max_definitions(&self) -> usize;
    /// Free variables captured by the current function.
    fn free_symbols(&self) -> Vec<Symbol>;
}

impl SymbolTableExt for SymbolTableRef {
    fn define(&self, name: &str) -> Option<Symbol> {
        if self.borrow().store.contains_key(name) {
            return None;
        }
        let index = self.next_index();
        let scope = if self.is_global_scope() {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        };
        let symbol = Symbol {
            name: name.to_string(),
            scope,
            index,
        };
        {
            let mut table = self.borrow_mut();
            table.store.insert(name.to_string(), symbol.clone());
            table.num_definitions += 1;
        }
        update_max_definitions(self, index + 1);
        Some(symbol)
    }

    fn define_builtin(&self, index: usize, name: &str) -> Symbol {
        if let Some(parent) = self.parent() {
            return parent.define_builtin(index, name);
        }
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Builtin,
            index,
        };
        self.borrow_mut()
            .store
            .insert(name.to_string(), symbol.clone());
        symbol
    }

    fn resolve(&self, name: &str) -> Option<Symbol> {
        if let Some(symbol) = self.borrow().store.get(name) {
            return Some(symbol.clone());
        }
        let parent = self.parent()?;
        let symbol = parent.resolve(name)?;
        // Crossing a function boundary over a local (or an already
        // captured free variable) turns it into a capture here.
        let block = self.borrow().block;
        if !block && matches!(symbol.scope, SymbolScope::Local | SymbolScope::Free) {
            return Some(define_free(self, symbol));
        }
        Some(symbol)
    }

    fn parent(&self) -> Option<SymbolTableRef> {
        self.borrow().parent.as_ref().map(Rc::clone)
    }

    fn is_global_scope(&self) -> bool {
        let table = self.borrow();
        match &table.parent {
            None => true,
            Some(parent) => table.block && parent.is_global_scope(),
        }
    }

    fn next_index(&self) -> usize {
        let table = self.borrow();
        if table.block {
            table
                .parent
                .as_ref()
                .expect("block scope always has a parent")
                .next_index()
                + table.num_definitions
        } else {
            table.num_definitions
        }
    }

    fn max_definitions(&self) -> usize {
        self.borrow().max_definitions
    }

    fn free_symbols(&self) -> Vec<Symbol> {
        self.borrow().free_symbols.clone()
    }
}

/// Record `original` as a free variable of this function and return
/// the Free symbol the caller should use.
fn define_free(table: &SymbolTableRef, original: Symbol) -> Symbol {
    let mut t = table.borrow_mut();
    // Reuse an existing capture of the same name.
    if let Some(existing) = t.store.get(&original.name) {
        if existing.scope == SymbolScope::Free {
            return existing.clone();
        }
    }
    t.free_symbols.push(original.clone());
    let symbol = Symbol {
        name: original.name.clone(),
        scope: SymbolScope::Free,
        index: t.free_symbols.len() - 1,
    };
    t.store.insert(original.name, symbol.clone());
    symbol
}

/// Propagate the local-slot high-water mark to the function root, so
/// nested blocks reserve enough frame slots.
fn update_max_definitions(table: &SymbolTableRef, candidate: usize) {
    {
        let mut t = table.borrow_mut();
        if candidate > t.max_definitions {
            t.max_definitions = candidate;
        }
        if !t.block {
            return;
        }
    }
    if let Some(parent) = table.parent() {
        update_max_definitions(&parent, candidate);
    }
}
