// quill-vm - Bytecode compiler and virtual machine for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! The Quill bytecode compiler and stack virtual machine.
//!
//! Compilation: an AST from `quill-parser` is walked by
//! [`compiler::Compiler`], producing a [`bytecode::Unit`] (flat
//! instruction buffer + constant pool + main-function metadata).
//! Execution: [`vm::Vm`] runs a unit over a globals area, dispatching
//! through the value model in `quill-core`.

pub mod bytecode;
pub mod compiler;
pub mod frame;
pub mod module_map;
pub mod opcode;
pub mod symbol_table;
pub mod vm;

pub use bytecode::Unit;
pub use compiler::{CompileError, Compiler, SOURCE_FILE_EXT};
pub use module_map::{Module, ModuleMap};
pub use opcode::Opcode;
pub use symbol_table::{Symbol, SymbolScope, SymbolTable, SymbolTableExt, SymbolTableRef};
pub use vm::{Vm, VmError, GLOBALS_SIZE, MAX_FRAMES, STACK_SIZE};
