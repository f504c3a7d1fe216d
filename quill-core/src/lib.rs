// quill-core - Value model, runtime errors and built-ins for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! The Quill runtime core: the value universe, its operations, and
//! the built-in function set.
//!
//! The bytecode compiler and VM live in `quill-vm`; this crate is the
//! layer both of them (and the standard library) build on.

pub mod builtins;
pub mod convert;
pub mod error;
pub mod format;
pub mod index;
pub mod iter;
pub mod ops;
pub mod pretty;
pub mod value;
pub mod vm_access;

pub use builtins::{lookup as lookup_builtin, BUILTINS};
pub use error::{Result, RuntimeError};
pub use iter::ValueIterator;
pub use value::{
    new_cell, BuiltinFunction, CellRef, CompiledFunction, FuncProto, PointerValue, StrValue,
    UserFunction, Value, MAX_BYTES_LEN, MAX_STRING_LEN,
};
pub use vm_access::{VmAccess, VmHandle};
