// quill-core - Pointer built-ins for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! `pointer` / `deref` / `set` / `is_pointer`.

use std::rc::Rc;

use crate::error::{Result, RuntimeError};
use crate::value::{new_cell, PointerValue, Value};

/// `pointer(x)` (VM-aware): a pointer to the global slot currently
/// holding `x`.
///
/// When `x` is not found in the globals area the pointer falls back
/// to a detached cell seeded with the value: `deref` and `set` still
/// work, but writes do not propagate to the original variable.
pub(super) fn builtin_pointer(args: &[Value]) -> Result<Value> {
    if args.len() != 2 {
        return Err(RuntimeError::WrongNumArguments);
    }
    let Value::VmHandle(vm) = &args[0] else {
        return Err(RuntimeError::custom("pointer: missing VM handle"));
    };
    let target = &args[1];
    let slot = match vm.0.find_global_cell(target) {
        Some(cell) => cell,
        None => new_cell(target.clone()),
    };
    Ok(Value::Pointer(Rc::new(PointerValue::new(slot))))
}

/// `deref(p)`: the value in the pointer's slot.
pub(super) fn builtin_deref(args: &[Value]) -> Result<Value> {
    if args.len() != 1 {
        return Err(RuntimeError::WrongNumArguments);
    }
    let Value::Pointer(p) = &args[0] else {
        return Err(RuntimeError::invalid_argument(
            "first",
            "pointer",
            args[0].type_name(),
        ));
    };
    Ok(p.slot.borrow().clone())
}

/// `set(p, v)`: write the pointer's slot and return the written
/// value.
pub(super) fn builtin_set(args: &[Value]) -> Result<Value> {
    if args.len() != 2 {
        return Err(RuntimeError::WrongNumArguments);
    }
    let Value::Pointer(p) = &args[0] else {
        return Err(RuntimeError::invalid_argument(
            "first",
            "pointer",
            args[0].type_name(),
        ));
    };
    *p.slot.borrow_mut() = args[1].clone();
    Ok(args[1].clone())
}

pub(super) fn builtin_is_pointer(args: &[Value]) -> Result<Value> {
    if args.len() != 1 {
        return Err(RuntimeError::WrongNumArguments);
    }
    Ok(Value::Bool(matches!(args[0], Value::Pointer(_))))
}
