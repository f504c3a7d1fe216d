// quill-core - Printing built-ins for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! `print` / `println` / `sysout` / `debug`.

use crate::convert::to_display_string;
use crate::error::{Result, RuntimeError};
use crate::pretty::to_pretty_string;
use crate::value::Value;

pub(super) fn builtin_print(args: &[Value]) -> Result<Value> {
    print!("{}", join_display(args, " "));
    Ok(Value::Null)
}

pub(super) fn builtin_println(args: &[Value]) -> Result<Value> {
    println!("{}", join_display(args, " "));
    Ok(Value::Null)
}

/// Raw output: no separators, no trailing newline.
pub(super) fn builtin_sysout(args: &[Value]) -> Result<Value> {
    print!("{}", join_display(args, ""));
    Ok(Value::Null)
}

/// `debug(...)` (VM-aware): cycle-aware pretty printing.
pub(super) fn builtin_debug(args: &[Value]) -> Result<Value> {
    if args.is_empty() {
        return Err(RuntimeError::WrongNumArguments);
    }
    // args[0] is the VM handle; debug does not need it beyond the
    // calling convention.
    let rendered: Vec<String> = args[1..].iter().map(to_pretty_string).collect();
    println!("{}", rendered.join(" "));
    Ok(Value::Null)
}

fn join_display(args: &[Value], sep: &str) -> String {
    args.iter()
        .map(to_display_string)
        .collect::<Vec<_>>()
        .join(sep)
}
