// quill-core - Built-in functions for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! The built-in function registry.
//!
//! The registry is process-wide and read-only; the compiler assigns
//! builtin symbols by index into [`BUILTINS`], so the order here is
//! part of the compiled-unit contract.

mod collections;
mod conversions;
mod cycle;
mod pointers;
mod predicates;
mod printing;

use crate::error::{Result, RuntimeError};
use crate::format::format_values;
use crate::value::{BuiltinFunction, Value};

use collections::{
    builtin_append, builtin_copy, builtin_delete, builtin_includes, builtin_indexof,
    builtin_lastindexof, builtin_len, builtin_range, builtin_reverse, builtin_sort,
    builtin_splice,
};
use conversions::{
    builtin_bigfloat, builtin_bigint, builtin_bool, builtin_bytes, builtin_char,
    builtin_complex, builtin_float, builtin_int, builtin_rune, builtin_string, builtin_time,
};
use cycle::builtin_is_cycle;
use pointers::{builtin_deref, builtin_is_pointer, builtin_pointer, builtin_set};
use predicates::{
    builtin_is_array, builtin_is_bigfloat, builtin_is_bigint, builtin_is_bool,
    builtin_is_bytes, builtin_is_callable, builtin_is_char, builtin_is_complex,
    builtin_is_error, builtin_is_float, builtin_is_function, builtin_is_immutable_array,
    builtin_is_immutable_map, builtin_is_int, builtin_is_iterable, builtin_is_map,
    builtin_is_null, builtin_is_string, builtin_is_time, builtin_typeof,
};
use printing::{builtin_debug, builtin_print, builtin_println, builtin_sysout};

/// All built-in functions, in registration (index) order.
pub static BUILTINS: &[BuiltinFunction] = &[
    BuiltinFunction {
        name: "pointer",
        func: builtin_pointer,
        vm_aware: true,
    },
    BuiltinFunction {
        name: "deref",
        func: builtin_deref,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "set",
        func: builtin_set,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "is_pointer",
        func: builtin_is_pointer,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "debug",
        func: builtin_debug,
        vm_aware: true,
    },
    BuiltinFunction {
        name: "sysout",
        func: builtin_sysout,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "print",
        func: builtin_print,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "println",
        func: builtin_println,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "reverse",
        func: builtin_reverse,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "includes",
        func: builtin_includes,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "indexof",
        func: builtin_indexof,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "lastindexof",
        func: builtin_lastindexof,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "len",
        func: builtin_len,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "copy",
        func: builtin_copy,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "append",
        func: builtin_append,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "delete",
        func: builtin_delete,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "splice",
        func: builtin_splice,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "sort",
        func: builtin_sort,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "rune",
        func: builtin_rune,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "string",
        func: builtin_string,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "int",
        func: builtin_int,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "bigint",
        func: builtin_bigint,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "bool",
        func: builtin_bool,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "float",
        func: builtin_float,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "bigfloat",
        func: builtin_bigfloat,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "complex",
        func: builtin_complex,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "char",
        func: builtin_char,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "bytes",
        func: builtin_bytes,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "time",
        func: builtin_time,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "is_cycle",
        func: builtin_is_cycle,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "is_int",
        func: builtin_is_int,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "is_float",
        func: builtin_is_float,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "is_bigint",
        func: builtin_is_bigint,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "is_bigfloat",
        func: builtin_is_bigfloat,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "is_complex",
        func: builtin_is_complex,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "is_string",
        func: builtin_is_string,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "is_bool",
        func: builtin_is_bool,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "is_char",
        func: builtin_is_char,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "is_bytes",
        func: builtin_is_bytes,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "is_array",
        func: builtin_is_array,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "is_immutable_array",
        func: builtin_is_immutable_array,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "is_map",
        func: builtin_is_map,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "is_immutable_map",
        func: builtin_is_immutable_map,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "is_iterable",
        func: builtin_is_iterable,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "is_time",
        func: builtin_is_time,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "is_error",
        func: builtin_is_error,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "is_null",
        func: builtin_is_null,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "is_function",
        func: builtin_is_function,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "is_callable",
        func: builtin_is_callable,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "typeof",
        func: builtin_typeof,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "format",
        func: builtin_format,
        vm_aware: false,
    },
    BuiltinFunction {
        name: "range",
        func: builtin_range,
        vm_aware: false,
    },
];

/// Look up a builtin by name, returning its registry index.
pub fn lookup(name: &str) -> Option<(usize, &'static BuiltinFunction)> {
    BUILTINS
        .iter()
        .enumerate()
        .find(|(_, b)| b.name == name)
}

/// `format(fmt, ...args)`: printf-style formatting. Formatting
/// failures (unknown verb, argument mismatch) propagate as error
/// values, not runtime errors.
fn builtin_format(args: &[Value]) -> Result<Value> {
    if args.is_empty() {
        return Err(RuntimeError::WrongNumArguments);
    }
    let Value::Str(fmt) = &args[0] else {
        return Err(RuntimeError::invalid_argument(
            "format",
            "string",
            args[0].type_name(),
        ));
    };
    let fmt = fmt.borrow().text.clone();
    if args.len() == 1 {
        return Ok(args[0].clone());
    }
    match format_values(&fmt, &args[1..]) {
        Ok(s) => Ok(Value::string(s)),
        Err(e) => Ok(Value::error_msg(e.to_string())),
    }
}
