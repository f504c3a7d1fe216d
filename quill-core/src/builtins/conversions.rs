// quill-core - Conversion built-ins for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! Type conversion builtins. Each takes one argument plus an
//! optional fallback returned when the conversion fails; with no
//! fallback a failed conversion yields `null`. Zero arguments yield
//! the type's zero value.

use bigdecimal::BigDecimal;
use chrono::Local;
use num_bigint::BigInt;
use num_complex::Complex64;

use crate::convert::{
    to_bigfloat, to_bigint, to_bool, to_byte_slice, to_char, to_f64, to_i64, to_raw_string,
    to_time,
};
use crate::error::{Result, RuntimeError};
use crate::value::{Value, MAX_BYTES_LEN};

/// Fallback-or-null for a failed conversion.
fn fallback(args: &[Value]) -> Value {
    args.get(1).cloned().unwrap_or(Value::Null)
}

pub(super) fn builtin_string(args: &[Value]) -> Result<Value> {
    match args.len() {
        0 => Ok(Value::string("")),
        1 => Ok(Value::string(to_raw_string(&args[0]))),
        _ => Err(RuntimeError::WrongNumArguments),
    }
}

pub(super) fn builtin_int(args: &[Value]) -> Result<Value> {
    match args.len() {
        0 => Ok(Value::Int(0)),
        1 | 2 => {
            if let Value::Int(_) = args[0] {
                return Ok(args[0].clone());
            }
            match to_i64(&args[0]) {
                Some(v) => Ok(Value::Int(v)),
                None => Ok(fallback(args)),
            }
        }
        _ => Err(RuntimeError::WrongNumArguments),
    }
}

pub(super) fn builtin_float(args: &[Value]) -> Result<Value> {
    match args.len() {
        0 => Ok(Value::Float(0.0)),
        1 | 2 => {
            if let Value::Float(_) = args[0] {
                return Ok(args[0].clone());
            }
            match to_f64(&args[0]) {
                Some(v) => Ok(Value::Float(v)),
                None => Ok(fallback(args)),
            }
        }
        _ => Err(RuntimeError::WrongNumArguments),
    }
}

pub(super) fn builtin_bigint(args: &[Value]) -> Result<Value> {
    match args.len() {
        0 => Ok(Value::bigint(BigInt::from(0))),
        1 => match to_bigint(&args[0]) {
            Some(v) => Ok(Value::bigint(v)),
            None => Ok(Value::Null),
        },
        _ => Err(RuntimeError::WrongNumArguments),
    }
}

pub(super) fn builtin_bigfloat(args: &[Value]) -> Result<Value> {
    match args.len() {
        0 => Ok(Value::bigfloat(BigDecimal::from(0))),
        1 => match to_bigfloat(&args[0]) {
            Some(v) => Ok(Value::bigfloat(v)),
            None => Ok(Value::Null),
        },
        _ => Err(RuntimeError::WrongNumArguments),
    }
}

pub(super) fn builtin_complex(args: &[Value]) -> Result<Value> {
    if args.len() != 2 {
        return Err(RuntimeError::WrongNumArguments);
    }
    let re = to_f64(&args[0]).unwrap_or(0.0);
    let im = to_f64(&args[1]).unwrap_or(0.0);
    Ok(Value::Complex(Complex64::new(re, im)))
}

pub(super) fn builtin_bool(args: &[Value]) -> Result<Value> {
    if args.len() != 1 {
        return Err(RuntimeError::WrongNumArguments);
    }
    if let Value::Bool(_) = args[0] {
        return Ok(args[0].clone());
    }
    Ok(Value::Bool(to_bool(&args[0])))
}

pub(super) fn builtin_char(args: &[Value]) -> Result<Value> {
    match args.len() {
        0 => Ok(Value::Char('\0')),
        1 | 2 => {
            if let Value::Char(_) = args[0] {
                return Ok(args[0].clone());
            }
            match to_char(&args[0]) {
                Some(c) => Ok(Value::Char(c)),
                None => Ok(fallback(args)),
            }
        }
        _ => Err(RuntimeError::WrongNumArguments),
    }
}

pub(super) fn builtin_bytes(args: &[Value]) -> Result<Value> {
    match args.len() {
        0 => Ok(Value::bytes(Vec::new())),
        1 => {
            // bytes(n) allocates n zero bytes.
            if let Value::Int(n) = args[0] {
                if n < 0 || n as usize > MAX_BYTES_LEN {
                    return Err(RuntimeError::BytesLimit);
                }
                return Ok(Value::bytes(vec![0u8; n as usize]));
            }
            match to_byte_slice(&args[0]) {
                Some(v) => {
                    if v.len() > MAX_BYTES_LEN {
                        return Err(RuntimeError::BytesLimit);
                    }
                    Ok(Value::bytes(v))
                }
                None => Ok(Value::Null),
            }
        }
        _ => {
            // bytes(a, b, ...) concatenates the byte renderings.
            let mut out = Vec::new();
            for arg in args {
                let Some(b) = to_byte_slice(arg) else {
                    return Err(RuntimeError::invalid_argument(
                        "argument",
                        "bytes",
                        arg.type_name(),
                    ));
                };
                out.extend_from_slice(&b);
            }
            if out.len() > MAX_BYTES_LEN {
                return Err(RuntimeError::BytesLimit);
            }
            Ok(Value::bytes(out))
        }
    }
}

pub(super) fn builtin_time(args: &[Value]) -> Result<Value> {
    match args.len() {
        0 => Ok(Value::Time(Local::now())),
        1 | 2 => {
            if let Value::Time(_) = args[0] {
                return Ok(args[0].clone());
            }
            match to_time(&args[0]) {
                Some(t) => Ok(Value::Time(t)),
                None => Ok(fallback(args)),
            }
        }
        _ => Err(RuntimeError::WrongNumArguments),
    }
}

/// `rune(v)`: the Unicode scalar value of a char or one-character
/// string.
pub(super) fn builtin_rune(args: &[Value]) -> Result<Value> {
    if args.len() != 1 {
        return Err(RuntimeError::WrongNumArguments);
    }
    match &args[0] {
        Value::Char(c) => Ok(Value::Int(*c as i64)),
        Value::Str(s) => {
            let s = s.borrow();
            match s.text.chars().next() {
                Some(c) => Ok(Value::Int(c as i64)),
                None => Err(RuntimeError::invalid_argument(
                    "first",
                    "char or string of length 1",
                    "empty string",
                )),
            }
        }
        other => Err(RuntimeError::invalid_argument(
            "first",
            "char or string of length 1",
            other.type_name(),
        )),
    }
}
