// quill-core - Cross-type conversions for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! Lossy cross-type conversions used by the conversion builtins and
//! by indexing. Each returns `None` (or `false`) when the source
//! value has no sensible rendering in the target type.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Local, TimeZone};
use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::value::Value;

/// The raw text of a value: string/bytes content verbatim, display
/// form otherwise.
pub fn to_raw_string(v: &Value) -> String {
    match v {
        Value::Str(s) => s.borrow().text.clone(),
        Value::Bytes(b) => String::from_utf8_lossy(&b.borrow()).into_owned(),
        other => other.to_string(),
    }
}

/// Like [`to_raw_string`] but keeps the quoted form for bytes — used
/// by `print`-family builtins.
pub fn to_display_string(v: &Value) -> String {
    match v {
        Value::Str(s) => s.borrow().text.clone(),
        other => other.to_string(),
    }
}

pub fn to_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Int(v) => Some(*v),
        Value::Float(v) => Some(*v as i64),
        Value::BigInt(v) => v.to_i64(),
        Value::BigFloat(v) => v.to_f64().map(|f| f as i64),
        Value::Char(c) => Some(*c as i64),
        Value::Bool(b) => Some(if *b { 1 } else { 0 }),
        Value::Str(s) => i64::from_str(s.borrow().text.trim()).ok(),
        _ => None,
    }
}

pub fn to_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Int(v) => Some(*v as f64),
        Value::Float(v) => Some(*v),
        Value::BigInt(v) => v.to_f64(),
        Value::BigFloat(v) => v.to_f64(),
        Value::Str(s) => f64::from_str(s.borrow().text.trim()).ok(),
        _ => None,
    }
}

pub fn to_bigint(v: &Value) -> Option<BigInt> {
    match v {
        Value::Int(v) => Some(BigInt::from(*v)),
        Value::Float(v) => Some(BigInt::from(v.trunc() as i64)),
        Value::BigInt(v) => Some((**v).clone()),
        Value::BigFloat(v) => Some(v.with_scale(0).as_bigint_and_exponent().0),
        Value::Char(c) => Some(BigInt::from(*c as i64)),
        Value::Bool(b) => Some(BigInt::from(if *b { 1 } else { 0 })),
        Value::Str(s) => BigInt::from_str(s.borrow().text.trim()).ok(),
        _ => None,
    }
}

pub fn to_bigfloat(v: &Value) -> Option<BigDecimal> {
    match v {
        Value::Int(v) => Some(BigDecimal::from(*v)),
        Value::Float(v) => BigDecimal::try_from(*v).ok(),
        Value::BigInt(v) => Some(BigDecimal::from((**v).clone())),
        Value::BigFloat(v) => Some((**v).clone()),
        Value::Char(c) => Some(BigDecimal::from(*c as i64)),
        Value::Bool(b) => Some(BigDecimal::from(if *b { 1 } else { 0 })),
        Value::Str(s) => BigDecimal::from_str(s.borrow().text.trim()).ok(),
        _ => None,
    }
}

pub fn to_bool(v: &Value) -> bool {
    !v.is_falsy()
}

pub fn to_char(v: &Value) -> Option<char> {
    match v {
        Value::Int(v) => char::from_u32(*v as u32),
        Value::Char(c) => Some(*c),
        _ => None,
    }
}

/// A byte-slice rendering: bytes/strings verbatim, ints and chars as
/// their UTF-8 encoding, arrays elementwise (unconvertible elements
/// contribute a zero byte).
pub fn to_byte_slice(v: &Value) -> Option<Vec<u8>> {
    match v {
        Value::Bytes(b) => Some(b.borrow().clone()),
        Value::Str(s) => Some(s.borrow().text.as_bytes().to_vec()),
        Value::Int(i) => {
            let c = char::from_u32(*i as u32)?;
            Some(c.to_string().into_bytes())
        }
        Value::Char(c) => Some(c.to_string().into_bytes()),
        Value::Array(a) => {
            let mut out = Vec::new();
            for e in a.borrow().iter() {
                match to_byte_slice(e) {
                    Some(b) => out.extend_from_slice(&b),
                    None => out.push(0),
                }
            }
            Some(out)
        }
        _ => None,
    }
}

/// Times convert from times and from Unix-second ints.
pub fn to_time(v: &Value) -> Option<DateTime<Local>> {
    match v {
        Value::Time(t) => Some(*t),
        Value::Int(secs) => Local.timestamp_opt(*secs, 0).single(),
        _ => None,
    }
}
