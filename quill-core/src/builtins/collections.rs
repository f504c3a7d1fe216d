// quill-core - Collection built-ins for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! `len`, `copy`, `append`, `delete`, `splice`, `sort`, `reverse`,
//! `includes`, `indexof`, `lastindexof`, `range`.

use std::cmp::Ordering;

use crate::error::{Result, RuntimeError};
use crate::value::Value;

pub(super) fn builtin_len(args: &[Value]) -> Result<Value> {
    if args.len() != 1 {
        return Err(RuntimeError::WrongNumArguments);
    }
    let n = match &args[0] {
        Value::Array(a) => a.borrow().len(),
        Value::ImmutableArray(a) => a.len(),
        Value::Str(s) => s.borrow().text.len(),
        Value::Bytes(b) => b.borrow().len(),
        Value::Map(m) => m.borrow().len(),
        Value::ImmutableMap(m) => m.len(),
        other => {
            return Err(RuntimeError::invalid_argument(
                "first",
                "array/string/bytes/map",
                other.type_name(),
            ));
        }
    };
    Ok(Value::Int(n as i64))
}

pub(super) fn builtin_copy(args: &[Value]) -> Result<Value> {
    if args.len() != 1 {
        return Err(RuntimeError::WrongNumArguments);
    }
    Ok(args[0].copy_value())
}

/// `append(arr, items...)`: a fresh mutable array with the items
/// appended. Accepts an immutable array input.
pub(super) fn builtin_append(args: &[Value]) -> Result<Value> {
    if args.len() < 2 {
        return Err(RuntimeError::WrongNumArguments);
    }
    let mut out = match args[0].as_array_payload() {
        Some(payload) => payload,
        None => {
            return Err(RuntimeError::invalid_argument(
                "first",
                "array",
                args[0].type_name(),
            ));
        }
    };
    for item in &args[1..] {
        out.push_back(item.clone());
    }
    Ok(Value::array(out))
}

/// `delete(map, key)`: remove a string key.
pub(super) fn builtin_delete(args: &[Value]) -> Result<Value> {
    if args.len() != 2 {
        return Err(RuntimeError::WrongNumArguments);
    }
    match (&args[0], &args[1]) {
        (Value::Map(m), Value::Str(key)) => {
            m.borrow_mut().remove(&key.borrow().text);
            Ok(Value::Null)
        }
        (Value::Map(_), other) => Err(RuntimeError::invalid_argument(
            "second",
            "string",
            other.type_name(),
        )),
        (other, _) => Err(RuntimeError::invalid_argument(
            "first",
            "map",
            other.type_name(),
        )),
    }
}

/// `splice(arr[, start[, delete_count[, items...]]])`: remove (and
/// optionally replace) a range in place, returning the removed
/// elements.
pub(super) fn builtin_splice(args: &[Value]) -> Result<Value> {
    if args.is_empty() {
        return Err(RuntimeError::WrongNumArguments);
    }
    let Value::Array(payload) = &args[0] else {
        return Err(RuntimeError::invalid_argument(
            "first",
            "array",
            args[0].type_name(),
        ));
    };
    let len = payload.borrow().len();

    let start = match args.get(1) {
        None => 0,
        Some(Value::Int(v)) => {
            if *v < 0 || *v as usize > len {
                return Err(RuntimeError::IndexOutOfBounds);
            }
            *v as usize
        }
        Some(other) => {
            return Err(RuntimeError::invalid_argument(
                "second",
                "int",
                other.type_name(),
            ));
        }
    };

    let mut del_count = match args.get(2) {
        None => len,
        Some(Value::Int(v)) => {
            if *v < 0 {
                return Err(RuntimeError::IndexOutOfBounds);
            }
            *v as usize
        }
        Some(other) => {
            return Err(RuntimeError::invalid_argument(
                "third",
                "int",
                other.type_name(),
            ));
        }
    };
    // Deleting past the end only deletes what is there.
    if start + del_count > len {
        del_count = len - start;
    }

    let mut target = payload.borrow_mut();
    let mut tail = target.split_off(start);
    let rest = tail.split_off(del_count);
    let deleted = tail;
    for item in args.iter().skip(3) {
        target.push_back(item.clone());
    }
    target.append(rest);
    Ok(Value::array(deleted))
}

/// Ordering for `sort`: values of the same comparable type order
/// normally; any other pair reports `Equal`, so the stable sort
/// leaves unsupported elements where they were.
fn sort_ordering(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Str(x), Value::Str(y)) => x.borrow().text.cmp(&y.borrow().text),
        (Value::Bool(x), Value::Bool(y)) => y.cmp(x), // true sorts first
        (Value::Char(x), Value::Char(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

/// `sort(v)`: in-place for arrays and bytes; strings return a new
/// sorted string.
pub(super) fn builtin_sort(args: &[Value]) -> Result<Value> {
    if args.len() != 1 {
        return Err(RuntimeError::WrongNumArguments);
    }
    match &args[0] {
        Value::Array(payload) => {
            let mut elements: Vec<Value> = payload.borrow().iter().cloned().collect();
            elements.sort_by(sort_ordering);
            *payload.borrow_mut() = elements.into_iter().collect();
            Ok(args[0].clone())
        }
        Value::Str(s) => {
            let mut chars: Vec<char> = s.borrow().text.chars().collect();
            chars.sort_unstable();
            Ok(Value::string(chars.into_iter().collect::<String>()))
        }
        Value::Bytes(payload) => {
            payload.borrow_mut().sort_unstable();
            Ok(args[0].clone())
        }
        _ => Ok(Value::Null),
    }
}

/// `reverse(v)`: a reversed copy of an array, string or bytes.
pub(super) fn builtin_reverse(args: &[Value]) -> Result<Value> {
    if args.len() != 1 {
        return Err(RuntimeError::WrongNumArguments);
    }
    match &args[0] {
        Value::Array(a) => Ok(Value::array(a.borrow().iter().rev().cloned())),
        Value::Str(s) => Ok(Value::string(
            s.borrow().text.chars().rev().collect::<String>(),
        )),
        Value::Bytes(b) => {
            let mut out = b.borrow().clone();
            out.reverse();
            Ok(Value::bytes(out))
        }
        _ => Ok(Value::Null),
    }
}

/// `includes(container, item)`: membership test.
pub(super) fn builtin_includes(args: &[Value]) -> Result<Value> {
    if args.len() != 2 {
        return Err(RuntimeError::WrongNumArguments);
    }
    match &args[0] {
        Value::Map(_) | Value::ImmutableMap(_) => {
            let Value::Str(key) = &args[1] else {
                return Err(RuntimeError::invalid_argument(
                    "second",
                    "string",
                    args[1].type_name(),
                ));
            };
            let key = key.borrow().text.clone();
            let found = args[0]
                .as_map_payload()
                .map(|m| m.contains_key(&key))
                .unwrap_or(false);
            Ok(Value::Bool(found))
        }
        Value::Array(_) | Value::ImmutableArray(_) => {
            let payload = args[0].as_array_payload().unwrap();
            Ok(Value::Bool(payload.iter().any(|e| e.equals(&args[1]))))
        }
        Value::Str(s) => {
            let Value::Char(c) = &args[1] else {
                return Err(RuntimeError::invalid_argument(
                    "second",
                    "char",
                    args[1].type_name(),
                ));
            };
            Ok(Value::Bool(s.borrow().text.contains(*c)))
        }
        _ => Ok(Value::Bool(false)),
    }
}

/// `indexof(container, item)`: first index, or -1.
pub(super) fn builtin_indexof(args: &[Value]) -> Result<Value> {
    if args.len() != 2 {
        return Err(RuntimeError::WrongNumArguments);
    }
    match &args[0] {
        Value::Array(_) | Value::ImmutableArray(_) => {
            let payload = args[0].as_array_payload().unwrap();
            for (i, e) in payload.iter().enumerate() {
                if e.equals(&args[1]) {
                    return Ok(Value::Int(i as i64));
                }
            }
            Ok(Value::Int(-1))
        }
        Value::Str(s) => {
            let Value::Char(c) = &args[1] else {
                return Err(RuntimeError::invalid_argument(
                    "second",
                    "char",
                    args[1].type_name(),
                ));
            };
            // Byte offset, matching string length semantics.
            match s.borrow().text.find(*c) {
                Some(i) => Ok(Value::Int(i as i64)),
                None => Ok(Value::Int(-1)),
            }
        }
        other => Err(RuntimeError::invalid_argument(
            "first",
            "array or string",
            other.type_name(),
        )),
    }
}

/// `lastindexof(container, item)`: last index, or -1.
pub(super) fn builtin_lastindexof(args: &[Value]) -> Result<Value> {
    if args.len() != 2 {
        return Err(RuntimeError::WrongNumArguments);
    }
    match &args[0] {
        Value::Array(_) | Value::ImmutableArray(_) => {
            let payload = args[0].as_array_payload().unwrap();
            for (i, e) in payload.iter().enumerate().rev() {
                if e.equals(&args[1]) {
                    return Ok(Value::Int(i as i64));
                }
            }
            Ok(Value::Int(-1))
        }
        Value::Str(s) => {
            let Value::Char(c) = &args[1] else {
                return Err(RuntimeError::invalid_argument(
                    "second",
                    "char",
                    args[1].type_name(),
                ));
            };
            match s.borrow().text.rfind(*c) {
                Some(i) => Ok(Value::Int(i as i64)),
                None => Ok(Value::Int(-1)),
            }
        }
        other => Err(RuntimeError::invalid_argument(
            "first",
            "array or string",
            other.type_name(),
        )),
    }
}

/// `range(start, stop[, step])`: an Int array counting from `start`
/// toward `stop` (exclusive); the step must be positive and the
/// direction is inferred.
pub(super) fn builtin_range(args: &[Value]) -> Result<Value> {
    if args.len() < 2 || args.len() > 3 {
        return Err(RuntimeError::WrongNumArguments);
    }
    let mut bounds = [0i64; 3];
    for (i, arg) in args.iter().enumerate() {
        let Value::Int(v) = arg else {
            let name = ["start", "stop", "step"][i];
            return Err(RuntimeError::invalid_argument(
                name,
                "int",
                arg.type_name(),
            ));
        };
        if i == 2 && *v <= 0 {
            return Err(RuntimeError::InvalidRangeStep);
        }
        bounds[i] = *v;
    }
    let (start, stop) = (bounds[0], bounds[1]);
    let step = if args.len() == 3 { bounds[2] } else { 1 };

    let mut out = im::Vector::new();
    if start <= stop {
        let mut i = start;
        while i < stop {
            out.push_back(Value::Int(i));
            i += step;
        }
    } else {
        let mut i = start;
        while i > stop {
            out.push_back(Value::Int(i));
            i -= step;
        }
    }
    Ok(Value::array(out))
}
