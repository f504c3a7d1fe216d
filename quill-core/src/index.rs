// quill-core - Indexing semantics for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! `IndexGet` / `IndexSet`.
//!
//! String indices select named attributes on containers (`length`,
//! `push`); Int indices are positional. Out-of-range reads yield
//! `null`; out-of-range writes are errors.

use std::rc::Rc;

use crate::convert::{to_i64, to_raw_string};
use crate::error::{Result, RuntimeError};
use crate::value::Value;

impl Value {
    /// Read `self[index]`.
    pub fn index_get(&self, index: &Value) -> Result<Value> {
        match self {
            Value::Array(payload) => {
                if let Value::Str(s) = index {
                    return Ok(match s.borrow().text.as_str() {
                        "length" => Value::Int(payload.borrow().len() as i64),
                        "push" => array_push_method(Rc::clone(payload)),
                        _ => Value::Null,
                    });
                }
                let idx = require_int_index(index)?;
                let payload = payload.borrow();
                Ok(element_or_null(payload.get(checked_index(
                    idx,
                    payload.len(),
                ))))
            }
            Value::ImmutableArray(payload) => {
                if let Value::Str(s) = index {
                    return Ok(match s.borrow().text.as_str() {
                        "length" => Value::Int(payload.len() as i64),
                        _ => Value::Null,
                    });
                }
                let idx = require_int_index(index)?;
                Ok(element_or_null(
                    payload.get(checked_index(idx, payload.len())),
                ))
            }
            Value::Bytes(payload) => {
                if let Value::Str(s) = index {
                    return Ok(match s.borrow().text.as_str() {
                        "length" => Value::Int(payload.borrow().len() as i64),
                        _ => Value::Null,
                    });
                }
                let idx = require_int_index(index)?;
                let payload = payload.borrow();
                match payload.get(checked_index(idx, payload.len())) {
                    Some(b) => Ok(Value::Int(*b as i64)),
                    None => Ok(Value::Null),
                }
            }
            Value::Str(payload) => {
                if let Value::Str(s) = index {
                    return Ok(match s.borrow().text.as_str() {
                        "length" => Value::Int(payload.borrow().text.len() as i64),
                        _ => Value::Null,
                    });
                }
                let idx = require_int_index(index)?;
                let mut payload = payload.borrow_mut();
                let chars = payload.chars();
                match chars.get(checked_index(idx, chars.len())) {
                    Some(c) => Ok(Value::Char(*c)),
                    None => Ok(Value::Null),
                }
            }
            Value::Map(payload) => {
                let key = to_raw_string(index);
                Ok(payload.borrow().get(&key).cloned().unwrap_or(Value::Null))
            }
            Value::ImmutableMap(payload) => {
                let key = to_raw_string(index);
                Ok(payload.get(&key).cloned().unwrap_or(Value::Null))
            }
            Value::Error(inner) => {
                if to_raw_string(index) == "value" {
                    Ok((**inner).clone())
                } else {
                    Err(RuntimeError::InvalidIndexOnError)
                }
            }
            Value::Null => Ok(Value::Null),
            _ => Err(RuntimeError::NotIndexable),
        }
    }

    /// Write `self[index] = value`.
    pub fn index_set(&self, index: &Value, value: Value) -> Result<()> {
        match self {
            Value::Array(payload) => {
                let idx = to_i64(index).ok_or(RuntimeError::InvalidIndexType)?;
                let mut payload = payload.borrow_mut();
                let len = payload.len();
                if idx < 0 || idx as usize >= len {
                    return Err(RuntimeError::IndexOutOfBounds);
                }
                payload.set(idx as usize, value);
                Ok(())
            }
            Value::Bytes(payload) => {
                let idx = to_i64(index).ok_or(RuntimeError::InvalidIndexType)?;
                let mut payload = payload.borrow_mut();
                let len = payload.len();
                if idx < 0 || idx as usize >= len {
                    return Err(RuntimeError::IndexOutOfBounds);
                }
                let byte = match &value {
                    Value::Int(v) => *v,
                    Value::Char(c) => *c as i64,
                    Value::Float(v) => *v as i64,
                    _ => return Err(RuntimeError::InvalidIndexValueType),
                };
                if !(0..=255).contains(&byte) {
                    return Err(RuntimeError::ByteOutOfRange);
                }
                payload[idx as usize] = byte as u8;
                Ok(())
            }
            Value::Str(payload) => {
                let Value::Char(c) = value else {
                    return Err(RuntimeError::InvalidIndexValueType);
                };
                let idx = match index {
                    Value::Int(v) => *v,
                    _ => return Err(RuntimeError::InvalidIndexType),
                };
                if idx < 0 {
                    return Err(RuntimeError::IndexOutOfBounds);
                }
                payload.borrow_mut().set_char(idx as usize, c)
            }
            Value::Map(payload) => {
                let key = to_raw_string(index);
                payload.borrow_mut().insert(key, value);
                Ok(())
            }
            _ => Err(RuntimeError::NotIndexAssignable),
        }
    }
}

/// `array.push(...)`: a bound method appending in place and
/// returning the array.
fn array_push_method(payload: Rc<std::cell::RefCell<im::Vector<Value>>>) -> Value {
    Value::user_function("push", move |args: &[Value]| {
        let mut target = payload.borrow_mut();
        for arg in args {
            target.push_back(arg.clone());
        }
        drop(target);
        Ok(Value::Array(Rc::clone(&payload)))
    })
}

fn require_int_index(index: &Value) -> Result<i64> {
    match index {
        Value::Int(v) => Ok(*v),
        _ => Err(RuntimeError::InvalidIndexType),
    }
}

/// Map a possibly negative/overflowing index to an always-miss
/// sentinel so reads fall through to `null`.
fn checked_index(idx: i64, len: usize) -> usize {
    if idx < 0 {
        usize::MAX
    } else {
        let idx = idx as usize;
        if idx >= len {
            usize::MAX
        } else {
            idx
        }
    }
}

fn element_or_null(v: Option<&Value>) -> Value {
    v.cloned().unwrap_or(Value::Null)
}
