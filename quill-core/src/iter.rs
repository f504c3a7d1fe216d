// quill-core - Iteration protocol for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! VM-internal iterators.
//!
//! An iterator is a finite, single-pass cursor over a snapshot of a
//! collection. Iterators are owned by the VM frame that opened them
//! and are never visible to user code.

use im::Vector;

use crate::value::Value;

/// Iteration state for each iterable variant.
#[derive(Debug)]
pub enum ValueIterator {
    /// Arrays and immutable arrays: snapshot + cursor.
    Array { items: Vector<Value>, index: usize },
    /// Strings iterate Unicode scalars.
    Str { chars: Vec<char>, index: usize },
    Bytes { bytes: Vec<u8>, index: usize },
    /// Maps iterate a key/value snapshot in key order.
    Map {
        entries: Vec<(String, Value)>,
        index: usize,
    },
    /// `null` iterates zero times.
    Empty,
}

impl ValueIterator {
    /// Open an iterator over `value`, or `None` if it is not
    /// iterable.
    pub fn open(value: &Value) -> Option<ValueIterator> {
        match value {
            Value::Array(a) => Some(ValueIterator::Array {
                items: a.borrow().clone(),
                index: 0,
            }),
            Value::ImmutableArray(a) => Some(ValueIterator::Array {
                items: (**a).clone(),
                index: 0,
            }),
            Value::Str(s) => Some(ValueIterator::Str {
                chars: s.borrow_mut().chars().to_vec(),
                index: 0,
            }),
            Value::Bytes(b) => Some(ValueIterator::Bytes {
                bytes: b.borrow().clone(),
                index: 0,
            }),
            Value::Map(m) => Some(ValueIterator::Map {
                entries: m
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
                index: 0,
            }),
            Value::ImmutableMap(m) => Some(ValueIterator::Map {
                entries: m.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                index: 0,
            }),
            Value::Null => Some(ValueIterator::Empty),
            _ => None,
        }
    }

    /// Advance the cursor; true while an element is available.
    pub fn next(&mut self) -> bool {
        match self {
            ValueIterator::Array { items, index } => advance(index, items.len()),
            ValueIterator::Str { chars, index } => advance(index, chars.len()),
            ValueIterator::Bytes { bytes, index } => advance(index, bytes.len()),
            ValueIterator::Map { entries, index } => advance(index, entries.len()),
            ValueIterator::Empty => false,
        }
    }

    /// The current key: an Int position for sequences, a String for
    /// maps. Only meaningful after `next` has returned true.
    pub fn key(&self) -> Value {
        let Some(current) = self.current() else {
            return Value::Null;
        };
        match self {
            ValueIterator::Array { .. }
            | ValueIterator::Str { .. }
            | ValueIterator::Bytes { .. } => Value::Int(current as i64),
            ValueIterator::Map { entries, .. } => entries
                .get(current)
                .map(|(k, _)| Value::string(k.clone()))
                .unwrap_or(Value::Null),
            ValueIterator::Empty => Value::Null,
        }
    }

    /// The current element. Only meaningful after `next` has
    /// returned true.
    pub fn value(&self) -> Value {
        let Some(current) = self.current() else {
            return Value::Null;
        };
        match self {
            ValueIterator::Array { items, .. } => {
                items.get(current).cloned().unwrap_or(Value::Null)
            }
            ValueIterator::Str { chars, .. } => chars
                .get(current)
                .map(|c| Value::Char(*c))
                .unwrap_or(Value::Null),
            ValueIterator::Bytes { bytes, .. } => bytes
                .get(current)
                .map(|b| Value::Int(*b as i64))
                .unwrap_or(Value::Null),
            ValueIterator::Map { entries, .. } => entries
                .get(current)
                .map(|(_, v)| v.clone())
                .unwrap_or(Value::Null),
            ValueIterator::Empty => Value::Null,
        }
    }

    fn current(&self) -> Option<usize> {
        let index = match self {
            ValueIterator::Array { index, .. }
            | ValueIterator::Str { index, .. }
            | ValueIterator::Bytes { index, .. }
            | ValueIterator::Map { index, .. } => *index,
            ValueIterator::Empty => 0,
        };
        index.checked_sub(1)
    }
}

/// Move the cursor one past the element being reported, so `key` and
/// `value` read at `index - 1`.
fn advance(index: &mut usize, len: usize) -> bool {
    if *index < len {
        *index += 1;
        true
    } else {
        false
    }
}
