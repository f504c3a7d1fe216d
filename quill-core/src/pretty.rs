// quill-core - Cycle-aware pretty printing for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! Indented, cycle-aware rendering used by the `debug` builtin.
//!
//! The visited set is keyed by container identity; re-entering a
//! container that is still being printed emits `<cycle-detected>`.

use std::collections::HashSet;

use crate::value::Value;

/// Render `value` with indentation and cycle markers.
pub fn to_pretty_string(value: &Value) -> String {
    let mut out = String::new();
    let mut visited = HashSet::new();
    write_pretty(&mut out, value, 0, &mut visited);
    out
}

fn write_pretty(out: &mut String, value: &Value, level: usize, visited: &mut HashSet<usize>) {
    let id = value.identity();
    if let Some(id) = id {
        if is_container(value) && !visited.insert(id) {
            out.push_str("<cycle-detected>");
            return;
        }
    }

    let indent = "  ".repeat(level);
    match value {
        Value::Map(m) => {
            let entries: Vec<(String, Value)> = m
                .borrow()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            write_map_entries(out, entries, &indent, level, visited);
        }
        Value::ImmutableMap(m) => {
            let entries: Vec<(String, Value)> =
                m.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            write_map_entries(out, entries, &indent, level, visited);
        }
        Value::Array(a) => {
            let elements: Vec<Value> = a.borrow().iter().cloned().collect();
            write_array_entries(out, elements, &indent, level, visited);
        }
        Value::ImmutableArray(a) => {
            let elements: Vec<Value> = a.iter().cloned().collect();
            write_array_entries(out, elements, &indent, level, visited);
        }
        Value::Char(c) => {
            out.push('\'');
            out.push(*c);
            out.push('\'');
        }
        other => out.push_str(&other.to_string()),
    }

    if let Some(id) = id {
        visited.remove(&id);
    }
}

fn is_container(value: &Value) -> bool {
    matches!(
        value,
        Value::Map(_) | Value::ImmutableMap(_) | Value::Array(_) | Value::ImmutableArray(_)
    )
}

fn write_map_entries(
    out: &mut String,
    entries: Vec<(String, Value)>,
    indent: &str,
    level: usize,
    visited: &mut HashSet<usize>,
) {
    if entries.is_empty() {
        out.push_str("{}");
        return;
    }
    out.push_str("{\n");
    let last = entries.len() - 1;
    for (i, (k, v)) in entries.into_iter().enumerate() {
        out.push_str(indent);
        out.push_str("  ");
        out.push_str(&k);
        out.push_str(": ");
        write_pretty(out, &v, level + 1, visited);
        if i != last {
            out.push_str(",\n");
        }
    }
    out.push('\n');
    out.push_str(indent);
    out.push('}');
}

fn write_array_entries(
    out: &mut String,
    elements: Vec<Value>,
    indent: &str,
    level: usize,
    visited: &mut HashSet<usize>,
) {
    if elements.is_empty() {
        out.push_str("[]");
        return;
    }
    out.push_str("[\n");
    let last = elements.len() - 1;
    for (i, e) in elements.iter().enumerate() {
        // Four elements per line.
        if i == 0 || i % 4 == 0 {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(indent);
            out.push_str("   ");
        }
        write_pretty(out, e, level + 1, visited);
        if i != last {
            out.push_str(", ");
        }
    }
    out.push('\n');
    out.push_str(indent);
    out.push(']');
}
