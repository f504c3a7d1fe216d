// quill-core - Cycle detection built-in for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! `is_cycle`: depth-first reachability with a "currently
//! traversing" set. A value is cyclic when following container
//! references can re-enter a container still being traversed.

use std::collections::HashSet;

use crate::error::{Result, RuntimeError};
use crate::value::Value;

pub(super) fn builtin_is_cycle(args: &[Value]) -> Result<Value> {
    if args.len() != 1 {
        return Err(RuntimeError::WrongNumArguments);
    }
    match &args[0] {
        Value::Map(_) | Value::ImmutableMap(_) | Value::Array(_) | Value::ImmutableArray(_) => {
            let mut traversing = HashSet::new();
            let mut visited = HashSet::new();
            Ok(Value::Bool(dfs(&args[0], &mut traversing, &mut visited)))
        }
        other => Err(RuntimeError::invalid_argument(
            "first",
            "map, array, immutable-map, immutable-array",
            other.type_name(),
        )),
    }
}

fn dfs(value: &Value, traversing: &mut HashSet<usize>, visited: &mut HashSet<usize>) -> bool {
    let Some(id) = value.identity() else {
        return false;
    };
    let children: Vec<Value> = match value {
        Value::Map(m) => m.borrow().values().cloned().collect(),
        Value::ImmutableMap(m) => m.values().cloned().collect(),
        Value::Array(a) => a.borrow().iter().cloned().collect(),
        Value::ImmutableArray(a) => a.iter().cloned().collect(),
        _ => return false,
    };
    if traversing.contains(&id) {
        return true;
    }
    if visited.contains(&id) {
        return false;
    }
    traversing.insert(id);
    visited.insert(id);
    let cyclic = children.iter().any(|child| dfs(child, traversing, visited));
    traversing.remove(&id);
    cyclic
}
