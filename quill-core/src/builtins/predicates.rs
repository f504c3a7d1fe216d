// quill-core - Type predicate built-ins for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! `is_*` predicates and `typeof`.

use crate::error::{Result, RuntimeError};
use crate::value::Value;

fn one_arg(args: &[Value]) -> Result<&Value> {
    if args.len() != 1 {
        return Err(RuntimeError::WrongNumArguments);
    }
    Ok(&args[0])
}

macro_rules! predicate {
    ($name:ident, $pattern:pat) => {
        pub(super) fn $name(args: &[Value]) -> Result<Value> {
            Ok(Value::Bool(matches!(one_arg(args)?, $pattern)))
        }
    };
}

predicate!(builtin_is_int, Value::Int(_));
predicate!(builtin_is_float, Value::Float(_));
predicate!(builtin_is_bigint, Value::BigInt(_));
predicate!(builtin_is_bigfloat, Value::BigFloat(_));
predicate!(builtin_is_complex, Value::Complex(_));
predicate!(builtin_is_string, Value::Str(_));
predicate!(builtin_is_bool, Value::Bool(_));
predicate!(builtin_is_char, Value::Char(_));
predicate!(builtin_is_bytes, Value::Bytes(_));
predicate!(builtin_is_array, Value::Array(_));
predicate!(builtin_is_immutable_array, Value::ImmutableArray(_));
predicate!(builtin_is_map, Value::Map(_));
predicate!(builtin_is_immutable_map, Value::ImmutableMap(_));
predicate!(builtin_is_time, Value::Time(_));
predicate!(builtin_is_error, Value::Error(_));
predicate!(builtin_is_null, Value::Null);
predicate!(builtin_is_function, Value::CompiledFunction(_));

pub(super) fn builtin_is_callable(args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(one_arg(args)?.can_call()))
}

pub(super) fn builtin_is_iterable(args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(one_arg(args)?.can_iterate()))
}

pub(super) fn builtin_typeof(args: &[Value]) -> Result<Value> {
    Ok(Value::string(one_arg(args)?.type_name().into_owned()))
}
