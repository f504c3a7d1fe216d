// quill-core - Built-in function tests
// Copyright (c) 2025 The Quill Authors. MIT licensed.

use quill_core::{lookup_builtin, RuntimeError, Value};

fn call(name: &str, args: &[Value]) -> Result<Value, RuntimeError> {
    let (_, builtin) = lookup_builtin(name).unwrap_or_else(|| panic!("no builtin '{}'", name));
    (builtin.func)(args)
}

fn ok(name: &str, args: &[Value]) -> Value {
    call(name, args).unwrap_or_else(|e| panic!("{}: {}", name, e))
}

fn int(v: i64) -> Value {
    Value::Int(v)
}

#[test]
fn test_len() {
    assert!(ok("len", &[Value::array([int(1), int(2)])]).equals(&int(2)));
    assert!(ok("len", &[Value::string("héllo")]).equals(&int(6)));
    assert!(ok("len", &[Value::bytes(vec![0; 4])]).equals(&int(4)));
    assert!(ok("len", &[Value::map([("a".to_string(), int(1))])]).equals(&int(1)));
    assert!(matches!(
        call("len", &[int(1)]),
        Err(RuntimeError::InvalidArgumentType { .. })
    ));
    assert!(matches!(
        call("len", &[]),
        Err(RuntimeError::WrongNumArguments)
    ));
}

#[test]
fn test_append_returns_fresh_array() {
    let a = Value::array([int(1)]);
    let b = ok("append", &[a.clone(), int(2)]);
    assert!(ok("len", &[a.clone()]).equals(&int(1)));
    assert!(ok("len", &[b.clone()]).equals(&int(2)));
    assert!(b.index_get(&int(1)).unwrap().equals(&int(2)));

    // Immutable input produces a mutable array.
    let frozen = Value::immutable_array([int(1)]);
    let grown = ok("append", &[frozen, int(2)]);
    assert!(matches!(grown, Value::Array(_)));
}

#[test]
fn test_delete() {
    let m = Value::map([("a".to_string(), int(1)), ("b".to_string(), int(2))]);
    let r = ok("delete", &[m.clone(), Value::string("a")]);
    assert!(r.equals(&Value::Null));
    assert!(ok("len", &[m]).equals(&int(1)));
}

#[test]
fn test_splice() {
    // Remove the middle, insert replacements.
    let a = Value::array([int(1), int(2), int(3), int(4)]);
    let removed = ok("splice", &[a.clone(), int(1), int(2), int(8), int(9)]);
    assert_eq!(removed.to_string(), "[2, 3]");
    assert_eq!(a.to_string(), "[1, 8, 9, 4]");

    // delete_count past the end deletes only what is there.
    let a = Value::array([int(1), int(2)]);
    let removed = ok("splice", &[a.clone(), int(1), int(10)]);
    assert_eq!(removed.to_string(), "[2]");
    assert_eq!(a.to_string(), "[1]");

    // Without start/count, everything is removed.
    let a = Value::array([int(1), int(2)]);
    let removed = ok("splice", &[a.clone()]);
    assert_eq!(removed.to_string(), "[1, 2]");
    assert_eq!(a.to_string(), "[]");

    // Out-of-range start fails.
    let a = Value::array([int(1)]);
    assert!(matches!(
        call("splice", &[a.clone(), int(5)]),
        Err(RuntimeError::IndexOutOfBounds)
    ));
    assert!(matches!(
        call("splice", &[a, int(-1)]),
        Err(RuntimeError::IndexOutOfBounds)
    ));
}

#[test]
fn test_sort() {
    let a = Value::array([int(3), int(1), int(2)]);
    ok("sort", &[a.clone()]);
    assert_eq!(a.to_string(), "[1, 2, 3]");

    let s = ok("sort", &[Value::string("cba")]);
    assert_eq!(s.to_string(), "\"abc\"");

    let b = Value::bytes(vec![3, 1, 2]);
    ok("sort", &[b.clone()]);
    assert!(b.equals(&Value::bytes(vec![1, 2, 3])));

    // Heterogeneous arrays leave unsupported elements in place.
    let a = Value::array([int(2), Value::Null, int(1)]);
    ok("sort", &[a.clone()]);
    let payload = a.as_array_payload().unwrap();
    assert!(payload.iter().any(|v| matches!(v, Value::Null)));
    assert_eq!(payload.len(), 3);
}

#[test]
fn test_reverse() {
    assert_eq!(
        ok("reverse", &[Value::array([int(1), int(2), int(3)])]).to_string(),
        "[3, 2, 1]"
    );
    assert_eq!(ok("reverse", &[Value::string("abc")]).to_string(), "\"cba\"");
}

#[test]
fn test_membership_and_search() {
    let a = Value::array([int(1), int(2), int(2)]);
    assert!(ok("includes", &[a.clone(), int(2)]).equals(&Value::Bool(true)));
    assert!(ok("includes", &[a.clone(), int(9)]).equals(&Value::Bool(false)));
    assert!(ok("indexof", &[a.clone(), int(2)]).equals(&int(1)));
    assert!(ok("lastindexof", &[a.clone(), int(2)]).equals(&int(2)));
    assert!(ok("indexof", &[a, int(9)]).equals(&int(-1)));

    let m = Value::map([("k".to_string(), int(1))]);
    assert!(ok("includes", &[m, Value::string("k")]).equals(&Value::Bool(true)));

    let s = Value::string("hello");
    assert!(ok("includes", &[s.clone(), Value::Char('e')]).equals(&Value::Bool(true)));
    assert!(ok("indexof", &[s, Value::Char('l')]).equals(&int(2)));
}

#[test]
fn test_range() {
    assert_eq!(ok("range", &[int(0), int(5)]).to_string(), "[0, 1, 2, 3, 4]");
    assert_eq!(ok("range", &[int(0), int(10), int(3)]).to_string(), "[0, 3, 6, 9]");
    // Direction is inferred from start vs stop.
    assert_eq!(ok("range", &[int(5), int(0), int(2)]).to_string(), "[5, 3, 1]");
    assert_eq!(ok("range", &[int(3), int(3)]).to_string(), "[]");
    assert!(matches!(
        call("range", &[int(0), int(5), int(0)]),
        Err(RuntimeError::InvalidRangeStep)
    ));
    assert!(matches!(
        call("range", &[int(0), int(5), int(-2)]),
        Err(RuntimeError::InvalidRangeStep)
    ));
    assert!(matches!(
        call("range", &[int(0), Value::Float(1.0)]),
        Err(RuntimeError::InvalidArgumentType { .. })
    ));
}

#[test]
fn test_conversions_with_fallback() {
    assert!(ok("int", &[Value::string("42")]).equals(&int(42)));
    assert!(ok("int", &[Value::Float(3.9)]).equals(&int(3)));
    assert!(ok("int", &[Value::string("nope")]).equals(&Value::Null));
    assert!(ok("int", &[Value::string("nope"), int(-1)]).equals(&int(-1)));
    assert!(ok("int", &[]).equals(&int(0)));

    assert!(ok("float", &[Value::string("2.5")]).equals(&Value::Float(2.5)));
    assert!(ok("bool", &[int(0)]).equals(&Value::Bool(false)));
    assert!(ok("bool", &[Value::string("x")]).equals(&Value::Bool(true)));
    assert!(ok("char", &[int(97)]).equals(&Value::Char('a')));
    assert!(ok("string", &[int(7)]).equals(&Value::string("7")));
    assert!(ok("string", &[Value::string("s")]).equals(&Value::string("s")));

    let b = ok("bytes", &[int(3)]);
    assert!(b.equals(&Value::bytes(vec![0, 0, 0])));
    let b = ok("bytes", &[Value::string("ab")]);
    assert!(b.equals(&Value::bytes(vec![b'a', b'b'])));

    assert!(ok("rune", &[Value::Char('A')]).equals(&int(65)));
    assert!(ok("rune", &[Value::string("A")]).equals(&int(65)));

    let big = ok("bigint", &[Value::string("123456789012345678901234567890")]);
    assert_eq!(big.to_string(), "123456789012345678901234567890");
    let bf = ok("bigfloat", &[Value::string("1.5")]);
    assert_eq!(bf.to_string(), "1.5");

    let c = ok("complex", &[int(1), int(2)]);
    assert_eq!(c.to_string(), "(1+2i)");
}

#[test]
fn test_time_conversion() {
    let t = ok("time", &[int(0)]);
    assert!(matches!(t, Value::Time(_)));
    // Converting a time is the identity.
    let same = ok("time", &[t.clone()]);
    assert!(same.equals(&t));
}

#[test]
fn test_predicates() {
    assert!(ok("is_int", &[int(1)]).equals(&Value::Bool(true)));
    assert!(ok("is_int", &[Value::Float(1.0)]).equals(&Value::Bool(false)));
    assert!(ok("is_string", &[Value::string("")]).equals(&Value::Bool(true)));
    assert!(ok("is_null", &[Value::Null]).equals(&Value::Bool(true)));
    assert!(ok("is_error", &[Value::error(int(1))]).equals(&Value::Bool(true)));
    assert!(ok("is_array", &[Value::array([])]).equals(&Value::Bool(true)));
    assert!(
        ok("is_immutable_array", &[Value::immutable_array([])]).equals(&Value::Bool(true))
    );
    assert!(ok("is_iterable", &[Value::map([])]).equals(&Value::Bool(true)));
    assert!(ok("is_iterable", &[int(1)]).equals(&Value::Bool(false)));
    assert!(ok("is_callable", &[int(1)]).equals(&Value::Bool(false)));
}

#[test]
fn test_typeof() {
    assert_eq!(ok("typeof", &[int(1)]).to_string(), "\"int\"");
    assert_eq!(ok("typeof", &[Value::Null]).to_string(), "\"null\"");
    assert_eq!(
        ok("typeof", &[Value::immutable_map([])]).to_string(),
        "\"immutable-map\""
    );
}

#[test]
fn test_copy_builtin() {
    let a = Value::array([int(1)]);
    let b = ok("copy", &[a.clone()]);
    a.index_set(&int(0), int(9)).unwrap();
    assert!(b.index_get(&int(0)).unwrap().equals(&int(1)));
}

#[test]
fn test_format() {
    let r = ok(
        "format",
        &[Value::string("%s=%d (%05.1f)"), Value::string("x"), int(3), Value::Float(2.0)],
    );
    assert_eq!(r.to_string(), "\"x=3 (002.0)\"");

    let r = ok("format", &[Value::string("%d%%"), int(100)]);
    assert_eq!(r.to_string(), "\"100%\"");

    // Unknown verbs fail as error values.
    let r = ok("format", &[Value::string("%Z"), int(1)]);
    assert!(matches!(r, Value::Error(_)));

    // Missing argument fails as an error value too.
    let r = ok("format", &[Value::string("%d %d"), int(1)]);
    assert!(matches!(r, Value::Error(_)));
}

#[test]
fn test_is_cycle() {
    // Self-referential array.
    let a = Value::array([int(1)]);
    if let Value::Array(payload) = &a {
        payload.borrow_mut().push_back(a.clone());
    }
    assert!(ok("is_cycle", &[a]).equals(&Value::Bool(true)));

    // A DAG that shares a node is not a cycle.
    let shared = Value::array([int(1)]);
    let dag = Value::array([shared.clone(), shared]);
    assert!(ok("is_cycle", &[dag]).equals(&Value::Bool(false)));

    // Map containing itself.
    let m = Value::map([]);
    if let Value::Map(payload) = &m {
        payload.borrow_mut().insert("self".to_string(), m.clone());
    }
    assert!(ok("is_cycle", &[m]).equals(&Value::Bool(true)));

    assert!(matches!(
        call("is_cycle", &[int(1)]),
        Err(RuntimeError::InvalidArgumentType { .. })
    ));
}

#[test]
fn test_pointer_trio_without_vm() {
    // deref/set operate on detached cells without a VM.
    use quill_core::value::{new_cell, PointerValue};
    use std::rc::Rc;

    let p = Value::Pointer(Rc::new(PointerValue::new(new_cell(int(1)))));
    assert!(ok("deref", &[p.clone()]).equals(&int(1)));
    assert!(ok("set", &[p.clone(), int(9)]).equals(&int(9)));
    assert!(ok("deref", &[p.clone()]).equals(&int(9)));
    assert!(ok("is_pointer", &[p]).equals(&Value::Bool(true)));
    assert!(ok("is_pointer", &[int(1)]).equals(&Value::Bool(false)));

    assert!(matches!(
        call("deref", &[int(1)]),
        Err(RuntimeError::InvalidArgumentType { .. })
    ));
}
