// quill-core - Value model tests
// Copyright (c) 2025 The Quill Authors. MIT licensed.

use num_bigint::BigInt;
use quill_core::{RuntimeError, Value};
use quill_parser::BinOp;

fn int(v: i64) -> Value {
    Value::Int(v)
}

// ----------------------------------------------------------------------
// Binary operators & numeric promotion
// ----------------------------------------------------------------------

#[test]
fn test_int_arithmetic() {
    assert!(int(2).binary_op(BinOp::Add, &int(3)).unwrap().equals(&int(5)));
    assert!(int(2).binary_op(BinOp::Sub, &int(3)).unwrap().equals(&int(-1)));
    assert!(int(7).binary_op(BinOp::Quo, &int(2)).unwrap().equals(&int(3)));
    assert!(int(7).binary_op(BinOp::Rem, &int(3)).unwrap().equals(&int(1)));
    assert!(int(6).binary_op(BinOp::AndNot, &int(3)).unwrap().equals(&int(4)));
}

#[test]
fn test_int_float_promotion() {
    let r = int(1).binary_op(BinOp::Add, &Value::Float(2.5)).unwrap();
    assert!(matches!(r, Value::Float(v) if v == 3.5));
    let r = Value::Float(2.5).binary_op(BinOp::Mul, &int(2)).unwrap();
    assert!(matches!(r, Value::Float(v) if v == 5.0));
}

#[test]
fn test_bigint_promotion() {
    let big = Value::bigint(BigInt::from(1) << 70);
    let r = big.binary_op(BinOp::Add, &int(1)).unwrap();
    assert!(matches!(&r, Value::BigInt(_)));

    let r = int(3).binary_op(BinOp::Mul, &Value::bigint(BigInt::from(4))).unwrap();
    assert!(r.equals(&Value::bigint(BigInt::from(12))));

    // Floats truncate to their integer part when meeting a BigInt.
    let r = Value::Float(2.9)
        .binary_op(BinOp::Add, &Value::bigint(BigInt::from(1)))
        .unwrap();
    assert!(r.equals(&Value::bigint(BigInt::from(3))));
}

#[test]
fn test_division_by_zero_yields_infinity() {
    for lhs in [
        int(5),
        Value::Float(5.0),
        Value::bigint(BigInt::from(5)),
    ] {
        let r = lhs.binary_op(BinOp::Quo, &int(0)).unwrap();
        assert!(
            matches!(r, Value::Float(v) if v.is_infinite() && v > 0.0),
            "{:?} / 0",
            lhs
        );
    }
}

#[test]
fn test_char_ops() {
    let r = Value::Char('a').binary_op(BinOp::Add, &int(2)).unwrap();
    assert!(r.equals(&Value::Char('c')));
    let r = Value::Char('a').binary_op(BinOp::Less, &Value::Char('b')).unwrap();
    assert!(r.equals(&Value::Bool(true)));
}

#[test]
fn test_string_concat_stringifies_rhs() {
    let r = Value::string("v=").binary_op(BinOp::Add, &int(7)).unwrap();
    assert_eq!(r.to_string(), "\"v=7\"");
    let r = Value::string("ab").binary_op(BinOp::Add, &Value::string("cd")).unwrap();
    assert_eq!(r.to_string(), "\"abcd\"");
}

#[test]
fn test_bytes_concat() {
    let r = Value::bytes(vec![1, 2])
        .binary_op(BinOp::Add, &Value::bytes(vec![3]))
        .unwrap();
    assert!(r.equals(&Value::bytes(vec![1, 2, 3])));
}

#[test]
fn test_time_arithmetic() {
    let now = chrono::Local::now();
    let t = Value::Time(now);
    // time + int advances by nanoseconds
    let later = t.binary_op(BinOp::Add, &int(1_000_000_000)).unwrap();
    let diff = later.binary_op(BinOp::Sub, &t).unwrap();
    assert!(diff.equals(&int(1_000_000_000)));
    let r = t.binary_op(BinOp::Less, &later).unwrap();
    assert!(r.equals(&Value::Bool(true)));
}

#[test]
fn test_invalid_operator() {
    let err = Value::Bool(true).binary_op(BinOp::Add, &int(1)).unwrap_err();
    assert_eq!(err, RuntimeError::InvalidOperator);
    let err = Value::Null.binary_op(BinOp::Add, &int(1)).unwrap_err();
    assert_eq!(err, RuntimeError::InvalidOperator);
    let err = Value::string("a").binary_op(BinOp::Sub, &Value::string("b")).unwrap_err();
    assert_eq!(err, RuntimeError::InvalidOperator);
}

// ----------------------------------------------------------------------
// Equality & falsiness
// ----------------------------------------------------------------------

#[test]
fn test_no_cross_type_numeric_equality() {
    assert!(!int(1).equals(&Value::Float(1.0)));
    assert!(!int(1).equals(&Value::bigint(BigInt::from(1))));
}

#[test]
fn test_array_equals_immutable_array() {
    let a = Value::array([int(1), int(2)]);
    let b = Value::immutable_array([int(1), int(2)]);
    assert!(a.equals(&b));
    assert!(b.equals(&a));
}

#[test]
fn test_map_equality() {
    let a = Value::map([("k".to_string(), int(1))]);
    let b = Value::map([("k".to_string(), int(1))]);
    let c = Value::map([("k".to_string(), int(2))]);
    assert!(a.equals(&b));
    assert!(!a.equals(&c));
}

#[test]
fn test_error_equality_is_identity() {
    let a = Value::error(int(1));
    let b = Value::error(int(1));
    assert!(!a.equals(&b));
    assert!(a.equals(&a.clone()));
}

#[test]
fn test_falsiness() {
    assert!(Value::Null.is_falsy());
    assert!(int(0).is_falsy());
    assert!(!int(1).is_falsy());
    assert!(Value::Float(f64::NAN).is_falsy());
    // Only NaN is falsy for floats; zero is truthy.
    assert!(!Value::Float(0.0).is_falsy());
    assert!(Value::string("").is_falsy());
    assert!(!Value::string("x").is_falsy());
    assert!(Value::array([]).is_falsy());
    assert!(Value::error(int(1)).is_falsy());
    assert!(Value::Char('\0').is_falsy());
}

// ----------------------------------------------------------------------
// Deep copy
// ----------------------------------------------------------------------

#[test]
fn test_copy_is_deep() {
    let inner = Value::array([int(1)]);
    let outer = Value::array([inner.clone()]);
    let copied = outer.copy_value();

    // Mutating the original must not affect the copy.
    inner.index_set(&int(0), int(99)).unwrap();
    let copied_inner = copied.index_get(&int(0)).unwrap();
    assert!(copied_inner.index_get(&int(0)).unwrap().equals(&int(1)));
}

#[test]
fn test_copy_of_immutable_is_mutable() {
    let frozen = Value::immutable_array([int(1)]);
    let copied = frozen.copy_value();
    assert!(matches!(copied, Value::Array(_)));

    let frozen = Value::immutable_map([("k".to_string(), int(1))]);
    let copied = frozen.copy_value();
    assert!(matches!(copied, Value::Map(_)));
}

#[test]
fn test_copy_shares_closure_cells() {
    use quill_core::value::{new_cell, CompiledFunction, FuncProto};
    use std::rc::Rc;

    let cell = new_cell(int(1));
    let func = Value::CompiledFunction(Rc::new(CompiledFunction {
        proto: Rc::new(FuncProto {
            instructions: vec![],
            num_locals: 0,
            num_params: 0,
            variadic: false,
            source_map: vec![],
        }),
        free: vec![Rc::clone(&cell)],
    }));
    let copied = func.copy_value();
    *cell.borrow_mut() = int(2);
    let Value::CompiledFunction(copied) = copied else {
        panic!("copy changed the variant");
    };
    assert!(copied.free[0].borrow().equals(&int(2)));
}

// ----------------------------------------------------------------------
// Indexing
// ----------------------------------------------------------------------

#[test]
fn test_index_get() {
    let a = Value::array([int(10), int(20)]);
    assert!(a.index_get(&int(1)).unwrap().equals(&int(20)));
    assert!(a.index_get(&int(5)).unwrap().equals(&Value::Null));
    assert!(a.index_get(&int(-1)).unwrap().equals(&Value::Null));

    let s = Value::string("héllo");
    assert!(s.index_get(&int(1)).unwrap().equals(&Value::Char('é')));
    assert!(s.index_get(&int(99)).unwrap().equals(&Value::Null));

    let m = Value::map([("k".to_string(), int(1))]);
    assert!(m.index_get(&Value::string("k")).unwrap().equals(&int(1)));
    assert!(m.index_get(&Value::string("z")).unwrap().equals(&Value::Null));
}

#[test]
fn test_index_errors() {
    let a = Value::array([int(1)]);
    assert_eq!(
        a.index_get(&Value::Float(0.0)).unwrap_err(),
        RuntimeError::InvalidIndexType
    );
    assert_eq!(
        a.index_set(&int(5), int(0)).unwrap_err(),
        RuntimeError::IndexOutOfBounds
    );
    assert_eq!(
        int(1).index_get(&int(0)).unwrap_err(),
        RuntimeError::NotIndexable
    );
    assert_eq!(
        Value::immutable_array([int(1)])
            .index_set(&int(0), int(2))
            .unwrap_err(),
        RuntimeError::NotIndexAssignable
    );

    let e = Value::error(int(1));
    assert!(e.index_get(&Value::string("value")).unwrap().equals(&int(1)));
    assert_eq!(
        e.index_get(&Value::string("other")).unwrap_err(),
        RuntimeError::InvalidIndexOnError
    );
}

#[test]
fn test_bytes_index_set_range_check() {
    let b = Value::bytes(vec![0, 0]);
    b.index_set(&int(0), int(255)).unwrap();
    assert_eq!(
        b.index_set(&int(1), int(256)).unwrap_err(),
        RuntimeError::ByteOutOfRange
    );
    assert_eq!(
        b.index_set(&int(1), Value::string("x")).unwrap_err(),
        RuntimeError::InvalidIndexValueType
    );
}

// ----------------------------------------------------------------------
// Iteration
// ----------------------------------------------------------------------

#[test]
fn test_iteration_protocol() {
    use quill_core::ValueIterator;

    let a = Value::array([int(10), int(20)]);
    let mut it = ValueIterator::open(&a).unwrap();
    assert!(it.next());
    assert!(it.key().equals(&int(0)));
    assert!(it.value().equals(&int(10)));
    assert!(it.next());
    assert!(it.key().equals(&int(1)));
    assert!(it.value().equals(&int(20)));
    assert!(!it.next());

    // Maps iterate in key order.
    let m = Value::map([
        ("b".to_string(), int(2)),
        ("a".to_string(), int(1)),
    ]);
    let mut it = ValueIterator::open(&m).unwrap();
    assert!(it.next());
    assert_eq!(it.key().to_string(), "\"a\"");
    assert!(it.next());
    assert_eq!(it.key().to_string(), "\"b\"");
    assert!(!it.next());

    // null iterates zero times.
    let mut it = ValueIterator::open(&Value::Null).unwrap();
    assert!(!it.next());

    assert!(ValueIterator::open(&int(1)).is_none());
}

// ----------------------------------------------------------------------
// Display
// ----------------------------------------------------------------------

#[test]
fn test_display_conventions() {
    assert_eq!(Value::Bool(true).to_string(), "true");
    assert_eq!(Value::Null.to_string(), "null");
    assert_eq!(Value::Float(1.5).to_string(), "1.5");
    assert_eq!(Value::Float(f64::INFINITY).to_string(), "+Inf");
    assert_eq!(Value::Float(f64::NAN).to_string(), "NaN");
    assert_eq!(int(-3).to_string(), "-3");
    assert_eq!(Value::string("hi").to_string(), "\"hi\"");
    assert_eq!(Value::array([int(1), int(2)]).to_string(), "[1, 2]");
    assert_eq!(
        Value::map([("a".to_string(), int(1))]).to_string(),
        "{a: 1}"
    );
    assert_eq!(Value::error(int(1)).to_string(), "error: 1");
    assert_eq!(
        Value::bigint(BigInt::from(10).pow(25)).to_string(),
        "10000000000000000000000000"
    );
}
