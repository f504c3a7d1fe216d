// quill-core - Property tests for value-model laws
// Copyright (c) 2025 The Quill Authors. MIT licensed.

use proptest::prelude::*;

use quill_core::{lookup_builtin, Value};

fn call(name: &str, args: &[Value]) -> Value {
    let (_, builtin) = lookup_builtin(name).expect("builtin exists");
    (builtin.func)(args).expect("builtin call succeeds")
}

proptest! {
    /// len(append(a, v)) == len(a) + 1 and append(a, v)[len(a)] == v
    #[test]
    fn append_law(xs in prop::collection::vec(-1000i64..1000, 0..32), v in -1000i64..1000) {
        let a = Value::array(xs.iter().map(|x| Value::Int(*x)));
        let appended = call("append", &[a.clone(), Value::Int(v)]);

        let len_a = call("len", &[a]);
        let len_b = call("len", &[appended.clone()]);
        prop_assert!(len_b.equals(&Value::Int(xs.len() as i64 + 1)));
        prop_assert!(len_a.equals(&Value::Int(xs.len() as i64)));

        let last = appended.index_get(&Value::Int(xs.len() as i64)).unwrap();
        prop_assert!(last.equals(&Value::Int(v)));
    }

    /// range(s, e, k) has length ceil(|e - s| / k)
    #[test]
    fn range_length_law(s in -500i64..500, e in -500i64..500, k in 1i64..40) {
        let r = call("range", &[Value::Int(s), Value::Int(e), Value::Int(k)]);
        let len = call("len", &[r]);
        let expected = ((e - s).unsigned_abs() as i64 + k - 1) / k;
        prop_assert!(len.equals(&Value::Int(expected)), "range({}, {}, {})", s, e, k);
    }

    /// copy(copy(x)) == copy(x) deeply for non-reference values
    #[test]
    fn copy_idempotence(xs in prop::collection::vec(any::<i64>(), 0..16)) {
        let x = Value::array(xs.into_iter().map(Value::Int));
        let once = x.copy_value();
        let twice = once.copy_value();
        prop_assert!(once.equals(&twice));
        prop_assert!(x.equals(&once));
    }

    /// string(int(s)) == s for decimal-integer strings in Int range
    #[test]
    fn int_string_roundtrip(v in any::<i64>()) {
        let s = Value::string(v.to_string());
        let parsed = call("int", &[s.clone()]);
        let back = call("string", &[parsed]);
        prop_assert!(back.equals(&s));
    }

    /// Iterating a collection yields len(c) values with unique keys,
    /// and each key's index_get returns the paired value.
    #[test]
    fn iteration_law(xs in prop::collection::vec(-100i64..100, 0..24)) {
        use quill_core::ValueIterator;

        let c = Value::array(xs.iter().map(|x| Value::Int(*x)));
        let mut it = ValueIterator::open(&c).unwrap();
        let mut seen = Vec::new();
        while it.next() {
            let key = it.key();
            let value = it.value();
            prop_assert!(!seen.iter().any(|(k, _): &(Value, Value)| k.equals(&key)));
            prop_assert!(c.index_get(&key).unwrap().equals(&value));
            seen.push((key, value));
        }
        prop_assert_eq!(seen.len(), xs.len());
    }

    /// Dividing any Int by zero yields +Inf, never an error.
    #[test]
    fn div_by_zero_law(v in any::<i64>()) {
        use quill_parser::BinOp;
        let r = Value::Int(v).binary_op(BinOp::Quo, &Value::Int(0)).unwrap();
        prop_assert!(matches!(r, Value::Float(f) if f.is_infinite() && f > 0.0));
    }
}
