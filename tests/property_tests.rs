//! Property-based tests for the core round-trip guarantees.
//!
//! These complement the example-driven integration tests by pushing wide
//! ranges of generated inputs through encode-then-decode.

use std::collections::HashMap;

use proptest::prelude::*;
use serde::{de::DeserializeOwned, Serialize};
use serde_edn::{compact, from_str, to_string, Value};

fn roundtrip<T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug>(value: &T) -> bool {
    match to_string(value) {
        Ok(text) => match from_str::<T>(&text) {
            Ok(back) => *value == back,
            Err(e) => {
                eprintln!("decode failed: {e}\nencoded was: {text}");
                false
            }
        },
        Err(e) => {
            eprintln!("encode failed: {e}");
            false
        }
    }
}

proptest! {
    #[test]
    fn prop_i64(n in any::<i64>()) {
        prop_assert!(roundtrip(&n));
    }

    #[test]
    fn prop_u64(n in any::<u64>()) {
        prop_assert!(roundtrip(&n));
    }

    #[test]
    fn prop_bool(b in any::<bool>()) {
        prop_assert!(roundtrip(&b));
    }

    #[test]
    fn prop_finite_f64(
        f in proptest::num::f64::POSITIVE
            | proptest::num::f64::NEGATIVE
            | proptest::num::f64::NORMAL
            | proptest::num::f64::SUBNORMAL
            | proptest::num::f64::ZERO,
    ) {
        prop_assert!(roundtrip(&f));
    }

    #[test]
    fn prop_string(s in ".*") {
        prop_assert!(roundtrip(&s.to_string()));
    }

    #[test]
    fn prop_char(c in any::<char>()) {
        prop_assert!(roundtrip(&c));
    }

    #[test]
    fn prop_vec_i32(v in prop::collection::vec(any::<i32>(), 0..20)) {
        prop_assert!(roundtrip(&v));
    }

    #[test]
    fn prop_option_i32(opt in proptest::option::of(any::<i32>())) {
        prop_assert!(roundtrip(&opt));
    }

    #[test]
    fn prop_string_map(m in prop::collection::hash_map("[a-z]{1,8}", any::<i32>(), 0..8)) {
        prop_assert!(roundtrip::<HashMap<String, i32>>(&m));
    }

    #[test]
    fn prop_bytes(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let encoded = to_string(&Value::Bytes(bytes.clone())).unwrap();
        let back: Value = from_str(&encoded).unwrap();
        prop_assert_eq!(back, Value::Bytes(bytes));
    }

    #[test]
    fn prop_compact_idempotent(v in prop::collection::vec(any::<i32>(), 0..10)) {
        let text = to_string(&v).unwrap();
        let once = compact(text.as_bytes()).unwrap();
        let twice = compact(once.as_bytes()).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_discard_transparency(a in any::<i32>(), b in any::<i32>()) {
        let text = format!("#_ {a} {b}");
        let decoded: i32 = from_str(&text).unwrap();
        prop_assert_eq!(decoded, b);
    }
}
