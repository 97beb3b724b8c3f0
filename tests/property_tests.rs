//! Property-based tests: round-trip guarantees over generated inputs, plus
//! cross-validation that every produced document is valid JSON according to
//! an independent parser.

use jsonbind::{from_str, to_string, Bind, Dynamic};
use proptest::prelude::*;

fn roundtrip<T: Bind + PartialEq + std::fmt::Debug>(value: &T) -> bool {
    match to_string(value) {
        Ok(serialized) => match from_str::<T>(&serialized) {
            Ok(deserialized) => *value == deserialized,
            Err(e) => {
                eprintln!("Deserialize failed: {}", e);
                eprintln!("Serialized was: {}", serialized);
                false
            }
        },
        Err(e) => {
            eprintln!("Serialize failed: {}", e);
            false
        }
    }
}

/// Arbitrary JSON documents, produced by an independent library.
fn arb_json() -> impl Strategy<Value = serde_json::Value> {
    let leaf = prop_oneof![
        Just(serde_json::Value::Null),
        any::<bool>().prop_map(serde_json::Value::from),
        any::<i64>().prop_map(serde_json::Value::from),
        any::<f64>()
            .prop_filter("finite", |f| f.is_finite())
            .prop_map(serde_json::Value::from),
        "[a-zA-Z0-9 \\\\\"\u{00e9}\u{4e16}]{0,12}".prop_map(serde_json::Value::from),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::from),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(|m| {
                serde_json::Value::Object(m.into_iter().collect())
            }),
        ]
    })
}

proptest! {
    #[test]
    fn prop_i64(n in any::<i64>()) {
        prop_assert!(roundtrip(&n));
    }

    #[test]
    fn prop_i32(n in any::<i32>()) {
        prop_assert!(roundtrip(&n));
    }

    #[test]
    fn prop_bool(b in any::<bool>()) {
        prop_assert!(roundtrip(&b));
    }

    #[test]
    fn prop_finite_f64(f in any::<f64>().prop_filter("finite", |f| f.is_finite())) {
        prop_assert!(roundtrip(&f));
    }

    #[test]
    fn prop_string(s in "\\PC*") {
        prop_assert!(roundtrip(&s));
    }

    #[test]
    fn prop_string_with_escapes(s in "[\\\\\"\n\r\t\u{0}-\u{1f}a-z]{0,20}") {
        prop_assert!(roundtrip(&s));
    }

    #[test]
    fn prop_vec_i64(v in prop::collection::vec(any::<i64>(), 0..20)) {
        prop_assert!(roundtrip(&v));
    }

    #[test]
    fn prop_option_i64(opt in proptest::option::of(any::<i64>())) {
        prop_assert!(roundtrip(&opt));
    }

    #[test]
    fn prop_nested_vec(v in prop::collection::vec(prop::collection::vec(any::<bool>(), 0..4), 0..6)) {
        prop_assert!(roundtrip(&v));
    }

    /// Any document another JSON library produces, we read into a dynamic
    /// value and re-encode to something that library parses back to the
    /// same document.
    #[test]
    fn prop_dynamic_agrees_with_reference_parser(doc in arb_json()) {
        let input = serde_json::to_string(&doc).unwrap();
        let value: Dynamic = from_str(&input).unwrap();
        let output = to_string(&value).unwrap();
        let reparsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        prop_assert_eq!(reparsed, doc);
    }

    /// Strings survive the writer's escaping under an independent parser.
    #[test]
    fn prop_string_output_is_valid_json(s in "\\PC*") {
        let json = to_string(&s).unwrap();
        let reparsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(reparsed, serde_json::Value::from(s));
    }
}
