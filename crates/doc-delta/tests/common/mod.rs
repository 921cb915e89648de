#![allow(dead_code)]

use doc_delta::{apply, Diff, EncodingMode, Value};
use proptest::prelude::*;

pub fn v(j: serde_json::Value) -> Value {
    Value::from(j)
}

/// Applies `diff` to `pre` and checks the result against `post`, field order
/// included.
pub fn assert_reproduces(pre: &Value, diff: Diff, post: &Value) {
    let out = apply(pre, &EncodingMode::Diff(diff)).expect("diff applies to its own pre-image");
    assert!(out.identical(post), "got {out:?}\nwant {post:?}");
}

// ── Strategies ────────────────────────────────────────────────────────────

pub fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::NULL),
        any::<bool>().prop_map(Value::from),
        (-50i64..50).prop_map(Value::from),
        // Quarter steps keep the text form short and exact.
        (-4000i64..4000).prop_map(|n| Value::from(n as f64 / 4.0)),
        "[a-z]{0,6}".prop_map(Value::from),
    ]
}

/// Arbitrary values. Field names come from a small alphabet so that two
/// independently drawn objects share fields often.
pub fn value() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::from),
            prop::collection::vec(("[a-f]", inner), 0..6)
                .prop_map(|fields| fields.into_iter().collect::<Value>()),
        ]
    })
}

pub fn object() -> impl Strategy<Value = Value> {
    prop::collection::vec(("[a-f]", value()), 0..8).prop_map(|fields| fields.into_iter().collect::<Value>())
}

pub fn array() -> impl Strategy<Value = Value> {
    prop::collection::vec(value(), 0..8).prop_map(Value::from)
}

/// Two documents of the same shape class.
pub fn doc_pair() -> impl Strategy<Value = (Value, Value)> {
    prop_oneof![(object(), object()), (array(), array())]
}
