//! End-to-end mutation scenarios: compute, select, encode, decode, apply.

mod common;

use common::{assert_reproduces, v};
use doc_delta::codec::json::{decode, encode};
use doc_delta::{
    apply, apply_entry, build_entry, compute, make_mode, Change, CodecOptions, DeltaOptions, Diff,
    DiffOptions, EncodingMode,
};
use serde_json::json;

fn pipeline(pre: &doc_delta::Value, post: &doc_delta::Value) -> EncodingMode {
    let mode = make_mode(pre, post, &DiffOptions::default());
    let decoded = decode(&encode(&mode).unwrap()).unwrap();
    assert_eq!(decoded, mode);
    let out = apply(pre, &decoded).unwrap();
    assert!(out.identical(post), "got {out:?}\nwant {post:?}");
    mode
}

#[test]
fn delete_every_field() {
    let pre = v(json!({"x": 3, "y": 3}));
    let post = v(json!({}));
    let Some(Diff::Object(d)) = compute(&pre, &post) else {
        panic!("expected object diff");
    };
    let deletes: Vec<&str> = d.deletes.iter().map(String::as_str).collect();
    assert_eq!(deletes, ["x", "y"]);
    assert_reproduces(&pre, Diff::Object(d), &post);

    // `{}` is cheaper to write out than any diff.
    assert_eq!(pipeline(&pre, &post), EncodingMode::Replace(post));
}

#[test]
fn nested_field_update() {
    let pre = v(json!({"subObj": {"a": 1, "b": 2}}));
    let post = v(json!({"subObj": {"a": "foo", "b": 2}}));
    let Some(Diff::Object(d)) = compute(&pre, &post) else {
        panic!("expected object diff");
    };
    let Some(Change::Diff(Diff::Object(inner))) = d.updates.get("subObj") else {
        panic!("expected nested diff");
    };
    assert_eq!(inner.updates.get("a"), Some(&Change::Replace(v(json!("foo")))));
    assert!(inner.deletes.is_empty() && inner.inserts.is_empty());
    assert_reproduces(&pre, Diff::Object(d), &post);
    pipeline(&pre, &post);
}

#[test]
fn array_element_update() {
    let pre = v(json!({"a": [1, 2, 3, 4, 5]}));
    let post = v(json!({"a": [1, 2, 999, 4, 5]}));
    let Some(Diff::Object(d)) = compute(&pre, &post) else {
        panic!("expected object diff");
    };
    let Some(Change::Diff(Diff::Array(arr))) = d.updates.get("a") else {
        panic!("expected array diff");
    };
    assert_eq!(arr.positional, vec![(2, Change::Replace(v(json!(999))))]);
    assert_eq!(arr.truncate_to, None);
    assert!(arr.append.is_empty());
    pipeline(&pre, &post);
}

#[test]
fn array_truncate() {
    let pre = v(json!({"a": [1, 2, 3]}));
    let post = v(json!({"a": [1, 2]}));
    let Some(Diff::Object(d)) = compute(&pre, &post) else {
        panic!("expected object diff");
    };
    let Some(Change::Diff(Diff::Array(arr))) = d.updates.get("a") else {
        panic!("expected array diff");
    };
    assert_eq!(arr.truncate_to, Some(2));
    assert!(arr.positional.is_empty());
    pipeline(&pre, &post);
}

#[test]
fn unrelated_rewrite_replaces() {
    let pre = v(json!({"x": "foo", "subObj": {"a": 1, "b": 2}}));
    let post = v(json!({"newField": "a value that is much longer than everything it replaces, 很长很长"}));
    assert_eq!(pipeline(&pre, &post), EncodingMode::Replace(post));
}

#[test]
fn reorder_beats_rewriting_padding() {
    let padding = "p".repeat(4096);
    let pre = v(json!({"padding": padding, "x": "foo", "y": "bar"}));
    let post = v(json!({"padding": padding, "y": "bar", "x": "foo"}));
    let EncodingMode::Diff(Diff::Object(d)) = pipeline(&pre, &post) else {
        panic!("expected object diff");
    };
    assert!(d.updates.is_empty() && d.inserts.is_empty() && d.deletes.is_empty());
    assert_eq!(
        d.reorder,
        Some(vec!["padding".to_string(), "y".to_string(), "x".to_string()])
    );
}

#[test]
fn shape_change_is_replace() {
    let pre = v(json!({"a": 1}));
    let post = v(json!([1]));
    assert_eq!(compute(&pre, &post), None);
    assert_eq!(pipeline(&pre, &post), EncodingMode::Replace(post));
}

#[test]
fn nested_unrelated_object_is_replaced() {
    let padding = "p".repeat(2000);
    let pre = v(json!({"pad": padding, "sub": {"alpha": 1, "beta": 2, "gamma": 3, "delta": 4}}));
    let post = v(json!({"pad": padding, "sub": {"z": 9}}));
    let EncodingMode::Diff(Diff::Object(d)) = pipeline(&pre, &post) else {
        panic!("expected object diff");
    };
    assert!(d.deletes.is_empty() && d.inserts.is_empty() && d.reorder.is_none());
    assert_eq!(d.updates.len(), 1);
    assert_eq!(d.updates["sub"], Change::Replace(v(json!({"z": 9}))));
}

#[test]
fn nested_shape_change_to_scalar_is_replaced() {
    let padding = "p".repeat(2000);
    let pre = v(json!({"pad": padding, "sub": {"a": 1}}));
    let post = v(json!({"pad": padding, "sub": 5}));
    let EncodingMode::Diff(Diff::Object(d)) = pipeline(&pre, &post) else {
        panic!("expected object diff");
    };
    assert_eq!(d.updates["sub"], Change::Replace(v(json!(5))));
}

#[test]
fn reorder_with_updates() {
    let pre = v(json!({"k": "old value with some length", "z": 1, "other": "long sibling value"}));
    let post = v(json!({"other": "long sibling value", "z": 2, "k": "new"}));
    pipeline(&pre, &post);
}

#[test]
fn log_entry_pipeline() {
    let pre = v(json!({"title": "release notes for the next version", "rev": 3, "tags": ["a", "b"]}));
    let post = v(json!({"title": "release notes for the next version", "rev": 4, "tags": ["a", "b", "c"]}));
    let entry = build_entry(&pre, &post, &DeltaOptions::default()).unwrap();
    let mode = decode(&entry).unwrap();
    assert!(mode.is_diff());
    assert_eq!(mode.new_value_for_field("rev"), Some(&v(json!(4))));
    assert_eq!(mode.new_value_for_field("tags"), None);
    assert!(!mode.removes_field("title"));

    let out = apply_entry(&pre, &entry, &CodecOptions::default()).unwrap();
    assert!(out.identical(&post));
}
