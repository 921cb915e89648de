//! Applying an encoding mode to a pre-image.
//!
//! Object diffs run delete → update → reorder → insert; array diffs run
//! truncate → positional → append. Any mismatch between the diff and the
//! pre-image is corruption and fails the whole application: the diff is
//! applied to a copy, so the caller's value is never left half-updated.

use doc_value::{Object, Shape, Value};
use indexmap::IndexMap;

use crate::error::{pointer, ApplyError};
use crate::types::{ArrayDiff, Change, Diff, EncodingMode, ObjectDiff, Path};

/// Produces the post-image recorded by `mode`.
pub fn apply(pre: &Value, mode: &EncodingMode) -> Result<Value, ApplyError> {
    match mode {
        EncodingMode::Replace(post) => Ok(post.clone()),
        EncodingMode::Diff(diff) => {
            let mut doc = pre.clone();
            apply_diff(&mut doc, diff).map_err(|err| {
                log::warn!("rejecting diff: {err}");
                err
            })?;
            Ok(doc)
        }
    }
}

/// Applies `diff` to `doc` in place.
///
/// On error `doc` may hold a partial result; [`apply`] is the all-or-nothing
/// entry point.
pub fn apply_diff(doc: &mut Value, diff: &Diff) -> Result<(), ApplyError> {
    apply_at(doc, diff, &mut Vec::new())
}

fn apply_at(doc: &mut Value, diff: &Diff, path: &mut Path) -> Result<(), ApplyError> {
    match (diff, doc) {
        (Diff::Object(d), Value::Object(obj)) => apply_obj(obj, d, path),
        (Diff::Array(d), Value::Array(arr)) => apply_arr(arr, d, path),
        (diff, doc) => Err(ApplyError::ShapeMismatch {
            path: pointer(path),
            expected: match diff {
                Diff::Object(_) => Shape::Object,
                Diff::Array(_) => Shape::Array,
            },
            found: doc.shape(),
        }),
    }
}

fn apply_change(slot: &mut Value, change: &Change, path: &mut Path) -> Result<(), ApplyError> {
    match change {
        Change::Replace(v) => {
            *slot = v.clone();
            Ok(())
        }
        Change::Diff(d) => apply_at(slot, d, path),
    }
}

// ── Objects ───────────────────────────────────────────────────────────────

fn apply_obj(obj: &mut Object, d: &ObjectDiff, path: &mut Path) -> Result<(), ApplyError> {
    for name in &d.deletes {
        if obj.shift_remove(name).is_none() {
            return Err(ApplyError::MissingField {
                path: pointer(path),
                field: name.clone(),
            });
        }
    }

    for (name, change) in &d.updates {
        let Some(slot) = obj.get_mut(name) else {
            return Err(ApplyError::MissingField {
                path: pointer(path),
                field: name.clone(),
            });
        };
        path.push(name.clone());
        apply_change(slot, change, path)?;
        path.pop();
    }

    if let Some(name) = d.inserts.keys().find(|name| obj.contains_key(*name)) {
        return Err(ApplyError::FieldExists {
            path: pointer(path),
            field: name.clone(),
        });
    }

    let mut inserts: IndexMap<&str, &Value> =
        d.inserts.iter().map(|(k, v)| (k.as_str(), v)).collect();

    if let Some(order) = &d.reorder {
        *obj = reorder(std::mem::take(obj), order, &mut inserts, path)?;
    }

    for (name, value) in inserts {
        obj.insert(name.to_owned(), value.clone());
    }
    Ok(())
}

/// Rebuilds `obj` in the order given, placing inserts as they are named.
fn reorder(
    mut obj: Object,
    order: &[String],
    inserts: &mut IndexMap<&str, &Value>,
    path: &Path,
) -> Result<Object, ApplyError> {
    let mut out = Object::with_capacity(order.len());
    for name in order {
        let value = match obj.swap_remove(name) {
            Some(v) => v,
            None => match inserts.shift_remove(name.as_str()) {
                Some(v) => v.clone(),
                None => {
                    return Err(ApplyError::UnknownReorderField {
                        path: pointer(path),
                        field: name.clone(),
                    })
                }
            },
        };
        out.insert(name.clone(), value);
    }
    if let Some(name) = obj.keys().next() {
        return Err(ApplyError::IncompleteReorder {
            path: pointer(path),
            field: name.clone(),
        });
    }
    Ok(out)
}

// ── Arrays ────────────────────────────────────────────────────────────────

fn apply_arr(arr: &mut Vec<Value>, d: &ArrayDiff, path: &mut Path) -> Result<(), ApplyError> {
    if let Some(len) = d.truncate_to {
        if len > arr.len() {
            return Err(ApplyError::TruncateBeyondLength {
                path: pointer(path),
                len,
                actual: arr.len(),
            });
        }
        arr.truncate(len);
    }

    let len = arr.len();
    for (index, change) in &d.positional {
        let Some(slot) = arr.get_mut(*index) else {
            return Err(ApplyError::IndexOutOfBounds {
                path: pointer(path),
                index: *index,
                len,
            });
        };
        path.push(index.to_string());
        apply_change(slot, change, path)?;
        path.pop();
    }

    arr.extend(d.append.iter().cloned());
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::compute;
    use serde_json::json;

    fn v(j: serde_json::Value) -> Value {
        Value::from(j)
    }

    fn roundtrip(pre: serde_json::Value, post: serde_json::Value) {
        let (pre, post) = (v(pre), v(post));
        let diff = compute(&pre, &post).unwrap();
        let out = apply(&pre, &EncodingMode::Diff(diff)).unwrap();
        assert!(out.identical(&post), "got {out:?}, want {post:?}");
    }

    #[test]
    fn reproduces_post_image() {
        roundtrip(json!({"x": 3, "y": 3}), json!({}));
        roundtrip(json!({"sub": {"a": 1, "b": 2}}), json!({"sub": {"a": "foo", "b": 2}}));
        roundtrip(json!({"p": 0, "x": "foo", "y": "bar"}), json!({"p": 0, "y": "bar", "x": "foo"}));
        roundtrip(json!({"a": 1, "c": 3}), json!({"a": 1, "b": 2, "c": 3}));
        roundtrip(json!({"a": 1, "c": 3}), json!({"n": 0, "c": 30}));
        roundtrip(json!([1, 2, 3, 4, 5]), json!([1, 2, 999, 4, 5]));
        roundtrip(json!([1, 2, 3]), json!([1]));
        roundtrip(json!([[1, 2], {"k": 1}]), json!([[1], {"k": 2}, null, "x"]));
    }

    #[test]
    fn replace_ignores_pre_image() {
        let post = v(json!({"newField": 1}));
        let out = apply(&v(json!("anything")), &EncodingMode::Replace(post.clone())).unwrap();
        assert_eq!(out, post);
    }

    #[test]
    fn missing_field_is_corruption() {
        let diff = compute(&v(json!({"a": 1, "b": 2})), &v(json!({"a": 1}))).unwrap();
        let err = apply(&v(json!({"a": 1})), &EncodingMode::Diff(diff)).unwrap_err();
        assert_eq!(
            err,
            ApplyError::MissingField {
                path: "".into(),
                field: "b".into(),
            }
        );
    }

    #[test]
    fn existing_field_is_corruption() {
        let diff = compute(&v(json!({})), &v(json!({"a": 1}))).unwrap();
        let err = apply(&v(json!({"a": 0})), &EncodingMode::Diff(diff)).unwrap_err();
        assert!(matches!(err, ApplyError::FieldExists { .. }));
    }

    #[test]
    fn nested_shape_mismatch_names_path() {
        let diff = compute(&v(json!({"sub": {"a": 1, "k": 0}})), &v(json!({"sub": {"a": 2, "k": 0}}))).unwrap();
        let err = apply(&v(json!({"sub": [1]})), &EncodingMode::Diff(diff)).unwrap_err();
        assert_eq!(
            err,
            ApplyError::ShapeMismatch {
                path: "/sub".into(),
                expected: Shape::Object,
                found: Shape::Array,
            }
        );
    }

    #[test]
    fn array_bounds_are_checked() {
        let diff = compute(&v(json!([1, 2, 3])), &v(json!([1, 2, 4]))).unwrap();
        let err = apply(&v(json!([1])), &EncodingMode::Diff(diff)).unwrap_err();
        assert_eq!(
            err,
            ApplyError::IndexOutOfBounds {
                path: "".into(),
                index: 2,
                len: 1,
            }
        );

        let diff = compute(&v(json!([1, 2, 3])), &v(json!([1]))).unwrap();
        let err = apply(&v(json!([])), &EncodingMode::Diff(diff)).unwrap_err();
        assert!(matches!(err, ApplyError::TruncateBeyondLength { len: 1, actual: 0, .. }));
    }

    #[test]
    fn reorder_must_match_fields() {
        let diff = ObjectDiff {
            reorder: Some(vec!["b".into(), "zz".into()]),
            ..Default::default()
        };
        let mode = EncodingMode::Diff(Diff::Object(diff));
        let err = apply(&v(json!({"a": 1, "b": 2})), &mode).unwrap_err();
        assert!(matches!(err, ApplyError::UnknownReorderField { ref field, .. } if field == "zz"));

        let diff = ObjectDiff {
            reorder: Some(vec!["b".into()]),
            ..Default::default()
        };
        let mode = EncodingMode::Diff(Diff::Object(diff));
        let err = apply(&v(json!({"a": 1, "b": 2})), &mode).unwrap_err();
        assert!(matches!(err, ApplyError::IncompleteReorder { ref field, .. } if field == "a"));
    }

    #[test]
    fn failure_leaves_input_untouched() {
        let pre = v(json!({"a": 1, "b": 2}));
        let mut diff = ObjectDiff::default();
        diff.deletes.insert("a".into());
        diff.deletes.insert("missing".into());
        assert!(apply(&pre, &EncodingMode::Diff(Diff::Object(diff))).is_err());
        assert_eq!(pre, v(json!({"a": 1, "b": 2})));
    }
}
