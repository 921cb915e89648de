//! Mode selection: record a mutation as a diff or as a full replacement.
//!
//! Costs are the byte lengths of the JSON wire payloads, computed
//! structurally. Untouched subtrees cost nothing in a diff, so a small edit
//! inside a large document always diffs, while a rewrite into an unrelated
//! shape replaces.

use doc_value::size::{json_size, list_size, string_size, usize_size};
use doc_value::Value;

use crate::compute::compute_with;
use crate::types::{ArrayDiff, Change, Diff, DiffOptions, EncodingMode, ObjectDiff};

/// `"x":` prefix of a single-letter group key.
const GROUP_KEY: usize = 4;

// ── Cost model ────────────────────────────────────────────────────────────

/// Exact size of a diff's JSON payload (see [`crate::codec::json`]).
pub fn diff_size(diff: &Diff) -> usize {
    match diff {
        Diff::Object(d) => object_diff_size(d),
        Diff::Array(d) => array_diff_size(d),
    }
}

/// Size of `{"v":…}`, `{"o":…}` or `{"a":…}`.
pub fn change_size(change: &Change) -> usize {
    let payload = match change {
        Change::Replace(v) => json_size(v),
        Change::Diff(d) => diff_size(d),
    };
    GROUP_KEY + payload + 2
}

fn object_diff_size(d: &ObjectDiff) -> usize {
    let mut groups = Vec::with_capacity(4);
    if !d.deletes.is_empty() {
        groups.push(GROUP_KEY + list_size(d.deletes.iter().map(|k| string_size(k))));
    }
    if !d.updates.is_empty() {
        groups.push(
            GROUP_KEY
                + list_size(
                    d.updates
                        .iter()
                        .map(|(k, c)| list_size([string_size(k), change_size(c)])),
                ),
        );
    }
    if let Some(order) = &d.reorder {
        groups.push(GROUP_KEY + list_size(order.iter().map(|k| string_size(k))));
    }
    if !d.inserts.is_empty() {
        groups.push(
            GROUP_KEY
                + list_size(
                    d.inserts
                        .iter()
                        .map(|(k, v)| list_size([string_size(k), json_size(v)])),
                ),
        );
    }
    list_size(groups)
}

fn array_diff_size(d: &ArrayDiff) -> usize {
    let mut groups = Vec::with_capacity(3);
    if let Some(len) = d.truncate_to {
        groups.push(GROUP_KEY + usize_size(len));
    }
    if !d.positional.is_empty() {
        groups.push(
            GROUP_KEY
                + list_size(
                    d.positional
                        .iter()
                        .map(|(i, c)| list_size([usize_size(*i), change_size(c)])),
                ),
        );
    }
    if !d.append.is_empty() {
        groups.push(GROUP_KEY + list_size(d.append.iter().map(json_size)));
    }
    list_size(groups)
}

// ── Selection ─────────────────────────────────────────────────────────────

/// Picks the encoding for a mutation.
///
/// `None` (the values could not be diffed) always replaces. Otherwise the
/// diff is kept only if it is strictly smaller than the post-image.
pub fn select(diff: Option<Diff>, pre: &Value, post: &Value) -> EncodingMode {
    let Some(diff) = diff else {
        log::debug!("shape mismatch: recording replacement");
        return EncodingMode::Replace(post.clone());
    };

    let diff_cost = diff_size(&diff);
    let replace_cost = json_size(post);
    if log::log_enabled!(log::Level::Debug) {
        log::debug!(
            "diff cost {diff_cost} bytes, replace cost {replace_cost} bytes (pre-image {} bytes)",
            json_size(pre)
        );
    }

    if diff_cost < replace_cost {
        EncodingMode::Diff(diff)
    } else {
        EncodingMode::Replace(post.clone())
    }
}

/// Computes and selects in one step.
pub fn make_mode(pre: &Value, post: &Value, opts: &DiffOptions) -> EncodingMode {
    select(compute_with(pre, post, opts), pre, post)
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::json::encode_diff;
    use crate::compute::compute;
    use serde_json::json;

    fn v(j: serde_json::Value) -> Value {
        Value::from(j)
    }

    fn wire_len(diff: &Diff) -> usize {
        encode_diff(diff).unwrap().to_string().len()
    }

    #[test]
    fn size_matches_encoded_json() {
        let pairs = [
            (json!({"x": 3, "y": 3}), json!({})),
            (json!({"a": 1, "b": {"c": [1, 2, 3]}}), json!({"b": {"c": [1, 5]}, "d": "new\n"})),
            (json!({"p": 0, "x": "foo", "y": "bar"}), json!({"p": 0, "y": "bar", "x": "foo"})),
            (json!([1, 2, 3]), json!([1, 20, 3, 4, 5])),
            (json!([[1], {"a": 1}, 3]), json!([[2]])),
            (json!({"a": 1}), json!({"a": 1})),
        ];
        for (pre, post) in pairs {
            let diff = compute(&v(pre), &v(post)).unwrap();
            assert_eq!(diff_size(&diff), wire_len(&diff), "diff: {diff:?}");
        }
    }

    #[test]
    fn small_edit_in_large_document_diffs() {
        let mut pre = serde_json::Map::new();
        for i in 0..50 {
            pre.insert(format!("field{i}"), json!("some reasonably long sibling value"));
        }
        let pre = serde_json::Value::Object(pre);
        let mut post = pre.clone();
        post["field7"] = json!(42);

        let mode = make_mode(&v(pre), &v(post), &DiffOptions::default());
        assert!(mode.is_diff());
    }

    #[test]
    fn unrelated_rewrite_replaces() {
        let pre = v(json!({"x": "foo", "subObj": {"a": 1, "b": 2}}));
        let post = v(json!({"newField": "a considerably longer value than anything before"}));
        let mode = make_mode(&pre, &post, &DiffOptions::default());
        assert_eq!(mode, EncodingMode::Replace(post));
    }

    #[test]
    fn no_diff_replaces() {
        let mode = select(None, &v(json!(1)), &v(json!("x")));
        assert_eq!(mode, EncodingMode::Replace(v(json!("x"))));
    }

    #[test]
    fn equal_cost_replaces() {
        // {} as post-image costs 2 bytes; so does the empty diff.
        let mode = make_mode(&v(json!({})), &v(json!({})), &DiffOptions::default());
        assert_eq!(mode, EncodingMode::Replace(v(json!({}))));
    }
}
