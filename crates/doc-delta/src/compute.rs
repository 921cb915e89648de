//! Diff computation: derive a structural [`Diff`] from a pre-image and a
//! post-image.
//!
//! Objects are compared by field name, arrays by position. A subtree that is
//! identical on both sides (including field order) is skipped. A subtree that
//! changes shape class is always replaced whole; no recursion is attempted
//! across a shape mismatch. A nested subtree whose content is rewritten
//! outright is replaced as well.

use doc_value::{json_size, Object, Value};
use indexmap::{IndexMap, IndexSet};

use crate::select::diff_size;
use crate::types::{ArrayDiff, Change, Diff, DiffOptions, FieldOrder, ObjectDiff};

// ── Public API ────────────────────────────────────────────────────────────

/// Computes the diff that turns `pre` into `post` with default options.
///
/// Returns `None` when the two values cannot be diffed (different shape
/// classes, or scalars); the caller then has to record a replacement.
pub fn compute(pre: &Value, post: &Value) -> Option<Diff> {
    compute_with(pre, post, &DiffOptions::default())
}

/// Like [`compute`], with explicit options.
pub fn compute_with(pre: &Value, post: &Value, opts: &DiffOptions) -> Option<Diff> {
    diff_values(pre, post, opts)
}

// ── Core recursive differ ─────────────────────────────────────────────────

fn diff_values(pre: &Value, post: &Value, opts: &DiffOptions) -> Option<Diff> {
    match (pre, post) {
        (Value::Object(src), Value::Object(dst)) => diff_obj(src, dst, opts).map(Diff::Object),
        (Value::Array(src), Value::Array(dst)) => Some(Diff::Array(diff_arr(src, dst, opts))),
        _ => None,
    }
}

/// Whether a subtree can be skipped. Field order only counts when the
/// computed diff has to reproduce it.
fn unchanged(pre: &Value, post: &Value, opts: &DiffOptions) -> bool {
    match opts.field_order {
        FieldOrder::Ignore => pre == post,
        FieldOrder::Reorder | FieldOrder::Replace => pre.identical(post),
    }
}

fn diff_change(pre: &Value, post: &Value, opts: &DiffOptions) -> Change {
    match diff_values(pre, post, opts) {
        Some(diff) if worth_diffing(pre, post, &diff) => Change::Diff(diff),
        _ => Change::Replace(post.clone()),
    }
}

/// Whether a nested subtree keeps its diff rather than being replaced.
///
/// A diff that preserves nothing of the pre-image (every field deleted or
/// overwritten, every common element overwritten) is a rewrite. A purely
/// structural object diff (deletes, reorder, inserts) must also be cheaper
/// than the post-image it describes.
fn worth_diffing(pre: &Value, post: &Value, diff: &Diff) -> bool {
    match (pre, diff) {
        (Value::Object(src), Diff::Object(d)) => {
            let overwritten = d
                .updates
                .values()
                .filter(|c| matches!(c, Change::Replace(_)))
                .count();
            if d.deletes.len() + overwritten >= src.len() {
                log::trace!("subtree rewritten: replacing");
                return false;
            }
            !d.updates.is_empty() || diff_size(diff) < json_size(post)
        }
        (Value::Array(src), Diff::Array(d)) => {
            let common = src.len().min(post.as_array().map_or(0, Vec::len));
            let overwritten = d
                .positional
                .iter()
                .filter(|(_, c)| matches!(c, Change::Replace(_)))
                .count();
            overwritten < common
        }
        _ => false,
    }
}

fn diff_obj(src: &Object, dst: &Object, opts: &DiffOptions) -> Option<ObjectDiff> {
    let deletes: IndexSet<String> = src
        .keys()
        .filter(|key| !dst.contains_key(*key))
        .cloned()
        .collect();

    let mut updates = IndexMap::new();
    let mut inserts = IndexMap::new();
    for (key, dst_val) in dst {
        match src.get(key) {
            None => {
                inserts.insert(key.clone(), dst_val.clone());
            }
            Some(src_val) if unchanged(src_val, dst_val, opts) => {}
            Some(src_val) => {
                log::trace!("field '{key}' differs");
                updates.insert(key.clone(), diff_change(src_val, dst_val, opts));
            }
        }
    }

    let reorder = if natural_order_matches(src, dst, &deletes, &inserts) {
        None
    } else {
        match opts.field_order {
            FieldOrder::Reorder => Some(dst.keys().cloned().collect()),
            FieldOrder::Replace => return None,
            FieldOrder::Ignore => None,
        }
    };

    Some(ObjectDiff {
        deletes,
        updates,
        reorder,
        inserts,
    })
}

/// Whether delete → update → append-inserts already yields `dst`'s field
/// order.
fn natural_order_matches(
    src: &Object,
    dst: &Object,
    deletes: &IndexSet<String>,
    inserts: &IndexMap<String, Value>,
) -> bool {
    let surviving = src.keys().filter(|key| !deletes.contains(*key));
    let natural = surviving.chain(inserts.keys());
    natural.eq(dst.keys())
}

fn diff_arr(src: &[Value], dst: &[Value], opts: &DiffOptions) -> ArrayDiff {
    let common = src.len().min(dst.len());

    let positional = (0..common)
        .filter(|&i| !unchanged(&src[i], &dst[i], opts))
        .map(|i| (i, diff_change(&src[i], &dst[i], opts)))
        .collect();

    ArrayDiff {
        truncate_to: (dst.len() < src.len()).then_some(dst.len()),
        positional,
        append: dst[common..].to_vec(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
