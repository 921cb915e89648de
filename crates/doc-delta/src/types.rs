//! Core types of the delta codec: diffs, encoding modes, format versions
//! and options.

use doc_value::Value;
use indexmap::{IndexMap, IndexSet};

use crate::error::EncodeError;

/// A location inside a document: field names and array indices as strings.
pub type Path = Vec<String>;

// ── Diff ──────────────────────────────────────────────────────────────────

/// A structural transformation between two values of the same shape class.
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    Object(ObjectDiff),
    Array(ArrayDiff),
}

/// What happens to a single field or array slot that exists on both sides.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Overwrite with a full value.
    Replace(Value),
    /// Recurse into a value of the same shape class.
    Diff(Diff),
}

/// Changes to the fields of one object.
///
/// The groups are applied in declaration order: deletes, updates, reorder,
/// inserts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectDiff {
    /// Fields present before and absent after.
    pub deletes: IndexSet<String>,
    /// Fields present on both sides with differing values.
    pub updates: IndexMap<String, Change>,
    /// Complete final field order, when it differs from the natural
    /// "surviving fields then inserts" order.
    pub reorder: Option<Vec<String>>,
    /// Fields absent before and present after.
    pub inserts: IndexMap<String, Value>,
}

/// Changes to the elements of one array.
///
/// Applied as: truncate, positional changes, append.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayDiff {
    pub truncate_to: Option<usize>,
    /// `(index, change)` pairs with strictly increasing indices.
    pub positional: Vec<(usize, Change)>,
    pub append: Vec<Value>,
}

impl ObjectDiff {
    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty()
            && self.updates.is_empty()
            && self.reorder.is_none()
            && self.inserts.is_empty()
    }

    /// Checks that the groups are pairwise disjoint and that a reorder, if
    /// present, names each field once and never a deleted one.
    pub fn validate(&self, path: &mut Path) -> Result<(), EncodeError> {
        for name in &self.deletes {
            if self.updates.contains_key(name) {
                return Err(EncodeError::invariant(path, format!("'{name}' is both deleted and updated")));
            }
            if self.inserts.contains_key(name) {
                return Err(EncodeError::invariant(path, format!("'{name}' is both deleted and inserted")));
            }
        }
        for name in self.updates.keys() {
            if self.inserts.contains_key(name) {
                return Err(EncodeError::invariant(path, format!("'{name}' is both updated and inserted")));
            }
        }
        if let Some(order) = &self.reorder {
            let mut seen = IndexSet::with_capacity(order.len());
            for name in order {
                if !seen.insert(name.as_str()) {
                    return Err(EncodeError::invariant(path, format!("reorder names '{name}' twice")));
                }
                if self.deletes.contains(name) {
                    return Err(EncodeError::invariant(path, format!("reorder names deleted field '{name}'")));
                }
            }
        }
        for (name, change) in &self.updates {
            path.push(name.clone());
            change.validate(path)?;
            path.pop();
        }
        Ok(())
    }
}

impl ArrayDiff {
    pub fn is_empty(&self) -> bool {
        self.truncate_to.is_none() && self.positional.is_empty() && self.append.is_empty()
    }

    /// Checks index ordering and the truncate/append exclusivity.
    pub fn validate(&self, path: &mut Path) -> Result<(), EncodeError> {
        if self.truncate_to.is_some() && !self.append.is_empty() {
            return Err(EncodeError::invariant(path, "array diff both truncates and appends"));
        }
        let mut prev: Option<usize> = None;
        for (index, change) in &self.positional {
            if prev.is_some_and(|p| *index <= p) {
                return Err(EncodeError::invariant(path, format!("index {index} is out of order")));
            }
            if self.truncate_to.is_some_and(|len| *index >= len) {
                return Err(EncodeError::invariant(path, format!("index {index} lies past the truncation point")));
            }
            prev = Some(*index);
            path.push(index.to_string());
            change.validate(path)?;
            path.pop();
        }
        Ok(())
    }
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        match self {
            Diff::Object(d) => d.is_empty(),
            Diff::Array(d) => d.is_empty(),
        }
    }

    pub fn validate(&self, path: &mut Path) -> Result<(), EncodeError> {
        match self {
            Diff::Object(d) => d.validate(path),
            Diff::Array(d) => d.validate(path),
        }
    }
}

impl Change {
    fn validate(&self, path: &mut Path) -> Result<(), EncodeError> {
        match self {
            Change::Replace(_) => Ok(()),
            Change::Diff(d) => d.validate(path),
        }
    }
}

// ── Encoding mode ─────────────────────────────────────────────────────────

/// How a single mutation is recorded in the log.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodingMode {
    /// Full post-image.
    Replace(Value),
    /// Structural delta against the pre-image.
    Diff(Diff),
}

impl EncodingMode {
    pub fn is_diff(&self) -> bool {
        matches!(self, EncodingMode::Diff(_))
    }

    /// The full new value of a top-level field, if the entry records one.
    ///
    /// Nested diffs do not carry a full value, so a field changed through one
    /// yields `None`, exactly like an untouched or deleted field.
    pub fn new_value_for_field(&self, field: &str) -> Option<&Value> {
        match self {
            EncodingMode::Replace(doc) => doc.get(field),
            EncodingMode::Diff(Diff::Object(d)) => match d.updates.get(field) {
                Some(Change::Replace(v)) => Some(v),
                Some(Change::Diff(_)) => None,
                None => d.inserts.get(field),
            },
            EncodingMode::Diff(Diff::Array(_)) => None,
        }
    }

    /// Whether the entry deletes the given top-level field.
    ///
    /// A replacement cannot tell without the pre-image and answers `false`.
    pub fn removes_field(&self, field: &str) -> bool {
        match self {
            EncodingMode::Diff(Diff::Object(d)) => d.deletes.contains(field),
            _ => false,
        }
    }
}

// ── Format version ────────────────────────────────────────────────────────

/// Wire format discriminator of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatVersion {
    /// Legacy: full replacement only.
    V1,
    /// Diff-capable.
    #[default]
    V2,
}

impl FormatVersion {
    pub fn as_u8(self) -> u8 {
        match self {
            FormatVersion::V1 => 1,
            FormatVersion::V2 => 2,
        }
    }

    pub fn from_i64(v: i64) -> Option<Self> {
        match v {
            1 => Some(FormatVersion::V1),
            2 => Some(FormatVersion::V2),
            _ => None,
        }
    }
}

// ── Options ───────────────────────────────────────────────────────────────

/// What the diff computer does when an object's fields change order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldOrder {
    /// Emit a reorder marker carrying the final field order.
    #[default]
    Reorder,
    /// Replace the whole object instead of diffing it.
    Replace,
    /// Reproduce values only; the applied object may differ in field order.
    Ignore,
}

impl FieldOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "reorder" => Some(FieldOrder::Reorder),
            "replace" => Some(FieldOrder::Replace),
            "ignore" => Some(FieldOrder::Ignore),
            _ => None,
        }
    }
}

/// Options for diff computation.
#[derive(Debug, Clone, Default)]
pub struct DiffOptions {
    pub field_order: FieldOrder,
}

/// Options for encoding and decoding log entries.
#[derive(Debug, Clone)]
pub struct CodecOptions {
    /// Version written by the encoder.
    pub format_version: FormatVersion,
    /// Maximum diff/value nesting accepted by the decoder.
    pub max_depth: usize,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            format_version: FormatVersion::V2,
            max_depth: 200,
        }
    }
}

/// Options for the producer pipeline.
#[derive(Debug, Clone, Default)]
pub struct DeltaOptions {
    pub diff: DiffOptions,
    pub codec: CodecOptions,
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> IndexSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn overlapping_groups_are_rejected() {
        let mut diff = ObjectDiff {
            deletes: names(&["a"]),
            ..Default::default()
        };
        diff.inserts.insert("a".into(), Value::from(1i64));
        let err = diff.validate(&mut vec![]).unwrap_err();
        assert!(matches!(err, EncodeError::InvariantViolation { .. }));
        assert!(err.to_string().contains("deleted and inserted"));
    }

    #[test]
    fn nested_violation_reports_path() {
        let mut inner = ObjectDiff::default();
        inner.updates.insert("x".into(), Change::Replace(Value::NULL));
        inner.inserts.insert("x".into(), Value::NULL);
        let mut outer = ObjectDiff::default();
        outer.updates.insert("sub".into(), Change::Diff(Diff::Object(inner)));
        let err = outer.validate(&mut vec![]).unwrap_err();
        assert_eq!(
            err,
            EncodeError::InvariantViolation {
                path: "/sub".into(),
                reason: "'x' is both updated and inserted".into(),
            }
        );
    }

    #[test]
    fn reorder_cannot_name_deleted_field() {
        let diff = ObjectDiff {
            deletes: names(&["a"]),
            reorder: Some(vec!["b".into(), "a".into()]),
            ..Default::default()
        };
        assert!(diff.validate(&mut vec![]).is_err());
    }

    #[test]
    fn array_indices_must_increase() {
        let diff = ArrayDiff {
            positional: vec![(2, Change::Replace(Value::NULL)), (1, Change::Replace(Value::NULL))],
            ..Default::default()
        };
        assert!(diff.validate(&mut vec![]).is_err());

        let diff = ArrayDiff {
            truncate_to: Some(2),
            positional: vec![(2, Change::Replace(Value::NULL))],
            ..Default::default()
        };
        assert!(diff.validate(&mut vec![]).is_err());

        let diff = ArrayDiff {
            truncate_to: Some(1),
            append: vec![Value::NULL],
            ..Default::default()
        };
        assert!(diff.validate(&mut vec![]).is_err());
    }

    #[test]
    fn field_inspection() {
        let mut diff = ObjectDiff {
            deletes: names(&["gone"]),
            ..Default::default()
        };
        diff.updates.insert("u".into(), Change::Replace(Value::from("foo")));
        diff.updates.insert("nested".into(), Change::Diff(Diff::Object(ObjectDiff::default())));
        diff.inserts.insert("i".into(), Value::from("bar"));
        let mode = EncodingMode::Diff(Diff::Object(diff));

        assert_eq!(mode.new_value_for_field("u"), Some(&Value::from("foo")));
        assert_eq!(mode.new_value_for_field("i"), Some(&Value::from("bar")));
        assert_eq!(mode.new_value_for_field("nested"), None);
        assert_eq!(mode.new_value_for_field("gone"), None);
        assert!(mode.removes_field("gone"));
        assert!(!mode.removes_field("u"));
        assert!(!mode.removes_field("missing"));
    }

    #[test]
    fn defaults() {
        assert_eq!(CodecOptions::default().format_version, FormatVersion::V2);
        assert_eq!(DiffOptions::default().field_order, FieldOrder::Reorder);
        assert_eq!(FieldOrder::parse("IGNORE"), Some(FieldOrder::Ignore));
        assert_eq!(FormatVersion::from_i64(3), None);
    }
}
