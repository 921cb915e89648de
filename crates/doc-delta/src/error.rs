//! Error types for the delta codec.
//!
//! Shape mismatches and cost decisions are not errors; they steer the
//! encoding mode. What remains are encoder invariant violations (a defect in
//! whoever built the diff), undecodable entries, and corruption detected while
//! applying a diff to a pre-image that does not match it.

use doc_value::{Shape, ValueError};
use thiserror::Error;

/// Path segment for a value appended to an array (RFC 6901 "past the end").
pub(crate) const APPEND_SEGMENT: &str = "-";

/// Renders a path as a JSON Pointer (RFC 6901).
pub fn pointer(path: &[String]) -> String {
    let mut ptr = String::with_capacity(path.len() * 8);
    for key in path {
        ptr.push('/');
        ptr.push_str(&key.replace('~', "~0").replace('/', "~1"));
    }
    ptr
}

// ── Encode ────────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq)]
pub enum EncodeError {
    #[error("diff invariant violated at '{path}': {reason}")]
    InvariantViolation { path: String, reason: String },
    #[error("format version {0} cannot carry a diff")]
    DiffNotSupported(u8),
    #[error("value at '{path}' is not representable: {source}")]
    Value {
        path: String,
        #[source]
        source: ValueError,
    },
}

impl EncodeError {
    pub(crate) fn invariant(path: &[String], reason: impl Into<String>) -> Self {
        EncodeError::InvariantViolation {
            path: pointer(path),
            reason: reason.into(),
        }
    }
}

// ── Decode ────────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("unsupported format version: {0}")]
    UnsupportedVersion(i64),
    #[error("malformed entry at '{path}': {reason}")]
    Malformed { path: String, reason: String },
    #[error("entry nesting at '{path}' exceeds the limit of {limit} levels")]
    TooDeep { path: String, limit: usize },
    #[error("invalid JSON: {0}")]
    Json(String),
}

impl DecodeError {
    pub(crate) fn malformed(path: &[String], reason: impl Into<String>) -> Self {
        DecodeError::Malformed {
            path: pointer(path),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        DecodeError::Json(e.to_string())
    }
}

// ── Apply ─────────────────────────────────────────────────────────────────

/// The pre-image does not match what the diff was computed against.
///
/// Always fatal for the entry being applied: the replica's copy has diverged
/// and the replication layer has to decide how to recover.
#[derive(Debug, Error, PartialEq)]
pub enum ApplyError {
    #[error("field '{field}' not found at '{path}'")]
    MissingField { path: String, field: String },
    #[error("field '{field}' already exists at '{path}'")]
    FieldExists { path: String, field: String },
    #[error("index {index} out of bounds at '{path}' (length {len})")]
    IndexOutOfBounds { path: String, index: usize, len: usize },
    #[error("cannot truncate array at '{path}' to {len}: it only has {actual} elements")]
    TruncateBeyondLength { path: String, len: usize, actual: usize },
    #[error("expected {expected} at '{path}', found {found}")]
    ShapeMismatch {
        path: String,
        expected: Shape,
        found: Shape,
    },
    #[error("reorder at '{path}' names unknown field '{field}'")]
    UnknownReorderField { path: String, field: String },
    #[error("reorder at '{path}' does not place field '{field}'")]
    IncompleteReorder { path: String, field: String },
}

// ── Umbrella ──────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Apply(#[from] ApplyError),
}

pub type Result<T> = std::result::Result<T, Error>;
