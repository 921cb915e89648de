//! Command-line front end: the logic behind the `doc-diff` and `doc-apply`
//! binaries.
//!
//! - `doc-diff`  — record the mutation between two documents as a log entry
//! - `doc-apply` — replay a log entry against a document read from stdin
//!
//! Options come from the environment:
//! `DOC_DELTA_FIELD_ORDER` (`reorder`, `replace` or `ignore`) and
//! `DOC_DELTA_FORMAT_VERSION` (`1` or `2`).

use doc_value::{Value, ValueError};
use thiserror::Error;

use crate::entry::{apply_entry, build_entry, LogEntry};
use crate::error::{DecodeError, EncodeError, Error};
use crate::types::{CodecOptions, DeltaOptions, DiffOptions, FieldOrder, FormatVersion};

pub const FIELD_ORDER_VAR: &str = "DOC_DELTA_FIELD_ORDER";
pub const FORMAT_VERSION_VAR: &str = "DOC_DELTA_FORMAT_VERSION";

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid document: {0}")]
    Document(#[from] ValueError),
    #[error("invalid entry: {0}")]
    Entry(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Delta(#[from] Error),
    #[error("{var} must be one of {expected}, got '{value}'")]
    BadOption {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

// ── Options ───────────────────────────────────────────────────────────────

/// Builds options from optional `DOC_DELTA_*` settings.
pub fn options_from(field_order: Option<&str>, format_version: Option<&str>) -> Result<DeltaOptions, CliError> {
    let mut opts = DeltaOptions::default();
    if let Some(raw) = field_order {
        opts.diff = DiffOptions {
            field_order: FieldOrder::parse(raw.trim()).ok_or_else(|| CliError::BadOption {
                var: FIELD_ORDER_VAR,
                expected: "reorder, replace, ignore",
                value: raw.to_string(),
            })?,
        };
    }
    if let Some(raw) = format_version {
        opts.codec = CodecOptions {
            format_version: raw
                .trim()
                .parse::<i64>()
                .ok()
                .and_then(FormatVersion::from_i64)
                .ok_or_else(|| CliError::BadOption {
                    var: FORMAT_VERSION_VAR,
                    expected: "1, 2",
                    value: raw.to_string(),
                })?,
            ..Default::default()
        };
    }
    Ok(opts)
}

/// Reads options from the process environment.
pub fn options_from_env() -> Result<DeltaOptions, CliError> {
    let field_order = std::env::var(FIELD_ORDER_VAR).ok();
    let format_version = std::env::var(FORMAT_VERSION_VAR).ok();
    options_from(field_order.as_deref(), format_version.as_deref())
}

// ── doc-diff ──────────────────────────────────────────────────────────────

/// Records `pre_json → post_json` as a compact JSON log entry.
pub fn diff_documents(pre_json: &str, post_json: &str, opts: &DeltaOptions) -> Result<String, CliError> {
    let pre = Value::from_json_str(pre_json)?;
    let post = Value::from_json_str(post_json)?;
    Ok(build_entry(&pre, &post, opts)?.to_string())
}

// ── doc-apply ─────────────────────────────────────────────────────────────

/// Applies a JSON log entry to a document and returns the post-image as
/// pretty-printed JSON.
pub fn apply_document(doc_json: &str, entry_json: &str, opts: &CodecOptions) -> Result<String, CliError> {
    let pre = Value::from_json_str(doc_json)?;
    let entry = LogEntry::parse(entry_json)?;
    let post = apply_entry(&pre, &entry, opts)?;
    let json = serde_json::Value::try_from(&post)?;
    serde_json::to_string_pretty(&json).map_err(|e| CliError::Document(e.into()))
}
