//! doc-delta — compact delta encoding for document oplog entries.
//!
//! Given the pre-image and post-image of a document mutation, computes a
//! structural diff, decides by byte cost whether to record the diff or the
//! full post-image, encodes the decision as a versioned log entry, and
//! replays entries against a replica's copy of the document.

pub mod apply;
pub mod cli;
pub mod codec;
pub mod compute;
pub mod entry;
pub mod error;
pub mod select;
pub mod types;

pub use apply::apply;
pub use compute::{compute, compute_with};
pub use entry::{apply_entry, build_entry, LogEntry};
pub use error::{ApplyError, DecodeError, EncodeError, Error, Result};
pub use select::{diff_size, make_mode, select};
pub use types::{
    ArrayDiff, Change, CodecOptions, DeltaOptions, Diff, DiffOptions, EncodingMode, FieldOrder,
    FormatVersion, ObjectDiff,
};

pub use doc_value::{Object, Scalar, Shape, Value};
