//! doc-value — the document model shared by the doc-delta codec.
//!
//! Provides the [`Value`] tagged union (scalars, insertion-ordered objects,
//! arrays), conversion to and from `serde_json`, and exact JSON size
//! estimation used by the delta cost model.

pub mod json;
pub mod size;
pub mod value;

pub use json::ValueError;
pub use size::{json_size, string_size};
pub use value::{Object, Scalar, Shape, Value};
