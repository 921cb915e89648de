//! Wire codecs for log entries.
//!
//! [`json`] is the canonical form stored in the oplog; [`binary`] is a compact
//! marker-based form for transports that carry raw bytes.

pub mod binary;
pub mod json;

pub use json::{decode, decode_with, encode, encode_with};
