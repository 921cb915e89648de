//! Log entries and the producer/consumer pipelines around them.

use std::fmt;

use doc_value::Value;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};

use crate::apply::apply;
use crate::codec::json::{self as codec, VERSION_KEY};
use crate::error::{DecodeError, EncodeError, Result};
use crate::select::make_mode;
use crate::types::{CodecOptions, DeltaOptions, EncodingMode, FormatVersion};

/// One recorded mutation in its durable JSON form.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry(serde_json::Value);

impl LogEntry {
    /// Wraps raw JSON. Nothing is checked until the entry is decoded.
    pub fn from_json(json: serde_json::Value) -> Self {
        LogEntry(json)
    }

    /// Parses entry text. A key repeated within one object is malformed: a
    /// lenient parser would keep only the last occurrence and silently drop
    /// part of the mutation.
    pub fn parse(text: &str) -> std::result::Result<Self, DecodeError> {
        match serde_json::from_str::<StrictJson>(text) {
            Ok(StrictJson(json)) => Ok(LogEntry(json)),
            Err(e) if e.is_data() => Err(DecodeError::malformed(&[], e.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_json(self) -> serde_json::Value {
        self.0
    }

    /// Reads the `$v` discriminator without decoding the payload.
    pub fn format_version(&self) -> std::result::Result<FormatVersion, DecodeError> {
        let v = self
            .0
            .get(VERSION_KEY)
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| DecodeError::malformed(&[], "missing format version"))?;
        FormatVersion::from_i64(v).ok_or(DecodeError::UnsupportedVersion(v))
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Strict parsing ────────────────────────────────────────────────────────

struct StrictJson(serde_json::Value);

impl<'de> Deserialize<'de> for StrictJson {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(StrictVisitor).map(StrictJson)
    }
}

struct StrictVisitor;

impl<'de> Visitor<'de> for StrictVisitor {
    type Value = serde_json::Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value without repeated keys")
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
        Ok(serde_json::Value::Null)
    }

    fn visit_bool<E: de::Error>(self, b: bool) -> std::result::Result<Self::Value, E> {
        Ok(b.into())
    }

    fn visit_i64<E: de::Error>(self, n: i64) -> std::result::Result<Self::Value, E> {
        Ok(n.into())
    }

    fn visit_u64<E: de::Error>(self, n: u64) -> std::result::Result<Self::Value, E> {
        Ok(n.into())
    }

    fn visit_f64<E: de::Error>(self, n: f64) -> std::result::Result<Self::Value, E> {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .ok_or_else(|| E::custom(format!("non-finite number {n}")))
    }

    fn visit_str<E: de::Error>(self, s: &str) -> std::result::Result<Self::Value, E> {
        Ok(s.into())
    }

    fn visit_string<E: de::Error>(self, s: String) -> std::result::Result<Self::Value, E> {
        Ok(s.into())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error> {
        let mut arr = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(StrictJson(item)) = seq.next_element()? {
            arr.push(item);
        }
        Ok(serde_json::Value::Array(arr))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
        let mut obj = serde_json::Map::new();
        while let Some(key) = map.next_key::<String>()? {
            if obj.contains_key(&key) {
                return Err(de::Error::custom(format!("duplicate key '{key}'")));
            }
            let StrictJson(value) = map.next_value()?;
            obj.insert(key, value);
        }
        Ok(serde_json::Value::Object(obj))
    }
}

// ── Pipelines ─────────────────────────────────────────────────────────────

/// Records the mutation `pre → post` as a log entry.
///
/// Version 1 output cannot carry a diff, so it always records the post-image.
pub fn build_entry(
    pre: &Value,
    post: &Value,
    opts: &DeltaOptions,
) -> std::result::Result<LogEntry, EncodeError> {
    let mode = match opts.codec.format_version {
        FormatVersion::V1 => EncodingMode::Replace(post.clone()),
        FormatVersion::V2 => make_mode(pre, post, &opts.diff),
    };
    log::debug!(
        "recording {} entry",
        if mode.is_diff() { "diff" } else { "replace" }
    );
    codec::encode_with(&mode, &opts.codec)
}

/// Replays a log entry against the replica's copy of the document.
pub fn apply_entry(pre: &Value, entry: &LogEntry, opts: &CodecOptions) -> Result<Value> {
    let mode = codec::decode_with(entry, opts).map_err(|err| {
        log::warn!("rejecting undecodable entry: {err}");
        err
    })?;
    Ok(apply(pre, &mode)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApplyError, Error};
    use crate::types::FieldOrder;
    use serde_json::json;

    fn v(j: serde_json::Value) -> Value {
        Value::from(j)
    }

    #[test]
    fn pipeline_reproduces_post_image() {
        let pre = v(json!({"title": "a long enough title to make diffing worthwhile", "n": 1}));
        let post = v(json!({"title": "a long enough title to make diffing worthwhile", "n": 2}));
        let entry = build_entry(&pre, &post, &DeltaOptions::default()).unwrap();
        assert_eq!(entry.to_string(), r#"{"$v":2,"o":{"u":[["n",{"v":2}]]}}"#);
        let out = apply_entry(&pre, &entry, &CodecOptions::default()).unwrap();
        assert!(out.identical(&post));
    }

    #[test]
    fn legacy_output_replaces() {
        let opts = DeltaOptions {
            codec: CodecOptions {
                format_version: FormatVersion::V1,
                ..Default::default()
            },
            ..Default::default()
        };
        let entry = build_entry(&v(json!({"a": "xxxxxxxxxxxx"})), &v(json!({"a": "xxxxxxxxxxxx", "b": 1})), &opts).unwrap();
        assert_eq!(entry.format_version(), Ok(FormatVersion::V1));
        assert_eq!(entry.to_string(), r#"{"$v":1,"v":{"a":"xxxxxxxxxxxx","b":1}}"#);
    }

    #[test]
    fn field_order_policy_reaches_the_computer() {
        let pre = v(json!({"x": "some long value", "y": "another long value", "z": 1}));
        let post = v(json!({"y": "another long value", "x": "some long value", "z": 1}));
        let opts = DeltaOptions {
            diff: crate::types::DiffOptions {
                field_order: FieldOrder::Ignore,
            },
            ..Default::default()
        };
        let entry = build_entry(&pre, &post, &opts).unwrap();
        assert_eq!(entry.to_string(), r#"{"$v":2,"o":{}}"#);
    }

    #[test]
    fn corrupt_pre_image_is_reported() {
        let entry = LogEntry::parse(r#"{"$v":2,"o":{"d":["gone"]}}"#).unwrap();
        let err = apply_entry(&v(json!({})), &entry, &CodecOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Apply(ApplyError::MissingField { .. })));
    }

    #[test]
    fn parse_and_version() {
        assert!(matches!(LogEntry::parse("{"), Err(DecodeError::Json(_))));
        let entry = LogEntry::parse(r#"{"$v":7,"v":1}"#).unwrap();
        assert_eq!(entry.format_version(), Err(DecodeError::UnsupportedVersion(7)));
        assert_eq!(entry.clone().into_json(), json!({"$v": 7, "v": 1}));
    }

    #[test]
    fn repeated_keys_are_malformed() {
        let err = LogEntry::parse(r#"{"$v":2,"o":{"d":["a"],"d":["b"]}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { ref reason, .. } if reason.contains("duplicate key 'd'")));
        assert!(LogEntry::parse(r#"{"$v":2,"v":{"x":[{"k":1,"k":2}]}}"#).is_err());

        // The same name at different levels is fine.
        let entry = LogEntry::parse(r#"{"$v":1,"v":{"v":{"v":[1.5,-2,null,true,"s"]}}}"#).unwrap();
        assert_eq!(entry.into_json(), json!({"$v": 1, "v": {"v": {"v": [1.5, -2, null, true, "s"]}}}));
    }
}
