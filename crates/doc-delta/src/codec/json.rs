//! JSON codec for log entries.
//!
//! Wire layout:
//!
//! ```text
//! entry  := {"$v": 1|2, "v": value} | {"$v": 2, "o": objdiff} | {"$v": 2, "a": arrdiff}
//! change := {"v": value} | {"o": objdiff} | {"a": arrdiff}
//! objdiff := {"d": [name...], "u": [[name, change]...], "r": [name...], "i": [[name, value]...]}
//! arrdiff := {"l": length, "p": [[index, change]...], "e": [value...]}
//! ```
//!
//! Groups are written in apply order and omitted when empty; an empty diff
//! is `{}`.

use doc_value::Value;
use indexmap::IndexMap;
use serde_json::{Map, Value as Json};

use crate::entry::LogEntry;
use crate::error::{pointer, DecodeError, EncodeError, APPEND_SEGMENT};
use crate::types::{
    ArrayDiff, Change, CodecOptions, Diff, EncodingMode, FormatVersion, ObjectDiff, Path,
};

pub const VERSION_KEY: &str = "$v";

pub const TAG_VALUE: &str = "v";
pub const TAG_OBJECT: &str = "o";
pub const TAG_ARRAY: &str = "a";

pub const GROUP_DELETE: &str = "d";
pub const GROUP_UPDATE: &str = "u";
pub const GROUP_REORDER: &str = "r";
pub const GROUP_INSERT: &str = "i";

pub const GROUP_TRUNCATE: &str = "l";
pub const GROUP_POSITIONAL: &str = "p";
pub const GROUP_APPEND: &str = "e";

// ── Encode ────────────────────────────────────────────────────────────────

/// Encodes an encoding mode as a version 2 log entry.
pub fn encode(mode: &EncodingMode) -> Result<LogEntry, EncodeError> {
    encode_with(mode, &CodecOptions::default())
}

/// Encodes an encoding mode using the version from `opts`.
pub fn encode_with(mode: &EncodingMode, opts: &CodecOptions) -> Result<LogEntry, EncodeError> {
    let version = opts.format_version;
    let (tag, payload) = match mode {
        EncodingMode::Replace(v) => (TAG_VALUE, encode_value(v, &[])?),
        EncodingMode::Diff(diff) => {
            if version == FormatVersion::V1 {
                return Err(EncodeError::DiffNotSupported(version.as_u8()));
            }
            diff.validate(&mut Vec::new())?;
            (diff_tag(diff), encode_diff(diff)?)
        }
    };
    let mut m = Map::new();
    m.insert(VERSION_KEY.into(), Json::from(version.as_u8()));
    m.insert(tag.into(), payload);
    Ok(LogEntry::from_json(Json::Object(m)))
}

fn diff_tag(diff: &Diff) -> &'static str {
    match diff {
        Diff::Object(_) => TAG_OBJECT,
        Diff::Array(_) => TAG_ARRAY,
    }
}

fn encode_value(v: &Value, path: &[String]) -> Result<Json, EncodeError> {
    Json::try_from(v).map_err(|source| EncodeError::Value {
        path: pointer(path),
        source,
    })
}

/// Serializes a diff payload without checking its invariants.
pub fn encode_diff(diff: &Diff) -> Result<Json, EncodeError> {
    encode_diff_at(diff, &mut Vec::new())
}

fn encode_diff_at(diff: &Diff, path: &mut Path) -> Result<Json, EncodeError> {
    match diff {
        Diff::Object(d) => encode_object_diff(d, path),
        Diff::Array(d) => encode_array_diff(d, path),
    }
}

fn encode_change(change: &Change, path: &mut Path) -> Result<Json, EncodeError> {
    let (tag, payload) = match change {
        Change::Replace(v) => (TAG_VALUE, encode_value(v, path)?),
        Change::Diff(d) => (diff_tag(d), encode_diff_at(d, path)?),
    };
    let mut m = Map::with_capacity(1);
    m.insert(tag.into(), payload);
    Ok(Json::Object(m))
}

fn encode_object_diff(d: &ObjectDiff, path: &mut Path) -> Result<Json, EncodeError> {
    let mut m = Map::new();
    if !d.deletes.is_empty() {
        m.insert(
            GROUP_DELETE.into(),
            Json::Array(d.deletes.iter().map(|k| Json::String(k.clone())).collect()),
        );
    }
    if !d.updates.is_empty() {
        let mut items = Vec::with_capacity(d.updates.len());
        for (name, change) in &d.updates {
            path.push(name.clone());
            let encoded = encode_change(change, path)?;
            path.pop();
            items.push(Json::Array(vec![Json::String(name.clone()), encoded]));
        }
        m.insert(GROUP_UPDATE.into(), Json::Array(items));
    }
    if let Some(order) = &d.reorder {
        m.insert(
            GROUP_REORDER.into(),
            Json::Array(order.iter().map(|k| Json::String(k.clone())).collect()),
        );
    }
    if !d.inserts.is_empty() {
        let mut items = Vec::with_capacity(d.inserts.len());
        for (name, value) in &d.inserts {
            path.push(name.clone());
            let encoded = encode_value(value, path)?;
            path.pop();
            items.push(Json::Array(vec![Json::String(name.clone()), encoded]));
        }
        m.insert(GROUP_INSERT.into(), Json::Array(items));
    }
    Ok(Json::Object(m))
}

fn encode_array_diff(d: &ArrayDiff, path: &mut Path) -> Result<Json, EncodeError> {
    let mut m = Map::new();
    if let Some(len) = d.truncate_to {
        m.insert(GROUP_TRUNCATE.into(), Json::from(len));
    }
    if !d.positional.is_empty() {
        let mut items = Vec::with_capacity(d.positional.len());
        for (index, change) in &d.positional {
            path.push(index.to_string());
            let encoded = encode_change(change, path)?;
            path.pop();
            items.push(Json::Array(vec![Json::from(*index), encoded]));
        }
        m.insert(GROUP_POSITIONAL.into(), Json::Array(items));
    }
    if !d.append.is_empty() {
        let mut items = Vec::with_capacity(d.append.len());
        for value in &d.append {
            path.push(APPEND_SEGMENT.into());
            let encoded = encode_value(value, path)?;
            path.pop();
            items.push(encoded);
        }
        m.insert(GROUP_APPEND.into(), Json::Array(items));
    }
    Ok(Json::Object(m))
}

// ── Decode ────────────────────────────────────────────────────────────────

/// Decodes a log entry with default options.
pub fn decode(entry: &LogEntry) -> Result<EncodingMode, DecodeError> {
    decode_with(entry, &CodecOptions::default())
}

/// Decodes a log entry, enforcing the nesting limit from `opts`.
pub fn decode_with(entry: &LogEntry, opts: &CodecOptions) -> Result<EncodingMode, DecodeError> {
    let mut dec = Decoder {
        max_depth: opts.max_depth,
        path: Vec::new(),
    };
    let obj = entry
        .as_json()
        .as_object()
        .ok_or_else(|| DecodeError::malformed(&[], "entry must be an object"))?;
    let version = obj
        .get(VERSION_KEY)
        .ok_or_else(|| DecodeError::malformed(&[], "missing format version"))?;
    let version = version
        .as_i64()
        .ok_or_else(|| DecodeError::malformed(&[], "format version must be an integer"))?;
    let version = FormatVersion::from_i64(version).ok_or(DecodeError::UnsupportedVersion(version))?;

    if obj.len() != 2 {
        return Err(DecodeError::malformed(&[], "entry must carry exactly one payload"));
    }
    let (tag, payload) = obj
        .iter()
        .find(|(k, _)| k.as_str() != VERSION_KEY)
        .ok_or_else(|| DecodeError::malformed(&[], "entry must carry exactly one payload"))?;

    match (version, tag.as_str()) {
        (_, TAG_VALUE) => Ok(EncodingMode::Replace(dec.value(payload, 0)?)),
        (FormatVersion::V1, _) => Err(DecodeError::malformed(&[], "version 1 entries carry full values only")),
        (FormatVersion::V2, _) => {
            let diff = dec.diff(tag, payload, 0)?;
            diff.validate(&mut Vec::new()).map_err(|e| match e {
                EncodeError::InvariantViolation { path, reason } => DecodeError::Malformed { path, reason },
                other => DecodeError::Malformed {
                    path: String::new(),
                    reason: other.to_string(),
                },
            })?;
            Ok(EncodingMode::Diff(diff))
        }
    }
}

struct Decoder {
    max_depth: usize,
    path: Path,
}

impl Decoder {
    fn err(&self, reason: impl Into<String>) -> DecodeError {
        DecodeError::malformed(&self.path, reason)
    }

    fn enter(&self, depth: usize) -> Result<usize, DecodeError> {
        if depth >= self.max_depth {
            return Err(DecodeError::TooDeep {
                path: pointer(&self.path),
                limit: self.max_depth,
            });
        }
        Ok(depth + 1)
    }

    fn value(&self, v: &Json, depth: usize) -> Result<Value, DecodeError> {
        self.check_value_depth(v, depth)?;
        Ok(Value::from(v))
    }

    fn check_value_depth(&self, v: &Json, depth: usize) -> Result<(), DecodeError> {
        match v {
            Json::Array(arr) => {
                let depth = self.enter(depth)?;
                arr.iter().try_for_each(|item| self.check_value_depth(item, depth))
            }
            Json::Object(map) => {
                let depth = self.enter(depth)?;
                map.values().try_for_each(|item| self.check_value_depth(item, depth))
            }
            _ => Ok(()),
        }
    }

    fn diff(&mut self, tag: &str, payload: &Json, depth: usize) -> Result<Diff, DecodeError> {
        let depth = self.enter(depth)?;
        let groups = payload
            .as_object()
            .ok_or_else(|| self.err("diff must be an object"))?;
        match tag {
            TAG_OBJECT => Ok(Diff::Object(self.object_diff(groups, depth)?)),
            TAG_ARRAY => Ok(Diff::Array(self.array_diff(groups, depth)?)),
            other => Err(self.err(format!("unknown tag '{other}'"))),
        }
    }

    fn change(&mut self, v: &Json, depth: usize) -> Result<Change, DecodeError> {
        let m = v
            .as_object()
            .filter(|m| m.len() == 1)
            .ok_or_else(|| self.err("change must be an object with a single tag"))?;
        let (tag, payload) = m
            .iter()
            .next()
            .ok_or_else(|| self.err("change must be an object with a single tag"))?;
        if tag == TAG_VALUE {
            Ok(Change::Replace(self.value(payload, depth)?))
        } else {
            Ok(Change::Diff(self.diff(tag, payload, depth)?))
        }
    }

    fn names(&self, v: &Json, group: &str) -> Result<Vec<String>, DecodeError> {
        let arr = v
            .as_array()
            .ok_or_else(|| self.err(format!("'{group}' must be an array")))?;
        arr.iter()
            .map(|n| {
                n.as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| self.err(format!("'{group}' must hold field names")))
            })
            .collect()
    }

    fn pairs<'a>(&self, v: &'a Json, group: &str) -> Result<Vec<(&'a Json, &'a Json)>, DecodeError> {
        let arr = v
            .as_array()
            .ok_or_else(|| self.err(format!("'{group}' must be an array")))?;
        arr.iter()
            .map(|item| match item.as_array().map(Vec::as_slice) {
                Some([key, val]) => Ok((key, val)),
                _ => Err(self.err(format!("'{group}' must hold two-element arrays"))),
            })
            .collect()
    }

    fn field_name<'a>(&self, v: &'a Json, group: &str) -> Result<&'a str, DecodeError> {
        v.as_str()
            .ok_or_else(|| self.err(format!("'{group}' keys must be field names")))
    }

    fn object_diff(&mut self, groups: &Map<String, Json>, depth: usize) -> Result<ObjectDiff, DecodeError> {
        let mut d = ObjectDiff::default();
        for (group, payload) in groups {
            match group.as_str() {
                GROUP_DELETE => {
                    for name in self.names(payload, group)? {
                        if !d.deletes.insert(name.clone()) {
                            return Err(self.err(format!("'{name}' deleted twice")));
                        }
                    }
                }
                GROUP_UPDATE => {
                    let mut updates = IndexMap::new();
                    for (key, change) in self.pairs(payload, group)? {
                        let name = self.field_name(key, group)?.to_owned();
                        self.path.push(name.clone());
                        let change = self.change(change, depth)?;
                        self.path.pop();
                        if updates.insert(name.clone(), change).is_some() {
                            return Err(self.err(format!("'{name}' updated twice")));
                        }
                    }
                    d.updates = updates;
                }
                GROUP_REORDER => d.reorder = Some(self.names(payload, group)?),
                GROUP_INSERT => {
                    let mut inserts = IndexMap::new();
                    for (key, value) in self.pairs(payload, group)? {
                        let name = self.field_name(key, group)?.to_owned();
                        self.path.push(name.clone());
                        let value = self.value(value, depth)?;
                        self.path.pop();
                        if inserts.insert(name.clone(), value).is_some() {
                            return Err(self.err(format!("'{name}' inserted twice")));
                        }
                    }
                    d.inserts = inserts;
                }
                other => return Err(self.err(format!("unknown object diff group '{other}'"))),
            }
        }
        Ok(d)
    }

    fn array_diff(&mut self, groups: &Map<String, Json>, depth: usize) -> Result<ArrayDiff, DecodeError> {
        let mut d = ArrayDiff::default();
        for (group, payload) in groups {
            match group.as_str() {
                GROUP_TRUNCATE => {
                    let len = payload
                        .as_u64()
                        .and_then(|n| usize::try_from(n).ok())
                        .ok_or_else(|| self.err("truncate length must be a non-negative integer"))?;
                    d.truncate_to = Some(len);
                }
                GROUP_POSITIONAL => {
                    for (index, change) in self.pairs(payload, group)? {
                        let index = index
                            .as_u64()
                            .and_then(|n| usize::try_from(n).ok())
                            .ok_or_else(|| self.err("array index must be a non-negative integer"))?;
                        self.path.push(index.to_string());
                        let change = self.change(change, depth)?;
                        self.path.pop();
                        d.positional.push((index, change));
                    }
                }
                GROUP_APPEND => {
                    let arr = payload
                        .as_array()
                        .ok_or_else(|| self.err("'e' must be an array"))?;
                    for value in arr {
                        self.path.push(APPEND_SEGMENT.into());
                        let value = self.value(value, depth)?;
                        self.path.pop();
                        d.append.push(value);
                    }
                }
                other => return Err(self.err(format!("unknown array diff group '{other}'"))),
            }
        }
        Ok(d)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
