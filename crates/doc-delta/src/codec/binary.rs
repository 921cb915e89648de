//! Compact binary codec for log entries.
//!
//! An entry is a version byte followed by a body. Version 1 bodies are a bare
//! value; version 2 bodies are a change. Diffs are marker-prefixed entry
//! streams closed by [`END`]:
//!
//! ```text
//! change   := UPDATE value | OBJECT_DIFF objdiff | ARRAY_DIFF arrdiff
//! objdiff  := (DELETE NAME str)* (UPDATE NAME str change)* (REORDER u32 str*)?
//!             (INSERT NAME str value)* END
//! arrdiff  := (RESIZE u64)? (UPDATE INDEX u64 change)* (APPEND value)* END
//! ```
//!
//! Groups must appear in apply order; the decoder rejects interleaving.
//! Integers are little-endian, strings are `u32` length-prefixed UTF-8 and
//! floats keep their exact bit pattern.

use doc_value::{Object, Scalar, Value};
use indexmap::IndexMap;

use crate::error::{pointer, DecodeError, EncodeError, APPEND_SEGMENT};
use crate::types::{
    ArrayDiff, Change, CodecOptions, Diff, EncodingMode, FormatVersion, ObjectDiff, Path,
};

pub const END: u8 = 0;
pub const NAME: u8 = 1;
pub const INDEX: u8 = 2;
pub const OBJECT_DIFF: u8 = 149;
pub const UPDATE: u8 = 150;
pub const INSERT: u8 = 151;
pub const DELETE: u8 = 152;
pub const RESIZE: u8 = 153;
pub const ARRAY_DIFF: u8 = 154;
pub const REORDER: u8 = 155;
pub const APPEND: u8 = 156;

const T_NULL: u8 = 0;
const T_FALSE: u8 = 1;
const T_TRUE: u8 = 2;
const T_INT: u8 = 3;
const T_FLOAT: u8 = 4;
const T_STR: u8 = 5;
const T_ARRAY: u8 = 6;
const T_OBJECT: u8 = 7;

// ── Writer ────────────────────────────────────────────────────────────────

struct Writer {
    buf: Vec<u8>,
    path: Path,
}

impl Writer {
    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn len(&mut self, n: usize) -> Result<(), EncodeError> {
        let n = u32::try_from(n)
            .map_err(|_| EncodeError::invariant(&self.path, format!("length {n} exceeds u32")))?;
        self.buf.extend_from_slice(&n.to_le_bytes());
        Ok(())
    }

    fn str(&mut self, s: &str) -> Result<(), EncodeError> {
        self.len(s.len())?;
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }

    fn value(&mut self, v: &Value) -> Result<(), EncodeError> {
        match v {
            Value::Scalar(Scalar::Null) => self.u8(T_NULL),
            Value::Scalar(Scalar::Bool(false)) => self.u8(T_FALSE),
            Value::Scalar(Scalar::Bool(true)) => self.u8(T_TRUE),
            Value::Scalar(Scalar::Int(n)) => {
                self.u8(T_INT);
                self.buf.extend_from_slice(&n.to_le_bytes());
            }
            Value::Scalar(Scalar::Float(f)) => {
                self.u8(T_FLOAT);
                self.u64(f.to_bits());
            }
            Value::Scalar(Scalar::Str(s)) => {
                self.u8(T_STR);
                self.str(s)?;
            }
            Value::Array(arr) => {
                self.u8(T_ARRAY);
                self.len(arr.len())?;
                for item in arr {
                    self.value(item)?;
                }
            }
            Value::Object(obj) => {
                self.u8(T_OBJECT);
                self.len(obj.len())?;
                for (key, item) in obj {
                    self.str(key)?;
                    self.value(item)?;
                }
            }
        }
        Ok(())
    }

    fn change(&mut self, change: &Change) -> Result<(), EncodeError> {
        match change {
            Change::Replace(v) => {
                self.u8(UPDATE);
                self.value(v)
            }
            Change::Diff(d) => self.diff(d),
        }
    }

    fn diff(&mut self, diff: &Diff) -> Result<(), EncodeError> {
        match diff {
            Diff::Object(d) => {
                self.u8(OBJECT_DIFF);
                self.object_diff(d)
            }
            Diff::Array(d) => {
                self.u8(ARRAY_DIFF);
                self.array_diff(d)
            }
        }
    }

    fn object_diff(&mut self, d: &ObjectDiff) -> Result<(), EncodeError> {
        for name in &d.deletes {
            self.u8(DELETE);
            self.u8(NAME);
            self.str(name)?;
        }
        for (name, change) in &d.updates {
            self.u8(UPDATE);
            self.u8(NAME);
            self.str(name)?;
            self.path.push(name.clone());
            self.change(change)?;
            self.path.pop();
        }
        if let Some(order) = &d.reorder {
            self.u8(REORDER);
            self.len(order.len())?;
            for name in order {
                self.str(name)?;
            }
        }
        for (name, value) in &d.inserts {
            self.u8(INSERT);
            self.u8(NAME);
            self.str(name)?;
            self.value(value)?;
        }
        self.u8(END);
        Ok(())
    }

    fn array_diff(&mut self, d: &ArrayDiff) -> Result<(), EncodeError> {
        if let Some(len) = d.truncate_to {
            self.u8(RESIZE);
            self.u64(len as u64);
        }
        for (index, change) in &d.positional {
            self.u8(UPDATE);
            self.u8(INDEX);
            self.u64(*index as u64);
            self.path.push(index.to_string());
            self.change(change)?;
            self.path.pop();
        }
        for value in &d.append {
            self.u8(APPEND);
            self.value(value)?;
        }
        self.u8(END);
        Ok(())
    }
}

/// Encodes an encoding mode into its binary form.
pub fn encode(mode: &EncodingMode, opts: &CodecOptions) -> Result<Vec<u8>, EncodeError> {
    let version = opts.format_version;
    let mut w = Writer {
        buf: Vec::with_capacity(64),
        path: Vec::new(),
    };
    w.u8(version.as_u8());
    match (version, mode) {
        (FormatVersion::V1, EncodingMode::Replace(v)) => w.value(v)?,
        (FormatVersion::V1, EncodingMode::Diff(_)) => {
            return Err(EncodeError::DiffNotSupported(version.as_u8()))
        }
        (FormatVersion::V2, EncodingMode::Replace(v)) => {
            w.u8(UPDATE);
            w.value(v)?;
        }
        (FormatVersion::V2, EncodingMode::Diff(d)) => {
            d.validate(&mut Vec::new())?;
            w.diff(d)?;
        }
    }
    Ok(w.buf)
}

// ── Reader ────────────────────────────────────────────────────────────────

struct Reader<'a> {
    data: &'a [u8],
    x: usize,
    max_depth: usize,
    path: Path,
}

impl<'a> Reader<'a> {
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

    fn buf(&mut self, size: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .x
            .checked_add(size)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| self.err(format!("unexpected end of input at byte {}", self.x)))?;
        let data = self.data;
        let bytes = &data[self.x..end];
        self.x = end;
        Ok(bytes)
    }

    fn peek(&self) -> Result<u8, DecodeError> {
        self.data
            .get(self.x)
            .copied()
            .ok_or_else(|| self.err(format!("unexpected end of input at byte {}", self.x)))
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        let b = self.peek()?;
        self.x += 1;
        Ok(b)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.buf(N)?);
        Ok(out)
    }

    fn u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn usize(&mut self) -> Result<usize, DecodeError> {
        let n = self.u64()?;
        usize::try_from(n).map_err(|_| self.err(format!("{n} does not fit in usize")))
    }

    fn len(&mut self) -> Result<usize, DecodeError> {
        Ok(u32::from_le_bytes(self.array()?) as usize)
    }

    fn str(&mut self) -> Result<String, DecodeError> {
        let len = self.len()?;
        let bytes = self.buf(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| self.err("invalid UTF-8 in string"))
    }

    fn expect(&mut self, marker: u8, what: &str) -> Result<(), DecodeError> {
        let b = self.u8()?;
        if b != marker {
            return Err(self.err(format!("expected {what} marker, found {b}")));
        }
        Ok(())
    }

    fn value(&mut self, depth: usize) -> Result<Value, DecodeError> {
        let tag = self.u8()?;
        let v = match tag {
            T_NULL => Value::NULL,
            T_FALSE => Value::from(false),
            T_TRUE => Value::from(true),
            T_INT => Value::from(i64::from_le_bytes(self.array()?)),
            T_FLOAT => Value::from(f64::from_bits(self.u64()?)),
            T_STR => Value::from(self.str()?),
            T_ARRAY => {
                let depth = self.enter(depth)?;
                let len = self.len()?;
                // Every element takes at least one byte.
                let mut arr = Vec::with_capacity(len.min(self.data.len() - self.x));
                for _ in 0..len {
                    arr.push(self.value(depth)?);
                }
                Value::Array(arr)
            }
            T_OBJECT => {
                let depth = self.enter(depth)?;
                let len = self.len()?;
                let mut obj = Object::with_capacity(len.min(self.data.len() - self.x));
                for _ in 0..len {
                    let key = self.str()?;
                    let item = self.value(depth)?;
                    if obj.insert(key.clone(), item).is_some() {
                        return Err(self.err(format!("duplicate field '{key}'")));
                    }
                }
                Value::Object(obj)
            }
            other => return Err(self.err(format!("unknown value tag {other}"))),
        };
        Ok(v)
    }

    fn change(&mut self, depth: usize) -> Result<Change, DecodeError> {
        match self.peek()? {
            UPDATE => {
                self.x += 1;
                Ok(Change::Replace(self.value(depth)?))
            }
            _ => Ok(Change::Diff(self.diff(depth)?)),
        }
    }

    fn diff(&mut self, depth: usize) -> Result<Diff, DecodeError> {
        let depth = self.enter(depth)?;
        match self.u8()? {
            OBJECT_DIFF => Ok(Diff::Object(self.object_diff(depth)?)),
            ARRAY_DIFF => Ok(Diff::Array(self.array_diff(depth)?)),
            other => Err(self.err(format!("unknown diff marker {other}"))),
        }
    }

    fn object_diff(&mut self, depth: usize) -> Result<ObjectDiff, DecodeError> {
        let mut d = ObjectDiff::default();
        let mut updates = IndexMap::new();
        let mut inserts = IndexMap::new();
        let mut phase = 0;
        loop {
            let marker = self.u8()?;
            let next = match marker {
                END => break,
                DELETE => 0,
                UPDATE => 1,
                REORDER => 2,
                INSERT => 3,
                other => return Err(self.err(format!("unknown object diff marker {other}"))),
            };
            if next < phase || (next == 2 && d.reorder.is_some()) {
                return Err(self.err(format!("object diff marker {marker} out of order")));
            }
            phase = next;
            match marker {
                DELETE => {
                    self.expect(NAME, "field name")?;
                    let name = self.str()?;
                    if !d.deletes.insert(name.clone()) {
                        return Err(self.err(format!("'{name}' deleted twice")));
                    }
                }
                UPDATE => {
                    self.expect(NAME, "field name")?;
                    let name = self.str()?;
                    self.path.push(name.clone());
                    let change = self.change(depth)?;
                    self.path.pop();
                    if updates.insert(name.clone(), change).is_some() {
                        return Err(self.err(format!("'{name}' updated twice")));
                    }
                }
                REORDER => {
                    let len = self.len()?;
                    let mut order = Vec::with_capacity(len.min(self.data.len() - self.x));
                    for _ in 0..len {
                        order.push(self.str()?);
                    }
                    d.reorder = Some(order);
                }
                _ => {
                    self.expect(NAME, "field name")?;
                    let name = self.str()?;
                    self.path.push(name.clone());
                    let value = self.value(depth)?;
                    self.path.pop();
                    if inserts.insert(name.clone(), value).is_some() {
                        return Err(self.err(format!("'{name}' inserted twice")));
                    }
                }
            }
        }
        d.updates = updates;
        d.inserts = inserts;
        Ok(d)
    }

    fn array_diff(&mut self, depth: usize) -> Result<ArrayDiff, DecodeError> {
        let mut d = ArrayDiff::default();
        let mut phase = 0;
        loop {
            let marker = self.u8()?;
            let next = match marker {
                END => break,
                RESIZE => 0,
                UPDATE => 1,
                APPEND => 2,
                other => return Err(self.err(format!("unknown array diff marker {other}"))),
            };
            if next < phase || (next == 0 && d.truncate_to.is_some()) {
                return Err(self.err(format!("array diff marker {marker} out of order")));
            }
            phase = next;
            match marker {
                RESIZE => d.truncate_to = Some(self.usize()?),
                UPDATE => {
                    self.expect(INDEX, "array index")?;
                    let index = self.usize()?;
                    self.path.push(index.to_string());
                    let change = self.change(depth)?;
                    self.path.pop();
                    d.positional.push((index, change));
                }
                _ => {
                    self.path.push(APPEND_SEGMENT.into());
                    let value = self.value(depth)?;
                    self.path.pop();
                    d.append.push(value);
                }
            }
        }
        Ok(d)
    }
}

/// Decodes a binary entry.
pub fn decode(data: &[u8], opts: &CodecOptions) -> Result<EncodingMode, DecodeError> {
    let mut r = Reader {
        data,
        x: 0,
        max_depth: opts.max_depth,
        path: Vec::new(),
    };
    let version = r.u8()?;
    let version =
        FormatVersion::from_i64(version.into()).ok_or(DecodeError::UnsupportedVersion(version.into()))?;
    let mode = match version {
        FormatVersion::V1 => EncodingMode::Replace(r.value(0)?),
        FormatVersion::V2 => match r.change(0)? {
            Change::Replace(v) => EncodingMode::Replace(v),
            Change::Diff(d) => {
                d.validate(&mut Vec::new()).map_err(|e| match e {
                    EncodeError::InvariantViolation { path, reason } => {
                        DecodeError::Malformed { path, reason }
                    }
                    other => DecodeError::malformed(&[], other.to_string()),
                })?;
                EncodingMode::Diff(d)
            }
        },
    };
    if r.x != data.len() {
        return Err(DecodeError::malformed(
            &[],
            format!("{} trailing bytes", data.len() - r.x),
        ));
    }
    Ok(mode)
}

// ── Tests ─────────────────────────────────────────────────────────────────
