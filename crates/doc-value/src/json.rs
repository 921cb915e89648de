//! Conversion between [`Value`] and `serde_json::Value`.
//!
//! Field order is carried across in both directions (`serde_json` is built
//! with `preserve_order`). Numbers that fit an `i64` become [`Scalar::Int`];
//! every other number becomes [`Scalar::Float`].

use serde_json::{Map, Number};
use thiserror::Error;

use crate::value::{Object, Scalar, Value};

#[derive(Debug, Error, PartialEq)]
pub enum ValueError {
    /// JSON has no representation for NaN or infinities.
    #[error("non-finite number {0} cannot be represented as JSON")]
    NonFiniteNumber(f64),
    #[error("invalid JSON: {0}")]
    Json(String),
}

impl From<serde_json::Error> for ValueError {
    fn from(e: serde_json::Error) -> Self {
        ValueError::Json(e.to_string())
    }
}

// ── serde_json → Value ────────────────────────────────────────────────────

fn number_to_scalar(n: &Number) -> Scalar {
    if let Some(i) = n.as_i64() {
        Scalar::Int(i)
    } else {
        // u64 above i64::MAX and all fractional numbers.
        Scalar::Float(n.as_f64().unwrap_or(f64::NAN))
    }
}

impl From<&serde_json::Value> for Value {
    fn from(v: &serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Scalar(Scalar::Null),
            serde_json::Value::Bool(b) => Value::Scalar(Scalar::Bool(*b)),
            serde_json::Value::Number(n) => Value::Scalar(number_to_scalar(n)),
            serde_json::Value::String(s) => Value::Scalar(Scalar::Str(s.clone())),
            serde_json::Value::Array(arr) => Value::Array(arr.iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect::<Object>(),
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Array(arr) => Value::Array(arr.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect::<Object>(),
            ),
            other => Value::from(&other),
        }
    }
}

// ── Value → serde_json ────────────────────────────────────────────────────

impl TryFrom<&Value> for serde_json::Value {
    type Error = ValueError;

    fn try_from(v: &Value) -> Result<Self, Self::Error> {
        Ok(match v {
            Value::Scalar(Scalar::Null) => serde_json::Value::Null,
            Value::Scalar(Scalar::Bool(b)) => serde_json::Value::Bool(*b),
            Value::Scalar(Scalar::Int(i)) => serde_json::Value::Number((*i).into()),
            Value::Scalar(Scalar::Float(f)) => Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .ok_or(ValueError::NonFiniteNumber(*f))?,
            Value::Scalar(Scalar::Str(s)) => serde_json::Value::String(s.clone()),
            Value::Array(arr) => serde_json::Value::Array(
                arr.iter()
                    .map(serde_json::Value::try_from)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), serde_json::Value::try_from(v)?);
                }
                serde_json::Value::Object(out)
            }
        })
    }
}

impl Value {
    /// Parses JSON text into a value.
    pub fn from_json_str(s: &str) -> Result<Value, ValueError> {
        let v: serde_json::Value = serde_json::from_str(s)?;
        Ok(Value::from(v))
    }

    /// Serializes the value as compact JSON text.
    pub fn to_json_string(&self) -> Result<String, ValueError> {
        let v = serde_json::Value::try_from(self)?;
        Ok(v.to_string())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_split_into_int_and_float() {
        assert_eq!(Value::from(json!(3)), Value::from(3i64));
        assert_eq!(Value::from(json!(-3)), Value::from(-3i64));
        assert_eq!(Value::from(json!(1.5)), Value::from(1.5));
        assert_eq!(
            Value::from(json!(u64::MAX)),
            Value::from(u64::MAX as f64)
        );
    }

    #[test]
    fn field_order_survives_conversion() {
        let v = Value::from(json!({"z": 1, "a": 2, "m": 3}));
        let keys: Vec<&str> = v.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, ["z", "a", "m"]);
        let back = serde_json::Value::try_from(&v).unwrap();
        assert_eq!(back.to_string(), r#"{"z":1,"a":2,"m":3}"#);
    }

    #[test]
    fn non_finite_float_is_rejected() {
        let v = Value::Array(vec![Value::from(f64::INFINITY)]);
        assert_eq!(
            serde_json::Value::try_from(&v),
            Err(ValueError::NonFiniteNumber(f64::INFINITY))
        );
    }

    #[test]
    fn parse_and_print() {
        let v = Value::from_json_str(r#"{"a":[1,2.5,"x",null,true]}"#).unwrap();
        assert_eq!(v.to_json_string().unwrap(), r#"{"a":[1,2.5,"x",null,true]}"#);
        assert!(Value::from_json_str("{").is_err());
    }
}
