//! Extended JSON: the wire encoding for values JSON cannot express natively.
//!
//! 32- and 64-bit integers, doubles, dates, binary data and object ids are
//! carried in single-key tagged wrappers such as `{"$numberLong": "42"}`.
//! Requests are written in canonical form; responses are accepted in either
//! canonical or relaxed form.
//!
//! ```
//! use serde_json::json;
//! use stitch_core::codec::ejson::{self, Mode};
//!
//! assert_eq!(ejson::stringify(&json!({ "test": 42 })), r#"{"test":{"$numberInt":"42"}}"#);
//! assert_eq!(ejson::parse(r#"{ "$numberLong": "42" }"#, Mode::Relaxed).unwrap(), json!(42));
//! ```

use std::collections::BTreeMap;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Datelike, SecondsFormat, TimeZone, Utc};
use serde_json::{Map, Number, Value, json};

use crate::error::DecodeError;

const NUMBER_INT: &str = "$numberInt";
const NUMBER_LONG: &str = "$numberLong";
const NUMBER_DOUBLE: &str = "$numberDouble";
const DATE: &str = "$date";
const BINARY: &str = "$binary";
const LEGACY_BINARY_TYPE: &str = "$type";
const OID: &str = "$oid";

/// Output form when converting back to plain JSON values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Every typed value is wrapped; lossless.
    Canonical,
    /// Numbers become plain JSON numbers and dates ISO-8601 strings where possible.
    Relaxed,
}

/// A typed value in the extended JSON data model.
#[derive(Debug, Clone, PartialEq)]
pub enum Bson {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    String(String),
    /// Milliseconds since the Unix epoch.
    DateTime(i64),
    Binary { subtype: u8, bytes: Vec<u8> },
    /// 24 lowercase hex characters.
    ObjectId(String),
    Array(Vec<Bson>),
    Document(BTreeMap<String, Bson>),
}

impl Bson {
    /// Interpret a JSON value, unwrapping any extended JSON wrappers.
    ///
    /// Plain integers become `Int32` when they fit and `Int64` otherwise.
    pub fn from_extended(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Null => Ok(Bson::Null),
            Value::Bool(b) => Ok(Bson::Boolean(*b)),
            Value::Number(n) => Ok(Self::from_number(n)),
            Value::String(s) => Ok(Bson::String(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(Self::from_extended)
                .collect::<Result<Vec<_>, _>>()
                .map(Bson::Array),
            Value::Object(map) => {
                if let Some(wrapped) = Self::from_wrapper(map)? {
                    return Ok(wrapped);
                }
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), Self::from_extended(v)?)))
                    .collect::<Result<BTreeMap<_, _>, DecodeError>>()
                    .map(Bson::Document)
            }
        }
    }

    /// Convert to a JSON value in the requested form.
    pub fn to_json(&self, mode: Mode) -> Value {
        match mode {
            Mode::Canonical => self.to_canonical(),
            Mode::Relaxed => self.to_relaxed(),
        }
    }

    /// Convert to canonical extended JSON.
    pub fn to_canonical(&self) -> Value {
        match self {
            Bson::Null => Value::Null,
            Bson::Boolean(b) => Value::Bool(*b),
            Bson::Int32(i) => json!({ NUMBER_INT: i.to_string() }),
            Bson::Int64(i) => json!({ NUMBER_LONG: i.to_string() }),
            Bson::Double(f) => json!({ NUMBER_DOUBLE: format_double(*f) }),
            Bson::String(s) => Value::String(s.clone()),
            Bson::DateTime(millis) => json!({ DATE: { NUMBER_LONG: millis.to_string() } }),
            Bson::Binary { subtype, bytes } => json!({
                BINARY: { "base64": BASE64.encode(bytes), "subType": format!("{:02x}", subtype) }
            }),
            Bson::ObjectId(hex) => json!({ OID: hex }),
            Bson::Array(items) => Value::Array(items.iter().map(Bson::to_canonical).collect()),
            Bson::Document(doc) => Value::Object(
                doc.iter()
                    .map(|(k, v)| (k.clone(), v.to_canonical()))
                    .collect::<Map<_, _>>(),
            ),
        }
    }

    /// Convert to relaxed extended JSON.
    pub fn to_relaxed(&self) -> Value {
        match self {
            Bson::Int32(i) => Value::from(*i),
            Bson::Int64(i) => Value::from(*i),
            Bson::Double(f) => match Number::from_f64(*f) {
                Some(n) => Value::Number(n),
                None => self.to_canonical(),
            },
            Bson::DateTime(millis) => match relaxed_date(*millis) {
                Some(iso) => json!({ DATE: iso }),
                None => self.to_canonical(),
            },
            Bson::Array(items) => Value::Array(items.iter().map(Bson::to_relaxed).collect()),
            Bson::Document(doc) => Value::Object(
                doc.iter()
                    .map(|(k, v)| (k.clone(), v.to_relaxed()))
                    .collect::<Map<_, _>>(),
            ),
            other => other.to_canonical(),
        }
    }

    fn from_number(n: &Number) -> Self {
        match n.as_i64() {
            Some(i) => match i32::try_from(i) {
                Ok(small) => Bson::Int32(small),
                Err(_) => Bson::Int64(i),
            },
            None => Bson::Double(n.as_f64().unwrap_or(f64::NAN)),
        }
    }

    fn from_wrapper(map: &Map<String, Value>) -> Result<Option<Self>, DecodeError> {
        if map.len() == 2 {
            if let (Some(data), Some(subtype)) = (map.get(BINARY), map.get(LEGACY_BINARY_TYPE)) {
                let data = wrapper_str(BINARY, data)?;
                let subtype = wrapper_str(LEGACY_BINARY_TYPE, subtype)?;
                return parse_binary(data, subtype).map(Some);
            }
            return Ok(None);
        }

        let Some((key, value)) = map.iter().next().filter(|_| map.len() == 1) else {
            return Ok(None);
        };

        let parsed = match key.as_str() {
            NUMBER_INT => {
                let s = wrapper_str(key, value)?;
                Bson::Int32(s.parse().map_err(|_| invalid(key, s))?)
            }
            NUMBER_LONG => {
                let s = wrapper_str(key, value)?;
                Bson::Int64(s.parse().map_err(|_| invalid(key, s))?)
            }
            NUMBER_DOUBLE => Bson::Double(parse_double(wrapper_str(key, value)?)?),
            DATE => Bson::DateTime(parse_date(value)?),
            OID => Bson::ObjectId(parse_oid(wrapper_str(key, value)?)?),
            BINARY => match value {
                Value::Object(inner) => {
                    let data = inner
                        .get("base64")
                        .ok_or_else(|| invalid(key, "missing 'base64'"))?;
                    let subtype = inner
                        .get("subType")
                        .ok_or_else(|| invalid(key, "missing 'subType'"))?;
                    parse_binary(wrapper_str(key, data)?, wrapper_str(key, subtype)?)?
                }
                _ => return Err(invalid(key, "expected a document")),
            },
            _ => return Ok(None),
        };

        Ok(Some(parsed))
    }
}

/// Re-encode a plain or extended JSON value in canonical form.
///
/// Values already carrying wrappers are preserved. A malformed wrapper is
/// passed through unchanged while everything around it is
/// still encoded.
pub fn to_canonical(value: &Value) -> Value {
    if let Ok(bson) = Bson::from_extended(value) {
        return bson.to_canonical();
    }
    match value {
        Value::Array(items) => Value::Array(items.iter().map(to_canonical).collect()),
        Value::Object(map) if Bson::from_wrapper(map).is_ok() => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), to_canonical(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Serialize a value as canonical extended JSON text.
pub fn stringify(value: &Value) -> String {
    to_canonical(value).to_string()
}

/// Parse extended JSON text, unwrapping values into the requested form.
///
/// # Errors
///
/// Returns a [`DecodeError`] if the text is not JSON or a wrapper is malformed.
pub fn parse(text: &str, mode: Mode) -> Result<Value, DecodeError> {
    let value: Value = serde_json::from_str(text)?;
    normalize(&value, mode)
}

/// Interpret the wrappers in an already-parsed value.
pub fn normalize(value: &Value, mode: Mode) -> Result<Value, DecodeError> {
    Ok(Bson::from_extended(value)?.to_json(mode))
}

fn wrapper_str<'a>(key: &str, value: &'a Value) -> Result<&'a str, DecodeError> {
    value.as_str().ok_or_else(|| invalid(key, "expected a string"))
}

fn invalid(key: &str, detail: &str) -> DecodeError {
    DecodeError::ExtendedJson {
        message: format!("{}: {}", key, detail),
    }
}

fn format_double(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        let s = if f > 0.0 { "Infinity" } else { "-Infinity" };
        s.to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

fn parse_double(s: &str) -> Result<f64, DecodeError> {
    match s {
        "Infinity" => Ok(f64::INFINITY),
        "-Infinity" => Ok(f64::NEG_INFINITY),
        "NaN" => Ok(f64::NAN),
        other => other.parse().map_err(|_| invalid(NUMBER_DOUBLE, other)),
    }
}

fn parse_date(value: &Value) -> Result<i64, DecodeError> {
    match value {
        Value::String(iso) => DateTime::parse_from_rfc3339(iso)
            .map(|dt| dt.timestamp_millis())
            .map_err(|e| invalid(DATE, &e.to_string())),
        Value::Object(inner) => match inner.get(NUMBER_LONG) {
            Some(millis) if inner.len() == 1 => {
                let s = wrapper_str(NUMBER_LONG, millis)?;
                s.parse().map_err(|_| invalid(DATE, s))
            }
            _ => Err(invalid(DATE, "expected {\"$numberLong\": ...}")),
        },
        Value::Number(n) => n.as_i64().ok_or_else(|| invalid(DATE, "expected integer millis")),
        _ => Err(invalid(DATE, "unsupported representation")),
    }
}

fn relaxed_date(millis: i64) -> Option<String> {
    let dt = Utc.timestamp_millis_opt(millis).single()?;
    (1970..=9999)
        .contains(&dt.year())
        .then(|| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn parse_oid(s: &str) -> Result<String, DecodeError> {
    if s.len() == 24 && s.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(s.to_ascii_lowercase())
    } else {
        Err(invalid(OID, s))
    }
}

fn parse_binary(data: &str, subtype: &str) -> Result<Bson, DecodeError> {
    let bytes = BASE64
        .decode(data)
        .map_err(|e| invalid(BINARY, &e.to_string()))?;
    let subtype = u8::from_str_radix(subtype, 16).map_err(|_| invalid(BINARY, subtype))?;
    Ok(Bson::Binary { subtype, bytes })
}
