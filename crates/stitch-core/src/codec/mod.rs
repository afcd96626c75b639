//! Codecs between typed entities and wire documents.
//!
//! A wire document is a JSON object with stable string keys. Codecs are pure
//! data mappings: they never perform I/O, ignore undeclared keys on decode,
//! and decode absent optional fields to `None`.

pub mod ejson;

use serde_json::Value;

use crate::error::DecodeError;

pub use ejson::Bson;

/// A wire document.
pub type Document = serde_json::Map<String, Value>;

/// Bidirectional mapping between `T` and a wire [`Document`].
///
/// For any value built only from the declared fields,
/// `decode(&encode(&value)) == Ok(value)`.
pub trait Codec<T> {
    /// Encode a value into a document containing exactly the declared fields.
    fn encode(&self, value: &T) -> Document;

    /// Decode a value from a document, ignoring undeclared fields.
    fn decode(&self, document: &Document) -> Result<T, DecodeError>;
}

/// Read a required string field.
pub fn required_str(document: &Document, field: &str) -> Result<String, DecodeError> {
    optional_str(document, field)?.ok_or_else(|| DecodeError::MissingField {
        field: field.to_string(),
    })
}

/// Read an optional string field; absent and `null` both decode to `None`.
pub fn optional_str(document: &Document, field: &str) -> Result<Option<String>, DecodeError> {
    match document.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(DecodeError::WrongType {
            field: field.to_string(),
            expected: "a string",
        }),
    }
}

/// Read an optional sub-document field.
pub fn optional_document<'a>(
    document: &'a Document,
    field: &str,
) -> Result<Option<&'a Document>, DecodeError> {
    match document.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(DecodeError::WrongType {
            field: field.to_string(),
            expected: "a document",
        }),
    }
}

/// Interpret a JSON value as a document.
pub fn as_document(value: Value) -> Result<Document, DecodeError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(DecodeError::Malformed {
            message: "expected a JSON object".to_string(),
        }),
    }
}
