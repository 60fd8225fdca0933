//! Structured configuration documents.
//!
//! Filters, action configurations and event payloads are opaque to the core.
//! In memory they are ordered string keyed maps of JSON values; only the
//! persistence layer ever sees them as bytes.

use serde_json::{Map, Value};

/// An ordered mapping of string keys to dynamically-typed values.
pub type Document = Map<String, Value>;

/// Builds a [`Document`] from a `serde_json::json!` object literal.
///
/// Non-object values yield an empty document.
#[must_use]
pub fn document(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}

/// Resolves a dotted path (`"repository.owner.login"`) inside a document.
///
/// Array elements can be addressed by their numeric index.
#[must_use]
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = doc.get(first)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Human-readable JSON type name, used in configuration errors.
#[must_use]
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
