//! Persistence codec for opaque documents.
//!
//! Filter, action and event-metadata documents are stored as
//! `base64(JSON)` byte blobs. Encoding and decoding happen only here; every
//! layer above works with structured [`Document`]s.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::document::Document;

use super::StorageError;

/// Encodes a document into its persisted form.
///
/// Format: standard-alphabet, padded base64 over compact JSON.
///
/// # Errors
/// `SerializationError` if the document cannot be serialized.
pub fn encode_document(doc: &Document) -> Result<Vec<u8>, StorageError> {
    let json = serde_json::to_vec(doc)
        .map_err(|e| StorageError::SerializationError(format!("serialization failed: {e}")))?;
    Ok(STANDARD.encode(json).into_bytes())
}

/// Decodes a persisted blob back into a document.
///
/// # Errors
/// `SerializationError` if the blob is not base64, not JSON, or not an object.
pub fn decode_document(blob: &[u8]) -> Result<Document, StorageError> {
    let json = STANDARD
        .decode(blob)
        .map_err(|e| StorageError::SerializationError(format!("invalid base64: {e}")))?;
    serde_json::from_slice(&json)
        .map_err(|e| StorageError::SerializationError(format!("deserialization failed: {e}")))
}

/// Decodes an optional blob; absent blobs decode to an empty document.
///
/// # Errors
/// See [`decode_document`].
pub fn decode_optional_document(blob: Option<&[u8]>) -> Result<Document, StorageError> {
    blob.map_or_else(|| Ok(Document::new()), decode_document)
}
