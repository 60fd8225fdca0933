//! Events produced by event sources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::Document;
use crate::ids::{EventId, EventSourceId};

/// An event emitted by an event source.
///
/// Events are immutable once produced and are never persisted by the core;
/// only their [`Event::metadata`] ends up in trigger execution records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub source_id: EventSourceId,
    pub payload: Document,
    pub occurred_at: DateTime<Utc>,
}

impl Event {
    /// Creates an event that occurred now.
    #[must_use]
    pub fn new(source_id: EventSourceId, payload: Document) -> Self {
        Self::at(source_id, payload, Utc::now())
    }

    /// Creates an event with an explicit occurrence time.
    #[must_use]
    pub fn at(source_id: EventSourceId, payload: Document, occurred_at: DateTime<Utc>) -> Self {
        Self {
            id: EventId::new(),
            source_id,
            payload,
            occurred_at,
        }
    }

    /// blake3 digest of the payload's JSON form.
    ///
    /// `Document` keeps keys sorted, so equal payloads hash equally.
    #[must_use]
    pub fn digest(&self) -> String {
        let bytes = serde_json::to_vec(&self.payload).unwrap_or_default();
        blake3::hash(&bytes).to_hex().to_string()
    }

    /// Metadata document recorded with a trigger execution.
    #[must_use]
    pub fn metadata(&self) -> Document {
        let mut doc = Document::new();
        doc.insert("event_id".to_string(), Value::String(self.id.to_string()));
        doc.insert(
            "event_source_id".to_string(),
            Value::String(self.source_id.to_string()),
        );
        doc.insert(
            "occurred_at".to_string(),
            Value::String(self.occurred_at.to_rfc3339()),
        );
        doc.insert("digest".to_string(), Value::String(self.digest()));
        doc.insert("payload".to_string(), Value::Object(self.payload.clone()));
        doc
    }
}
