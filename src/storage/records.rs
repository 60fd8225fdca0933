//! Row representations of the blob-carrying tables.
//!
//! Only triggers and trigger executions persist opaque documents. Their rows
//! hold the encoded bytes; conversion to and from the domain models goes
//! through [`super::codec`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{EventSourceId, TriggerExecutionId, TriggerId, WorkspaceId};
use crate::models::{Trigger, TriggerExecution};

use super::codec::{decode_document, decode_optional_document, encode_document};
use super::StorageError;

/// Persisted trigger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRecord {
    pub id: TriggerId,
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub event_source_id: EventSourceId,
    pub event_filter: Vec<u8>,
    pub action_flavor: String,
    pub action_subtype: String,
    pub action: Vec<u8>,
    pub is_active: bool,
    pub description: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl TriggerRecord {
    /// # Errors
    /// `SerializationError` if a document cannot be encoded.
    pub fn from_model(trigger: &Trigger) -> Result<Self, StorageError> {
        Ok(Self {
            id: trigger.id,
            workspace_id: trigger.workspace_id,
            name: trigger.name.clone(),
            event_source_id: trigger.event_source_id,
            event_filter: encode_document(&trigger.event_filter)?,
            action_flavor: trigger.action_flavor.clone(),
            action_subtype: trigger.action_subtype.clone(),
            action: encode_document(&trigger.action)?,
            is_active: trigger.is_active,
            description: trigger.description.clone(),
            created: trigger.created,
            updated: trigger.updated,
        })
    }

    /// # Errors
    /// `SerializationError` if a stored blob is corrupt.
    pub fn into_model(self) -> Result<Trigger, StorageError> {
        Ok(Trigger {
            id: self.id,
            workspace_id: self.workspace_id,
            name: self.name,
            event_source_id: self.event_source_id,
            event_filter: decode_document(&self.event_filter)?,
            action_flavor: self.action_flavor,
            action_subtype: self.action_subtype,
            action: decode_document(&self.action)?,
            is_active: self.is_active,
            description: self.description,
            created: self.created,
            updated: self.updated,
        })
    }
}

/// Persisted execution row. `event_metadata` is nullable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerExecutionRecord {
    pub id: TriggerExecutionId,
    pub trigger_id: TriggerId,
    pub event_metadata: Option<Vec<u8>>,
    pub created: DateTime<Utc>,
}

impl TriggerExecutionRecord {
    /// Empty metadata is stored as NULL.
    ///
    /// # Errors
    /// `SerializationError` if the metadata cannot be encoded.
    pub fn from_model(execution: &TriggerExecution) -> Result<Self, StorageError> {
        let event_metadata = if execution.event_metadata.is_empty() {
            None
        } else {
            Some(encode_document(&execution.event_metadata)?)
        };
        Ok(Self {
            id: execution.id,
            trigger_id: execution.trigger_id,
            event_metadata,
            created: execution.created,
        })
    }

    /// # Errors
    /// `SerializationError` if the stored blob is corrupt.
    pub fn into_model(self) -> Result<TriggerExecution, StorageError> {
        Ok(TriggerExecution {
            id: self.id,
            trigger_id: self.trigger_id,
            event_metadata: decode_optional_document(self.event_metadata.as_deref())?,
            created: self.created,
        })
    }
}
