//! Trigger execution records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::ids::{TriggerExecutionId, TriggerId};

/// Audit record of one successful trigger firing. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerExecution {
    pub id: TriggerExecutionId,
    pub trigger_id: TriggerId,
    pub event_metadata: Document,
    pub created: DateTime<Utc>,
}

impl TriggerExecution {
    #[must_use]
    pub fn new(trigger_id: TriggerId, event_metadata: Document) -> Self {
        Self {
            id: TriggerExecutionId::new(),
            trigger_id,
            event_metadata,
            created: Utc::now(),
        }
    }

    #[must_use]
    pub fn to_response(&self, hydrate: bool) -> TriggerExecutionResponse {
        TriggerExecutionResponse {
            id: self.id,
            body: TriggerExecutionResponseBody {
                trigger_id: self.trigger_id,
                created: self.created,
            },
            metadata: hydrate.then(|| TriggerExecutionResponseMetadata {
                event_metadata: self.event_metadata.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerExecutionFilter {
    #[serde(default)]
    pub trigger_id: Option<TriggerId>,
    #[serde(default)]
    pub created_after: Option<DateTime<Utc>>,
}

impl TriggerExecutionFilter {
    #[must_use]
    pub fn for_trigger(trigger_id: TriggerId) -> Self {
        Self {
            trigger_id: Some(trigger_id),
            created_after: None,
        }
    }

    #[must_use]
    pub fn matches(&self, execution: &TriggerExecution) -> bool {
        self.trigger_id.map_or(true, |t| t == execution.trigger_id)
            && self.created_after.map_or(true, |after| execution.created > after)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerExecutionResponseBody {
    pub trigger_id: TriggerId,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerExecutionResponseMetadata {
    pub event_metadata: Document,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerExecutionResponse {
    pub id: TriggerExecutionId,
    pub body: TriggerExecutionResponseBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TriggerExecutionResponseMetadata>,
}
