//! Identifier newtypes.
//!
//! Every resource is addressed by a UUID wrapped in its own type so that a
//! trigger id can never be passed where an event source id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(
    /// Identifier of a workspace.
    WorkspaceId
);
define_id!(
    /// Identifier of a configured event source.
    EventSourceId
);
define_id!(
    /// Identifier of a reusable action.
    ActionId
);
define_id!(
    /// Identifier of a trigger.
    TriggerId
);
define_id!(
    /// Identifier of a trigger execution record.
    TriggerExecutionId
);
define_id!(
    /// Identifier of a stack component.
    ComponentId
);
define_id!(
    /// Identifier of a single emitted event.
    EventId
);
