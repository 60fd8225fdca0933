//! Storage layer.
//!
//! Traits define the abstract interface for backends; `memory` is the
//! reference implementation. Opaque documents cross the storage boundary as
//! `base64(JSON)` blobs via `codec`.

pub mod codec;
mod memory;
mod records;
mod traits;

pub use codec::{decode_document, decode_optional_document, encode_document};
pub use memory::{
    InMemoryActionStore, InMemoryComponentStore, InMemoryEventSourceStore,
    InMemoryTriggerExecutionStore, InMemoryTriggerStore, InMemoryWorkspaceStore, Stores,
};
pub use records::{TriggerExecutionRecord, TriggerRecord};
pub use traits::{
    ActionStore, ComponentStore, EventSourceStore, StorageError, TriggerExecutionStore,
    TriggerStore, WorkspaceStore,
};
