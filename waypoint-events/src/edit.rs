//! Edit status events emitted by the batched edit coordinator.

use crate::bus::{BusEvent, EventBus, Subscription};
use serde::{Deserialize, Serialize};
use waypoint_core::RecordId;

/// Progress of one row's flush.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EditEvent {
    /// A flush carrying these fields was sent to the store.
    Saving { row_id: RecordId, fields: Vec<String> },

    /// The store accepted the flush.
    Saved { row_id: RecordId, fields: Vec<String> },

    /// The store rejected the flush and the fields were restored.
    RolledBack {
        row_id: RecordId,
        fields: Vec<String>,
        message: String,
    },
}

impl EditEvent {
    pub fn row_id(&self) -> RecordId {
        match self {
            EditEvent::Saving { row_id, .. }
            | EditEvent::Saved { row_id, .. }
            | EditEvent::RolledBack { row_id, .. } => *row_id,
        }
    }

    pub fn fields(&self) -> &[String] {
        match self {
            EditEvent::Saving { fields, .. }
            | EditEvent::Saved { fields, .. }
            | EditEvent::RolledBack { fields, .. } => fields,
        }
    }
}

impl BusEvent for EditEvent {
    fn event_type(&self) -> &'static str {
        match self {
            EditEvent::Saving { .. } => "Saving",
            EditEvent::Saved { .. } => "Saved",
            EditEvent::RolledBack { .. } => "RolledBack",
        }
    }
}

/// Bus carrying [`EditEvent`].
pub type EditBus = EventBus<EditEvent>;

/// Subscription to an [`EditBus`].
pub type EditSubscription = Subscription<EditEvent>;
