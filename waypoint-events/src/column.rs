//! Columns-changed notifications.

use crate::bus::{BusEvent, EventBus, Subscription};
use serde::{Deserialize, Serialize};
use waypoint_core::{ColumnDefinition, ColumnId};

/// What happened to the column set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnChangeKind {
    Created,
    Updated,
    Deleted,
    Reordered,
}

/// Published after every successful registry mutation.
///
/// Subscribers treat it as a signal to re-read the registry; the payload
/// only says which definition moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnsChanged {
    pub kind: ColumnChangeKind,
    /// Affected definition; None for changes spanning many definitions
    pub column_id: Option<ColumnId>,
    pub field_key: Option<String>,
}

impl ColumnsChanged {
    pub fn created(def: &ColumnDefinition) -> Self {
        Self::for_column(ColumnChangeKind::Created, def)
    }

    pub fn updated(def: &ColumnDefinition) -> Self {
        Self::for_column(ColumnChangeKind::Updated, def)
    }

    pub fn deleted(def: &ColumnDefinition) -> Self {
        Self::for_column(ColumnChangeKind::Deleted, def)
    }

    pub fn reordered() -> Self {
        Self {
            kind: ColumnChangeKind::Reordered,
            column_id: None,
            field_key: None,
        }
    }

    fn for_column(kind: ColumnChangeKind, def: &ColumnDefinition) -> Self {
        Self {
            kind,
            column_id: Some(def.id),
            field_key: Some(def.field_key.clone()),
        }
    }
}

impl BusEvent for ColumnsChanged {
    fn event_type(&self) -> &'static str {
        match self.kind {
            ColumnChangeKind::Created => "ColumnCreated",
            ColumnChangeKind::Updated => "ColumnUpdated",
            ColumnChangeKind::Deleted => "ColumnDeleted",
            ColumnChangeKind::Reordered => "ColumnsReordered",
        }
    }
}

/// Bus carrying [`ColumnsChanged`].
pub type ColumnBus = EventBus<ColumnsChanged>;

/// Subscription to a [`ColumnBus`].
pub type ColumnSubscription = Subscription<ColumnsChanged>;

#[cfg(test)]
mod tests {
    use super::*;
    use waypoint_core::{DataType, NewColumn};

    #[test]
    fn test_event_names_column() {
        let def = NewColumn::custom("risk_level", "Risk", DataType::Text).into_definition(3);
        let event = ColumnsChanged::created(&def);
        assert_eq!(event.column_id, Some(def.id));
        assert_eq!(event.field_key.as_deref(), Some("risk_level"));
        assert_eq!(event.event_type(), "ColumnCreated");
    }

    #[test]
    fn test_reorder_has_no_single_column() {
        let event = ColumnsChanged::reordered();
        assert_eq!(event.column_id, None);
        assert_eq!(event.event_type(), "ColumnsReordered");
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_value(ColumnsChanged::reordered()).unwrap();
        assert_eq!(json["kind"], "reordered");
    }
}
