//! Column definitions and field key validation

use crate::{new_column_id, ColumnError, ColumnGroup, ColumnId, DataType, Timestamp};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Pattern every field key must match.
pub const FIELD_KEY_PATTERN: &str = "^[a-z][a-z0-9_]*$";

static FIELD_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(FIELD_KEY_PATTERN).expect("Invalid field key regex"));

/// Check that a field key is a valid storage identifier.
pub fn is_valid_field_key(field_key: &str) -> bool {
    FIELD_KEY_RE.is_match(field_key)
}

/// Validate a field key, returning `InvalidName` when it is malformed.
pub fn validate_field_key(field_key: &str) -> Result<(), ColumnError> {
    if is_valid_field_key(field_key) {
        Ok(())
    } else {
        Err(ColumnError::InvalidName {
            name: field_key.to_string(),
            reason: format!("field key must match {}", FIELD_KEY_PATTERN),
        })
    }
}

/// Validate a human-readable column label.
pub fn validate_display_name(display_name: &str) -> Result<(), ColumnError> {
    if display_name.trim().is_empty() {
        return Err(ColumnError::InvalidName {
            name: display_name.to_string(),
            reason: "display name cannot be blank".to_string(),
        });
    }
    Ok(())
}

// ============================================================================
// COLUMN DEFINITION
// ============================================================================

/// One field exposed in the roadmap table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub id: ColumnId,
    /// Storage identifier, immutable once created
    pub field_key: String,
    pub display_name: String,
    /// Immutable once created
    pub data_type: DataType,
    pub visible: bool,
    /// Dense display position
    pub order: i32,
    /// System columns can be hidden and reordered but never deleted
    pub is_system_defined: bool,
    /// Advisory only, not enforced by storage
    pub is_required: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ColumnDefinition {
    /// Display group this column belongs to.
    pub fn group(&self) -> ColumnGroup {
        ColumnGroup::from_system_flag(self.is_system_defined)
    }
}

/// Request to create a column definition.
///
/// The registry assigns the id and order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewColumn {
    pub field_key: String,
    pub display_name: String,
    pub data_type: DataType,
    pub visible: bool,
    pub is_system_defined: bool,
    pub is_required: bool,
}

impl NewColumn {
    /// A visible, optional, user-defined column.
    pub fn custom(
        field_key: impl Into<String>,
        display_name: impl Into<String>,
        data_type: DataType,
    ) -> Self {
        Self {
            field_key: field_key.into(),
            display_name: display_name.into(),
            data_type,
            visible: true,
            is_system_defined: false,
            is_required: false,
        }
    }

    /// A visible system column.
    pub fn system(
        field_key: impl Into<String>,
        display_name: impl Into<String>,
        data_type: DataType,
    ) -> Self {
        Self {
            is_system_defined: true,
            ..Self::custom(field_key, display_name, data_type)
        }
    }

    /// Set visibility.
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Set the advisory required flag.
    pub fn with_required(mut self, required: bool) -> Self {
        self.is_required = required;
        self
    }

    /// Materialize into a definition with a fresh id at the given order.
    pub fn into_definition(self, order: i32) -> ColumnDefinition {
        let now = Utc::now();
        ColumnDefinition {
            id: new_column_id(),
            field_key: self.field_key,
            display_name: self.display_name,
            data_type: self.data_type,
            visible: self.visible,
            order,
            is_system_defined: self.is_system_defined,
            is_required: self.is_required,
            created_at: now,
            updated_at: now,
        }
    }
}

// ============================================================================
// COLUMN PATCH
// ============================================================================

/// Partial update of a column definition.
///
/// `field_key`, `data_type` and `is_system_defined` are accepted only when
/// they repeat the stored value; any actual change is an `InvalidMutation`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnPatch {
    pub display_name: Option<String>,
    pub visible: Option<bool>,
    pub order: Option<i32>,
    pub field_key: Option<String>,
    pub data_type: Option<DataType>,
    pub is_system_defined: Option<bool>,
}

impl ColumnPatch {
    /// Patch that renames a column.
    pub fn rename(display_name: impl Into<String>) -> Self {
        Self {
            display_name: Some(display_name.into()),
            ..Default::default()
        }
    }

    /// Patch that shows or hides a column.
    pub fn visibility(visible: bool) -> Self {
        Self {
            visible: Some(visible),
            ..Default::default()
        }
    }

    /// Patch that moves a column.
    pub fn order(order: i32) -> Self {
        Self {
            order: Some(order),
            ..Default::default()
        }
    }

    /// True if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.visible.is_none()
            && self.order.is_none()
            && self.field_key.is_none()
            && self.data_type.is_none()
            && self.is_system_defined.is_none()
    }

    /// Reject changes to immutable attributes of `current`.
    pub fn check_immutable(&self, current: &ColumnDefinition) -> Result<(), ColumnError> {
        if let Some(field_key) = &self.field_key {
            if *field_key != current.field_key {
                return Err(ColumnError::InvalidMutation {
                    reason: format!("field key of '{}' cannot change", current.field_key),
                });
            }
        }
        if let Some(data_type) = self.data_type {
            if data_type != current.data_type {
                return Err(ColumnError::InvalidMutation {
                    reason: format!(
                        "data type of '{}' cannot change from {} to {}",
                        current.field_key, current.data_type, data_type
                    ),
                });
            }
        }
        if let Some(is_system_defined) = self.is_system_defined {
            if is_system_defined != current.is_system_defined {
                return Err(ColumnError::InvalidMutation {
                    reason: format!("system flag of '{}' cannot change", current.field_key),
                });
            }
        }
        Ok(())
    }

    /// Validate the patch against `current` and return the updated definition.
    pub fn apply(&self, current: &ColumnDefinition) -> Result<ColumnDefinition, ColumnError> {
        self.check_immutable(current)?;
        if let Some(display_name) = &self.display_name {
            validate_display_name(display_name)?;
        }

        let mut next = current.clone();
        if let Some(display_name) = &self.display_name {
            next.display_name = display_name.clone();
        }
        if let Some(visible) = self.visible {
            next.visible = visible;
        }
        if let Some(order) = self.order {
            next.order = order;
        }
        next.updated_at = Utc::now();
        Ok(next)
    }
}
