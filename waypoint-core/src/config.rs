//! Configuration types
//!
//! Defaults suit an interactive roadmap table; every value can be overridden
//! from the environment.

use crate::{ConfigError, FieldValue, Record};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default debounce window for batched edits.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Default capacity of the event channels.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

// ============================================================================
// EDIT CONFIGURATION
// ============================================================================

/// Batched edit coordinator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditConfig {
    /// Quiet period after the last edit to a row before it is flushed
    pub debounce: Duration,
    /// Whether edits start in batched mode; when off every edit is immediate
    pub batch_mode: bool,
    /// Reject values that do not fit the column's data type
    pub enforce_types: bool,
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            batch_mode: true,
            enforce_types: true,
        }
    }
}

// ============================================================================
// STATUS POLICY
// ============================================================================

/// Which field holds a record's lifecycle status and which value is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPolicy {
    pub status_field: String,
    pub terminal_status: String,
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self {
            status_field: "status".to_string(),
            terminal_status: "Completed".to_string(),
        }
    }
}

impl StatusPolicy {
    /// True if the record's status is the terminal status.
    pub fn is_terminal(&self, record: &Record) -> bool {
        record.text(&self.status_field) == Some(self.terminal_status.as_str())
    }

    /// True if writing `value` to `field_key` moves a record to the terminal status.
    pub fn is_terminal_transition(&self, field_key: &str, value: &FieldValue) -> bool {
        field_key == self.status_field && value.as_text() == Some(self.terminal_status.as_str())
    }
}

// ============================================================================
// EVENT CONFIGURATION
// ============================================================================

/// Event bus settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventConfig {
    /// Buffered events per channel before slow subscribers lag
    pub capacity: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

// ============================================================================
// MASTER CONFIGURATION
// ============================================================================

/// Master configuration struct.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaypointConfig {
    pub edit: EditConfig,
    pub status: StatusPolicy,
    pub events: EventConfig,
}

impl WaypointConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `WAYPOINT_EDIT_DEBOUNCE_MS`: Debounce window in milliseconds (default: 300)
    /// - `WAYPOINT_EDIT_BATCH_MODE`: "true" or "false" (default: true)
    /// - `WAYPOINT_EDIT_ENFORCE_TYPES`: "true" or "false" (default: true)
    /// - `WAYPOINT_STATUS_FIELD`: Field holding the lifecycle status (default: status)
    /// - `WAYPOINT_TERMINAL_STATUS`: Terminal status value (default: Completed)
    /// - `WAYPOINT_EVENT_CAPACITY`: Event channel capacity (default: 256)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let debounce = std::env::var("WAYPOINT_EDIT_DEBOUNCE_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.edit.debounce);

        let batch_mode = std::env::var("WAYPOINT_EDIT_BATCH_MODE")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(defaults.edit.batch_mode);

        let enforce_types = std::env::var("WAYPOINT_EDIT_ENFORCE_TYPES")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(defaults.edit.enforce_types);

        let status_field = std::env::var("WAYPOINT_STATUS_FIELD")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.status.status_field);

        let terminal_status = std::env::var("WAYPOINT_TERMINAL_STATUS")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.status.terminal_status);

        let capacity = std::env::var("WAYPOINT_EVENT_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.events.capacity);

        Self {
            edit: EditConfig {
                debounce,
                batch_mode,
                enforce_types,
            },
            status: StatusPolicy {
                status_field,
                terminal_status,
            },
            events: EventConfig { capacity },
        }
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - debounce is positive
    /// - status field is a valid field key and terminal status is not blank
    /// - event capacity is positive
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.edit.debounce.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "edit.debounce".to_string(),
                value: format!("{:?}", self.edit.debounce),
                reason: "debounce must be positive".to_string(),
            });
        }

        if !crate::is_valid_field_key(&self.status.status_field) {
            return Err(ConfigError::InvalidValue {
                field: "status.status_field".to_string(),
                value: self.status.status_field.clone(),
                reason: format!("must match {}", crate::FIELD_KEY_PATTERN),
            });
        }

        if self.status.terminal_status.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "status.terminal_status".to_string(),
            });
        }

        if self.events.capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "events.capacity".to_string(),
                value: self.events.capacity.to_string(),
                reason: "capacity must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}
