//! Error types for Waypoint operations

use crate::{DataType, RecordId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// STORE ERRORS
// ============================================================================

/// Machine-readable kind of a store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreErrorKind {
    /// A unique constraint was violated
    UniqueViolation,
    /// The addressed row or field does not exist
    NotFound,
    /// The physical field being added already exists
    AlreadyExists,
    /// The store could not be reached
    Unavailable,
    /// The store refused the operation (permissions, constraint, trigger)
    Rejected,
    /// Anything else
    Internal,
}

impl StoreErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreErrorKind::UniqueViolation => "unique_violation",
            StoreErrorKind::NotFound => "not_found",
            StoreErrorKind::AlreadyExists => "already_exists",
            StoreErrorKind::Unavailable => "unavailable",
            StoreErrorKind::Rejected => "rejected",
            StoreErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure reported by an external store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("store error ({kind}): {message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unique_violation(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::UniqueViolation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::NotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::AlreadyExists, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Unavailable, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Rejected, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Internal, message)
    }

    /// Storage lock poisoned.
    pub fn lock_poisoned() -> Self {
        Self::internal("storage lock poisoned")
    }
}

/// Result type alias for store calls.
pub type StoreResult<T> = Result<T, StoreError>;

// ============================================================================
// COLUMN ERRORS
// ============================================================================

/// Column registry, schema gateway and column mutation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ColumnError {
    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Field key '{field_key}' already exists")]
    DuplicateKey { field_key: String },

    #[error("Forbidden: cannot {action} system column '{field_key}'")]
    Forbidden { field_key: String, action: String },

    #[error("Schema conflict on '{field_key}': {reason}")]
    SchemaConflict { field_key: String, reason: String },

    #[error("Not found: {target}")]
    NotFound { target: String },

    #[error("Invalid mutation: {reason}")]
    InvalidMutation { reason: String },

    #[error(
        "Partial failure during {operation} of '{field_key}': {reason}; manual schema remediation required"
    )]
    PartialFailure {
        operation: String,
        field_key: String,
        reason: String,
    },

    #[error("Column store error: {0}")]
    Store(#[from] StoreError),
}

impl ColumnError {
    pub fn not_found(target: impl Into<String>) -> Self {
        ColumnError::NotFound {
            target: target.into(),
        }
    }

    /// True for errors raised before any store was touched.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ColumnError::InvalidName { .. }
                | ColumnError::Forbidden { .. }
                | ColumnError::InvalidMutation { .. }
        )
    }

    /// True if the registry and physical schema may disagree after this error.
    pub fn needs_remediation(&self) -> bool {
        matches!(self, ColumnError::PartialFailure { .. })
    }

    /// Short message suitable for a transient notification.
    pub fn user_message(&self) -> String {
        match self {
            ColumnError::InvalidName { name, .. } => format!(
                "'{}' is not a valid column name. Use lowercase letters, digits and underscores, starting with a letter.",
                name
            ),
            ColumnError::DuplicateKey { field_key } => {
                format!("A column named '{}' already exists.", field_key)
            }
            ColumnError::Forbidden { field_key, action } => {
                format!("Built-in column '{}' cannot be {}.", field_key, past_tense(action))
            }
            ColumnError::SchemaConflict { field_key, .. } => format!(
                "The table already has a field '{}'. Pick another name.",
                field_key
            ),
            ColumnError::NotFound { .. } => {
                "That column no longer exists. Refresh and try again.".to_string()
            }
            ColumnError::InvalidMutation { reason } => format!("Change not allowed: {}.", reason),
            ColumnError::PartialFailure { field_key, .. } => format!(
                "Column '{}' is in an inconsistent state. An administrator needs to repair the table schema.",
                field_key
            ),
            ColumnError::Store(err) => format!("Saving the column failed: {}", err.message),
        }
    }
}

fn past_tense(action: &str) -> &'static str {
    match action {
        "delete" => "deleted",
        "rename" => "renamed",
        _ => "changed",
    }
}

/// Result type alias for column operations.
pub type ColumnResult<T> = Result<T, ColumnError>;

// ============================================================================
// EDIT ERRORS
// ============================================================================

/// Batched edit and record errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("Saving row {row_id} failed: {source}")]
    FlushFailed {
        row_id: RecordId,
        #[source]
        source: StoreError,
    },

    #[error("Type mismatch on '{field_key}': expected {expected}, got {got}")]
    TypeMismatch {
        field_key: String,
        expected: DataType,
        got: String,
    },

    #[error("Field '{field_key}' is read-only")]
    ReadOnlyField { field_key: String },

    #[error("Unknown field '{field_key}'")]
    UnknownField { field_key: String },

    #[error("Unknown record {row_id}")]
    UnknownRecord { row_id: RecordId },

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),
}

impl EditError {
    /// Short message suitable for a transient notification.
    pub fn user_message(&self) -> String {
        match self {
            EditError::FlushFailed { row_id, .. } => {
                format!("Changes to row {} could not be saved and were reverted.", row_id)
            }
            EditError::TypeMismatch {
                field_key, expected, ..
            } => format!("'{}' expects a {} value.", field_key, expected),
            EditError::ReadOnlyField { field_key } => format!("'{}' cannot be edited.", field_key),
            EditError::UnknownField { field_key } => {
                format!("Column '{}' no longer exists.", field_key)
            }
            EditError::UnknownRecord { row_id } => {
                format!("Row {} no longer exists. Refresh and try again.", row_id)
            }
            EditError::Store(err) => format!("Saving failed: {}", err.message),
        }
    }
}

/// Result type alias for edit operations.
pub type EditResult<T> = Result<T, EditError>;

// ============================================================================
// CONFIG ERRORS
// ============================================================================

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

// ============================================================================
// MASTER ERROR
// ============================================================================

/// Master error type for all Waypoint errors.
#[derive(Debug, Clone, Error)]
pub enum WaypointError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Column error: {0}")]
    Column(#[from] ColumnError),

    #[error("Edit error: {0}")]
    Edit(#[from] EditError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Waypoint operations.
pub type WaypointResult<T> = Result<T, WaypointError>;

// =============================================================================
// TESTS
// =============================================================================
