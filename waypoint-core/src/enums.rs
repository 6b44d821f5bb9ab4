//! Enum types for Waypoint columns

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// DATA TYPES
// ============================================================================

/// Storage type of a column.
///
/// Fixed at creation; changing it would need a data migration, which the
/// column pipeline does not perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Free text
    Text,
    /// 64-bit signed integer
    Integer,
    /// Decimal number
    Numeric,
    /// Calendar date without time zone
    Date,
    /// True/false flag
    Boolean,
}

impl DataType {
    /// All supported data types, in display order.
    pub const ALL: [DataType; 5] = [
        DataType::Text,
        DataType::Integer,
        DataType::Numeric,
        DataType::Date,
        DataType::Boolean,
    ];

    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            DataType::Text => "text",
            DataType::Integer => "integer",
            DataType::Numeric => "numeric",
            DataType::Date => "date",
            DataType::Boolean => "boolean",
        }
    }

    /// Parse from database string representation.
    ///
    /// Accepts the common SQL aliases the physical schema reports back.
    pub fn from_db_str(s: &str) -> Result<Self, DataTypeParseError> {
        match s.trim().to_lowercase().as_str() {
            "text" | "varchar" | "string" => Ok(DataType::Text),
            "integer" | "int" | "int4" | "int8" | "bigint" => Ok(DataType::Integer),
            "numeric" | "decimal" | "float" | "double" => Ok(DataType::Numeric),
            "date" => Ok(DataType::Date),
            "boolean" | "bool" => Ok(DataType::Boolean),
            _ => Err(DataTypeParseError(s.to_string())),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for DataType {
    type Err = DataTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid data type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTypeParseError(pub String);

impl fmt::Display for DataTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid data type: {}", self.0)
    }
}

impl std::error::Error for DataTypeParseError {}

// ============================================================================
// COLUMN GROUPS
// ============================================================================

/// Display group of a column.
///
/// System and custom columns are never interleaved in the display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnGroup {
    /// Columns that predate user-driven schema evolution
    System,
    /// Columns added by users at runtime
    Custom,
}

impl ColumnGroup {
    /// Group for a definition with the given system flag.
    pub fn from_system_flag(is_system_defined: bool) -> Self {
        if is_system_defined {
            ColumnGroup::System
        } else {
            ColumnGroup::Custom
        }
    }

    /// The opposite group.
    pub fn other(self) -> Self {
        match self {
            ColumnGroup::System => ColumnGroup::Custom,
            ColumnGroup::Custom => ColumnGroup::System,
        }
    }
}
