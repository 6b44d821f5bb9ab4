//! Waypoint Core - Column and Record Types
//!
//! Pure data structures shared by the column pipeline and the batched edit
//! coordinator. This crate does no I/O.

pub mod column;
pub mod config;
pub mod enums;
pub mod error;
pub mod filter;
pub mod identity;
pub mod notice;
pub mod record;

pub use column::{
    is_valid_field_key, validate_display_name, validate_field_key, ColumnDefinition, ColumnPatch,
    NewColumn, FIELD_KEY_PATTERN,
};
pub use config::{
    EditConfig, EventConfig, StatusPolicy, WaypointConfig, DEFAULT_DEBOUNCE,
    DEFAULT_EVENT_CAPACITY,
};
pub use enums::{ColumnGroup, DataType, DataTypeParseError};
pub use error::{
    ColumnError, ColumnResult, ConfigError, EditError, EditResult, StoreError, StoreErrorKind,
    StoreResult, WaypointError, WaypointResult,
};
pub use filter::{
    compare_values, FilterExpr, FilterOperator, RecordFilter, RecordOrder, SortDirection, SortKey,
};
pub use identity::{new_column_id, ColumnId, RecordId, Timestamp};
pub use notice::{Notice, NoticeLevel};
pub use record::{
    is_reserved_key, FieldValue, NewRecord, Record, RecordPatch, ID_KEY, PRIORITY_RANK_KEY,
    SORT_ORDER_KEY,
};
