//! Async store contracts.
//!
//! These traits describe the external collaborators the column pipeline and
//! the edit coordinator talk to. Implementations wrap a managed relational
//! backend; the in-memory versions in [`crate::memory`] back tests and
//! embedded use.

use ::async_trait::async_trait;
use waypoint_core::{
    ColumnDefinition, ColumnId, DataType, NewRecord, Record, RecordFilter, RecordId, RecordOrder,
    RecordPatch, StoreResult,
};

/// Row-level access to the roadmap records table.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Select rows matching `filter`, sorted by `order`.
    async fn select(&self, filter: &RecordFilter, order: &RecordOrder) -> StoreResult<Vec<Record>>;

    /// Get a single row.
    async fn get(&self, id: RecordId) -> StoreResult<Option<Record>>;

    /// Insert a row; the store assigns the id.
    async fn insert(&self, row: NewRecord) -> StoreResult<Record>;

    /// Update the fields present in `patch` and return the row as stored.
    ///
    /// Fields absent from the patch are left untouched.
    async fn update(&self, id: RecordId, patch: &RecordPatch) -> StoreResult<Record>;

    /// Delete a row.
    async fn delete(&self, id: RecordId) -> StoreResult<()>;
}

/// Privileged procedures that alter the physical record structure.
///
/// Only the schema gateway should hold an implementation of this trait.
#[async_trait]
pub trait SchemaProcedures: Send + Sync {
    /// Add a field of the given type to the records table.
    async fn add_physical_field(&self, field_key: &str, data_type: DataType) -> StoreResult<()>;

    /// Remove a field and all of its data from the records table.
    async fn remove_physical_field(&self, field_key: &str) -> StoreResult<()>;

    /// Fields currently present in the records table with their types.
    ///
    /// System-managed attributes (id, sort order, priority rank) are not
    /// included.
    async fn physical_fields(&self) -> StoreResult<Vec<(String, DataType)>>;
}

/// Persistence for column definitions.
#[async_trait]
pub trait ColumnStore: Send + Sync {
    /// All stored definitions, in no particular order.
    async fn list(&self) -> StoreResult<Vec<ColumnDefinition>>;

    /// Insert a definition. Fails with a unique violation if its id or field
    /// key is already stored.
    async fn insert(&self, def: &ColumnDefinition) -> StoreResult<ColumnDefinition>;

    /// Replace a stored definition by id.
    async fn update(&self, def: &ColumnDefinition) -> StoreResult<ColumnDefinition>;

    /// Delete a definition by id.
    async fn delete(&self, id: ColumnId) -> StoreResult<()>;
}
