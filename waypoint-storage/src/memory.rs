//! In-memory store implementations.
//!
//! Used by tests and by embedders that keep a roadmap entirely in process.
//! Both stores can be told to fail specific operations through their
//! [`FaultPlan`] and record every call in a [`CallLog`].

use crate::faults::{CallLog, FaultPlan, StoreCall, StoreOp};
use crate::traits::{ColumnStore, RecordStore, SchemaProcedures};
use ::async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;
use std::time::Duration;
use waypoint_core::{
    is_reserved_key, ColumnDefinition, ColumnId, DataType, NewRecord, Record, RecordFilter,
    RecordId, RecordOrder, RecordPatch, StoreError, StoreResult,
};

// ============================================================================
// RECORD STORE
// ============================================================================

/// In-memory records table with a mutable physical schema.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    rows: RwLock<BTreeMap<RecordId, Record>>,
    physical: RwLock<BTreeMap<String, DataType>>,
    next_id: AtomicI64,
    latency: Option<Duration>,
    faults: FaultPlan,
    log: CallLog,
}

impl InMemoryRecordStore {
    /// Create an empty store with no physical fields.
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            ..Default::default()
        }
    }

    /// Create a store whose table already has the given fields.
    pub fn with_fields<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, DataType)>,
        K: Into<String>,
    {
        let store = Self::new();
        if let Ok(mut physical) = store.physical.write() {
            physical.extend(fields.into_iter().map(|(k, t)| (k.into(), t)));
        }
        store
    }

    /// Delay every call by `latency` to simulate a network round trip.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Put rows in place as-is, keeping their ids.
    pub fn seed(&self, records: impl IntoIterator<Item = Record>) {
        let mut rows = self.rows.write().unwrap_or_else(|e| e.into_inner());
        for record in records {
            self.next_id.fetch_max(record.id.get() + 1, Ordering::SeqCst);
            rows.insert(record.id, record);
        }
    }

    /// Planned failures for this store.
    pub fn faults(&self) -> &FaultPlan {
        &self.faults
    }

    /// Calls made against this store.
    pub fn log(&self) -> &CallLog {
        &self.log
    }

    /// Current state of one row, bypassing faults and the call log.
    pub fn row(&self, id: RecordId) -> Option<Record> {
        self.rows
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
    }

    /// All rows ordered by id, bypassing faults and the call log.
    pub fn rows(&self) -> Vec<Record> {
        self.rows
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    /// Whether the table has a physical field named `field_key`.
    pub fn has_physical_field(&self, field_key: &str) -> bool {
        self.physical
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(field_key)
    }

    async fn round_trip(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_fields<'a>(
        &self,
        fields: impl IntoIterator<Item = (&'a str, &'a waypoint_core::FieldValue)>,
    ) -> StoreResult<()> {
        let physical = self.physical.read().map_err(|_| StoreError::lock_poisoned())?;
        for (field_key, value) in fields {
            if is_reserved_key(field_key) {
                continue;
            }
            let Some(data_type) = physical.get(field_key) else {
                return Err(StoreError::rejected(format!(
                    "column \"{}\" of relation \"records\" does not exist",
                    field_key
                )));
            };
            if !value.fits(*data_type) {
                return Err(StoreError::rejected(format!(
                    "invalid input for column \"{}\": expected {}, got {}",
                    field_key,
                    data_type,
                    value.kind()
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn select(&self, filter: &RecordFilter, order: &RecordOrder) -> StoreResult<Vec<Record>> {
        self.log.record(StoreCall::Select);
        self.round_trip().await;
        self.faults.check(StoreOp::Select)?;

        let rows = self.rows.read().map_err(|_| StoreError::lock_poisoned())?;
        let mut result: Vec<Record> = rows
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        result.sort_by(|a, b| order.compare(a, b));
        Ok(result)
    }

    async fn get(&self, id: RecordId) -> StoreResult<Option<Record>> {
        self.log.record(StoreCall::Get(id));
        self.round_trip().await;
        self.faults.check(StoreOp::Get)?;

        let rows = self.rows.read().map_err(|_| StoreError::lock_poisoned())?;
        Ok(rows.get(&id).cloned())
    }

    async fn insert(&self, row: NewRecord) -> StoreResult<Record> {
        self.log.record(StoreCall::Insert);
        self.round_trip().await;
        self.faults.check(StoreOp::Insert)?;
        self.check_fields(row.fields.iter().map(|(k, v)| (k.as_str(), v)))?;

        let mut rows = self.rows.write().map_err(|_| StoreError::lock_poisoned())?;
        let id = RecordId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let sort_order = row.sort_order.unwrap_or_else(|| {
            rows.values()
                .map(|r| r.sort_order)
                .max()
                .map_or(0, |max| max + 1)
        });
        let record = Record {
            id,
            sort_order,
            priority_rank: None,
            fields: row.fields,
        };
        rows.insert(id, record.clone());
        Ok(record)
    }

    async fn update(&self, id: RecordId, patch: &RecordPatch) -> StoreResult<Record> {
        self.log.record(StoreCall::Update {
            id,
            patch: patch.clone(),
        });
        self.round_trip().await;
        self.faults.check(StoreOp::Update)?;
        self.check_fields(patch.iter())?;

        let mut rows = self.rows.write().map_err(|_| StoreError::lock_poisoned())?;
        let record = rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(format!("record {} not found", id)))?;
        record
            .apply(patch)
            .map_err(|e| StoreError::rejected(e.to_string()))?;
        Ok(record.clone())
    }

    async fn delete(&self, id: RecordId) -> StoreResult<()> {
        self.log.record(StoreCall::Delete(id));
        self.round_trip().await;
        self.faults.check(StoreOp::Delete)?;

        let mut rows = self.rows.write().map_err(|_| StoreError::lock_poisoned())?;
        rows.remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(format!("record {} not found", id)))
    }
}

#[async_trait]
impl SchemaProcedures for InMemoryRecordStore {
    async fn add_physical_field(&self, field_key: &str, data_type: DataType) -> StoreResult<()> {
        self.log.record(StoreCall::AddField(field_key.to_string()));
        self.round_trip().await;
        self.faults.check(StoreOp::AddField)?;

        if is_reserved_key(field_key) {
            return Err(StoreError::already_exists(format!(
                "column \"{}\" is system-managed",
                field_key
            )));
        }
        let mut physical = self.physical.write().map_err(|_| StoreError::lock_poisoned())?;
        if physical.contains_key(field_key) {
            return Err(StoreError::already_exists(format!(
                "column \"{}\" of relation \"records\" already exists",
                field_key
            )));
        }
        physical.insert(field_key.to_string(), data_type);
        Ok(())
    }

    async fn remove_physical_field(&self, field_key: &str) -> StoreResult<()> {
        self.log.record(StoreCall::RemoveField(field_key.to_string()));
        self.round_trip().await;
        self.faults.check(StoreOp::RemoveField)?;

        {
            let mut physical = self.physical.write().map_err(|_| StoreError::lock_poisoned())?;
            if physical.remove(field_key).is_none() {
                return Err(StoreError::not_found(format!(
                    "column \"{}\" of relation \"records\" does not exist",
                    field_key
                )));
            }
        }

        let mut rows = self.rows.write().map_err(|_| StoreError::lock_poisoned())?;
        for record in rows.values_mut() {
            record.fields.remove(field_key);
        }
        Ok(())
    }

    async fn physical_fields(&self) -> StoreResult<Vec<(String, DataType)>> {
        self.round_trip().await;
        self.faults.check(StoreOp::PhysicalFields)?;

        let physical = self.physical.read().map_err(|_| StoreError::lock_poisoned())?;
        Ok(physical.iter().map(|(k, t)| (k.clone(), *t)).collect())
    }
}

// ============================================================================
// COLUMN STORE
// ============================================================================

/// In-memory column definition table.
#[derive(Debug, Default)]
pub struct InMemoryColumnStore {
    columns: RwLock<HashMap<ColumnId, ColumnDefinition>>,
    faults: FaultPlan,
    log: CallLog,
}

impl InMemoryColumnStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Planned failures for this store.
    pub fn faults(&self) -> &FaultPlan {
        &self.faults
    }

    /// Calls made against this store.
    pub fn log(&self) -> &CallLog {
        &self.log
    }

    /// Get count of stored definitions.
    pub fn column_count(&self) -> usize {
        self.columns.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl ColumnStore for InMemoryColumnStore {
    async fn list(&self) -> StoreResult<Vec<ColumnDefinition>> {
        self.faults.check(StoreOp::ColumnList)?;
        let columns = self.columns.read().map_err(|_| StoreError::lock_poisoned())?;
        Ok(columns.values().cloned().collect())
    }

    async fn insert(&self, def: &ColumnDefinition) -> StoreResult<ColumnDefinition> {
        self.log.record(StoreCall::ColumnInsert(def.field_key.clone()));
        self.faults.check(StoreOp::ColumnInsert)?;

        let mut columns = self.columns.write().map_err(|_| StoreError::lock_poisoned())?;
        if columns.contains_key(&def.id) {
            return Err(StoreError::unique_violation(format!(
                "duplicate key value violates unique constraint \"column_definitions_pkey\" ({})",
                def.id
            )));
        }
        if columns.values().any(|c| c.field_key == def.field_key) {
            return Err(StoreError::unique_violation(format!(
                "duplicate key value violates unique constraint \"column_definitions_field_key_key\" ({})",
                def.field_key
            )));
        }
        columns.insert(def.id, def.clone());
        Ok(def.clone())
    }

    async fn update(&self, def: &ColumnDefinition) -> StoreResult<ColumnDefinition> {
        self.log.record(StoreCall::ColumnUpdate(def.id));
        self.faults.check(StoreOp::ColumnUpdate)?;

        let mut columns = self.columns.write().map_err(|_| StoreError::lock_poisoned())?;
        let stored = columns
            .get_mut(&def.id)
            .ok_or_else(|| StoreError::not_found(format!("column definition {} not found", def.id)))?;
        *stored = def.clone();
        Ok(def.clone())
    }

    async fn delete(&self, id: ColumnId) -> StoreResult<()> {
        self.log.record(StoreCall::ColumnDelete(id));
        self.faults.check(StoreOp::ColumnDelete)?;

        let mut columns = self.columns.write().map_err(|_| StoreError::lock_poisoned())?;
        columns
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(format!("column definition {} not found", id)))
    }
}

// ============================================================================
// TESTS
// ============================================================================
