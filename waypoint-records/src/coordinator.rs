//! Batched Edit Coordinator
//!
//! Cell edits are applied to the in-memory records at once and written to
//! the store in batches: all edits to one row inside a debounce window go
//! out as a single multi-field update. A rejected update restores every
//! field it carried to the value it had before the batch began.
//!
//! # Concurrency
//!
//! All coordinator state sits behind one synchronous mutex that is never
//! held across an `.await`. A flush first takes the row's edits out of the
//! buffer, then releases the lock and sends them, so edits keep arriving
//! while the write is in flight. Sent values stay registered until their
//! write settles, so a row adopted from the store in the meantime still
//! shows them.

use crate::backlog::{reorder_backlog, SortDelta};
use crate::buffer::{PendingEditBuffer, StagedEdits};
use crate::rank::{RankDelta, RankMaintainer};
use futures_util::future::join_all;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};
use waypoint_core::{
    is_reserved_key, ColumnDefinition, DataType, EditConfig, EditError, EditResult, FieldValue,
    NewRecord, Record, RecordFilter, RecordId, RecordOrder, RecordPatch, StatusPolicy,
    PRIORITY_RANK_KEY, SORT_ORDER_KEY,
};
use waypoint_events::{EditBus, EditEvent, EditSubscription};
use waypoint_storage::RecordStore;

// ============================================================================
// STATE
// ============================================================================

/// A flush sent to the store and not yet settled.
#[derive(Debug)]
struct InFlight {
    flush_id: u64,
    /// Sent values still shown locally; a later flush of a field takes it over
    overlay: RecordPatch,
    baseline: RecordPatch,
}

/// One row's edits on their way to the store.
#[derive(Debug)]
struct Flush {
    id: u64,
    patch: RecordPatch,
    fields: Vec<String>,
}

#[derive(Debug, Default)]
struct EditState {
    records: HashMap<RecordId, Record>,
    buffer: PendingEditBuffer,
    in_flight: HashMap<RecordId, Vec<InFlight>>,
    /// Fields with an edit not yet confirmed by the store
    saving: BTreeSet<(RecordId, String)>,
    /// Column types used to check values; None disables the check
    columns: Option<HashMap<String, DataType>>,
    batch_mode: bool,
    next_generation: u64,
    next_flush: u64,
}

impl EditState {
    /// Store `record` as the local copy, keeping unsettled and pending edits
    /// on top.
    fn adopt(&mut self, mut record: Record) {
        let row_id = record.id;
        let unsettled = self
            .in_flight
            .get(&row_id)
            .into_iter()
            .flatten()
            .map(|flight| &flight.overlay)
            .chain(self.buffer.pending(row_id));
        for patch in unsettled {
            if let Err(e) = record.apply(patch) {
                warn!(row_id = %row_id, error = %e, "Local edits no longer apply");
            }
        }
        self.records.insert(row_id, record);
    }

    /// Register `staged` as sent. Earlier unsettled flushes of the row give
    /// up the fields it carries.
    fn begin_flush(&mut self, row_id: RecordId, staged: StagedEdits) -> Flush {
        self.next_flush += 1;
        let flights = self.in_flight.entry(row_id).or_default();
        for flight in flights.iter_mut() {
            for field_key in staged.patch.keys() {
                flight.overlay.remove(field_key);
            }
        }
        let flush = Flush {
            id: self.next_flush,
            patch: staged.patch.clone(),
            fields: staged.field_keys(),
        };
        flights.push(InFlight {
            flush_id: flush.id,
            overlay: staged.patch,
            baseline: staged.baseline,
        });
        flush
    }

    fn end_flush(&mut self, row_id: RecordId, flush_id: u64) -> Option<InFlight> {
        let flights = self.in_flight.get_mut(&row_id)?;
        let index = flights.iter().position(|f| f.flush_id == flush_id)?;
        let flight = flights.remove(index);
        if flights.is_empty() {
            self.in_flight.remove(&row_id);
        }
        Some(flight)
    }

    /// Whether a pending edit or an unsettled flush still carries the field.
    fn is_carried(&self, row_id: RecordId, field_key: &str) -> bool {
        self.buffer.is_pending(row_id, field_key)
            || self
                .in_flight
                .get(&row_id)
                .is_some_and(|flights| flights.iter().any(|f| f.overlay.contains(field_key)))
    }

    /// Give the unsettled flush carrying `field_key` an older baseline.
    fn rebase_in_flight(&mut self, row_id: RecordId, field_key: &str, before: FieldValue) {
        let flight = self
            .in_flight
            .get_mut(&row_id)
            .and_then(|flights| flights.iter_mut().find(|f| f.overlay.contains(field_key)));
        if let Some(flight) = flight {
            flight.baseline.insert(field_key, before);
        }
    }

    /// Drop a pending field and show its baseline again.
    fn withdraw(&mut self, row_id: RecordId, field_key: &str) -> EditResult<()> {
        let Some(before) = self.buffer.unstage(row_id, field_key) else {
            return Ok(());
        };
        if let Some(record) = self.records.get_mut(&row_id) {
            record.set(field_key, before)?;
        }
        if !self.is_carried(row_id, field_key) {
            self.saving.remove(&(row_id, field_key.to_string()));
        }
        Ok(())
    }

    /// Whether the row's pending patch holds a terminal status and the rank
    /// clear that came with it.
    fn has_pending_terminal(&self, row_id: RecordId, policy: &StatusPolicy) -> bool {
        self.buffer.pending(row_id).is_some_and(|patch| {
            patch.get(PRIORITY_RANK_KEY) == Some(&FieldValue::Null)
                && patch
                    .get(&policy.status_field)
                    .is_some_and(|status| policy.is_terminal_transition(&policy.status_field, status))
        })
    }

    /// Clear saving markers for `fields` no longer carried by a newer edit.
    fn settle(&mut self, row_id: RecordId, fields: &[String]) {
        for field_key in fields {
            if !self.is_carried(row_id, field_key) {
                self.saving.remove(&(row_id, field_key.clone()));
            }
        }
    }

    fn check_type(&self, field_key: &str, value: &FieldValue) -> EditResult<()> {
        Record::check_field(field_key, value)?;
        let Some(columns) = &self.columns else {
            return Ok(());
        };
        if is_reserved_key(field_key) {
            return Ok(());
        }
        let data_type = columns.get(field_key).ok_or_else(|| EditError::UnknownField {
            field_key: field_key.to_string(),
        })?;
        if !value.fits(*data_type) {
            return Err(EditError::TypeMismatch {
                field_key: field_key.to_string(),
                expected: *data_type,
                got: value.kind().to_string(),
            });
        }
        Ok(())
    }
}

/// Outcome of flushing every pending row.
#[derive(Debug, Default)]
pub struct FlushReport {
    pub saved: Vec<RecordId>,
    pub failed: Vec<(RecordId, EditError)>,
}

impl FlushReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

struct Inner {
    store: Arc<dyn RecordStore>,
    config: EditConfig,
    policy: StatusPolicy,
    events: EditBus,
    ranks: Option<RankMaintainer>,
    state: Mutex<EditState>,
}

// ============================================================================
// BUILDER
// ============================================================================

/// Builder for [`BatchedEditCoordinator`].
pub struct EditCoordinatorBuilder {
    store: Arc<dyn RecordStore>,
    config: EditConfig,
    policy: StatusPolicy,
    events: Option<EditBus>,
    rank_maintenance: bool,
    columns: Option<Vec<ColumnDefinition>>,
}

impl EditCoordinatorBuilder {
    pub fn config(mut self, config: EditConfig) -> Self {
        self.config = config;
        self
    }

    pub fn status_policy(mut self, policy: StatusPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Publish edit events on an existing bus.
    pub fn events(mut self, events: EditBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Rebalance priority ranks after creates, status changes and reorders.
    pub fn rank_maintenance(mut self, enabled: bool) -> Self {
        self.rank_maintenance = enabled;
        self
    }

    /// Check edited values against these column types.
    pub fn columns(mut self, columns: &[ColumnDefinition]) -> Self {
        self.columns = Some(columns.to_vec());
        self
    }

    pub fn build(self) -> BatchedEditCoordinator {
        let ranks = self
            .rank_maintenance
            .then(|| RankMaintainer::new(self.store.clone(), self.policy.clone()));
        let columns = match (&self.columns, self.config.enforce_types) {
            (Some(columns), true) => Some(column_types(columns)),
            _ => None,
        };
        let state = EditState {
            columns,
            batch_mode: self.config.batch_mode,
            ..Default::default()
        };

        BatchedEditCoordinator {
            inner: Arc::new(Inner {
                store: self.store,
                config: self.config,
                policy: self.policy,
                events: self.events.unwrap_or_default(),
                ranks,
                state: Mutex::new(state),
            }),
        }
    }
}

fn column_types(columns: &[ColumnDefinition]) -> HashMap<String, DataType> {
    columns
        .iter()
        .map(|c| (c.field_key.clone(), c.data_type))
        .collect()
}

// ============================================================================
// COORDINATOR
// ============================================================================

/// Buffers cell edits per row and writes them as one update per batch.
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct BatchedEditCoordinator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for BatchedEditCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchedEditCoordinator")
            .field("config", &self.inner.config)
            .field("pending_rows", &self.pending_rows())
            .finish_non_exhaustive()
    }
}

impl BatchedEditCoordinator {
    pub fn builder(store: Arc<dyn RecordStore>) -> EditCoordinatorBuilder {
        EditCoordinatorBuilder {
            store,
            config: EditConfig::default(),
            policy: StatusPolicy::default(),
            events: None,
            rank_maintenance: false,
            columns: None,
        }
    }

    /// Coordinator with default settings.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::builder(store).build()
    }

    fn state(&self) -> MutexGuard<'_, EditState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn config(&self) -> &EditConfig {
        &self.inner.config
    }

    pub fn subscribe(&self) -> EditSubscription {
        self.inner.events.subscribe()
    }

    // ------------------------------------------------------------------------
    // Local state
    // ------------------------------------------------------------------------

    /// Replace the local records with an authoritative set.
    ///
    /// Pending edits stay applied on top of the loaded values.
    pub fn load(&self, records: impl IntoIterator<Item = Record>) {
        let mut state = self.state();
        state.records.clear();
        for record in records {
            state.adopt(record);
        }
    }

    /// Reload every record from the store.
    pub async fn refresh(&self) -> EditResult<usize> {
        let records = self
            .inner
            .store
            .select(&RecordFilter::all(), &RecordOrder::by_id().asc(SORT_ORDER_KEY))
            .await?;
        let count = records.len();
        self.load(records);
        debug!(records = count, "Records refreshed");
        Ok(count)
    }

    /// Replace the column types used to check edited values.
    pub fn set_columns(&self, columns: &[ColumnDefinition]) {
        if self.inner.config.enforce_types {
            self.state().columns = Some(column_types(columns));
        }
    }

    /// Local copy of a record, including unsaved edits.
    pub fn record(&self, row_id: RecordId) -> Option<Record> {
        self.state().records.get(&row_id).cloned()
    }

    /// Every local record in backlog order.
    pub fn records(&self) -> Vec<Record> {
        let mut records: Vec<Record> = self.state().records.values().cloned().collect();
        records.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.id.cmp(&b.id)));
        records
    }

    /// Fields whose edits the store has not yet confirmed.
    pub fn saving(&self) -> BTreeSet<(RecordId, String)> {
        self.state().saving.clone()
    }

    pub fn is_saving(&self, row_id: RecordId, field_key: &str) -> bool {
        self.state().saving.contains(&(row_id, field_key.to_string()))
    }

    /// Rows with edits waiting for their batch to close.
    pub fn pending_rows(&self) -> Vec<RecordId> {
        self.state().buffer.pending_rows()
    }

    pub fn batch_mode(&self) -> bool {
        self.state().batch_mode
    }

    // ------------------------------------------------------------------------
    // Edits
    // ------------------------------------------------------------------------

    /// Record one cell edit.
    ///
    /// The value is applied locally at once and marked saving. With
    /// `immediate`, or outside batch mode, the row is flushed before this
    /// returns and the flush result is returned. Otherwise the row's
    /// debounce timer is re-armed and the edit goes out with the batch.
    ///
    /// Setting the status field to the terminal status also clears the
    /// priority rank in the same batch.
    pub async fn record_edit(
        &self,
        row_id: RecordId,
        field_key: &str,
        value: FieldValue,
        immediate: bool,
    ) -> EditResult<()> {
        let flush_now = {
            let mut state = self.state();
            state.check_type(field_key, &value)?;
            if !state.records.contains_key(&row_id) {
                return Err(EditError::UnknownRecord { row_id });
            }

            let policy = &self.inner.policy;
            let mut edits = vec![(field_key.to_string(), value)];
            if policy.is_terminal_transition(field_key, &edits[0].1) {
                edits.push((PRIORITY_RANK_KEY.to_string(), FieldValue::Null));
            } else if field_key == policy.status_field
                && state.has_pending_terminal(row_id, policy)
            {
                // Leaving the terminal status in the same batch keeps the rank.
                state.withdraw(row_id, PRIORITY_RANK_KEY)?;
            }

            let EditState {
                records,
                buffer,
                saving,
                ..
            } = &mut *state;
            let record = records
                .get_mut(&row_id)
                .ok_or(EditError::UnknownRecord { row_id })?;
            for (key, value) in edits {
                let before = record.get(&key);
                record.set(&key, value.clone())?;
                buffer.stage(row_id, &key, value, before);
                saving.insert((row_id, key));
            }
            debug!(row_id = %row_id, field_key = %field_key, "Edit buffered");

            let flush_now = immediate || !state.batch_mode;
            if !flush_now {
                state.next_generation += 1;
                let generation = state.next_generation;
                let timer = self.spawn_timer(row_id, generation);
                state.buffer.arm(row_id, generation, timer);
            }
            flush_now
        };

        if flush_now {
            self.flush_row(row_id).await
        } else {
            Ok(())
        }
    }

    fn spawn_timer(&self, row_id: RecordId, generation: u64) -> tokio::task::JoinHandle<()> {
        let coordinator = self.clone();
        let debounce = self.inner.config.debounce;
        tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            let flush = {
                let mut state = coordinator.state();
                let staged = state.buffer.take_due(row_id, generation);
                staged.map(|staged| state.begin_flush(row_id, staged))
            };
            if let Some(flush) = flush {
                if let Err(e) = coordinator.send(row_id, flush).await {
                    debug!(row_id = %row_id, error = %e, "Debounced flush failed");
                }
            }
        })
    }

    /// Flush one row's pending edits now.
    pub async fn flush_row(&self, row_id: RecordId) -> EditResult<()> {
        let flush = {
            let mut state = self.state();
            let staged = state.buffer.take(row_id);
            staged.map(|staged| state.begin_flush(row_id, staged))
        };
        match flush {
            Some(flush) => self.send(row_id, flush).await,
            None => Ok(()),
        }
    }

    /// Flush every row with pending edits concurrently and wait for all.
    pub async fn flush_all(&self) -> FlushReport {
        let mut flushes = Vec::new();
        {
            let mut state = self.state();
            let staged = state.buffer.take_all();
            for (row_id, staged) in staged {
                flushes.push((row_id, state.begin_flush(row_id, staged)));
            }
        }
        let results = join_all(flushes.into_iter().map(|(row_id, flush)| async move {
            (row_id, self.send(row_id, flush).await)
        }))
        .await;

        let mut report = FlushReport::default();
        for (row_id, result) in results {
            match result {
                Ok(()) => report.saved.push(row_id),
                Err(e) => report.failed.push((row_id, e)),
            }
        }
        report
    }

    /// Turn batching on or off. Turning it off flushes everything pending.
    pub async fn set_batch_mode(&self, enabled: bool) -> FlushReport {
        self.state().batch_mode = enabled;
        if enabled {
            return FlushReport::default();
        }
        let report = self.flush_all().await;
        info!(
            saved = report.saved.len(),
            failed = report.failed.len(),
            "Batch mode ended"
        );
        report
    }

    /// Leave batch mode, flushing every pending row.
    pub async fn exit_batch_mode(&self) -> FlushReport {
        self.set_batch_mode(false).await
    }

    /// Send one row's edits and settle local state on the outcome.
    async fn send(&self, row_id: RecordId, flush: Flush) -> EditResult<()> {
        let fields = flush.fields;
        self.inner.events.publish(EditEvent::Saving {
            row_id,
            fields: fields.clone(),
        });
        debug!(row_id = %row_id, fields = ?fields, "Flushing row");

        match self.inner.store.update(row_id, &flush.patch).await {
            Ok(stored) => {
                {
                    let mut state = self.state();
                    state.end_flush(row_id, flush.id);
                    state.adopt(stored);
                    state.settle(row_id, &fields);
                }
                debug!(row_id = %row_id, fields = ?fields, "Row saved");
                self.inner.events.publish(EditEvent::Saved { row_id, fields });

                if flush.patch.contains(&self.inner.policy.status_field) {
                    self.rebalance_ranks().await;
                }
                Ok(())
            }
            Err(err) => {
                self.roll_back(row_id, flush.id, &fields);
                warn!(row_id = %row_id, fields = ?fields, error = %err, "Flush rejected, edits reverted");

                match self.inner.store.get(row_id).await {
                    Ok(Some(authoritative)) => self.state().adopt(authoritative),
                    Ok(None) => {
                        self.state().records.remove(&row_id);
                    }
                    Err(e) => debug!(row_id = %row_id, error = %e, "Refetch after rollback failed"),
                }

                self.inner.events.publish(EditEvent::RolledBack {
                    row_id,
                    fields,
                    message: err.message.clone(),
                });
                Err(EditError::FlushFailed {
                    row_id,
                    source: err,
                })
            }
        }
    }

    fn roll_back(&self, row_id: RecordId, flush_id: u64, fields: &[String]) {
        let mut state = self.state();
        let Some(flight) = state.end_flush(row_id, flush_id) else {
            state.settle(row_id, fields);
            return;
        };
        for (field_key, before) in flight.baseline.iter() {
            if !flight.overlay.contains(field_key) {
                // A later flush took the field over and inherits this baseline.
                state.rebase_in_flight(row_id, field_key, before.clone());
                continue;
            }
            // A newer edit keeps its value; the restored one becomes its baseline.
            if state.buffer.rebase(row_id, field_key, before.clone()) {
                continue;
            }
            if let Some(record) = state.records.get_mut(&row_id) {
                if let Err(e) = record.set(field_key, before.clone()) {
                    warn!(row_id = %row_id, field_key = %field_key, error = %e, "Could not restore field");
                }
            }
        }
        state.settle(row_id, fields);
    }

    // ------------------------------------------------------------------------
    // Ranks and backlog
    // ------------------------------------------------------------------------

    async fn rebalance_ranks(&self) -> Vec<RankDelta> {
        let Some(ranks) = &self.inner.ranks else {
            return Vec::new();
        };
        let deltas = match ranks.rebalance().await {
            Ok(deltas) => deltas,
            Err(e) => {
                warn!(error = %e, "Rank rebalance failed");
                return Vec::new();
            }
        };

        let mut state = self.state();
        for delta in &deltas {
            if state.is_carried(delta.id, PRIORITY_RANK_KEY) {
                continue;
            }
            if let Some(record) = state.records.get_mut(&delta.id) {
                record.priority_rank = delta.to;
            }
        }
        deltas
    }

    /// Insert a record, add it to the local state and rebalance ranks.
    pub async fn create_record(&self, row: NewRecord) -> EditResult<Record> {
        let record = self.inner.store.insert(row).await?;
        self.state().adopt(record.clone());
        info!(row_id = %record.id, "Record created");
        self.rebalance_ranks().await;
        Ok(self.record(record.id).unwrap_or(record))
    }

    /// Move `ordered_ids` to the front of the backlog and rebalance ranks.
    ///
    /// Position writes go out concurrently; the first failure is returned
    /// after all settle.
    pub async fn reorder_backlog(&self, ordered_ids: &[RecordId]) -> EditResult<Vec<SortDelta>> {
        let deltas = reorder_backlog(&self.records(), ordered_ids)?;
        if deltas.is_empty() {
            return Ok(deltas);
        }

        let results = join_all(deltas.iter().map(|delta| {
            let patch = delta.patch();
            async move { self.inner.store.update(delta.id, &patch).await }
        }))
        .await;

        let mut first_error = None;
        for result in results {
            match result {
                Ok(stored) => self.state().adopt(stored),
                Err(e) => {
                    warn!(error = %e, "Backlog position write failed");
                    first_error.get_or_insert(EditError::Store(e));
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        info!(moved = deltas.len(), "Backlog reordered");
        self.rebalance_ranks().await;
        Ok(deltas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use waypoint_core::{DataType, NewColumn, StoreError};
    use waypoint_storage::{InMemoryRecordStore, StoreOp};

    fn store() -> Arc<InMemoryRecordStore> {
        let store = InMemoryRecordStore::with_fields([
            ("title", DataType::Text),
            ("status", DataType::Text),
            ("a", DataType::Text),
            ("b", DataType::Text),
        ]);
        store.seed([Record::new(42, 0)
            .with_field("title", "Launch")
            .with_field("status", "Planned")
            .with_priority_rank(Some(1))]);
        Arc::new(store)
    }

    async fn coordinator(store: &Arc<InMemoryRecordStore>) -> BatchedEditCoordinator {
        let coordinator = BatchedEditCoordinator::new(store.clone());
        coordinator.refresh().await.unwrap();
        coordinator
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_applies_optimistically() {
        let store = store();
        let coordinator = coordinator(&store).await;
        coordinator
            .record_edit(RecordId(42), "title", "Relaunch".into(), false)
            .await
            .unwrap();

        assert_eq!(coordinator.record(RecordId(42)).unwrap().text("title"), Some("Relaunch"));
        assert!(coordinator.is_saving(RecordId(42), "title"));
        assert!(store.log().updates().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_record_rejected() {
        let store = store();
        let coordinator = coordinator(&store).await;
        let err = coordinator
            .record_edit(RecordId(7), "title", "x".into(), false)
            .await
            .unwrap_err();
        assert_eq!(err, EditError::UnknownRecord { row_id: RecordId(7) });
    }

    #[tokio::test(start_paused = true)]
    async fn test_id_is_read_only() {
        let store = store();
        let coordinator = coordinator(&store).await;
        let err = coordinator
            .record_edit(RecordId(42), "id", FieldValue::Integer(1), true)
            .await
            .unwrap_err();
        assert!(matches!(err, EditError::ReadOnlyField { .. }));
        assert!(coordinator.saving().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_type_checked_against_columns() {
        let store = store();
        let columns = vec![
            NewColumn::system("title", "Title", DataType::Text).into_definition(0),
            NewColumn::system("status", "Status", DataType::Text).into_definition(1),
        ];
        let coordinator = BatchedEditCoordinator::builder(store.clone())
            .columns(&columns)
            .build();
        coordinator.refresh().await.unwrap();

        let err = coordinator
            .record_edit(RecordId(42), "title", FieldValue::Integer(3), false)
            .await
            .unwrap_err();
        assert!(matches!(err, EditError::TypeMismatch { .. }));

        let err = coordinator
            .record_edit(RecordId(42), "ghost", "x".into(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, EditError::UnknownField { .. }));
        assert_eq!(coordinator.record(RecordId(42)).unwrap().text("title"), Some("Launch"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_edit_flushes_before_returning() {
        let store = store();
        let coordinator = coordinator(&store).await;
        coordinator
            .record_edit(RecordId(42), "a", "x".into(), false)
            .await
            .unwrap();
        coordinator
            .record_edit(RecordId(42), "b", "y".into(), true)
            .await
            .unwrap();

        let updates = store.log().updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].1.len(), 2);
        assert!(coordinator.pending_rows().is_empty());
        assert!(coordinator.saving().is_empty());

        // The cancelled timer never fires a second write.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.log().updates().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_edit_survives_rollback_of_older_flush() {
        let store = Arc::new(
            InMemoryRecordStore::with_fields([("title", DataType::Text), ("status", DataType::Text)])
                .with_latency(Duration::from_millis(50)),
        );
        store.seed([Record::new(1, 0).with_field("title", "v0")]);
        let coordinator = coordinator(&store).await;
        store
            .faults()
            .fail_next(StoreOp::Update, StoreError::unavailable("offline"));

        let first = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .record_edit(RecordId(1), "title", "v1".into(), true)
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        coordinator
            .record_edit(RecordId(1), "title", "v2".into(), false)
            .await
            .unwrap();

        assert!(first.await.unwrap().is_err());
        // v2 is still pending and shown; its rollback target is now v0.
        assert_eq!(coordinator.record(RecordId(1)).unwrap().text("title"), Some("v2"));
        assert!(coordinator.is_saving(RecordId(1), "title"));

        store
            .faults()
            .fail_next(StoreOp::Update, StoreError::unavailable("offline"));
        assert!(coordinator.flush_row(RecordId(1)).await.is_err());
        assert_eq!(coordinator.record(RecordId(1)).unwrap().text("title"), Some("v0"));
        assert!(coordinator.saving().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_debounced_flush_reverts() {
        let store = store();
        let coordinator = coordinator(&store).await;
        let mut events = coordinator.subscribe();
        store
            .faults()
            .fail_next(StoreOp::Update, StoreError::unavailable("offline"));

        coordinator
            .record_edit(RecordId(42), "title", "Relaunch".into(), false)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(coordinator.record(RecordId(42)).unwrap().text("title"), Some("Launch"));
        assert!(coordinator.saving().is_empty());
        assert!(coordinator.pending_rows().is_empty());
        let last = std::iter::from_fn(|| events.try_recv()).last();
        assert!(matches!(last, Some(EditEvent::RolledBack { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_record_assigns_rank() {
        let store = store();
        let coordinator = BatchedEditCoordinator::builder(store.clone())
            .rank_maintenance(true)
            .build();
        coordinator.refresh().await.unwrap();

        let created = coordinator
            .create_record(NewRecord::new().with_field("title", "Beta"))
            .await
            .unwrap();
        assert_eq!(created.priority_rank, Some(2));
        assert_eq!(store.row(created.id).unwrap().priority_rank, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reorder_backlog_writes_positions() {
        let store = store();
        store.seed([Record::new(43, 1), Record::new(44, 2)]);
        let coordinator = coordinator(&store).await;

        let deltas = coordinator
            .reorder_backlog(&[RecordId(44)])
            .await
            .unwrap();
        assert_eq!(deltas.len(), 3);
        let order: Vec<i64> = coordinator.records().iter().map(|r| r.id.get()).collect();
        assert_eq!(order, vec![44, 42, 43]);
        assert_eq!(store.row(RecordId(44)).unwrap().sort_order, 0);
    }
}
