//! Pending edit buffer.
//!
//! Per row: the patch waiting to be flushed, the value every touched field
//! had before the batch began, and the debounce timer armed for the row.

use std::collections::HashMap;
use tokio::task::JoinHandle;
use waypoint_core::{FieldValue, RecordId, RecordPatch};

/// Edits taken out of the buffer for one flush.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedEdits {
    pub patch: RecordPatch,
    /// Pre-edit value of every field in `patch`
    pub baseline: RecordPatch,
}

impl StagedEdits {
    pub fn field_keys(&self) -> Vec<String> {
        self.patch.keys().map(str::to_string).collect()
    }
}

#[derive(Debug, Default)]
struct RowEntry {
    patch: RecordPatch,
    baseline: RecordPatch,
    timer: Option<(u64, JoinHandle<()>)>,
}

impl RowEntry {
    fn cancel_timer(&mut self) {
        if let Some((_, handle)) = self.timer.take() {
            handle.abort();
        }
    }
}

#[derive(Debug, Default)]
pub struct PendingEditBuffer {
    rows: HashMap<RecordId, RowEntry>,
}

impl PendingEditBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `value` for `field_key`, remembering `before` if this is the
    /// first edit to the field since the row was last flushed.
    pub fn stage(&mut self, row_id: RecordId, field_key: &str, value: FieldValue, before: FieldValue) {
        let entry = self.rows.entry(row_id).or_default();
        if !entry.baseline.contains(field_key) {
            entry.baseline.insert(field_key, before);
        }
        entry.patch.insert(field_key, value);
    }

    /// Arm the row's timer, cancelling any timer already armed.
    ///
    /// Does nothing for a row with no pending edits.
    pub fn arm(&mut self, row_id: RecordId, generation: u64, timer: JoinHandle<()>) {
        match self.rows.get_mut(&row_id) {
            Some(entry) => {
                entry.cancel_timer();
                entry.timer = Some((generation, timer));
            }
            None => timer.abort(),
        }
    }

    /// Take the row's edits and cancel its timer.
    pub fn take(&mut self, row_id: RecordId) -> Option<StagedEdits> {
        let mut entry = self.rows.remove(&row_id)?;
        entry.cancel_timer();
        Some(StagedEdits {
            patch: entry.patch,
            baseline: entry.baseline,
        })
    }

    /// Take the row's edits on behalf of the timer of `generation`.
    ///
    /// Returns None if that timer has since been replaced or the row was
    /// already flushed. The timer itself is not cancelled since it is the
    /// caller.
    pub fn take_due(&mut self, row_id: RecordId, generation: u64) -> Option<StagedEdits> {
        let current = self
            .rows
            .get(&row_id)
            .and_then(|entry| entry.timer.as_ref())
            .is_some_and(|(armed, _)| *armed == generation);
        if !current {
            return None;
        }
        let entry = self.rows.remove(&row_id)?;
        Some(StagedEdits {
            patch: entry.patch,
            baseline: entry.baseline,
        })
    }

    /// Take every row's edits and cancel all timers.
    pub fn take_all(&mut self) -> Vec<(RecordId, StagedEdits)> {
        let rows: Vec<RecordId> = self.rows.keys().copied().collect();
        rows.into_iter()
            .filter_map(|row_id| self.take(row_id).map(|staged| (row_id, staged)))
            .collect()
    }

    /// Replace the baseline of a pending field. Returns false if the field
    /// has no pending edit.
    pub fn rebase(&mut self, row_id: RecordId, field_key: &str, before: FieldValue) -> bool {
        match self.rows.get_mut(&row_id) {
            Some(entry) if entry.patch.contains(field_key) => {
                entry.baseline.insert(field_key, before);
                true
            }
            _ => false,
        }
    }

    /// Withdraw a pending field, returning its baseline.
    ///
    /// A row left with nothing pending is dropped and its timer cancelled.
    pub fn unstage(&mut self, row_id: RecordId, field_key: &str) -> Option<FieldValue> {
        let entry = self.rows.get_mut(&row_id)?;
        entry.patch.remove(field_key)?;
        let before = entry.baseline.remove(field_key);
        if entry.patch.is_empty() {
            if let Some(mut entry) = self.rows.remove(&row_id) {
                entry.cancel_timer();
            }
        }
        before
    }

    pub fn pending(&self, row_id: RecordId) -> Option<&RecordPatch> {
        self.rows.get(&row_id).map(|entry| &entry.patch)
    }

    pub fn is_pending(&self, row_id: RecordId, field_key: &str) -> bool {
        self.pending(row_id).is_some_and(|patch| patch.contains(field_key))
    }

    pub fn has_timer(&self, row_id: RecordId) -> bool {
        self.rows.get(&row_id).is_some_and(|entry| entry.timer.is_some())
    }

    pub fn pending_rows(&self) -> Vec<RecordId> {
        let mut rows: Vec<RecordId> = self.rows.keys().copied().collect();
        rows.sort();
        rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
