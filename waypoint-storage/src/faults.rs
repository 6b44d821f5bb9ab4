//! Fault injection and call recording for in-memory stores.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use waypoint_core::{ColumnId, RecordId, RecordPatch, StoreError, StoreResult};

/// Store operations that can be failed on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Select,
    Get,
    Insert,
    Update,
    Delete,
    AddField,
    RemoveField,
    PhysicalFields,
    ColumnList,
    ColumnInsert,
    ColumnUpdate,
    ColumnDelete,
}

/// One recorded store call.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Select,
    Get(RecordId),
    Insert,
    Update { id: RecordId, patch: RecordPatch },
    Delete(RecordId),
    AddField(String),
    RemoveField(String),
    ColumnInsert(String),
    ColumnUpdate(ColumnId),
    ColumnDelete(ColumnId),
}

#[derive(Debug, Default)]
struct FaultState {
    /// None lets one call through
    queued: HashMap<StoreOp, VecDeque<Option<StoreError>>>,
    sticky: HashMap<StoreOp, StoreError>,
}

/// Planned failures, consumed as operations run.
///
/// Queued failures fire once each, in order; a sticky failure fires on every
/// call until cleared.
#[derive(Debug, Default)]
pub struct FaultPlan {
    state: Mutex<FaultState>,
}

impl FaultPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next call of `op` with `err`.
    pub fn fail_next(&self, op: StoreOp, err: StoreError) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.queued.entry(op).or_default().push_back(Some(err));
    }

    /// Let the next queued call of `op` succeed, so a following
    /// [`FaultPlan::fail_next`] hits a later call.
    pub fn pass_next(&self, op: StoreOp) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.queued.entry(op).or_default().push_back(None);
    }

    /// Fail every call of `op` with `err` until [`FaultPlan::clear`].
    pub fn fail_always(&self, op: StoreOp, err: StoreError) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.sticky.insert(op, err);
    }

    /// Drop every planned failure for `op`.
    pub fn clear(&self, op: StoreOp) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.queued.remove(&op);
        state.sticky.remove(&op);
    }

    /// Consume the failure planned for this call of `op`, if any.
    pub fn check(&self, op: StoreOp) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(planned) = state.queued.get_mut(&op).and_then(VecDeque::pop_front) {
            return planned.map_or(Ok(()), Err);
        }
        match state.sticky.get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// Ordered log of store calls.
#[derive(Debug, Default)]
pub struct CallLog {
    calls: Mutex<Vec<StoreCall>>,
}

impl CallLog {
    pub fn record(&self, call: StoreCall) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }

    /// Every call so far.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Update calls so far, as (row, patch) pairs.
    pub fn updates(&self) -> Vec<(RecordId, RecordPatch)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Update { id, patch } => Some((id, patch)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queued_failures_fire_once_in_order() {
        let plan = FaultPlan::new();
        plan.fail_next(StoreOp::Update, StoreError::unavailable("first"));
        plan.fail_next(StoreOp::Update, StoreError::rejected("second"));

        assert_eq!(plan.check(StoreOp::Update).unwrap_err().message, "first");
        assert_eq!(plan.check(StoreOp::Update).unwrap_err().message, "second");
        assert!(plan.check(StoreOp::Update).is_ok());
        assert!(plan.check(StoreOp::Insert).is_ok());
    }

    #[test]
    fn test_sticky_failure_until_cleared() {
        let plan = FaultPlan::new();
        plan.fail_always(StoreOp::AddField, StoreError::internal("boom"));
        assert!(plan.check(StoreOp::AddField).is_err());
        assert!(plan.check(StoreOp::AddField).is_err());
        plan.clear(StoreOp::AddField);
        assert!(plan.check(StoreOp::AddField).is_ok());
    }

    #[test]
    fn test_call_log_filters_updates() {
        let log = CallLog::default();
        log.record(StoreCall::Select);
        log.record(StoreCall::Update {
            id: RecordId(1),
            patch: RecordPatch::new().with("a", 1i64),
        });
        assert_eq!(log.calls().len(), 2);
        assert_eq!(log.updates().len(), 1);
        log.clear();
        assert!(log.calls().is_empty());
    }

    #[test]
    fn test_pass_defers_failure_to_later_call() {
        let plan = FaultPlan::new();
        plan.pass_next(StoreOp::ColumnUpdate);
        plan.fail_next(StoreOp::ColumnUpdate, StoreError::unavailable("second"));

        assert!(plan.check(StoreOp::ColumnUpdate).is_ok());
        assert!(plan.check(StoreOp::ColumnUpdate).is_err());
        assert!(plan.check(StoreOp::ColumnUpdate).is_ok());
    }
}
