//! Priority Rank Assigner
//!
//! Non-terminal records carry a dense priority rank 1..N; terminal records
//! carry none. Records that already have a rank keep their relative order
//! and unranked records queue up behind them in backlog order.

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, warn};
use waypoint_core::{
    EditError, EditResult, FieldValue, Record, RecordFilter, RecordId, RecordOrder, RecordPatch,
    StatusPolicy, PRIORITY_RANK_KEY,
};
use waypoint_storage::RecordStore;

/// One record whose stored rank differs from the computed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankDelta {
    pub id: RecordId,
    pub from: Option<i64>,
    pub to: Option<i64>,
}

impl RankDelta {
    /// Patch that writes the computed rank.
    pub fn patch(&self) -> RecordPatch {
        RecordPatch::new().with(PRIORITY_RANK_KEY, FieldValue::from(self.to))
    }
}

fn rank_order(a: &Record, b: &Record) -> Ordering {
    match (a.priority_rank, b.priority_rank) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.sort_order.cmp(&b.sort_order))
    .then_with(|| a.id.cmp(&b.id))
}

/// Compute rank changes for a fully loaded record set.
///
/// Returns only records whose rank changes. Applying the result and running
/// again yields no deltas.
pub fn assign_priority_ranks(records: &[Record], policy: &StatusPolicy) -> Vec<RankDelta> {
    let (terminal, mut open): (Vec<&Record>, Vec<&Record>) =
        records.iter().partition(|r| policy.is_terminal(r));
    open.sort_by(|a, b| rank_order(a, b));

    let ranked = open.into_iter().zip(1i64..).map(|(r, rank)| (r, Some(rank)));
    let cleared = terminal.into_iter().map(|r| (r, None));

    ranked
        .chain(cleared)
        .filter(|(r, rank)| r.priority_rank != *rank)
        .map(|(r, rank)| RankDelta {
            id: r.id,
            from: r.priority_rank,
            to: rank,
        })
        .collect()
}

/// Keeps stored priority ranks dense.
///
/// Run after records are created, change status, or are reordered.
pub struct RankMaintainer {
    store: Arc<dyn RecordStore>,
    policy: StatusPolicy,
}

impl std::fmt::Debug for RankMaintainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RankMaintainer")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RankMaintainer {
    pub fn new(store: Arc<dyn RecordStore>, policy: StatusPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &StatusPolicy {
        &self.policy
    }

    /// Load every record, compute rank deltas and write them concurrently.
    ///
    /// Returns the deltas that were written. All writes are attempted; the
    /// first failure is returned after they settle.
    pub async fn rebalance(&self) -> EditResult<Vec<RankDelta>> {
        let records = self
            .store
            .select(&RecordFilter::all(), &RecordOrder::by_id())
            .await?;
        let deltas = assign_priority_ranks(&records, &self.policy);
        if deltas.is_empty() {
            return Ok(deltas);
        }

        let results = join_all(deltas.iter().map(|delta| {
            let patch = delta.patch();
            async move { (delta, self.store.update(delta.id, &patch).await) }
        }))
        .await;

        let mut written = Vec::with_capacity(deltas.len());
        let mut first_error: Option<EditError> = None;
        for (delta, result) in results {
            match result {
                Ok(_) => written.push(*delta),
                Err(e) => {
                    warn!(row_id = %delta.id, error = %e, "Rank write failed");
                    first_error.get_or_insert(EditError::Store(e));
                }
            }
        }

        debug!(written = written.len(), "Priority ranks rebalanced");
        match first_error {
            Some(e) => Err(e),
            None => Ok(written),
        }
    }
}
