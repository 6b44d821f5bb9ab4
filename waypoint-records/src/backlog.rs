//! Manual backlog ordering.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use waypoint_core::{EditError, EditResult, FieldValue, Record, RecordId, RecordPatch, SORT_ORDER_KEY};

/// One record whose backlog position changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortDelta {
    pub id: RecordId,
    pub from: i64,
    pub to: i64,
}

impl SortDelta {
    pub fn patch(&self) -> RecordPatch {
        RecordPatch::new().with(SORT_ORDER_KEY, FieldValue::Integer(self.to))
    }
}

/// Move `ordered_ids` to the front of the backlog in the given order.
///
/// Every other record follows in its current order. Positions are dense
/// from zero; only records whose position changes are returned. An id
/// listed twice keeps its first position.
///
/// # Errors
/// `UnknownRecord` if an id is not in `records`.
pub fn reorder_backlog(records: &[Record], ordered_ids: &[RecordId]) -> EditResult<Vec<SortDelta>> {
    let mut listed = Vec::with_capacity(ordered_ids.len());
    let mut seen = HashSet::with_capacity(ordered_ids.len());
    for id in ordered_ids {
        let record = records
            .iter()
            .find(|r| r.id == *id)
            .ok_or(EditError::UnknownRecord { row_id: *id })?;
        if seen.insert(*id) {
            listed.push(record);
        }
    }

    let mut rest: Vec<&Record> = records.iter().filter(|r| !seen.contains(&r.id)).collect();
    rest.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.id.cmp(&b.id)));

    Ok(listed
        .into_iter()
        .chain(rest)
        .zip(0i64..)
        .filter(|(r, position)| r.sort_order != *position)
        .map(|(r, position)| SortDelta {
            id: r.id,
            from: r.sort_order,
            to: position,
        })
        .collect())
}
