//! Column display order planning.
//!
//! System and custom columns are never interleaved. The group of the first
//! requested id leads: its requested columns in request order, then its
//! remaining columns in their current order, then every column of the other
//! group in its current order. Orders are dense from zero.

use std::collections::HashSet;
use waypoint_core::{ColumnDefinition, ColumnError, ColumnId, ColumnResult};

/// Compute the order changes for a reorder request.
///
/// `current` must be sorted by display order. Returns `(id, new_order)` for
/// every definition whose order changes; an empty request changes nothing.
///
/// # Errors
/// `NotFound` for ids not in `current`, `InvalidMutation` for ids listed
/// twice.
pub fn plan_reorder(
    current: &[ColumnDefinition],
    ordered_ids: &[ColumnId],
) -> ColumnResult<Vec<(ColumnId, i32)>> {
    let mut seen = HashSet::with_capacity(ordered_ids.len());
    for id in ordered_ids {
        if !current.iter().any(|c| c.id == *id) {
            return Err(ColumnError::not_found(format!("column {}", id)));
        }
        if !seen.insert(*id) {
            return Err(ColumnError::InvalidMutation {
                reason: format!("column {} listed more than once", id),
            });
        }
    }

    let Some(first) = ordered_ids.first() else {
        return Ok(Vec::new());
    };
    let leading = current
        .iter()
        .find(|c| c.id == *first)
        .map(|c| c.group())
        .ok_or_else(|| ColumnError::not_found(format!("column {}", first)))?;

    let listed: Vec<&ColumnDefinition> = ordered_ids
        .iter()
        .filter_map(|id| current.iter().find(|c| c.id == *id))
        .filter(|c| c.group() == leading)
        .collect();
    let listed_ids: HashSet<ColumnId> = listed.iter().map(|c| c.id).collect();

    let rest_of_group = current
        .iter()
        .filter(|c| c.group() == leading && !listed_ids.contains(&c.id));
    let other_group = current.iter().filter(|c| c.group() != leading);

    Ok(dense_changes(
        listed.into_iter().chain(rest_of_group).chain(other_group),
    ))
}

/// Close gaps in display order, keeping the current relative order.
///
/// `current` must be sorted by display order.
pub fn plan_compaction(current: &[ColumnDefinition]) -> Vec<(ColumnId, i32)> {
    dense_changes(current.iter())
}

fn dense_changes<'a>(
    sequence: impl Iterator<Item = &'a ColumnDefinition>,
) -> Vec<(ColumnId, i32)> {
    sequence
        .enumerate()
        .filter_map(|(index, def)| {
            let order = index as i32;
            (def.order != order).then_some((def.id, order))
        })
        .collect()
}
