//! Waypoint Records - Batched Edits, Priority Ranks and Backlog Order
//!
//! The [`BatchedEditCoordinator`] turns rapid cell edits into one optimistic
//! multi-field write per row and rolls back precisely on failure. The
//! [`assign_priority_ranks`] function and [`RankMaintainer`] keep priority
//! ranks dense across non-terminal records.

pub mod backlog;
pub mod buffer;
pub mod coordinator;
pub mod rank;

pub use backlog::{reorder_backlog, SortDelta};
pub use buffer::{PendingEditBuffer, StagedEdits};
pub use coordinator::{BatchedEditCoordinator, EditCoordinatorBuilder, FlushReport};
pub use rank::{assign_priority_ranks, RankDelta, RankMaintainer};
