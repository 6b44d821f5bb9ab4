//! Waypoint Events - Process-Wide Notification Buses
//!
//! Registry mutations publish [`ColumnsChanged`] on a [`ColumnBus`] so that
//! every column view can refresh without holding a reference to the
//! registry. The edit coordinator publishes [`EditEvent`]s on an
//! [`EditBus`].

pub mod bus;
pub mod column;
pub mod edit;

pub use bus::{BusError, BusEvent, EventBus, Subscription};
pub use column::{ColumnBus, ColumnChangeKind, ColumnSubscription, ColumnsChanged};
pub use edit::{EditBus, EditEvent, EditSubscription};
