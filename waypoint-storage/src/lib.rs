//! Waypoint Storage - Store Traits and In-Memory Implementations
//!
//! Defines the contracts for the external record store, the privileged
//! schema procedures and the column definition table. Production
//! implementations live with the application that owns the database
//! connection.

pub mod faults;
pub mod memory;
pub mod traits;

pub use faults::{CallLog, FaultPlan, StoreCall, StoreOp};
pub use memory::{InMemoryColumnStore, InMemoryRecordStore};
pub use traits::{ColumnStore, RecordStore, SchemaProcedures};
