//! Waypoint Schema - Column Registry and Schema Evolution
//!
//! Users add, rename, hide, reorder and delete table columns at runtime.
//! The [`ColumnMutationService`] keeps the [`ColumnRegistry`] metadata and
//! the physical record structure (through the [`SchemaGateway`]) in step,
//! and [`ColumnView`]s follow the registry through the columns-changed bus.

pub mod audit;
pub mod gateway;
pub mod registry;
pub mod reorder;
pub mod service;
pub mod view;

pub use audit::{SchemaAudit, TypeDrift};
pub use gateway::SchemaGateway;
pub use registry::ColumnRegistry;
pub use reorder::{plan_compaction, plan_reorder};
pub use service::ColumnMutationService;
pub use view::ColumnView;
