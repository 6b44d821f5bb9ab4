//! Column Registry
//!
//! Authoritative list of column definitions. Every successful mutation is
//! announced on the [`ColumnBus`].

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use waypoint_core::{
    validate_display_name, validate_field_key, ColumnDefinition, ColumnError, ColumnId,
    ColumnPatch, ColumnResult, NewColumn, StoreErrorKind,
};
use waypoint_events::{ColumnBus, ColumnSubscription, ColumnsChanged};
use waypoint_storage::ColumnStore;

/// Column definition metadata backed by a [`ColumnStore`].
pub struct ColumnRegistry {
    store: Arc<dyn ColumnStore>,
    bus: ColumnBus,
}

impl std::fmt::Debug for ColumnRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnRegistry")
            .field("subscribers", &self.bus.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl ColumnRegistry {
    pub fn new(store: Arc<dyn ColumnStore>, bus: ColumnBus) -> Self {
        Self { store, bus }
    }

    /// Bus on which this registry announces changes.
    pub fn bus(&self) -> &ColumnBus {
        &self.bus
    }

    pub fn subscribe(&self) -> ColumnSubscription {
        self.bus.subscribe()
    }

    /// All definitions ordered by display order.
    pub async fn list(&self) -> ColumnResult<Vec<ColumnDefinition>> {
        let mut columns = self.store.list().await?;
        columns.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.field_key.cmp(&b.field_key)));
        Ok(columns)
    }

    /// Look up a definition by field key.
    pub async fn get(&self, field_key: &str) -> ColumnResult<Option<ColumnDefinition>> {
        let columns = self.store.list().await?;
        Ok(columns.into_iter().find(|c| c.field_key == field_key))
    }

    /// Look up a definition by id.
    pub async fn get_by_id(&self, id: ColumnId) -> ColumnResult<Option<ColumnDefinition>> {
        let columns = self.store.list().await?;
        Ok(columns.into_iter().find(|c| c.id == id))
    }

    async fn require(&self, id: ColumnId) -> ColumnResult<ColumnDefinition> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| ColumnError::not_found(format!("column {}", id)))
    }

    /// Register a new definition at the end of the display order.
    pub async fn create(&self, column: NewColumn) -> ColumnResult<ColumnDefinition> {
        validate_field_key(&column.field_key)?;
        validate_display_name(&column.display_name)?;

        let columns = self.store.list().await?;
        if columns.iter().any(|c| c.field_key == column.field_key) {
            return Err(ColumnError::DuplicateKey {
                field_key: column.field_key,
            });
        }
        let order = columns.iter().map(|c| c.order).max().map_or(0, |max| max + 1);

        let field_key = column.field_key.clone();
        let def = column.into_definition(order);
        let stored = self.store.insert(&def).await.map_err(|e| match e.kind {
            StoreErrorKind::UniqueViolation => ColumnError::DuplicateKey {
                field_key: field_key.clone(),
            },
            _ => ColumnError::Store(e),
        })?;

        info!(
            column_id = %stored.id,
            field_key = %stored.field_key,
            order = stored.order,
            "Column registered"
        );
        self.bus.publish(ColumnsChanged::created(&stored));
        Ok(stored)
    }

    /// Change the mutable attributes of a definition.
    pub async fn update(&self, id: ColumnId, patch: &ColumnPatch) -> ColumnResult<ColumnDefinition> {
        let current = self.require(id).await?;
        let next = patch.apply(&current)?;
        let stored = self.store.update(&next).await?;

        debug!(column_id = %id, field_key = %stored.field_key, "Column updated");
        self.bus.publish(ColumnsChanged::updated(&stored));
        Ok(stored)
    }

    /// Remove a definition. System definitions cannot be removed.
    pub async fn delete(&self, id: ColumnId) -> ColumnResult<ColumnDefinition> {
        let current = self.require(id).await?;
        if current.is_system_defined {
            return Err(ColumnError::Forbidden {
                field_key: current.field_key,
                action: "delete".to_string(),
            });
        }
        self.store.delete(id).await?;

        info!(column_id = %id, field_key = %current.field_key, "Column unregistered");
        self.bus.publish(ColumnsChanged::deleted(&current));
        Ok(current)
    }

    /// Write new display orders, announcing one reorder if anything moved.
    ///
    /// Returns how many definitions were written. Writes are not atomic: if
    /// one fails, the earlier ones stay and orders may collide until the
    /// reorder is retried. A reorder is still announced so views refetch.
    pub async fn set_orders(&self, orders: &[(ColumnId, i32)]) -> ColumnResult<usize> {
        if orders.is_empty() {
            return Ok(0);
        }

        let current: HashMap<ColumnId, ColumnDefinition> = self
            .store
            .list()
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        let mut written = 0;
        for (id, order) in orders {
            if let Err(e) = self.write_order(&current, *id, *order, &mut written).await {
                if written > 0 {
                    warn!(written = written, error = %e, "Reorder interrupted, orders may collide");
                    self.bus.publish(ColumnsChanged::reordered());
                }
                return Err(e);
            }
        }

        if written > 0 {
            info!(written = written, "Columns reordered");
            self.bus.publish(ColumnsChanged::reordered());
        }
        Ok(written)
    }

    async fn write_order(
        &self,
        current: &HashMap<ColumnId, ColumnDefinition>,
        id: ColumnId,
        order: i32,
        written: &mut usize,
    ) -> ColumnResult<()> {
        let def = current
            .get(&id)
            .ok_or_else(|| ColumnError::not_found(format!("column {}", id)))?;
        if def.order == order {
            return Ok(());
        }
        let next = ColumnPatch::order(order).apply(def)?;
        self.store.update(&next).await?;
        *written += 1;
        Ok(())
    }
}
