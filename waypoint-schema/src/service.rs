//! Column Mutation Service
//!
//! User-facing column operations. Each operation validates before touching
//! any store, then sequences the registry and the schema gateway. A failed
//! second step is compensated where possible; a failed compensation, or a
//! step that cannot be compensated, surfaces `PartialFailure`.

use crate::audit::SchemaAudit;
use crate::gateway::SchemaGateway;
use crate::registry::ColumnRegistry;
use crate::reorder::{plan_compaction, plan_reorder};
use std::sync::Arc;
use tracing::{error, info, warn};
use waypoint_core::{
    is_reserved_key, validate_display_name, validate_field_key, ColumnDefinition, ColumnError,
    ColumnId, ColumnPatch, ColumnResult, NewColumn,
};

#[derive(Debug)]
pub struct ColumnMutationService {
    registry: Arc<ColumnRegistry>,
    gateway: SchemaGateway,
}

impl ColumnMutationService {
    pub fn new(registry: Arc<ColumnRegistry>, gateway: SchemaGateway) -> Self {
        Self { registry, gateway }
    }

    pub fn registry(&self) -> &Arc<ColumnRegistry> {
        &self.registry
    }

    /// Add a user-defined column: register it, then add the physical field.
    ///
    /// The column is always created as a custom column. If the physical add
    /// fails the new definition is removed again and the gateway error is
    /// returned.
    pub async fn add_column(&self, column: NewColumn) -> ColumnResult<ColumnDefinition> {
        let column = NewColumn {
            is_system_defined: false,
            ..column
        };
        validate_field_key(&column.field_key)?;
        validate_display_name(&column.display_name)?;
        if is_reserved_key(&column.field_key) {
            return Err(ColumnError::SchemaConflict {
                field_key: column.field_key,
                reason: "name is reserved for a system-managed attribute".to_string(),
            });
        }

        let data_type = column.data_type;
        let def = self.registry.create(column).await?;

        let Err(add_err) = self.gateway.add_physical_field(&def.field_key, data_type).await else {
            info!(field_key = %def.field_key, data_type = %data_type, "Column added");
            return Ok(def);
        };

        warn!(
            field_key = %def.field_key,
            error = %add_err,
            "Physical add failed, removing definition"
        );
        match self.registry.delete(def.id).await {
            Ok(_) => Err(add_err),
            Err(compensation_err) => {
                error!(
                    field_key = %def.field_key,
                    error = %compensation_err,
                    "Could not remove definition after failed physical add"
                );
                Err(ColumnError::PartialFailure {
                    operation: "add".to_string(),
                    field_key: def.field_key,
                    reason: format!(
                        "{}; removing the definition also failed: {}",
                        add_err, compensation_err
                    ),
                })
            }
        }
    }

    /// Change a column's display name.
    pub async fn rename_column(&self, id: ColumnId, display_name: &str) -> ColumnResult<ColumnDefinition> {
        validate_display_name(display_name)?;
        self.registry.update(id, &ColumnPatch::rename(display_name)).await
    }

    /// Show or hide a column.
    pub async fn set_visibility(&self, id: ColumnId, visible: bool) -> ColumnResult<ColumnDefinition> {
        self.registry.update(id, &ColumnPatch::visibility(visible)).await
    }

    /// Reorder columns, leading with the group of the first id.
    ///
    /// Returns the full list in its new order.
    pub async fn reorder_columns(&self, ordered_ids: &[ColumnId]) -> ColumnResult<Vec<ColumnDefinition>> {
        let current = self.registry.list().await?;
        let changes = plan_reorder(&current, ordered_ids)?;
        if changes.is_empty() {
            return Ok(current);
        }
        self.registry.set_orders(&changes).await?;
        self.registry.list().await
    }

    /// Delete a user-defined column: unregister it, close the gap it leaves
    /// in display order, then drop the physical field.
    ///
    /// A failed physical removal is not compensated; the definition stays
    /// deleted and `PartialFailure` is returned.
    pub async fn delete_column(&self, id: ColumnId) -> ColumnResult<ColumnDefinition> {
        let current = self
            .registry
            .get_by_id(id)
            .await?
            .ok_or_else(|| ColumnError::not_found(format!("column {}", id)))?;
        if current.is_system_defined {
            return Err(ColumnError::Forbidden {
                field_key: current.field_key,
                action: "delete".to_string(),
            });
        }

        let def = self.registry.delete(id).await?;
        if let Err(e) = self.compact_orders().await {
            warn!(field_key = %def.field_key, error = %e, "Could not close order gap");
        }
        if let Err(remove_err) = self.gateway.remove_physical_field(&def.field_key).await {
            error!(
                field_key = %def.field_key,
                error = %remove_err,
                "Definition deleted but physical field remains"
            );
            return Err(ColumnError::PartialFailure {
                operation: "delete".to_string(),
                field_key: def.field_key,
                reason: remove_err.to_string(),
            });
        }

        info!(field_key = %def.field_key, "Column deleted");
        Ok(def)
    }

    /// Renumber display orders densely from zero.
    async fn compact_orders(&self) -> ColumnResult<usize> {
        let current = self.registry.list().await?;
        self.registry.set_orders(&plan_compaction(&current)).await
    }

    pub async fn list_columns(&self) -> ColumnResult<Vec<ColumnDefinition>> {
        self.registry.list().await
    }

    pub async fn list_visible_columns(&self) -> ColumnResult<Vec<ColumnDefinition>> {
        let mut columns = self.registry.list().await?;
        columns.retain(|c| c.visible);
        Ok(columns)
    }

    /// Compare the registry with the physical schema.
    pub async fn audit(&self) -> ColumnResult<SchemaAudit> {
        let columns = self.registry.list().await?;
        let physical = self.gateway.physical_fields().await?;
        let audit = SchemaAudit::compare(&columns, &physical);
        if !audit.is_consistent() {
            warn!(
                orphaned = audit.orphaned.len(),
                unregistered = audit.unregistered.len(),
                drifted = audit.drifted.len(),
                "Registry and physical schema disagree"
            );
        }
        Ok(audit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypoint_core::{DataType, Notice, NoticeLevel, StoreError};
    use waypoint_events::ColumnBus;
    use waypoint_storage::{InMemoryColumnStore, InMemoryRecordStore, SchemaProcedures, StoreOp};

    struct Fixture {
        columns: Arc<InMemoryColumnStore>,
        records: Arc<InMemoryRecordStore>,
        service: ColumnMutationService,
    }

    async fn fixture() -> Fixture {
        let columns = Arc::new(InMemoryColumnStore::new());
        let records = Arc::new(InMemoryRecordStore::with_fields([
            ("title", DataType::Text),
            ("status", DataType::Text),
        ]));
        let registry = Arc::new(ColumnRegistry::new(columns.clone(), ColumnBus::new(16)));
        registry
            .create(NewColumn::system("title", "Title", DataType::Text))
            .await
            .unwrap();
        registry
            .create(NewColumn::system("status", "Status", DataType::Text))
            .await
            .unwrap();
        let service = ColumnMutationService::new(registry, SchemaGateway::new(records.clone()));
        Fixture {
            columns,
            records,
            service,
        }
    }

    #[tokio::test]
    async fn test_add_column_registers_and_adds_field() {
        let f = fixture().await;
        let def = f
            .service
            .add_column(NewColumn::custom("risk_level", "Risk Level", DataType::Text))
            .await
            .unwrap();
        assert_eq!(def.order, 2);
        assert!(!def.is_system_defined);
        assert!(f.records.has_physical_field("risk_level"));
        assert!(f.service.audit().await.unwrap().is_consistent());
    }

    #[tokio::test]
    async fn test_add_column_forces_custom() {
        let f = fixture().await;
        let def = f
            .service
            .add_column(NewColumn::system("budget", "Budget", DataType::Numeric))
            .await
            .unwrap();
        assert!(!def.is_system_defined);
    }

    #[tokio::test]
    async fn test_add_column_invalid_name_touches_nothing() {
        let f = fixture().await;
        let err = f
            .service
            .add_column(NewColumn::custom("Risk Level", "Risk", DataType::Text))
            .await
            .unwrap_err();
        assert!(matches!(err, ColumnError::InvalidName { .. }));

        let err = f
            .service
            .add_column(NewColumn::custom("risk", "   ", DataType::Text))
            .await
            .unwrap_err();
        assert!(matches!(err, ColumnError::InvalidName { .. }));
        assert_eq!(f.columns.column_count(), 2);
        assert!(f.records.log().calls().is_empty());
    }

    #[tokio::test]
    async fn test_add_reserved_key_conflicts_before_mutation() {
        let f = fixture().await;
        let err = f
            .service
            .add_column(NewColumn::custom("sort_order", "Sort", DataType::Integer))
            .await
            .unwrap_err();
        assert!(matches!(err, ColumnError::SchemaConflict { .. }));
        assert_eq!(f.columns.column_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_physical_add_removes_definition() {
        let f = fixture().await;
        let before = f.service.list_columns().await.unwrap();
        f.records
            .faults()
            .fail_next(StoreOp::AddField, StoreError::unavailable("maintenance"));

        let err = f
            .service
            .add_column(NewColumn::custom("risk_level", "Risk", DataType::Text))
            .await
            .unwrap_err();
        assert!(matches!(err, ColumnError::Store(_)));
        assert_eq!(f.service.list_columns().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_failed_compensation_is_partial_failure() {
        let f = fixture().await;
        f.records
            .faults()
            .fail_next(StoreOp::AddField, StoreError::unavailable("maintenance"));
        f.columns
            .faults()
            .fail_next(StoreOp::ColumnDelete, StoreError::unavailable("maintenance"));

        let err = f
            .service
            .add_column(NewColumn::custom("risk_level", "Risk", DataType::Text))
            .await
            .unwrap_err();
        assert!(err.needs_remediation());
        let audit = f.service.audit().await.unwrap();
        assert_eq!(audit.orphaned.len(), 1);
        assert_eq!(Notice::from(&err).level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn test_physical_field_conflict_is_reported() {
        let f = fixture().await;
        f.records
            .add_physical_field("legacy", DataType::Text)
            .await
            .unwrap();
        let err = f
            .service
            .add_column(NewColumn::custom("legacy", "Legacy", DataType::Text))
            .await
            .unwrap_err();
        assert!(matches!(err, ColumnError::SchemaConflict { .. }));
        assert_eq!(f.columns.column_count(), 2);
    }

    #[tokio::test]
    async fn test_delete_system_column_forbidden() {
        let f = fixture().await;
        let status = f.service.registry().get("status").await.unwrap().unwrap();
        let err = f.service.delete_column(status.id).await.unwrap_err();
        assert!(matches!(err, ColumnError::Forbidden { .. }));
        assert!(f.records.has_physical_field("status"));
        assert_eq!(f.columns.column_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_physical_remove_is_partial_failure() {
        let f = fixture().await;
        let def = f
            .service
            .add_column(NewColumn::custom("risk_level", "Risk", DataType::Text))
            .await
            .unwrap();
        f.records
            .faults()
            .fail_next(StoreOp::RemoveField, StoreError::unavailable("maintenance"));

        let err = f.service.delete_column(def.id).await.unwrap_err();
        assert!(matches!(err, ColumnError::PartialFailure { .. }));
        assert!(f.service.registry().get("risk_level").await.unwrap().is_none());
        let audit = f.service.audit().await.unwrap();
        assert_eq!(
            audit.unregistered,
            vec![("risk_level".to_string(), DataType::Text)]
        );
    }

    #[tokio::test]
    async fn test_rename_and_visibility() {
        let f = fixture().await;
        let title = f.service.registry().get("title").await.unwrap().unwrap();

        let renamed = f.service.rename_column(title.id, "Initiative").await.unwrap();
        assert_eq!(renamed.display_name, "Initiative");
        assert!(matches!(
            f.service.rename_column(title.id, "").await,
            Err(ColumnError::InvalidName { .. })
        ));

        f.service.set_visibility(title.id, false).await.unwrap();
        let visible = f.service.list_visible_columns().await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].field_key, "status");
    }

    #[tokio::test]
    async fn test_reorder_is_idempotent() {
        let f = fixture().await;
        let risk = f
            .service
            .add_column(NewColumn::custom("risk_level", "Risk", DataType::Text))
            .await
            .unwrap();
        let status = f.service.registry().get("status").await.unwrap().unwrap();

        let first = f.service.reorder_columns(&[status.id]).await.unwrap();
        f.columns.log().clear();
        let second = f.service.reorder_columns(&[status.id]).await.unwrap();

        assert_eq!(first, second);
        assert!(f.columns.log().calls().is_empty());
        let keys: Vec<&str> = second.iter().map(|c| c.field_key.as_str()).collect();
        assert_eq!(keys, vec!["status", "title", "risk_level"]);
        assert_eq!(second[2].id, risk.id);
    }

    #[tokio::test]
    async fn test_delete_middle_column_keeps_orders_dense() {
        let f = fixture().await;
        let first = f
            .service
            .add_column(NewColumn::custom("risk_level", "Risk", DataType::Text))
            .await
            .unwrap();
        f.service
            .add_column(NewColumn::custom("budget", "Budget", DataType::Numeric))
            .await
            .unwrap();

        f.service.delete_column(first.id).await.unwrap();
        let columns = f.service.list_columns().await.unwrap();
        let orders: Vec<i32> = columns.iter().map(|c| c.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(columns[2].field_key, "budget");
    }
}
