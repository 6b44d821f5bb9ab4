//! Schema Mutation Gateway
//!
//! The only path to the privileged procedures that change the physical
//! record structure. It is not transactional with the registry; callers
//! sequence and compensate.

use std::sync::Arc;
use tracing::info;
use waypoint_core::{
    is_reserved_key, ColumnError, ColumnResult, DataType, StoreError, StoreErrorKind,
};
use waypoint_storage::SchemaProcedures;

pub struct SchemaGateway {
    procedures: Arc<dyn SchemaProcedures>,
}

impl std::fmt::Debug for SchemaGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaGateway").finish_non_exhaustive()
    }
}

impl SchemaGateway {
    pub fn new(procedures: Arc<dyn SchemaProcedures>) -> Self {
        Self { procedures }
    }

    /// Add a field to the records table.
    ///
    /// # Errors
    /// `SchemaConflict` if the field already exists physically or names a
    /// system-managed attribute.
    pub async fn add_physical_field(&self, field_key: &str, data_type: DataType) -> ColumnResult<()> {
        if is_reserved_key(field_key) {
            return Err(ColumnError::SchemaConflict {
                field_key: field_key.to_string(),
                reason: "name is reserved for a system-managed attribute".to_string(),
            });
        }

        self.procedures
            .add_physical_field(field_key, data_type)
            .await
            .map_err(|e| match e.kind {
                StoreErrorKind::AlreadyExists | StoreErrorKind::UniqueViolation => {
                    ColumnError::SchemaConflict {
                        field_key: field_key.to_string(),
                        reason: e.message,
                    }
                }
                _ => ColumnError::Store(e),
            })?;

        info!(field_key = %field_key, data_type = %data_type, "Physical field added");
        Ok(())
    }

    /// Remove a field and all of its data from the records table.
    ///
    /// # Errors
    /// `NotFound` if the field is not physically present.
    pub async fn remove_physical_field(&self, field_key: &str) -> ColumnResult<()> {
        self.procedures
            .remove_physical_field(field_key)
            .await
            .map_err(|e: StoreError| match e.kind {
                StoreErrorKind::NotFound => {
                    ColumnError::not_found(format!("physical field '{}'", field_key))
                }
                _ => ColumnError::Store(e),
            })?;

        info!(field_key = %field_key, "Physical field removed");
        Ok(())
    }

    /// Fields currently present in the records table.
    pub async fn physical_fields(&self) -> ColumnResult<Vec<(String, DataType)>> {
        Ok(self.procedures.physical_fields().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypoint_storage::{InMemoryRecordStore, StoreOp};

    fn gateway() -> (Arc<InMemoryRecordStore>, SchemaGateway) {
        let store = Arc::new(InMemoryRecordStore::with_fields([("title", DataType::Text)]));
        (store.clone(), SchemaGateway::new(store))
    }

    #[tokio::test]
    async fn test_add_existing_field_conflicts() {
        let (_, gateway) = gateway();
        let err = gateway
            .add_physical_field("title", DataType::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, ColumnError::SchemaConflict { .. }));
    }

    #[tokio::test]
    async fn test_add_reserved_field_conflicts_without_store_call() {
        let (store, gateway) = gateway();
        let err = gateway
            .add_physical_field("priority_rank", DataType::Integer)
            .await
            .unwrap_err();
        assert!(matches!(err, ColumnError::SchemaConflict { .. }));
        assert!(store.log().calls().is_empty());
    }

    #[tokio::test]
    async fn test_remove_absent_field_not_found() {
        let (_, gateway) = gateway();
        let err = gateway.remove_physical_field("risk_level").await.unwrap_err();
        assert!(matches!(err, ColumnError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_add_then_remove() {
        let (store, gateway) = gateway();
        gateway
            .add_physical_field("risk_level", DataType::Text)
            .await
            .unwrap();
        assert!(store.has_physical_field("risk_level"));
        gateway.remove_physical_field("risk_level").await.unwrap();
        assert_eq!(
            gateway.physical_fields().await.unwrap(),
            vec![("title".to_string(), DataType::Text)]
        );
    }

    #[tokio::test]
    async fn test_unavailable_store_is_store_error() {
        let (store, gateway) = gateway();
        store
            .faults()
            .fail_next(StoreOp::AddField, StoreError::unavailable("maintenance"));
        let err = gateway
            .add_physical_field("risk_level", DataType::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, ColumnError::Store(_)));
    }
}
