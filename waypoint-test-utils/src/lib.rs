//! Waypoint Test Utilities
//!
//! Shared test infrastructure for the Waypoint workspace:
//! - Proptest generators for field keys, values and records
//! - Fixtures for the built-in roadmap columns and sample backlogs
//! - Harnesses wiring the in-memory stores to the services
//! - Assertions for column and edit outcomes

use std::sync::{Arc, Once};

pub use waypoint_core::{
    ColumnDefinition, ColumnError, ColumnResult, DataType, EditError, EditResult, FieldValue,
    NewColumn, NewRecord, Record, RecordId, RecordPatch, StatusPolicy, StoreError, StoreErrorKind,
};
pub use waypoint_storage::{InMemoryColumnStore, InMemoryRecordStore, StoreCall, StoreOp};

static TRACING: Once = Once::new();

/// Install an env-filtered tracing subscriber for test output.
///
/// Safe to call from every test; only the first call installs it. Set
/// `RUST_LOG` to see coordinator and registry logs.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Waypoint types.

    use super::*;
    use proptest::prelude::*;

    /// Generate a field key matching the allowed pattern.
    ///
    /// Reserved record attribute names are excluded.
    pub fn arb_field_key() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,20}"
            .prop_filter("reserved attribute", |k| !waypoint_core::is_reserved_key(k))
    }

    /// Generate a string that is not a valid field key.
    pub fn arb_invalid_field_key() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            "[0-9_][a-z0-9_]{0,10}",
            "[A-Z][a-zA-Z0-9]{0,10}",
            "[a-z]{1,5}[ \\-.][a-z]{1,5}",
        ]
    }

    /// Generate a non-blank display name.
    pub fn arb_display_name() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9 ]{0,24}"
    }

    pub fn arb_data_type() -> impl Strategy<Value = DataType> {
        prop::sample::select(DataType::ALL.to_vec())
    }

    /// Generate a value that fits `data_type`, possibly null.
    pub fn arb_value_for(data_type: DataType) -> BoxedStrategy<FieldValue> {
        let value = match data_type {
            DataType::Text => "[A-Za-z ]{0,16}".prop_map(FieldValue::Text).boxed(),
            DataType::Integer => any::<i64>().prop_map(FieldValue::Integer).boxed(),
            DataType::Numeric => (-1.0e6f64..1.0e6).prop_map(FieldValue::Numeric).boxed(),
            DataType::Date => (0u32..3650)
                .prop_map(|days| {
                    let start = chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default();
                    FieldValue::Date(start + chrono::Days::new(u64::from(days)))
                })
                .boxed(),
            DataType::Boolean => any::<bool>().prop_map(FieldValue::Boolean).boxed(),
        };
        prop_oneof![1 => Just(FieldValue::Null), 9 => value].boxed()
    }

    pub fn arb_status() -> impl Strategy<Value = String> {
        prop::sample::select(fixtures::STATUSES.to_vec()).prop_map(str::to_string)
    }

    /// Generate a backlog of `1..max` records with distinct ids, arbitrary
    /// statuses and arbitrary (possibly missing or duplicated) ranks.
    pub fn arb_backlog(max: usize) -> impl Strategy<Value = Vec<Record>> {
        prop::collection::vec(
            (arb_status(), prop::option::of(1i64..20), 0i64..50),
            1..max,
        )
        .prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (status, rank, sort_order))| {
                    Record::new(i as i64 + 1, sort_order)
                        .with_field("status", status)
                        .with_priority_rank(rank)
                })
                .collect()
        })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Built-in columns and sample records.

    use super::*;

    /// Lifecycle statuses used by the sample roadmap.
    pub const STATUSES: [&str; 4] = ["Planned", "In Progress", "Blocked", "Completed"];

    /// The columns every roadmap starts with.
    pub fn system_columns() -> Vec<NewColumn> {
        vec![
            NewColumn::system("title", "Title", DataType::Text).with_required(true),
            NewColumn::system("status", "Status", DataType::Text),
            NewColumn::system("owner", "Owner", DataType::Text),
            NewColumn::system("start_date", "Start", DataType::Date),
            NewColumn::system("end_date", "End", DataType::Date),
        ]
    }

    /// Physical fields backing [`system_columns`].
    pub fn system_fields() -> Vec<(String, DataType)> {
        system_columns()
            .into_iter()
            .map(|c| (c.field_key, c.data_type))
            .collect()
    }

    /// One record with a title and status at the given backlog position.
    pub fn roadmap_item(id: i64, sort_order: i64, title: &str, status: &str) -> Record {
        Record::new(id, sort_order)
            .with_field("title", title)
            .with_field("status", status)
    }

    /// Small backlog with dense ranks on the open items.
    pub fn sample_backlog() -> Vec<Record> {
        vec![
            roadmap_item(40, 0, "Billing revamp", "In Progress").with_priority_rank(Some(1)),
            roadmap_item(41, 1, "SSO", "Planned").with_priority_rank(Some(2)),
            roadmap_item(42, 2, "Mobile beta", "Planned").with_priority_rank(Some(3)),
            roadmap_item(43, 3, "Audit log", "Completed"),
        ]
    }
}

// ============================================================================
// HARNESSES
// ============================================================================

pub mod harness {
    //! In-memory stores wired to the column service and edit coordinator.

    use super::*;
    use waypoint_events::ColumnBus;
    use waypoint_records::BatchedEditCoordinator;
    use waypoint_schema::{ColumnMutationService, ColumnRegistry, SchemaGateway};

    /// Column service over in-memory stores seeded with the system columns.
    pub struct SchemaHarness {
        pub columns: Arc<InMemoryColumnStore>,
        pub records: Arc<InMemoryRecordStore>,
        pub registry: Arc<ColumnRegistry>,
        pub service: ColumnMutationService,
    }

    impl SchemaHarness {
        pub async fn new() -> ColumnResult<Self> {
            let columns = Arc::new(InMemoryColumnStore::new());
            let records = Arc::new(InMemoryRecordStore::with_fields(fixtures::system_fields()));
            let registry = Arc::new(ColumnRegistry::new(columns.clone(), ColumnBus::default()));
            for column in fixtures::system_columns() {
                registry.create(column).await?;
            }
            let service =
                ColumnMutationService::new(registry.clone(), SchemaGateway::new(records.clone()));
            Ok(Self {
                columns,
                records,
                registry,
                service,
            })
        }

        /// Field keys in display order.
        pub async fn field_keys(&self) -> ColumnResult<Vec<String>> {
            Ok(self
                .service
                .list_columns()
                .await?
                .into_iter()
                .map(|c| c.field_key)
                .collect())
        }
    }

    /// Record store seeded with the sample backlog.
    pub fn seeded_record_store() -> Arc<InMemoryRecordStore> {
        let mut fields = fixtures::system_fields();
        fields.push(("a".to_string(), DataType::Text));
        fields.push(("b".to_string(), DataType::Text));
        let store = InMemoryRecordStore::with_fields(fields);
        store.seed(fixtures::sample_backlog());
        Arc::new(store)
    }

    /// Coordinator over `store`, loaded from it.
    pub async fn loaded_coordinator(
        store: &Arc<InMemoryRecordStore>,
    ) -> EditResult<BatchedEditCoordinator> {
        let coordinator = BatchedEditCoordinator::new(store.clone());
        coordinator.refresh().await?;
        Ok(coordinator)
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Waypoint outcomes.

    use super::*;

    /// Assert that the registry and record store agree.
    pub fn assert_schema_consistent(audit: &waypoint_schema::SchemaAudit) {
        assert!(
            audit.is_consistent(),
            "Registry and physical schema disagree: {:?}",
            audit
        );
    }

    /// Assert exactly `expected` update calls were made.
    pub fn assert_update_count(store: &InMemoryRecordStore, expected: usize) {
        let updates = store.log().updates();
        assert_eq!(
            updates.len(),
            expected,
            "Expected {} update calls, got {:?}",
            expected,
            updates
        );
    }

    /// Assert the open records carry ranks 1..N and terminal ones carry none.
    pub fn assert_ranks_dense(records: &[Record], policy: &StatusPolicy) {
        let mut ranks: Vec<i64> = records
            .iter()
            .filter(|r| !policy.is_terminal(r))
            .map(|r| r.priority_rank.unwrap_or(0))
            .collect();
        ranks.sort_unstable();
        let expected: Vec<i64> = (1..=ranks.len() as i64).collect();
        assert_eq!(ranks, expected, "Ranks are not dense");
        for record in records.iter().filter(|r| policy.is_terminal(r)) {
            assert_eq!(
                record.priority_rank, None,
                "Terminal record {} still ranked",
                record.id
            );
        }
    }
}
