//! Batched edit coordinator behavior under a paused clock.

use std::sync::Arc;
use std::time::Duration;
use waypoint_core::{FieldValue, RecordId, StoreError, PRIORITY_RANK_KEY};
use waypoint_events::{EditBus, EditEvent};
use waypoint_records::BatchedEditCoordinator;
use waypoint_storage::{InMemoryRecordStore, StoreOp};
use waypoint_test_utils::assertions::{assert_ranks_dense, assert_update_count};
use waypoint_test_utils::fixtures;
use waypoint_test_utils::harness::{loaded_coordinator, seeded_record_store};
use waypoint_test_utils::{init_tracing, StatusPolicy};

const ROW: RecordId = RecordId(42);

async fn settle() {
    tokio::time::sleep(Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_two_fields_within_window_make_one_update() {
    init_tracing();
    let store = seeded_record_store();
    let coordinator = loaded_coordinator(&store).await.unwrap();

    coordinator.record_edit(ROW, "a", "alpha".into(), false).await.unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    coordinator.record_edit(ROW, "b", "beta".into(), false).await.unwrap();
    assert_update_count(&store, 0);

    settle().await;
    assert_update_count(&store, 1);
    let (id, patch) = &store.log().updates()[0];
    assert_eq!(*id, ROW);
    assert_eq!(patch.get("a"), Some(&FieldValue::from("alpha")));
    assert_eq!(patch.get("b"), Some(&FieldValue::from("beta")));
    assert!(coordinator.saving().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_many_edits_coalesce_into_one_flush() {
    let store = seeded_record_store();
    let coordinator = loaded_coordinator(&store).await.unwrap();

    let fields = ["title", "owner", "a", "b"];
    for (i, field) in fields.iter().enumerate() {
        coordinator
            .record_edit(ROW, field, format!("v{}", i).into(), false)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(coordinator.saving().len(), fields.len());

    settle().await;
    assert_update_count(&store, 1);
    assert_eq!(store.log().updates()[0].1.len(), fields.len());
    assert!(coordinator.saving().is_empty());
    assert!(coordinator.pending_rows().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_debounce_restarts_on_each_edit() {
    let store = seeded_record_store();
    let coordinator = loaded_coordinator(&store).await.unwrap();

    coordinator.record_edit(ROW, "a", "1".into(), false).await.unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;
    coordinator.record_edit(ROW, "a", "2".into(), false).await.unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_update_count(&store, 0);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_update_count(&store, 1);
    assert_eq!(store.row(ROW).unwrap().text("a"), Some("2"));
}

#[tokio::test(start_paused = true)]
async fn test_separate_rows_flush_separately() {
    let store = seeded_record_store();
    let coordinator = loaded_coordinator(&store).await.unwrap();

    coordinator.record_edit(RecordId(41), "a", "x".into(), false).await.unwrap();
    coordinator.record_edit(RecordId(42), "a", "y".into(), false).await.unwrap();
    settle().await;

    let mut rows: Vec<RecordId> = store.log().updates().into_iter().map(|(id, _)| id).collect();
    rows.sort();
    assert_eq!(rows, vec![RecordId(41), RecordId(42)]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_flush_reverts_every_field() {
    let store = seeded_record_store();
    let events = EditBus::default();
    let coordinator = BatchedEditCoordinator::builder(store.clone())
        .events(events.clone())
        .build();
    coordinator.refresh().await.unwrap();
    let mut sub = events.subscribe();

    let before = coordinator.record(ROW).unwrap();
    store
        .faults()
        .fail_next(StoreOp::Update, StoreError::unavailable("connection reset"));

    coordinator
        .record_edit(ROW, "title", "Mobile GA".into(), false)
        .await
        .unwrap();
    coordinator
        .record_edit(ROW, "owner", "dana".into(), false)
        .await
        .unwrap();
    let err = coordinator
        .record_edit(ROW, "status", "Completed".into(), true)
        .await
        .unwrap_err();

    assert!(matches!(err, waypoint_core::EditError::FlushFailed { row_id, .. } if row_id == ROW));
    assert_eq!(coordinator.record(ROW).unwrap(), before);
    assert!(coordinator.saving().is_empty());

    let kinds: Vec<&'static str> = std::iter::from_fn(|| sub.try_recv())
        .map(|e| match e {
            EditEvent::Saving { .. } => "saving",
            EditEvent::Saved { .. } => "saved",
            EditEvent::RolledBack { .. } => "rolled_back",
        })
        .collect();
    assert_eq!(kinds, vec!["saving", "rolled_back"]);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_status_clears_rank_in_same_flush() {
    let store = seeded_record_store();
    let coordinator = loaded_coordinator(&store).await.unwrap();

    coordinator
        .record_edit(ROW, "status", "Completed".into(), false)
        .await
        .unwrap();
    assert_eq!(coordinator.record(ROW).unwrap().priority_rank, None);

    settle().await;
    assert_update_count(&store, 1);
    let (_, patch) = &store.log().updates()[0];
    assert_eq!(patch.get("status"), Some(&FieldValue::from("Completed")));
    assert_eq!(patch.get(PRIORITY_RANK_KEY), Some(&FieldValue::Null));
    assert_eq!(store.row(ROW).unwrap().priority_rank, None);
}

#[tokio::test(start_paused = true)]
async fn test_rank_maintenance_after_completion() {
    let store = seeded_record_store();
    let coordinator = BatchedEditCoordinator::builder(store.clone())
        .rank_maintenance(true)
        .build();
    coordinator.refresh().await.unwrap();

    coordinator
        .record_edit(RecordId(40), "status", "Completed".into(), true)
        .await
        .unwrap();

    assert_ranks_dense(&store.rows(), &StatusPolicy::default());
    assert_ranks_dense(&coordinator.records(), &StatusPolicy::default());
    assert_eq!(coordinator.record(RecordId(41)).unwrap().priority_rank, Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_exit_batch_mode_flushes_everything() {
    let store = seeded_record_store();
    let coordinator = loaded_coordinator(&store).await.unwrap();

    coordinator.record_edit(RecordId(40), "a", "x".into(), false).await.unwrap();
    coordinator.record_edit(RecordId(41), "a", "y".into(), false).await.unwrap();
    coordinator.record_edit(RecordId(42), "b", "z".into(), false).await.unwrap();
    assert_eq!(coordinator.pending_rows().len(), 3);

    let report = coordinator.exit_batch_mode().await;
    assert!(report.is_success());
    assert_eq!(report.saved.len(), 3);
    assert!(coordinator.pending_rows().is_empty());
    assert!(coordinator.saving().is_empty());
    assert_update_count(&store, 3);

    // Outside batch mode every edit is written at once.
    coordinator.record_edit(RecordId(40), "b", "w".into(), false).await.unwrap();
    assert_update_count(&store, 4);

    // The cancelled timers never fire.
    settle().await;
    assert_update_count(&store, 4);
}

#[tokio::test(start_paused = true)]
async fn test_exit_batch_mode_reports_failures() {
    let store = seeded_record_store();
    let coordinator = loaded_coordinator(&store).await.unwrap();

    coordinator.record_edit(RecordId(40), "a", "x".into(), false).await.unwrap();
    coordinator.record_edit(RecordId(41), "a", "y".into(), false).await.unwrap();
    store
        .faults()
        .fail_always(StoreOp::Update, StoreError::unavailable("offline"));

    let report = coordinator.exit_batch_mode().await;
    assert_eq!(report.failed.len(), 2);
    assert!(coordinator.pending_rows().is_empty());
    assert_eq!(coordinator.record(RecordId(40)).unwrap().get("a"), FieldValue::Null);
}

fn slow_store() -> Arc<InMemoryRecordStore> {
    let store = InMemoryRecordStore::with_fields(fixtures::system_fields())
        .with_latency(Duration::from_millis(100));
    store.seed(fixtures::sample_backlog());
    Arc::new(store)
}

fn spawn_immediate(
    coordinator: &BatchedEditCoordinator,
    field_key: &'static str,
    value: &'static str,
) -> tokio::task::JoinHandle<waypoint_core::EditResult<()>> {
    let coordinator = coordinator.clone();
    tokio::spawn(async move {
        coordinator
            .record_edit(ROW, field_key, value.into(), true)
            .await
    })
}

#[tokio::test(start_paused = true)]
async fn test_leaving_terminal_status_in_same_batch_keeps_rank() {
    let store = seeded_record_store();
    let coordinator = loaded_coordinator(&store).await.unwrap();

    coordinator
        .record_edit(ROW, "status", "Completed".into(), false)
        .await
        .unwrap();
    assert_eq!(coordinator.record(ROW).unwrap().priority_rank, None);
    coordinator
        .record_edit(ROW, "status", "Planned".into(), false)
        .await
        .unwrap();
    assert_eq!(coordinator.record(ROW).unwrap().priority_rank, Some(3));
    assert!(!coordinator.is_saving(ROW, PRIORITY_RANK_KEY));

    settle().await;
    assert_update_count(&store, 1);
    let (_, patch) = &store.log().updates()[0];
    assert_eq!(patch.get("status"), Some(&FieldValue::from("Planned")));
    assert!(!patch.contains(PRIORITY_RANK_KEY));
    assert_eq!(store.row(ROW).unwrap().priority_rank, Some(3));
    assert!(coordinator.saving().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_saved_flush_keeps_values_of_overlapping_flush() {
    let store = slow_store();
    let coordinator = loaded_coordinator(&store).await.unwrap();

    let title = spawn_immediate(&coordinator, "title", "Mobile GA");
    tokio::time::sleep(Duration::from_millis(20)).await;
    let owner = spawn_immediate(&coordinator, "owner", "sam");

    // The title write has settled; the owner write is still out.
    tokio::time::sleep(Duration::from_millis(90)).await;
    let row = coordinator.record(ROW).unwrap();
    assert_eq!(row.text("title"), Some("Mobile GA"));
    assert_eq!(row.text("owner"), Some("sam"));
    assert!(coordinator.is_saving(ROW, "owner"));
    assert!(!coordinator.is_saving(ROW, "title"));

    title.await.unwrap().unwrap();
    owner.await.unwrap().unwrap();
    assert_eq!(store.row(ROW).unwrap().text("owner"), Some("sam"));
    assert_eq!(coordinator.record(ROW).unwrap().text("owner"), Some("sam"));
    assert!(coordinator.saving().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_flush_leaves_field_taken_over_by_later_flush() {
    let store = slow_store();
    let coordinator = loaded_coordinator(&store).await.unwrap();
    store
        .faults()
        .fail_next(StoreOp::Update, StoreError::unavailable("connection reset"));

    let first = spawn_immediate(&coordinator, "title", "draft");
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = spawn_immediate(&coordinator, "title", "final");

    tokio::time::sleep(Duration::from_millis(90)).await;
    assert_eq!(coordinator.record(ROW).unwrap().text("title"), Some("final"));
    assert!(coordinator.is_saving(ROW, "title"));

    assert!(first.await.unwrap().is_err());
    second.await.unwrap().unwrap();
    assert_eq!(store.row(ROW).unwrap().text("title"), Some("final"));
    assert_eq!(coordinator.record(ROW).unwrap().text("title"), Some("final"));
    assert!(coordinator.saving().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_edits_while_flush_in_flight_are_kept() {
    let store = slow_store();
    let coordinator = loaded_coordinator(&store).await.unwrap();

    let flushing = spawn_immediate(&coordinator, "title", "first");
    tokio::time::sleep(Duration::from_millis(20)).await;
    coordinator
        .record_edit(ROW, "owner", "sam".into(), false)
        .await
        .unwrap();

    flushing.await.unwrap().unwrap();
    let row = coordinator.record(ROW).unwrap();
    assert_eq!(row.text("title"), Some("first"));
    assert_eq!(row.text("owner"), Some("sam"));
    assert!(coordinator.is_saving(ROW, "owner"));
    assert!(!coordinator.is_saving(ROW, "title"));

    settle().await;
    assert_eq!(store.row(ROW).unwrap().text("owner"), Some("sam"));
    assert!(coordinator.saving().is_empty());
}
