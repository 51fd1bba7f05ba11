use chrono::{Duration, NaiveDate, Utc};
use std::sync::Arc;
use testing::{
    EPIC_TYPE, Harness, InMemoryTracker, RowBuilder, StaticSource, epic, sample_config,
    sample_tracker, story, subtask
};
use tracker_sync::state_store::{FileStateStore, StateStore};
use tracker_sync::{SyncError, TrackerSyncService};

#[tokio::test]
async fn test_dry_run_plans_without_mutating() {
    let mut config = sample_config();
    config.dry_run = true;
    let harness = Harness::new(
        config,
        sample_tracker(),
        vec![
            epic("E-1", "Launch site").build(),
            story("S-1", "Landing page", "E-1").status("Done").build(),
        ]
    );

    let report = harness.service.run().await.unwrap();

    assert!(report.dry_run);
    assert_eq!(report.created, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(harness.tracker.calls().mutations(), 0);
    assert!(harness.tracker.issues().is_empty());
    assert_eq!(harness.store.saves(), 0);
}

#[tokio::test]
async fn test_snapshot_outage_does_not_duplicate() {
    // GIVEN a synced epic
    let harness = Harness::sample(vec![epic("E-1", "Launch site").build()]);
    harness.service.run().await.unwrap();
    let original = harness.remote_id("E-1").unwrap();

    // WHEN the bulk query fails on the next run
    harness.tracker.fail_snapshot(true);
    harness.tracker.reset_calls();
    let report = harness.service.run().await.unwrap();

    // THEN the mapping is rebuilt through the live query, not by creating
    assert!(report.snapshot_degraded);
    assert_eq!(report.stale_mappings_cleaned, 1);
    assert_eq!(report.matched_existing, 1);
    assert_eq!(report.created, 0);
    assert_eq!(harness.tracker.calls().create, 0);
    assert_eq!(harness.remote_id("E-1"), Some(original));
}

#[tokio::test]
async fn test_failed_point_query_fails_record_instead_of_creating() {
    let harness = Harness::sample(vec![epic("E-1", "Launch site").build()]);
    harness.tracker.fail_snapshot(true);
    harness.tracker.fail_point_query(true);

    let report = harness.service.run().await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.created, 0);
    assert_eq!(harness.tracker.calls().create, 0);
}

#[tokio::test]
async fn test_unsearchable_title_is_created_without_live_query() {
    // GIVEN a record whose title has no words a text search can carry
    let harness = Harness::sample(vec![epic("E-1", "(?)").build()]);

    // WHEN it is synced twice
    let first = harness.service.run().await.unwrap();
    let second = harness.service.run().await.unwrap();

    // THEN it is created once and never fails on an empty search phrase
    assert_eq!(first.created, 1);
    assert_eq!(first.failed, 0);
    assert_eq!(second.created, 0);
    assert_eq!(second.failed, 0);
    assert_eq!(harness.tracker.issues_titled("(?)").len(), 1);
}

#[tokio::test]
async fn test_live_query_matches_on_words_not_punctuation() {
    // GIVEN an existing issue the bulk query does not return
    let tracker = sample_tracker();
    let existing = tracker.insert_issue("Phase 2: go-live", EPIC_TYPE, None, "To Do");
    tracker.hide_from_snapshot(&existing);
    let rows = vec![epic("E-1", "phase 2: GO-LIVE").build()];
    let harness = Harness::new(sample_config(), tracker, rows);

    let report = harness.service.run().await.unwrap();

    assert_eq!(report.matched_existing, 1);
    assert_eq!(report.created, 0);
    assert_eq!(harness.remote_id("E-1"), Some(existing));
}

#[tokio::test]
async fn test_blank_source_aborts_run() {
    let harness = Harness::sample(Vec::new());

    let err = harness.service.run().await.unwrap_err();

    assert!(matches!(err, SyncError::SourceError(_)));
    assert_eq!(harness.store.saves(), 0);
}

#[tokio::test]
async fn test_unreadable_source_aborts_run() {
    let harness = Harness::sample(vec![epic("E-1", "Launch site").build()]);
    harness.source.fail(true);

    assert!(harness.service.run().await.is_err());
    assert_eq!(harness.tracker.calls().search, 0);
}

#[tokio::test]
async fn test_missing_workflow_path_withholds_fingerprint() {
    // GIVEN a workflow that cannot jump from To Do straight to Done
    let tracker = sample_tracker().with_workflow(&[("To Do", "In Progress"), ("In Progress", "Done")]);
    let harness = Harness::new(
        sample_config(),
        tracker,
        vec![epic("E-1", "Launch site").status("Done").build()]
    );

    // WHEN syncing
    let report = harness.service.run().await.unwrap();

    // THEN the epic exists but the record is not marked synced
    assert_eq!(report.created, 1);
    assert_eq!(report.transition_failures, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors[0].kind, "transition_rejected");
    let state = harness.store.state();
    assert!(state.remote_id("E-1").is_some());
    assert!(!state.fingerprints.contains_key("E-1"));

    // AND the next run updates rather than recreates
    harness.tracker.reset_calls();
    let retry = harness.service.run().await.unwrap();
    assert_eq!(retry.created, 0);
    assert_eq!(retry.updated, 1);
    assert_eq!(harness.tracker.calls().create, 0);
}

#[tokio::test]
async fn test_unrecognized_status_is_rejected_without_probe() {
    let harness = Harness::sample(vec![epic("E-1", "Launch site").status("Shipped").build()]);

    let report = harness.service.run().await.unwrap();

    assert_eq!(report.transition_failures, 1);
    assert_eq!(harness.tracker.calls().list_transitions, 0);
    assert_eq!(harness.tracker.calls().transition, 0);
}

#[tokio::test]
async fn test_failed_transition_call_counts_as_transition_failure() {
    let harness = Harness::sample(vec![epic("E-1", "Launch site").status("In Progress").build()]);
    harness.tracker.fail_transitions_for("RM-1");

    let report = harness.service.run().await.unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.transition_failures, 1);
    assert!(!harness.store.state().fingerprints.contains_key("E-1"));
}

#[tokio::test]
async fn test_assignee_is_resolved_once_and_cached() {
    let harness = Harness::new(
        sample_config(),
        sample_tracker().with_user("Ana@Example.com", "acc-ana"),
        vec![
            epic("E-1", "Launch site").assignee("ana@example.com").build(),
            epic("E-2", "Pricing").assignee("ANA@example.com").build(),
        ]
    );

    harness.service.run().await.unwrap();

    assert_eq!(harness.tracker.calls().user_search, 1);
    let epic_id = harness.remote_id("E-1").unwrap();
    let stored = harness.tracker.issue(&epic_id).unwrap();
    assert_eq!(stored.assignee_account_id.as_deref(), Some("acc-ana"));
    assert_eq!(
        harness.store.state().cached_account("ana@example.com"),
        Some("acc-ana")
    );
}

#[tokio::test]
async fn test_unknown_assignee_does_not_fail_record() {
    let harness = Harness::sample(vec![epic("E-1", "Launch site").assignee("ghost@example.com").build()]);

    let report = harness.service.run().await.unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(report.assignee_unresolved, 1);
    let epic_id = harness.remote_id("E-1").unwrap();
    assert_eq!(harness.tracker.issue(&epic_id).unwrap().assignee_account_id, None);
    assert!(harness.store.state().fingerprints.contains_key("E-1"));
}

#[tokio::test]
async fn test_create_fills_due_date_and_metric_defaults() {
    let harness = Harness::sample(vec![
        epic("E-1", "Launch site").due("not a date").build(),
        story("S-1", "Landing page", "E-1").due("5/3/2025").build(),
    ]);

    harness.service.run().await.unwrap();

    let epic = harness
        .tracker
        .issue(&harness.remote_id("E-1").unwrap())
        .unwrap();
    let expected_default = Utc::now().date_naive() + Duration::days(14);
    assert_eq!(epic.due_date, Some(expected_default));
    assert_eq!(epic.custom_fields["customfield_100"], serde_json::json!("TBD"));

    let story = harness
        .tracker
        .issue(&harness.remote_id("S-1").unwrap())
        .unwrap();
    assert_eq!(story.due_date, NaiveDate::from_ymd_opt(2025, 3, 5));
    assert!(story.custom_fields.is_empty());
}

#[tokio::test]
async fn test_parent_on_wrong_level_is_rejected() {
    let harness = Harness::sample(vec![
        epic("E-1", "Launch site").build(),
        subtask("T-1", "Write copy", "E-1").build(),
    ]);

    let report = harness.service.run().await.unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.failed_no_parent, 1);
    assert_eq!(report.errors[0].kind, "parent_level_mismatch");
    assert!(harness.tracker.issues_titled("Write copy").is_empty());
}

#[tokio::test]
async fn test_rejected_rows_are_counted_and_keyless_rows_ignored() {
    let harness = Harness::sample(vec![
        epic("E-1", "Launch site").build(),
        RowBuilder::new("B-1", "Bug", "Crash on login").build(),
        RowBuilder::new("", "Epic", "Unmanaged idea").build(),
    ]);

    let report = harness.service.run().await.unwrap();

    assert_eq!(report.rows_rejected, 1);
    assert_eq!(report.created, 1);
    assert!(harness.tracker.issues_titled("Unmanaged idea").is_empty());
}

#[tokio::test]
async fn test_state_file_round_trip_across_processes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("state.json");
    let tracker = Arc::new(sample_tracker());
    let rows = vec![epic("E-1", "Launch site").build()];

    let service = |rows: Vec<tracker_sync::source::Row>| {
        TrackerSyncService::new(
            sample_config(),
            Arc::new(StaticSource::new(rows)),
            tracker.clone(),
            Arc::new(FileStateStore::new(&path))
        )
    };

    let first = service(rows.clone()).run().await.unwrap();
    assert_eq!(first.created, 1);

    let saved = FileStateStore::new(&path).load().await;
    assert_eq!(saved.remote_id("E-1"), Some("RM-1"));
    assert!(saved.last_run_at.is_some());

    let second = service(rows).run().await.unwrap();
    assert_eq!(second.unchanged, 1);
    assert_eq!(tracker.issues().len(), 1);
}

#[tokio::test]
async fn test_custom_tracker_project_key() {
    let mut config = sample_config();
    config.tracker.project_key = "OPS".to_string();
    let harness = Harness::new(
        config,
        InMemoryTracker::new("OPS"),
        vec![epic("E-1", "Launch site").build()]
    );

    harness.service.run().await.unwrap();

    assert_eq!(harness.remote_id("E-1").as_deref(), Some("OPS-1"));
}
