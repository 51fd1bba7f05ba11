//! Shared test doubles for the tracker-sync workspace.
//!
//! - `InMemoryTracker`: a Jira-like project with a configurable workflow,
//!   failure injection and per-operation call counters
//! - `StaticSource` / `InMemoryStateStore`: source and state without I/O
//! - row builders and a sample configuration matching them

mod fakes;
mod fixtures;

pub use fakes::*;
pub use fixtures::*;
use std::sync::Arc;
use tracker_sync::config::SyncConfig;
use tracker_sync::source::Row;
use tracker_sync::sync::TrackerSyncService;

/// Tracker pre-registered with the sample configuration's issue types.
pub fn sample_tracker() -> InMemoryTracker {
    InMemoryTracker::new(PROJECT_KEY)
        .with_issue_type(EPIC_TYPE, "Epic")
        .with_issue_type(STORY_TYPE, "Story")
        .with_issue_type(SUBTASK_TYPE, "Sub-task")
}

/// Fakes wired into a service, kept reachable for assertions.
pub struct Harness {
    pub source: Arc<StaticSource>,
    pub tracker: Arc<InMemoryTracker>,
    pub store: Arc<InMemoryStateStore>,
    pub service: TrackerSyncService
}

impl Harness {
    pub fn new(config: SyncConfig, tracker: InMemoryTracker, rows: Vec<Row>) -> Self {
        let source = Arc::new(StaticSource::new(rows));
        let tracker = Arc::new(tracker);
        let store = Arc::new(InMemoryStateStore::new());
        let service = TrackerSyncService::new(
            config,
            source.clone(),
            tracker.clone(),
            store.clone()
        );
        Self {
            source,
            tracker,
            store,
            service
        }
    }

    pub fn sample(rows: Vec<Row>) -> Self {
        Self::new(sample_config(), sample_tracker(), rows)
    }

    /// Remote id bound to `key` in the last saved state.
    pub fn remote_id(&self, key: &str) -> Option<String> {
        self.store.state().remote_id(key).map(str::to_string)
    }
}
