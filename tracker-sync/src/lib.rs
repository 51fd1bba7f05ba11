//! Reconciles a spreadsheet of hierarchical work items onto a Jira project.
//!
//! The sheet is authoritative. Each run maps rows to records, detects which
//! changed since the last successful sync, creates or updates the matching
//! issues parent-first, and rolls child statuses up the hierarchy. The
//! identity mapping and fingerprints persist between runs in one state file.

pub mod assignee;
pub mod cascade;
pub mod changeset;
pub mod config;
pub mod drift;
pub mod error;
pub mod fingerprint;
pub mod jira;
pub mod model;
pub mod reconciler;
pub mod report;
pub mod resolver;
pub mod scheduler;
pub mod sheets;
pub mod snapshot;
pub mod source;
pub mod state;
pub mod state_store;
pub mod sync;
pub mod tracker;
pub mod transition;

pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use jira::JiraClient;
pub use model::{HierarchyLevel, RemoteEntity, SourceRecord};
pub use report::SyncReport;
pub use scheduler::SyncScheduler;
pub use sheets::SheetsClient;
pub use source::{JsonFileSource, SourceReader};
pub use state::PersistentState;
pub use state_store::{FileStateStore, StateStore};
pub use sync::TrackerSyncService;
pub use tracker::IssueTracker;
