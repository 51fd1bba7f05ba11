use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of one reconciliation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub snapshot_degraded: bool,
    pub created: u32,
    pub updated: u32,
    pub matched_existing: u32,
    pub unchanged: u32,
    pub stale_mappings_cleaned: u32,
    pub failed: u32,
    pub failed_no_parent: u32,
    pub transition_failures: u32,
    pub assignee_unresolved: u32,
    pub rows_rejected: u32,
    pub cascade_transitions: u32,
    pub cascade_failures: u32,
    pub errors: Vec<RecordError>
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordError {
    pub external_key: String,
    pub kind: String,
    pub error: String,
    pub timestamp: DateTime<Utc>
}

impl SyncReport {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            ..Default::default()
        }
    }

    pub fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn add_error(&mut self, external_key: &str, kind: &str, error: impl ToString) {
        self.errors.push(RecordError {
            external_key: external_key.to_string(),
            kind: kind.to_string(),
            error: error.to_string(),
            timestamp: Utc::now()
        });
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.completed_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_report() {
        let mut report = SyncReport::new();
        assert!(report.completed_at.is_none());
        assert!(!report.has_errors());

        report.add_error("E-1", "tracker_api", "400 bad request");
        report.complete();

        assert!(report.has_errors());
        assert!(report.duration_seconds().is_some());
        assert_eq!(report.errors[0].kind, "tracker_api");
    }

    #[test]
    fn test_report_serialization() {
        let mut report = SyncReport::new();
        report.created = 2;
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["created"], 2);
        assert_eq!(json["errors"], serde_json::json!([]));
    }
}
