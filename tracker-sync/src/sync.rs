use crate::cascade::cascade_statuses;
use crate::changeset::select_changes;
use crate::config::SyncConfig;
use crate::drift::clean_stale_mappings;
use crate::error::{SyncError, SyncResult};
use crate::model::HierarchyLevel;
use crate::reconciler::Reconciler;
use crate::report::SyncReport;
use crate::snapshot::fetch_snapshot;
use crate::source::{SourceReader, parse_rows};
use crate::state::STATE_VERSION;
use crate::state_store::StateStore;
use crate::tracker::IssueTracker;
use chrono::Utc;
use metrics::{counter, histogram};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// One reconciliation of the source sheet onto the tracker project.
pub struct TrackerSyncService {
    config: SyncConfig,
    source: Arc<dyn SourceReader>,
    tracker: Arc<dyn IssueTracker>,
    store: Arc<dyn StateStore>
}

impl TrackerSyncService {
    pub fn new(
        config: SyncConfig,
        source: Arc<dyn SourceReader>,
        tracker: Arc<dyn IssueTracker>,
        store: Arc<dyn StateStore>
    ) -> Self {
        Self {
            config,
            source,
            tracker,
            store
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Source rows, then snapshot, drift cleanup, change selection,
    /// reconciliation, cascade and finally one state save.
    ///
    /// Only an unreadable or blank source and a failed state save abort the
    /// run; everything else is counted in the report. Dry runs skip every
    /// mutation, the cascade and the save.
    #[instrument(skip(self), fields(project = %self.config.tracker.project_key, dry_run = self.config.dry_run))]
    pub async fn run(&self) -> SyncResult<SyncReport> {
        let mut report = SyncReport::new();
        report.dry_run = self.config.dry_run;
        info!("Starting tracker sync");

        let rows = self.source.fetch_rows(self.config.source.sheet()).await?;
        if rows.is_empty() {
            return Err(SyncError::SourceError("source returned no rows".to_string()));
        }
        let parsed = parse_rows(&rows, &self.config);
        report.rows_rejected = parsed.rejected.len() as u32;
        for rejected in &parsed.rejected {
            report.add_error(
                &rejected.external_key,
                "rejected_row",
                format!("row {}: {}", rejected.row_number, rejected.reason)
            );
        }
        info!(
            records = parsed.records.len(),
            rejected = parsed.rejected.len(),
            "Read source rows"
        );

        let mut state = self.store.load().await;
        let snapshot = fetch_snapshot(
            self.tracker.as_ref(),
            &self.config.tracker.project_key,
            self.config.snapshot_limit
        )
        .await;
        report.snapshot_degraded = snapshot.is_degraded();

        report.stale_mappings_cleaned = clean_stale_mappings(&mut state, &snapshot) as u32;

        let changes = select_changes(&parsed.records, &state, &self.config.metric_fields);
        report.unchanged = changes.unchanged.len() as u32;
        info!(
            changed = changes.changed.len(),
            unchanged = changes.unchanged.len(),
            "Selected changed records"
        );

        let levels: HashMap<String, HierarchyLevel> = parsed
            .records
            .iter()
            .filter(|r| r.is_managed())
            .map(|r| (r.external_key.clone(), r.level))
            .collect();

        Reconciler::new(self.tracker.as_ref(), &self.config, self.config.dry_run)
            .reconcile(&changes.changed, &levels, &snapshot, &mut state, &mut report)
            .await;

        if self.config.dry_run {
            info!("Dry run: skipping status cascade and state save");
        } else {
            cascade_statuses(self.tracker.as_ref(), &self.config, &mut report).await;

            state.version = STATE_VERSION;
            state.last_run_at = Some(Utc::now());
            self.store.save(&state).await?;
        }

        report.complete();
        emit_metrics(&report);
        if report.has_errors() {
            warn!(errors = report.errors.len(), "Sync completed with errors");
        }
        info!(
            created = report.created,
            updated = report.updated,
            matched_existing = report.matched_existing,
            unchanged = report.unchanged,
            stale_mappings_cleaned = report.stale_mappings_cleaned,
            failed = report.failed,
            cascade_transitions = report.cascade_transitions,
            "Sync completed"
        );

        Ok(report)
    }
}

fn emit_metrics(report: &SyncReport) {
    counter!("tracker_sync.runs").increment(1);
    counter!("tracker_sync.records.created").increment(u64::from(report.created));
    counter!("tracker_sync.records.updated").increment(u64::from(report.updated));
    counter!("tracker_sync.records.matched").increment(u64::from(report.matched_existing));
    counter!("tracker_sync.records.unchanged").increment(u64::from(report.unchanged));
    counter!("tracker_sync.records.failed").increment(u64::from(report.failed));
    counter!("tracker_sync.mappings.cleaned").increment(u64::from(report.stale_mappings_cleaned));
    counter!("tracker_sync.transitions.failed").increment(u64::from(report.transition_failures));
    counter!("tracker_sync.cascade.transitions").increment(u64::from(report.cascade_transitions));
    counter!("tracker_sync.cascade.failures").increment(u64::from(report.cascade_failures));
    if report.snapshot_degraded {
        counter!("tracker_sync.snapshot.degraded").increment(1);
    }
    if let Some(seconds) = report.duration_seconds() {
        histogram!("tracker_sync.run.duration_seconds").record(seconds);
    }
}
