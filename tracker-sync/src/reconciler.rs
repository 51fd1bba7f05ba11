use crate::assignee::resolve_assignee;
use crate::changeset::ChangedRecord;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::model::{HierarchyLevel, SourceRecord};
use crate::report::SyncReport;
use crate::resolver::{Resolution, resolve_identity};
use crate::snapshot::RemoteSnapshot;
use crate::state::PersistentState;
use crate::tracker::{IssueDraft, IssueTracker, IssueUpdate};
use crate::transition::StatusTransitioner;
use chrono::{Datelike, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

const DUE_DATE_FORMAT: &str = "%d/%m/%Y";

/// Parse a `day/month/year` date; zero padding is optional. Anything else,
/// including two-digit years, is treated as no date.
pub fn parse_due_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DUE_DATE_FORMAT)
        .ok()
        .filter(|date| date.year() >= 1000)
}

/// Applies changed records to the tracker in hierarchy order.
pub struct Reconciler<'a> {
    tracker: &'a dyn IssueTracker,
    config: &'a SyncConfig,
    dry_run: bool
}

impl<'a> Reconciler<'a> {
    pub fn new(tracker: &'a dyn IssueTracker, config: &'a SyncConfig, dry_run: bool) -> Self {
        Self {
            tracker,
            config,
            dry_run
        }
    }

    /// Process every changed record, top level first.
    ///
    /// `levels` maps every source key (changed or not) to its level and is
    /// used to check parent references. Failures stay local to their record:
    /// they are counted and logged, and the record's fingerprint is withheld
    /// so the next run retries it.
    pub async fn reconcile(
        &self,
        changed: &[ChangedRecord],
        levels: &HashMap<String, HierarchyLevel>,
        snapshot: &RemoteSnapshot,
        state: &mut PersistentState,
        report: &mut SyncReport
    ) {
        for level in HierarchyLevel::ORDERED {
            for item in changed.iter().filter(|c| c.record.level == level) {
                let key = &item.record.external_key;
                if let Err(e) = self
                    .process(item, levels, snapshot, state, report)
                    .await
                {
                    warn!(key = %key, level = %level, error = %e, "Record failed");
                    report.failed += 1;
                    if matches!(
                        e,
                        SyncError::MissingParent { .. } | SyncError::ParentLevelMismatch { .. }
                    ) {
                        report.failed_no_parent += 1;
                    }
                    report.add_error(key, e.kind(), &e);
                }
            }
        }
    }

    async fn process(
        &self,
        item: &ChangedRecord,
        levels: &HashMap<String, HierarchyLevel>,
        snapshot: &RemoteSnapshot,
        state: &mut PersistentState,
        report: &mut SyncReport
    ) -> SyncResult<()> {
        let record = &item.record;

        let (remote_id, target_status) = match self
            .existing_id(record, snapshot, state, report)
            .await?
        {
            Some(id) => {
                self.update(&id, record, state, report).await?;
                (id, record.status.clone())
            }
            None => {
                let id = self
                    .create(record, levels, snapshot, state, report)
                    .await?;
                let status = record
                    .status
                    .clone()
                    .unwrap_or_else(|| self.config.statuses.initial.clone());
                (id, Some(status))
            }
        };

        if self.dry_run {
            return Ok(());
        }

        if let Some(target) = target_status {
            let transitioner = StatusTransitioner::new(self.tracker, &self.config.statuses);
            if let Err(e) = transitioner.transition(&remote_id, &target, None).await {
                report.transition_failures += 1;
                return Err(e);
            }
        }

        state.record_fingerprint(&record.external_key, item.fingerprint.clone());
        Ok(())
    }

    /// Stored mapping, or a bind to an existing remote entity with the same
    /// title.
    async fn existing_id(
        &self,
        record: &SourceRecord,
        snapshot: &RemoteSnapshot,
        state: &mut PersistentState,
        report: &mut SyncReport
    ) -> SyncResult<Option<String>> {
        if let Some(id) = state.remote_id(&record.external_key) {
            return Ok(Some(id.to_string()));
        }

        let resolution = resolve_identity(
            self.tracker,
            snapshot,
            &self.config.tracker.project_key,
            &record.title,
            self.config.point_query_limit
        )
        .await?;

        Ok(match resolution {
            Resolution::Unmatched => None,
            matched => {
                let id = matched.remote_id().unwrap_or_default().to_string();
                info!(key = %record.external_key, remote_id = %id, "Bound to existing entity");
                state.bind(&record.external_key, &id);
                report.matched_existing += 1;
                Some(id)
            }
        })
    }

    async fn update(
        &self,
        id: &str,
        record: &SourceRecord,
        state: &mut PersistentState,
        report: &mut SyncReport
    ) -> SyncResult<()> {
        let update = IssueUpdate {
            title: record.title.clone(),
            due_date: record.due_date.as_deref().and_then(parse_due_date),
            assignee_account_id: self.assignee(record, state, report).await
        };

        if self.dry_run {
            info!(key = %record.external_key, remote_id = %id, "Dry run: would update");
        } else {
            self.tracker.update_issue(id, &update).await?;
            info!(key = %record.external_key, remote_id = %id, "Updated");
        }
        report.updated += 1;
        Ok(())
    }

    async fn create(
        &self,
        record: &SourceRecord,
        levels: &HashMap<String, HierarchyLevel>,
        snapshot: &RemoteSnapshot,
        state: &mut PersistentState,
        report: &mut SyncReport
    ) -> SyncResult<String> {
        let parent_id = self.parent_reference(record, levels, snapshot, state)?;
        let due_date = record
            .due_date
            .as_deref()
            .and_then(parse_due_date)
            .unwrap_or_else(|| {
                Utc::now().date_naive() + chrono::Duration::days(self.config.defaults.due_offset_days)
            });

        let mut custom_fields = BTreeMap::new();
        if record.level == HierarchyLevel::Top {
            for metric in &self.config.metric_fields {
                custom_fields.insert(
                    metric.remote_field.clone(),
                    metric.render(record.metrics.get(&metric.column).map(String::as_str))
                );
            }
        }

        let draft = IssueDraft {
            project_key: self.config.tracker.project_key.clone(),
            issue_type_id: self
                .config
                .hierarchy
                .level(record.level)
                .issue_type_id
                .clone(),
            title: record.title.clone(),
            parent_id,
            assignee_account_id: self.assignee(record, state, report).await,
            due_date: Some(due_date),
            custom_fields
        };

        let id = if self.dry_run {
            info!(key = %record.external_key, level = %record.level, "Dry run: would create");
            format!("dry-run:{}", record.external_key)
        } else {
            let id = self.tracker.create_issue(&draft).await?;
            info!(key = %record.external_key, remote_id = %id, level = %record.level, "Created");
            id
        };

        state.bind(&record.external_key, &id);
        report.created += 1;
        Ok(id)
    }

    /// Remote id of the record's parent, checking the parent sits exactly one
    /// level up. `None` for the top level.
    fn parent_reference(
        &self,
        record: &SourceRecord,
        levels: &HashMap<String, HierarchyLevel>,
        snapshot: &RemoteSnapshot,
        state: &PersistentState
    ) -> SyncResult<Option<String>> {
        let Some(expected) = record.level.parent() else {
            return Ok(None);
        };
        let missing = |parent_key: &str| SyncError::MissingParent {
            key: record.external_key.clone(),
            parent_key: parent_key.to_string()
        };
        let parent_key = record
            .parent_key
            .as_deref()
            .ok_or_else(|| missing("(none)"))?;
        let parent_id = state.remote_id(parent_key);

        let actual = levels.get(parent_key).copied().or_else(|| {
            parent_id
                .and_then(|id| snapshot.get(id))
                .and_then(|entity| self.config.hierarchy.level_of_remote(entity))
        });
        if let Some(actual) = actual.filter(|level| *level != expected) {
            return Err(SyncError::ParentLevelMismatch {
                key: record.external_key.clone(),
                parent_key: parent_key.to_string(),
                expected: expected.to_string(),
                actual: actual.to_string()
            });
        }

        parent_id
            .map(|id| Some(id.to_string()))
            .ok_or_else(|| missing(parent_key))
    }

    async fn assignee(
        &self,
        record: &SourceRecord,
        state: &mut PersistentState,
        report: &mut SyncReport
    ) -> Option<String> {
        let email = record.assignee.as_deref()?;
        let resolved = resolve_assignee(self.tracker, state, email).await;
        if resolved.is_none() {
            report.assignee_unresolved += 1;
        }
        resolved
    }
}
