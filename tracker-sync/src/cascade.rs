use crate::config::{StatusVocabulary, SyncConfig};
use crate::model::HierarchyLevel;
use crate::report::SyncReport;
use crate::snapshot::{RemoteSnapshot, fetch_snapshot};
use crate::tracker::IssueTracker;
use crate::transition::{StatusTransitioner, TransitionOutcome};
use tracing::{debug, info, warn};

/// Status an ancestor should move to given its immediate children.
///
/// All children done moves the ancestor to done. Otherwise any started or
/// finished child moves a not-yet-started ancestor to the on-track label.
/// Ancestors that were already advanced by hand are never moved back.
pub fn decide_target<'v>(
    current: &str,
    children: &[&str],
    vocabulary: &'v StatusVocabulary
) -> Option<&'v str> {
    if children.is_empty() {
        return None;
    }

    if children.iter().all(|s| vocabulary.is_done(s)) {
        return (!vocabulary.is_done(current)).then_some(vocabulary.done.as_str());
    }

    let any_started = children
        .iter()
        .any(|s| vocabulary.is_done(s) || vocabulary.is_in_progress(s));
    (any_started && vocabulary.is_not_started(current)).then_some(vocabulary.on_track.as_str())
}

/// Roll child statuses up the hierarchy: mid from leaf, then top from mid.
///
/// A fresh snapshot is taken before each pass so the second pass sees what
/// the first one changed. A pass whose snapshot fetch failed is skipped.
pub async fn cascade_statuses(
    tracker: &dyn IssueTracker,
    config: &SyncConfig,
    report: &mut SyncReport
) {
    let passes = [
        (HierarchyLevel::Mid, HierarchyLevel::Leaf),
        (HierarchyLevel::Top, HierarchyLevel::Mid)
    ];

    for (ancestor_level, child_level) in passes {
        let snapshot =
            fetch_snapshot(tracker, &config.tracker.project_key, config.snapshot_limit).await;
        if snapshot.is_degraded() {
            warn!(level = %ancestor_level, "Skipping cascade pass without a snapshot");
            continue;
        }
        cascade_pass(tracker, config, &snapshot, ancestor_level, child_level, report).await;
    }
}

async fn cascade_pass(
    tracker: &dyn IssueTracker,
    config: &SyncConfig,
    snapshot: &RemoteSnapshot,
    ancestor_level: HierarchyLevel,
    child_level: HierarchyLevel,
    report: &mut SyncReport
) {
    let hierarchy = &config.hierarchy;
    let transitioner = StatusTransitioner::new(tracker, &config.statuses);

    let mut ancestors: Vec<_> = snapshot
        .entities()
        .filter(|e| hierarchy.level_of_remote(e) == Some(ancestor_level))
        .collect();
    ancestors.sort_by(|a, b| a.id.cmp(&b.id));

    for ancestor in ancestors {
        let children: Vec<&str> = snapshot
            .children_of(&ancestor.id)
            .filter(|c| hierarchy.level_of_remote(c) == Some(child_level))
            .map(|c| c.status.as_str())
            .collect();

        let Some(target) = decide_target(&ancestor.status, &children, &config.statuses) else {
            continue;
        };
        debug!(issue = %ancestor.id, from = %ancestor.status, to = %target, "Cascading status");

        match transitioner
            .transition(&ancestor.id, target, Some(&ancestor.status))
            .await
        {
            Ok(TransitionOutcome::Transitioned { .. }) => {
                info!(issue = %ancestor.id, status = %target, "Cascaded status");
                report.cascade_transitions += 1;
            }
            Ok(TransitionOutcome::AlreadyInStatus) => {}
            Err(e) => {
                warn!(issue = %ancestor.id, error = %e, "Cascade transition failed");
                report.cascade_failures += 1;
                report.add_error(&ancestor.id, e.kind(), &e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_progress_moves_not_started_to_on_track() {
        let vocabulary = StatusVocabulary::default();
        let children = ["Done", "Done", "In Progress"];
        assert_eq!(decide_target("To Do", &children, &vocabulary), Some("On Track"));
        assert_eq!(decide_target("backlog", &children, &vocabulary), Some("On Track"));
    }

    #[test]
    fn test_partial_progress_never_completes() {
        let vocabulary = StatusVocabulary::default();
        let children = ["Done", "Done", "In Progress"];
        assert_ne!(decide_target("To Do", &children, &vocabulary), Some("Done"));
        assert_eq!(decide_target("In Progress", &children, &vocabulary), None);
    }

    #[test]
    fn test_all_done_completes_ancestor() {
        let vocabulary = StatusVocabulary::default();
        let children = ["Done", "done", "Done"];
        assert_eq!(decide_target("To Do", &children, &vocabulary), Some("Done"));
        assert_eq!(decide_target("At Risk", &children, &vocabulary), Some("Done"));
        assert_eq!(decide_target("Done", &children, &vocabulary), None);
    }

    #[test]
    fn test_advanced_ancestor_left_alone() {
        let vocabulary = StatusVocabulary::default();
        assert_eq!(decide_target("Off Track", &["In Progress"], &vocabulary), None);
        assert_eq!(decide_target("Done", &["In Progress"], &vocabulary), None);
    }

    #[test]
    fn test_no_started_children() {
        let vocabulary = StatusVocabulary::default();
        assert_eq!(decide_target("To Do", &["To Do", "Backlog"], &vocabulary), None);
        assert_eq!(decide_target("To Do", &[], &vocabulary), None);
    }
}
