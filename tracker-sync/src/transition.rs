//! Workflow capability probe.
//!
//! The tracker's transition graph is not known statically. To move an entity
//! to a status the probe asks which transitions are available right now and
//! takes the one landing in the wanted status. When none does, the workflow
//! forbids the jump from the current state and the request is soft-rejected.

use crate::config::StatusVocabulary;
use crate::error::{SyncError, SyncResult};
use crate::tracker::IssueTracker;
use tracing::{debug, warn};
use utils::labels_match;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Entity was already in the target status; nothing was called.
    AlreadyInStatus,
    Transitioned { transition_id: String }
}

pub struct StatusTransitioner<'a> {
    tracker: &'a dyn IssueTracker,
    vocabulary: &'a StatusVocabulary
}

impl<'a> StatusTransitioner<'a> {
    pub fn new(tracker: &'a dyn IssueTracker, vocabulary: &'a StatusVocabulary) -> Self {
        Self {
            tracker,
            vocabulary
        }
    }

    /// Move `id` to `target`.
    ///
    /// `current` skips the status read when the caller already knows it.
    /// Unrecognized labels and missing workflow paths come back as
    /// `SyncError::TransitionRejected`.
    pub async fn transition(
        &self,
        id: &str,
        target: &str,
        current: Option<&str>
    ) -> SyncResult<TransitionOutcome> {
        let Some(target) = self.vocabulary.canonical(target) else {
            warn!(issue = %id, status = %target, "Unrecognized status label");
            return Err(SyncError::TransitionRejected {
                issue: id.to_string(),
                reason: format!("'{target}' is not a recognized status")
            });
        };

        let current = match current {
            Some(status) => status.to_string(),
            None => self.tracker.get_issue(id).await?.status
        };
        if labels_match(&current, target) {
            debug!(issue = %id, status = %target, "Already in target status");
            return Ok(TransitionOutcome::AlreadyInStatus);
        }

        let transitions = self.tracker.list_transitions(id).await?;
        let Some(transition) = transitions
            .iter()
            .find(|t| labels_match(&t.to_status, target))
        else {
            warn!(issue = %id, from = %current, to = %target, "No workflow path to target status");
            return Err(SyncError::TransitionRejected {
                issue: id.to_string(),
                reason: format!("no transition from '{current}' to '{target}'")
            });
        };

        self.tracker
            .transition_issue(id, &transition.id)
            .await?;
        debug!(issue = %id, from = %current, to = %target, "Transitioned");

        Ok(TransitionOutcome::Transitioned {
            transition_id: transition.id.clone()
        })
    }
}
