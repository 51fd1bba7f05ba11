use crate::error::SyncResult;
use crate::snapshot::RemoteSnapshot;
use crate::tracker::{IssueQuery, IssueTracker};
use tracing::debug;
use utils::normalize_display_text;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Matched through the bulk snapshot's title index.
    Snapshot(String),
    /// Matched through a live title query.
    PointQuery(String),
    Unmatched
}

impl Resolution {
    pub fn remote_id(&self) -> Option<&str> {
        match self {
            Self::Snapshot(id) | Self::PointQuery(id) => Some(id),
            Self::Unmatched => None
        }
    }
}

/// Look for an existing remote entity carrying `title` before a create.
///
/// The snapshot may be stale or truncated, so a miss there is confirmed with
/// one live query; only an exact normalized title match is accepted from it.
/// Titles with nothing a text search can carry skip the live query.
/// A failed live query is returned as an error so the caller does not create
/// a possible duplicate.
pub async fn resolve_identity(
    tracker: &dyn IssueTracker,
    snapshot: &RemoteSnapshot,
    project_key: &str,
    title: &str,
    point_query_limit: usize
) -> SyncResult<Resolution> {
    let wanted = normalize_display_text(title);
    if wanted.is_empty() {
        return Ok(Resolution::Unmatched);
    }

    if let Some(entity) = snapshot.find_by_title(title) {
        debug!(title = %title, remote_id = %entity.id, "Matched existing entity in snapshot");
        return Ok(Resolution::Snapshot(entity.id.clone()));
    }

    if IssueQuery::search_words(title).is_empty() {
        debug!(title = %title, "Title has no searchable words, skipping live query");
        return Ok(Resolution::Unmatched);
    }

    let query = IssueQuery::TitleContains {
        project_key: project_key.to_string(),
        text: title.to_string()
    };
    let candidates = tracker.search(&query, point_query_limit).await?;

    Ok(candidates
        .into_iter()
        .find(|entity| normalize_display_text(&entity.title) == wanted)
        .map_or(Resolution::Unmatched, |entity| {
            debug!(title = %title, remote_id = %entity.id, "Matched existing entity by live query");
            Resolution::PointQuery(entity.id)
        }))
}
