use crate::model::RemoteEntity;
use crate::tracker::{IssueQuery, IssueTracker};
use std::collections::HashMap;
use tracing::{debug, warn};
use utils::normalize_display_text;

/// Bulk view of the managed project at one point in time.
#[derive(Debug, Clone, Default)]
pub struct RemoteSnapshot {
    entities: HashMap<String, RemoteEntity>,
    /// normalized title -> id of the first entity seen with that title
    by_title: HashMap<String, String>,
    degraded: bool
}

impl RemoteSnapshot {
    pub fn from_entities(entities: impl IntoIterator<Item = RemoteEntity>) -> Self {
        let mut snapshot = Self::default();
        for entity in entities {
            snapshot
                .by_title
                .entry(normalize_display_text(&entity.title))
                .or_insert_with(|| entity.id.clone());
            snapshot.entities.insert(entity.id.clone(), entity);
        }
        snapshot
    }

    /// Empty snapshot standing in for a failed fetch.
    pub fn degraded() -> Self {
        Self {
            degraded: true,
            ..Self::default()
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&RemoteEntity> {
        self.entities.get(id)
    }

    pub fn find_by_title(&self, title: &str) -> Option<&RemoteEntity> {
        self.by_title
            .get(&normalize_display_text(title))
            .and_then(|id| self.entities.get(id))
    }

    /// Entities whose parent is `parent_id`.
    pub fn children_of<'a>(&'a self, parent_id: &'a str) -> impl Iterator<Item = &'a RemoteEntity> {
        self.entities
            .values()
            .filter(move |e| e.parent_id.as_deref() == Some(parent_id))
    }

    pub fn entities(&self) -> impl Iterator<Item = &RemoteEntity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Fetch every entity of the project, up to `limit`.
///
/// Entities past the limit are silently absent; deployments must keep the
/// project below it. A failed fetch yields a degraded empty snapshot instead
/// of an error.
pub async fn fetch_snapshot(
    tracker: &dyn IssueTracker,
    project_key: &str,
    limit: usize
) -> RemoteSnapshot {
    let query = IssueQuery::Project {
        project_key: project_key.to_string()
    };

    match tracker.search(&query, limit).await {
        Ok(entities) => {
            if entities.len() >= limit {
                warn!(
                    limit,
                    "Snapshot reached the result limit; entities beyond it are invisible to this run"
                );
            }
            let snapshot = RemoteSnapshot::from_entities(entities);
            debug!(count = snapshot.len(), "Fetched remote snapshot");
            snapshot
        }
        Err(e) => {
            warn!(error = %e, "Snapshot fetch failed, continuing with an empty snapshot");
            RemoteSnapshot::degraded()
        }
    }
}
