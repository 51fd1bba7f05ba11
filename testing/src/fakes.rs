use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracker_sync::config::StatusVocabulary;
use tracker_sync::error::{SyncError, SyncResult};
use tracker_sync::model::RemoteEntity;
use tracker_sync::source::{Row, SourceReader};
use tracker_sync::state::PersistentState;
use tracker_sync::state_store::StateStore;
use tracker_sync::tracker::{
    IssueDraft, IssueQuery, IssueTracker, IssueUpdate, TrackerUser, Transition
};
use utils::normalize_display_text;

const TRANSITION_PREFIX: &str = "to:";

/// Number of calls per tracker operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub create: u32,
    pub update: u32,
    pub get: u32,
    pub search: u32,
    pub list_transitions: u32,
    pub transition: u32,
    pub user_search: u32
}

impl CallCounts {
    /// Calls that change remote state.
    pub fn mutations(&self) -> u32 {
        self.create + self.update + self.transition
    }
}

/// Fields the fake stores beyond [`RemoteEntity`], for assertions.
#[derive(Debug, Clone)]
pub struct StoredIssue {
    pub entity: RemoteEntity,
    pub due_date: Option<NaiveDate>,
    pub assignee_account_id: Option<String>,
    pub custom_fields: BTreeMap<String, serde_json::Value>
}

#[derive(Debug, Default)]
struct TrackerState {
    next_number: u32,
    issues: BTreeMap<u32, StoredIssue>,
    type_names: HashMap<String, String>,
    statuses: Vec<String>,
    /// lowercase from-status -> reachable statuses; absent means any status
    workflow: Option<HashMap<String, Vec<String>>>,
    users: HashMap<String, TrackerUser>,
    hidden: HashSet<String>,
    failing_titles: HashSet<String>,
    failing_transitions: HashSet<String>,
    fail_snapshot: bool,
    fail_point_query: bool,
    calls: CallCounts
}

/// Tracker project held in memory.
///
/// Issue keys are `<project>-<n>`. New issues start in `To Do`. Without an
/// explicit workflow every known status is reachable from every other.
pub struct InMemoryTracker {
    project_key: String,
    state: Mutex<TrackerState>
}

impl InMemoryTracker {
    pub fn new(project_key: &str) -> Self {
        let state = TrackerState {
            next_number: 1,
            statuses: StatusVocabulary::default().recognized,
            ..Default::default()
        };
        Self {
            project_key: project_key.to_string(),
            state: Mutex::new(state)
        }
    }

    /// Type name reported for issues of `type_id`.
    pub fn with_issue_type(self, type_id: &str, name: &str) -> Self {
        self.state
            .lock()
            .type_names
            .insert(type_id.to_string(), name.to_string());
        self
    }

    /// Restrict transitions to the given `(from, to)` pairs.
    pub fn with_workflow(self, edges: &[(&str, &str)]) -> Self {
        let mut graph: HashMap<String, Vec<String>> = HashMap::new();
        for (from, to) in edges {
            graph
                .entry(from.to_lowercase())
                .or_default()
                .push((*to).to_string());
        }
        self.state.lock().workflow = Some(graph);
        self
    }

    pub fn with_user(self, email: &str, account_id: &str) -> Self {
        self.state.lock().users.insert(
            email.to_lowercase(),
            TrackerUser {
                account_id: account_id.to_string(),
                email: Some(email.to_string()),
                display_name: None
            }
        );
        self
    }

    fn key(&self, number: u32) -> String {
        format!("{}-{}", self.project_key, number)
    }

    fn number(&self, id: &str) -> Option<u32> {
        id.strip_prefix(&self.project_key)?
            .strip_prefix('-')?
            .parse()
            .ok()
    }

    /// Add an issue as if a person had created it. Returns its key.
    pub fn insert_issue(
        &self,
        title: &str,
        issue_type_id: &str,
        parent_id: Option<&str>,
        status: &str
    ) -> String {
        let mut state = self.state.lock();
        let number = state.next_number;
        state.next_number += 1;
        let id = self.key(number);
        let entity = RemoteEntity {
            id: id.clone(),
            title: title.to_string(),
            issue_type_id: issue_type_id.to_string(),
            issue_type_name: state
                .type_names
                .get(issue_type_id)
                .cloned()
                .unwrap_or_default(),
            parent_id: parent_id.map(str::to_string),
            status: status.to_string()
        };
        state.issues.insert(
            number,
            StoredIssue {
                entity,
                due_date: None,
                assignee_account_id: None,
                custom_fields: BTreeMap::new()
            }
        );
        id
    }

    pub fn delete_issue(&self, id: &str) {
        if let Some(number) = self.number(id) {
            self.state.lock().issues.remove(&number);
        }
    }

    pub fn set_status(&self, id: &str, status: &str) {
        if let Some(number) = self.number(id) {
            if let Some(issue) = self.state.lock().issues.get_mut(&number) {
                issue.entity.status = status.to_string();
            }
        }
    }

    pub fn issue(&self, id: &str) -> Option<StoredIssue> {
        let number = self.number(id)?;
        self.state.lock().issues.get(&number).cloned()
    }

    pub fn issues(&self) -> Vec<StoredIssue> {
        self.state.lock().issues.values().cloned().collect()
    }

    pub fn issues_titled(&self, title: &str) -> Vec<StoredIssue> {
        let wanted = normalize_display_text(title);
        self.issues()
            .into_iter()
            .filter(|i| normalize_display_text(&i.entity.title) == wanted)
            .collect()
    }

    pub fn status_of(&self, id: &str) -> Option<String> {
        self.issue(id).map(|i| i.entity.status)
    }

    pub fn calls(&self) -> CallCounts {
        self.state.lock().calls
    }

    pub fn reset_calls(&self) {
        self.state.lock().calls = CallCounts::default();
    }

    /// Leave `id` out of project-wide searches, as if past the result bound.
    pub fn hide_from_snapshot(&self, id: &str) {
        self.state.lock().hidden.insert(id.to_string());
    }

    /// Creates with this title fail with a 400.
    pub fn fail_create_for(&self, title: &str) {
        self.state
            .lock()
            .failing_titles
            .insert(normalize_display_text(title));
    }

    /// Transitions of `id` fail with a 500.
    pub fn fail_transitions_for(&self, id: &str) {
        self.state
            .lock()
            .failing_transitions
            .insert(id.to_string());
    }

    pub fn fail_snapshot(&self, fail: bool) {
        self.state.lock().fail_snapshot = fail;
    }

    pub fn fail_point_query(&self, fail: bool) {
        self.state.lock().fail_point_query = fail;
    }

    fn not_found(id: &str) -> SyncError {
        SyncError::NotFound(format!("issue {id}"))
    }
}

fn reachable(state: &TrackerState, from: &str) -> Vec<String> {
    match &state.workflow {
        Some(graph) => graph
            .get(&from.to_lowercase())
            .cloned()
            .unwrap_or_default(),
        None => state
            .statuses
            .iter()
            .filter(|s| !s.eq_ignore_ascii_case(from))
            .cloned()
            .collect()
    }
}

/// Lowercased words of an already stripped search phrase; Jira's `~`
/// matches when every query word occurs in the summary.
fn search_tokens(words: &str) -> HashSet<String> {
    words.split(' ').map(str::to_lowercase).collect()
}

#[async_trait]
impl IssueTracker for InMemoryTracker {
    async fn create_issue(&self, draft: &IssueDraft) -> SyncResult<String> {
        {
            let mut state = self.state.lock();
            state.calls.create += 1;
            if state
                .failing_titles
                .contains(&normalize_display_text(&draft.title))
            {
                return Err(SyncError::TrackerApiError {
                    status: 400,
                    message: "simulated create failure".to_string()
                });
            }
            if let Some(parent) = &draft.parent_id {
                let exists = self
                    .number(parent)
                    .is_some_and(|n| state.issues.contains_key(&n));
                if !exists {
                    return Err(SyncError::TrackerApiError {
                        status: 400,
                        message: format!("parent {parent} does not exist")
                    });
                }
            }
        }

        let id = self.insert_issue(
            &draft.title,
            &draft.issue_type_id,
            draft.parent_id.as_deref(),
            "To Do"
        );
        if let Some(number) = self.number(&id) {
            if let Some(issue) = self.state.lock().issues.get_mut(&number) {
                issue.due_date = draft.due_date;
                issue.assignee_account_id = draft.assignee_account_id.clone();
                issue.custom_fields = draft.custom_fields.clone();
            }
        }
        Ok(id)
    }

    async fn update_issue(&self, id: &str, update: &IssueUpdate) -> SyncResult<()> {
        let number = self.number(id);
        let mut state = self.state.lock();
        state.calls.update += 1;
        let issue = number
            .and_then(|n| state.issues.get_mut(&n))
            .ok_or_else(|| Self::not_found(id))?;

        issue.entity.title = update.title.clone();
        if update.due_date.is_some() {
            issue.due_date = update.due_date;
        }
        if update.assignee_account_id.is_some() {
            issue.assignee_account_id = update.assignee_account_id.clone();
        }
        Ok(())
    }

    async fn get_issue(&self, id: &str) -> SyncResult<RemoteEntity> {
        let number = self.number(id);
        let mut state = self.state.lock();
        state.calls.get += 1;
        number
            .and_then(|n| state.issues.get(&n))
            .map(|i| i.entity.clone())
            .ok_or_else(|| Self::not_found(id))
    }

    async fn search(
        &self,
        query: &IssueQuery,
        max_results: usize
    ) -> SyncResult<Vec<RemoteEntity>> {
        let mut state = self.state.lock();
        state.calls.search += 1;

        let matches: Vec<RemoteEntity> = match query {
            IssueQuery::Project { .. } => {
                if state.fail_snapshot {
                    return Err(SyncError::TrackerApiError {
                        status: 503,
                        message: "simulated search outage".to_string()
                    });
                }
                state
                    .issues
                    .values()
                    .filter(|i| !state.hidden.contains(&i.entity.id))
                    .map(|i| i.entity.clone())
                    .collect()
            }
            IssueQuery::TitleContains { text, .. } => {
                if state.fail_point_query {
                    return Err(SyncError::TrackerApiError {
                        status: 503,
                        message: "simulated search outage".to_string()
                    });
                }
                let words = IssueQuery::search_words(text);
                if words.is_empty() {
                    return Err(SyncError::TrackerApiError {
                        status: 400,
                        message: "the text search phrase is empty".to_string()
                    });
                }
                let wanted = search_tokens(&words);
                state
                    .issues
                    .values()
                    .filter(|i| {
                        let title = search_tokens(&IssueQuery::search_words(&i.entity.title));
                        wanted.is_subset(&title)
                    })
                    .map(|i| i.entity.clone())
                    .collect()
            }
        };

        Ok(matches.into_iter().take(max_results).collect())
    }

    async fn list_transitions(&self, id: &str) -> SyncResult<Vec<Transition>> {
        let number = self.number(id);
        let mut state = self.state.lock();
        state.calls.list_transitions += 1;
        let current = number
            .and_then(|n| state.issues.get(&n))
            .map(|i| i.entity.status.clone())
            .ok_or_else(|| Self::not_found(id))?;

        Ok(reachable(&state, &current)
            .into_iter()
            .map(|to| Transition {
                id: format!("{TRANSITION_PREFIX}{to}"),
                name: format!("Move to {to}"),
                to_status: to
            })
            .collect())
    }

    async fn transition_issue(&self, id: &str, transition_id: &str) -> SyncResult<()> {
        let number = self.number(id);
        let mut state = self.state.lock();
        state.calls.transition += 1;
        if state.failing_transitions.contains(id) {
            return Err(SyncError::TrackerApiError {
                status: 500,
                message: "simulated transition failure".to_string()
            });
        }

        let current = number
            .and_then(|n| state.issues.get(&n))
            .map(|i| i.entity.status.clone())
            .ok_or_else(|| Self::not_found(id))?;
        let target = transition_id
            .strip_prefix(TRANSITION_PREFIX)
            .filter(|to| reachable(&state, &current).iter().any(|s| s.as_str() == *to))
            .map(str::to_string)
            .ok_or_else(|| SyncError::TrackerApiError {
                status: 400,
                message: format!("transition {transition_id} is not valid from {current}")
            })?;

        if let Some(issue) = number.and_then(|n| state.issues.get_mut(&n)) {
            issue.entity.status = target;
        }
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> SyncResult<Option<TrackerUser>> {
        let mut state = self.state.lock();
        state.calls.user_search += 1;
        Ok(state.users.get(&email.to_lowercase()).cloned())
    }
}

/// Source returning a fixed set of rows for any sheet.
#[derive(Default)]
pub struct StaticSource {
    rows: Mutex<Vec<Row>>,
    fail: Mutex<bool>
}

impl StaticSource {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: Mutex::new(rows),
            fail: Mutex::new(false)
        }
    }

    pub fn set_rows(&self, rows: Vec<Row>) {
        *self.rows.lock() = rows;
    }

    /// Edit the row whose `ID` cell is `key`.
    pub fn edit_row(&self, key: &str, column: &str, value: &str) {
        let mut rows = self.rows.lock();
        if let Some(row) = rows
            .iter_mut()
            .find(|r| r.get("ID").map(String::as_str) == Some(key))
        {
            row.insert(column.to_string(), value.to_string());
        }
    }

    pub fn fail(&self, fail: bool) {
        *self.fail.lock() = fail;
    }
}

#[async_trait]
impl SourceReader for StaticSource {
    async fn fetch_rows(&self, sheet: &str) -> SyncResult<Vec<Row>> {
        if *self.fail.lock() {
            return Err(SyncError::SourceError(format!("sheet '{sheet}' unavailable")));
        }
        Ok(self.rows.lock().clone())
    }
}

/// State store keeping the last saved state in memory.
#[derive(Default)]
pub struct InMemoryStateStore {
    state: Mutex<Option<PersistentState>>,
    saves: Mutex<u32>
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: PersistentState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            saves: Mutex::new(0)
        }
    }

    /// Last saved state, or the empty state if nothing was saved.
    pub fn state(&self) -> PersistentState {
        self.state.lock().clone().unwrap_or_default()
    }

    pub fn saves(&self) -> u32 {
        *self.saves.lock()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self) -> PersistentState {
        self.state()
    }

    async fn save(&self, state: &PersistentState) -> SyncResult<()> {
        *self.state.lock() = Some(state.clone());
        *self.saves.lock() += 1;
        Ok(())
    }
}
