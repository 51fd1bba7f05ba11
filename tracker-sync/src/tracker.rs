use crate::error::SyncResult;
use crate::model::RemoteEntity;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The remote issue tracker, as far as the engine is concerned.
///
/// Every call may fail independently; callers decide whether a failure is
/// local to one record or degrades a whole phase.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Returns the new remote id.
    async fn create_issue(&self, draft: &IssueDraft) -> SyncResult<String>;
    async fn update_issue(&self, id: &str, update: &IssueUpdate) -> SyncResult<()>;
    async fn get_issue(&self, id: &str) -> SyncResult<RemoteEntity>;
    async fn search(
        &self,
        query: &IssueQuery,
        max_results: usize
    ) -> SyncResult<Vec<RemoteEntity>>;
    async fn list_transitions(&self, id: &str) -> SyncResult<Vec<Transition>>;
    async fn transition_issue(&self, id: &str, transition_id: &str) -> SyncResult<()>;
    async fn find_user_by_email(&self, email: &str) -> SyncResult<Option<TrackerUser>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueQuery {
    /// Every entity of the project.
    Project { project_key: String },
    /// Entities whose title contains the given words.
    TitleContains { project_key: String, text: String }
}

const JQL_RESERVED: &[char] = &[
    '"', '\\', '+', '-', '&', '|', '!', '(', ')', '{', '}', '[', ']', '^', '~', '*', '?', ':', '/'
];

impl IssueQuery {
    /// `text` as a JQL text search can carry it: reserved characters become
    /// spaces and whitespace runs collapse. Empty when nothing searchable is
    /// left, and Jira rejects an empty phrase.
    pub fn search_words(text: &str) -> String {
        text.chars()
            .map(|c| if JQL_RESERVED.contains(&c) { ' ' } else { c })
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn to_jql(&self) -> String {
        match self {
            Self::Project { project_key } => {
                format!("project = \"{}\" ORDER BY created ASC", escape_jql(project_key))
            }
            Self::TitleContains { project_key, text } => format!(
                "project = \"{}\" AND summary ~ \"{}\"",
                escape_jql(project_key),
                Self::search_words(text)
            )
        }
    }
}

fn escape_jql(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueDraft {
    pub project_key: String,
    pub issue_type_id: String,
    pub title: String,
    pub parent_id: Option<String>,
    pub assignee_account_id: Option<String>,
    pub due_date: Option<NaiveDate>,
    /// Remote field id -> rendered value.
    pub custom_fields: BTreeMap<String, serde_json::Value>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueUpdate {
    pub title: String,
    pub due_date: Option<NaiveDate>,
    pub assignee_account_id: Option<String>
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub id: String,
    pub name: String,
    /// Status the entity lands in after the transition.
    pub to_status: String
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerUser {
    pub account_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>
}
