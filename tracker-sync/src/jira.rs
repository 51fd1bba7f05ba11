use crate::config::{RetryConfig, TrackerConfig};
use crate::error::{SyncError, SyncResult};
use crate::model::RemoteEntity;
use crate::tracker::{IssueDraft, IssueQuery, IssueTracker, IssueUpdate, TrackerUser, Transition};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

const ISSUE_FIELDS: &str = "summary,status,parent,issuetype";
const SEARCH_PAGE_SIZE: usize = 100;

/// Jira Cloud REST v2 client.
///
/// Remote ids are issue keys. Parents are set through the `parent` field,
/// which covers both epic children and sub-tasks on current Jira Cloud.
pub struct JiraClient {
    client: Client,
    config: TrackerConfig,
    retry: RetryConfig
}

impl JiraClient {
    pub fn new(config: TrackerConfig, retry: RetryConfig) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(SyncError::HttpError)?;

        Ok(Self {
            client,
            config,
            retry
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/rest/api/2{}",
            self.config.base_url.trim_end_matches('/'),
            path
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Accept", "application/json");
        if !self.config.email.is_empty() {
            request.basic_auth(&self.config.email, Some(&self.config.api_token))
        } else if !self.config.api_token.is_empty() {
            request.bearer_auth(&self.config.api_token)
        } else {
            request
        }
    }

    async fn send_once(&self, request: RequestBuilder) -> SyncResult<Response> {
        let response = self.authorize(request).send().await?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(5);
                Err(SyncError::RateLimited {
                    retry_after_seconds: retry_after
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(
                SyncError::AuthenticationError("Jira credentials rejected".to_string())
            ),
            StatusCode::NOT_FOUND => Err(SyncError::NotFound(response.url().path().to_string())),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(SyncError::TrackerApiError {
                    status: status.as_u16(),
                    message: body
                })
            }
        }
    }

    /// Send with exponential backoff.
    ///
    /// Rate limiting is always retried since the server did not act on the
    /// request. Transport and 5xx errors are retried only for `idempotent`
    /// requests; a retried create could otherwise duplicate an issue.
    async fn send<F>(&self, idempotent: bool, build: F) -> SyncResult<Response>
    where
        F: Fn() -> RequestBuilder
    {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.retry.initial_backoff_ms))
            .with_max_interval(Duration::from_millis(self.retry.max_backoff_ms))
            .with_max_elapsed_time(None)
            .build();
        let attempts = Arc::new(AtomicU32::new(0));
        let max_retries = self.retry.max_retries;

        backoff::future::retry(policy, || {
            let request = build();
            let attempts = attempts.clone();
            async move {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                match self.send_once(request).await {
                    Ok(response) => Ok(response),
                    Err(e) if attempt < max_retries && should_retry(&e, idempotent) => {
                        warn!(attempt = attempt + 1, error = %e, "Jira request failed, retrying");
                        match e.retry_after() {
                            Some(secs) => {
                                Err(backoff::Error::retry_after(e, Duration::from_secs(secs)))
                            }
                            None => Err(backoff::Error::transient(e))
                        }
                    }
                    Err(e) => Err(backoff::Error::permanent(e))
                }
            }
        })
        .await
    }

    async fn search_page(
        &self,
        jql: &str,
        start_at: usize,
        max_results: usize
    ) -> SyncResult<SearchResponse> {
        let body = json!({
            "jql": jql,
            "startAt": start_at,
            "maxResults": max_results,
            "fields": ISSUE_FIELDS.split(',').collect::<Vec<_>>()
        });
        let url = self.url("/search");
        let response = self
            .send(true, || self.client.post(&url).json(&body))
            .await?;
        Ok(response.json::<SearchResponse>().await?)
    }
}

fn should_retry(error: &SyncError, idempotent: bool) -> bool {
    matches!(error, SyncError::RateLimited { .. }) || (idempotent && error.is_retryable())
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn create_issue(&self, draft: &IssueDraft) -> SyncResult<String> {
        let mut fields = Map::new();
        fields.insert("project".to_string(), json!({ "key": draft.project_key }));
        fields.insert("issuetype".to_string(), json!({ "id": draft.issue_type_id }));
        fields.insert("summary".to_string(), json!(draft.title));
        if let Some(parent) = &draft.parent_id {
            fields.insert("parent".to_string(), json!({ "key": parent }));
        }
        if let Some(account_id) = &draft.assignee_account_id {
            fields.insert("assignee".to_string(), json!({ "accountId": account_id }));
        }
        if let Some(due) = draft.due_date {
            fields.insert("duedate".to_string(), json!(due.format("%Y-%m-%d").to_string()));
        }
        for (field, value) in &draft.custom_fields {
            fields.insert(field.clone(), value.clone());
        }

        let body = json!({ "fields": fields });
        let url = self.url("/issue");
        let response = self
            .send(false, || self.client.post(&url).json(&body))
            .await?;
        let created = response.json::<CreatedIssue>().await?;
        debug!(key = %created.key, "Created Jira issue");
        Ok(created.key)
    }

    async fn update_issue(&self, id: &str, update: &IssueUpdate) -> SyncResult<()> {
        let mut fields = Map::new();
        fields.insert("summary".to_string(), json!(update.title));
        if let Some(due) = update.due_date {
            fields.insert("duedate".to_string(), json!(due.format("%Y-%m-%d").to_string()));
        }
        if let Some(account_id) = &update.assignee_account_id {
            fields.insert("assignee".to_string(), json!({ "accountId": account_id }));
        }

        let body = json!({ "fields": fields });
        let url = self.url(&format!("/issue/{}", urlencoding::encode(id)));
        self.send(true, || self.client.put(&url).json(&body))
            .await?;
        Ok(())
    }

    async fn get_issue(&self, id: &str) -> SyncResult<RemoteEntity> {
        let url = self.url(&format!("/issue/{}", urlencoding::encode(id)));
        let response = self
            .send(true, || {
                self.client
                    .get(&url)
                    .query(&[("fields", ISSUE_FIELDS)])
            })
            .await?;
        Ok(response.json::<JiraIssue>().await?.into_entity())
    }

    async fn search(
        &self,
        query: &IssueQuery,
        max_results: usize
    ) -> SyncResult<Vec<RemoteEntity>> {
        let jql = query.to_jql();
        let mut entities = Vec::new();

        while entities.len() < max_results {
            let page_size = SEARCH_PAGE_SIZE.min(max_results - entities.len());
            let page = self.search_page(&jql, entities.len(), page_size).await?;
            let fetched = page.issues.len();
            entities.extend(page.issues.into_iter().map(JiraIssue::into_entity));

            if fetched == 0 || entities.len() >= page.total {
                break;
            }
        }

        debug!(jql = %jql, count = entities.len(), "Jira search completed");
        Ok(entities)
    }

    async fn list_transitions(&self, id: &str) -> SyncResult<Vec<Transition>> {
        let url = self.url(&format!("/issue/{}/transitions", urlencoding::encode(id)));
        let response = self.send(true, || self.client.get(&url)).await?;
        let body = response.json::<TransitionsResponse>().await?;

        Ok(body
            .transitions
            .into_iter()
            .map(|t| Transition {
                id: t.id,
                name: t.name,
                to_status: t.to.name
            })
            .collect())
    }

    async fn transition_issue(&self, id: &str, transition_id: &str) -> SyncResult<()> {
        let url = self.url(&format!("/issue/{}/transitions", urlencoding::encode(id)));
        let body = json!({ "transition": { "id": transition_id } });
        self.send(false, || self.client.post(&url).json(&body))
            .await?;
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> SyncResult<Option<TrackerUser>> {
        let url = self.url("/user/search");
        let response = self
            .send(true, || self.client.get(&url).query(&[("query", email)]))
            .await?;
        let users = response.json::<Vec<JiraUser>>().await?;

        let exact = users.iter().position(|u| {
            u.email_address
                .as_deref()
                .is_some_and(|address| address.eq_ignore_ascii_case(email))
        });
        // A lone result is only trusted when Jira hides its address; a visible
        // different address belongs to someone else.
        let chosen = match (exact, users.as_slice()) {
            (Some(index), _) => Some(index),
            (None, [only]) if only.email_address.is_none() => Some(0),
            _ => None
        };

        Ok(chosen.map(|index| {
            let user = &users[index];
            TrackerUser {
                account_id: user.account_id.clone(),
                email: user.email_address.clone(),
                display_name: user.display_name.clone()
            }
        }))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    issues: Vec<JiraIssue>
}

#[derive(Debug, Deserialize)]
struct JiraIssue {
    key: String,
    fields: JiraFields
}

#[derive(Debug, Deserialize)]
struct JiraFields {
    #[serde(default)]
    summary: String,
    status: Option<NamedRef>,
    parent: Option<KeyRef>,
    issuetype: Option<IssueTypeRef>
}

#[derive(Debug, Deserialize)]
struct NamedRef {
    name: String
}

#[derive(Debug, Deserialize)]
struct KeyRef {
    key: String
}

#[derive(Debug, Deserialize)]
struct IssueTypeRef {
    id: String,
    name: String
}

impl JiraIssue {
    fn into_entity(self) -> RemoteEntity {
        let (issue_type_id, issue_type_name) = self
            .fields
            .issuetype
            .map(|t| (t.id, t.name))
            .unwrap_or_default();

        RemoteEntity {
            id: self.key,
            title: self.fields.summary,
            issue_type_id,
            issue_type_name,
            parent_id: self.fields.parent.map(|p| p.key),
            status: self.fields.status.map(|s| s.name).unwrap_or_default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    key: String
}

#[derive(Debug, Deserialize)]
struct TransitionsResponse {
    #[serde(default)]
    transitions: Vec<JiraTransition>
}

#[derive(Debug, Deserialize)]
struct JiraTransition {
    id: String,
    name: String,
    to: NamedRef
}

#[derive(Debug, Deserialize)]
struct JiraUser {
    #[serde(rename = "accountId")]
    account_id: String,
    #[serde(rename = "emailAddress")]
    email_address: Option<String>,
    #[serde(rename = "displayName")]
    display_name: Option<String>
}
