//! # Sync Configuration
//!
//! Every piece of domain vocabulary the engine needs (column names, status
//! labels, hierarchy level to issue type table) lives here and is handed to
//! the engine as one immutable value.
//!
//! Files are TOML or YAML, picked by extension. Secrets can be supplied via
//! environment variables:
//! - `TRACKER_SYNC_JIRA_EMAIL`
//! - `TRACKER_SYNC_JIRA_TOKEN`
//! - `TRACKER_SYNC_SHEETS_API_KEY`
//! - `TRACKER_SYNC_SHEETS_TOKEN`

use crate::error::{SyncError, SyncResult};
use crate::model::{HierarchyLevel, RemoteEntity};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use utils::labels_match;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SyncConfig {
    pub source: SourceConfig,

    #[validate(nested)]
    pub tracker: TrackerConfig,

    #[serde(default)]
    pub fields: FieldMapping,

    #[validate(nested)]
    pub hierarchy: HierarchyConfig,

    #[serde(default)]
    pub statuses: StatusVocabulary,

    #[serde(default)]
    #[validate(nested)]
    pub metric_fields: Vec<MetricField>,

    #[serde(default)]
    pub defaults: CreateDefaults,

    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    /// Upper bound on the bulk snapshot. Entities past it are invisible to
    /// drift detection and name matching.
    #[serde(default = "default_snapshot_limit")]
    #[validate(range(min = 1, max = 10000))]
    pub snapshot_limit: usize,

    #[serde(default = "default_point_query_limit")]
    #[validate(range(min = 1, max = 100))]
    pub point_query_limit: usize,

    #[serde(default = "default_sync_interval")]
    #[validate(range(min = 60, max = 86400))]
    pub sync_interval_seconds: u64,

    #[serde(default)]
    pub dry_run: bool,

    #[serde(default = "default_retry_config")]
    pub retry: RetryConfig
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    GoogleSheets(SheetsConfig),
    JsonFile(JsonFileConfig)
}

impl SourceConfig {
    /// Identifier handed to `SourceReader::fetch_rows`.
    pub fn sheet(&self) -> &str {
        match self {
            Self::GoogleSheets(sheets) => &sheets.range,
            Self::JsonFile(file) => file.sheet.as_deref().unwrap_or("default")
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    #[serde(default = "default_sheet_range")]
    pub range: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_sheets_base_url")]
    pub base_url: String
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonFileConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub sheet: Option<String>
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TrackerConfig {
    #[validate(url)]
    pub base_url: String,

    #[validate(length(min = 1, max = 64))]
    pub project_key: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub api_token: String,

    #[serde(default = "default_request_timeout")]
    #[validate(range(min = 1, max = 300))]
    pub request_timeout_seconds: u64
}

impl TrackerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Header names of the source sheet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FieldMapping {
    pub key: String,
    pub kind: String,
    pub title: String,
    pub parent_key: String,
    pub assignee: String,
    pub due_date: String,
    pub status: String
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            key: "ID".to_string(),
            kind: "Type".to_string(),
            title: "Summary".to_string(),
            parent_key: "Parent ID".to_string(),
            assignee: "Assignee".to_string(),
            due_date: "Due Date".to_string(),
            status: "Status".to_string()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct HierarchyConfig {
    #[validate(nested)]
    pub top: LevelConfig,
    #[validate(nested)]
    pub mid: LevelConfig,
    #[validate(nested)]
    pub leaf: LevelConfig
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LevelConfig {
    /// Value of the kind column, e.g. "Epic".
    #[validate(length(min = 1))]
    pub source_kind: String,

    #[validate(length(min = 1))]
    pub issue_type_id: String,

    /// Tracker-side type name when it differs from `source_kind`.
    #[serde(default)]
    pub issue_type_name: Option<String>
}

impl LevelConfig {
    fn matches_remote(&self, entity: &RemoteEntity) -> bool {
        entity.issue_type_id == self.issue_type_id
            || labels_match(
                &entity.issue_type_name,
                self.issue_type_name.as_deref().unwrap_or(&self.source_kind)
            )
    }
}

impl HierarchyConfig {
    pub fn level(&self, level: HierarchyLevel) -> &LevelConfig {
        match level {
            HierarchyLevel::Top => &self.top,
            HierarchyLevel::Mid => &self.mid,
            HierarchyLevel::Leaf => &self.leaf
        }
    }

    pub fn level_for_kind(&self, kind: &str) -> Option<HierarchyLevel> {
        HierarchyLevel::ORDERED
            .into_iter()
            .find(|level| labels_match(&self.level(*level).source_kind, kind))
    }

    pub fn level_of_remote(&self, entity: &RemoteEntity) -> Option<HierarchyLevel> {
        HierarchyLevel::ORDERED
            .into_iter()
            .find(|level| self.level(*level).matches_remote(entity))
    }
}

/// Status labels the engine is allowed to request, plus the groupings the
/// cascade reasons about. All comparisons are case-insensitive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StatusVocabulary {
    pub recognized: Vec<String>,
    pub done: String,
    pub in_progress: Vec<String>,
    pub not_started: Vec<String>,
    pub on_track: String,
    pub initial: String
}

impl Default for StatusVocabulary {
    fn default() -> Self {
        Self {
            recognized: ["To Do", "In Progress", "On Track", "At Risk", "Off Track", "Blocked", "Done"]
                .into_iter()
                .map(String::from)
                .collect(),
            done: "Done".to_string(),
            in_progress: ["In Progress", "On Track", "At Risk", "Off Track", "Blocked"]
                .into_iter()
                .map(String::from)
                .collect(),
            not_started: ["To Do", "Backlog", "Open"]
                .into_iter()
                .map(String::from)
                .collect(),
            on_track: "On Track".to_string(),
            initial: "To Do".to_string()
        }
    }
}

impl StatusVocabulary {
    /// Configured spelling of `label`, if it is a recognized target.
    pub fn canonical(&self, label: &str) -> Option<&str> {
        self.recognized
            .iter()
            .find(|known| labels_match(known, label))
            .map(String::as_str)
    }

    pub fn is_done(&self, status: &str) -> bool {
        labels_match(&self.done, status)
    }

    pub fn is_in_progress(&self, status: &str) -> bool {
        self.in_progress.iter().any(|s| labels_match(s, status))
    }

    pub fn is_not_started(&self, status: &str) -> bool {
        self.not_started.iter().any(|s| labels_match(s, status))
    }
}

/// A top-level metric column and the remote field it populates.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct MetricField {
    #[validate(length(min = 1))]
    pub column: String,

    #[validate(length(min = 1))]
    pub remote_field: String,

    /// Sent when the cell is blank; the tracker requires a value.
    #[serde(default = "default_metric_placeholder")]
    pub placeholder: String,

    #[serde(default)]
    pub format: MetricFormat
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MetricFormat {
    #[default]
    Text,
    /// Single-select field, sent as `{"value": ...}`.
    Option
}

impl MetricField {
    /// Remote payload for a cell value, falling back to the placeholder.
    pub fn render(&self, value: Option<&str>) -> serde_json::Value {
        let value = value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(&self.placeholder);
        match self.format {
            MetricFormat::Text => serde_json::Value::String(value.to_string()),
            MetricFormat::Option => serde_json::json!({ "value": value })
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CreateDefaults {
    /// Due date for new entities without a parseable date, in days from today.
    pub due_offset_days: i64
}

impl Default for CreateDefaults {
    fn default() -> Self {
        Self { due_offset_days: 14 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64
}

fn default_retry_config() -> RetryConfig {
    RetryConfig {
        max_retries: 3,
        initial_backoff_ms: 500,
        max_backoff_ms: 10000
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        default_retry_config()
    }
}

fn default_state_path() -> PathBuf {
    PathBuf::from(".tracker-sync/state.json")
}

fn default_snapshot_limit() -> usize {
    1000
}

fn default_point_query_limit() -> usize {
    50
}

fn default_sync_interval() -> u64 {
    300
}

fn default_request_timeout() -> u64 {
    30
}

fn default_sheet_range() -> String {
    "Sheet1".to_string()
}

fn default_sheets_base_url() -> String {
    "https://sheets.googleapis.com".to_string()
}

fn default_metric_placeholder() -> String {
    "TBD".to_string()
}

impl SyncConfig {
    pub fn new(source: SourceConfig, tracker: TrackerConfig, hierarchy: HierarchyConfig) -> Self {
        Self {
            source,
            tracker,
            fields: FieldMapping::default(),
            hierarchy,
            statuses: StatusVocabulary::default(),
            metric_fields: Vec::new(),
            defaults: CreateDefaults::default(),
            state_path: default_state_path(),
            snapshot_limit: default_snapshot_limit(),
            point_query_limit: default_point_query_limit(),
            sync_interval_seconds: default_sync_interval(),
            dry_run: false,
            retry: default_retry_config()
        }
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_seconds)
    }

    /// Load from file, apply environment overrides and validate.
    pub fn load(path: &Path) -> SyncResult<Self> {
        let mut config = load_from_file(path)?;
        config.apply_env_overrides();
        config.check()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(email) = env::var("TRACKER_SYNC_JIRA_EMAIL") {
            self.tracker.email = email;
        }
        if let Ok(token) = env::var("TRACKER_SYNC_JIRA_TOKEN") {
            self.tracker.api_token = token;
        }
        if let SourceConfig::GoogleSheets(sheets) = &mut self.source {
            if let Ok(key) = env::var("TRACKER_SYNC_SHEETS_API_KEY") {
                sheets.api_key = Some(key);
            }
            if let Ok(token) = env::var("TRACKER_SYNC_SHEETS_TOKEN") {
                sheets.access_token = Some(token);
            }
        }
    }

    /// Field validation plus the cross-field rules `validator` cannot express.
    pub fn check(&self) -> SyncResult<()> {
        self.validate()
            .map_err(|e| SyncError::ConfigError(e.to_string()))?;

        let mut kinds = HashSet::new();
        for level in HierarchyLevel::ORDERED {
            let kind = self.hierarchy.level(level).source_kind.to_lowercase();
            if !kinds.insert(kind) {
                return Err(SyncError::ConfigError(format!(
                    "hierarchy kind '{}' is used by more than one level",
                    self.hierarchy.level(level).source_kind
                )));
            }
        }

        let statuses = &self.statuses;
        for (name, label) in [
            ("done", &statuses.done),
            ("on_track", &statuses.on_track),
            ("initial", &statuses.initial)
        ] {
            if statuses.canonical(label).is_none() {
                return Err(SyncError::ConfigError(format!(
                    "statuses.{name} '{label}' is not in statuses.recognized"
                )));
            }
        }

        let mut columns = HashSet::new();
        for metric in &self.metric_fields {
            if !columns.insert(metric.column.to_lowercase()) {
                return Err(SyncError::ConfigError(format!(
                    "metric column '{}' is listed twice",
                    metric.column
                )));
            }
        }

        if let SourceConfig::GoogleSheets(sheets) = &self.source {
            if sheets.spreadsheet_id.trim().is_empty() {
                return Err(SyncError::ConfigError(
                    "source.spreadsheet_id must not be empty".to_string()
                ));
            }
        }

        Ok(())
    }
}

pub fn load_from_toml(path: &Path) -> SyncResult<SyncConfig> {
    let contents = read_config(path)?;
    toml::from_str(&contents).map_err(|e| SyncError::ConfigError(format!("TOML: {e}")))
}

pub fn load_from_yaml(path: &Path) -> SyncResult<SyncConfig> {
    let contents = read_config(path)?;
    serde_yaml::from_str(&contents).map_err(|e| SyncError::ConfigError(format!("YAML: {e}")))
}

/// Pick the loader from the file extension.
pub fn load_from_file(path: &Path) -> SyncResult<SyncConfig> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| {
            SyncError::ConfigError(format!("{} has no extension", path.display()))
        })?;

    match extension.to_lowercase().as_str() {
        "toml" => load_from_toml(path),
        "yaml" | "yml" => load_from_yaml(path),
        other => Err(SyncError::ConfigError(format!(
            "unsupported config format: {other}"
        )))
    }
}

fn read_config(path: &Path) -> SyncResult<String> {
    std::fs::read_to_string(path).map_err(|e| {
        SyncError::ConfigError(format!("cannot read {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE_TOML: &str = r#"
state_path = "state.json"

[source]
type = "google_sheets"
spreadsheet_id = "abc123"
range = "Roadmap"

[tracker]
base_url = "https://example.atlassian.net"
project_key = "RM"

[hierarchy.top]
source_kind = "Epic"
issue_type_id = "10000"

[hierarchy.mid]
source_kind = "Story"
issue_type_id = "10001"

[hierarchy.leaf]
source_kind = "Sub-task"
issue_type_id = "10002"

[[metric_fields]]
column = "Impact"
remote_field = "customfield_10050"
"#;

    fn sample_file(contents: &str, suffix: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_toml_with_defaults() {
        let file = sample_file(SAMPLE_TOML, ".toml");
        let config = load_from_file(file.path()).unwrap();

        assert_eq!(config.tracker.project_key, "RM");
        assert_eq!(config.source.sheet(), "Roadmap");
        assert_eq!(config.fields, FieldMapping::default());
        assert_eq!(config.snapshot_limit, 1000);
        assert_eq!(config.metric_fields[0].placeholder, "TBD");
        assert_eq!(config.tracker.request_timeout_seconds, 30);
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_load_yaml() {
        let yaml = r#"
source:
  type: json_file
  path: rows.json
tracker:
  base_url: https://example.atlassian.net
  project_key: RM
hierarchy:
  top: { source_kind: Epic, issue_type_id: "1" }
  mid: { source_kind: Story, issue_type_id: "2" }
  leaf: { source_kind: Sub-task, issue_type_id: "3" }
"#;
        let file = sample_file(yaml, ".yaml");
        let config = load_from_file(file.path()).unwrap();
        assert!(matches!(config.source, SourceConfig::JsonFile(_)));
        assert_eq!(config.source.sheet(), "default");
    }

    #[test]
    fn test_unsupported_extension() {
        let file = sample_file("{}", ".ini");
        let err = load_from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn test_duplicate_hierarchy_kind_rejected() {
        let file = sample_file(SAMPLE_TOML, ".toml");
        let mut config = load_from_file(file.path()).unwrap();
        config.hierarchy.leaf.source_kind = "story".to_string();
        assert!(config.check().is_err());
    }

    #[test]
    fn test_initial_status_must_be_recognized() {
        let file = sample_file(SAMPLE_TOML, ".toml");
        let mut config = load_from_file(file.path()).unwrap();
        config.statuses.initial = "Someday".to_string();
        let err = config.check().unwrap_err();
        assert!(err.to_string().contains("statuses.initial"));
    }

    #[test]
    fn test_invalid_tracker_url_rejected() {
        let file = sample_file(SAMPLE_TOML, ".toml");
        let mut config = load_from_file(file.path()).unwrap();
        config.tracker.base_url = "not a url".to_string();
        assert!(config.check().is_err());
    }

    #[test]
    fn test_metric_render() {
        let mut metric = MetricField {
            column: "Impact".to_string(),
            remote_field: "customfield_1".to_string(),
            placeholder: "TBD".to_string(),
            format: MetricFormat::Text
        };
        assert_eq!(metric.render(Some(" High ")), serde_json::json!("High"));
        assert_eq!(metric.render(Some("")), serde_json::json!("TBD"));

        metric.format = MetricFormat::Option;
        assert_eq!(metric.render(None), serde_json::json!({ "value": "TBD" }));
    }

    #[test]
    fn test_status_vocabulary_lookup() {
        let statuses = StatusVocabulary::default();
        assert_eq!(statuses.canonical("on track"), Some("On Track"));
        assert_eq!(statuses.canonical("Maybe"), None);
        assert!(statuses.is_done("DONE"));
        assert!(statuses.is_in_progress("at risk"));
        assert!(statuses.is_not_started("backlog"));
    }

    #[test]
    fn test_level_lookup() {
        let file = sample_file(SAMPLE_TOML, ".toml");
        let config = load_from_file(file.path()).unwrap();
        assert_eq!(
            config.hierarchy.level_for_kind("sub-task"),
            Some(HierarchyLevel::Leaf)
        );
        assert_eq!(config.hierarchy.level_for_kind("Bug"), None);

        let entity = RemoteEntity {
            id: "RM-1".to_string(),
            title: "x".to_string(),
            issue_type_id: "10001".to_string(),
            issue_type_name: "Story".to_string(),
            parent_id: None,
            status: "To Do".to_string()
        };
        assert_eq!(
            config.hierarchy.level_of_remote(&entity),
            Some(HierarchyLevel::Mid)
        );
    }
}
