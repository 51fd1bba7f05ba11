use tracker_sync::config::{
    HierarchyConfig, JsonFileConfig, LevelConfig, MetricField, MetricFormat, SourceConfig,
    SyncConfig, TrackerConfig
};
use tracker_sync::source::Row;

pub const PROJECT_KEY: &str = "RM";
pub const EPIC_TYPE: &str = "10000";
pub const STORY_TYPE: &str = "10001";
pub const SUBTASK_TYPE: &str = "10002";

fn level(kind: &str, type_id: &str) -> LevelConfig {
    LevelConfig {
        source_kind: kind.to_string(),
        issue_type_id: type_id.to_string(),
        issue_type_name: None
    }
}

/// Epic / Story / Sub-task project `RM` with one `Impact` metric column.
pub fn sample_config() -> SyncConfig {
    let mut config = SyncConfig::new(
        SourceConfig::JsonFile(JsonFileConfig {
            path: "roadmap.json".into(),
            sheet: Some("Roadmap".to_string())
        }),
        TrackerConfig {
            base_url: "https://example.atlassian.net".to_string(),
            project_key: PROJECT_KEY.to_string(),
            email: "bot@example.com".to_string(),
            api_token: "token".to_string(),
            request_timeout_seconds: 30
        },
        HierarchyConfig {
            top: level("Epic", EPIC_TYPE),
            mid: level("Story", STORY_TYPE),
            leaf: level("Sub-task", SUBTASK_TYPE)
        }
    );
    config.metric_fields.push(MetricField {
        column: "Impact".to_string(),
        remote_field: "customfield_100".to_string(),
        placeholder: "TBD".to_string(),
        format: MetricFormat::Text
    });
    config
}

/// Builds one sheet row using the default column names.
pub struct RowBuilder {
    row: Row
}

impl RowBuilder {
    pub fn new(key: &str, kind: &str, title: &str) -> Self {
        let mut row = Row::new();
        row.insert("ID".to_string(), key.to_string());
        row.insert("Type".to_string(), kind.to_string());
        row.insert("Summary".to_string(), title.to_string());
        Self { row }
    }

    pub fn parent(self, key: &str) -> Self {
        self.cell("Parent ID", key)
    }

    pub fn assignee(self, email: &str) -> Self {
        self.cell("Assignee", email)
    }

    pub fn due(self, date: &str) -> Self {
        self.cell("Due Date", date)
    }

    pub fn status(self, status: &str) -> Self {
        self.cell("Status", status)
    }

    pub fn cell(mut self, column: &str, value: &str) -> Self {
        self.row.insert(column.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> Row {
        self.row
    }
}

pub fn epic(key: &str, title: &str) -> RowBuilder {
    RowBuilder::new(key, "Epic", title)
}

pub fn story(key: &str, title: &str, parent: &str) -> RowBuilder {
    RowBuilder::new(key, "Story", title).parent(parent)
}

pub fn subtask(key: &str, title: &str, parent: &str) -> RowBuilder {
    RowBuilder::new(key, "Sub-task", title).parent(parent)
}
