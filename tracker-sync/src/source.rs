//! Tabular source access and row-to-record mapping.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::model::{HierarchyLevel, SourceRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tracing::{debug, warn};

/// One data row as `{header: value}`.
pub type Row = HashMap<String, String>;

#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Rows in sheet order, header row excluded.
    async fn fetch_rows(&self, sheet: &str) -> SyncResult<Vec<Row>>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RejectedRow {
    pub row_number: usize,
    pub external_key: String,
    pub reason: String
}

#[derive(Debug, Clone, Default)]
pub struct ParsedRows {
    pub records: Vec<SourceRecord>,
    pub rejected: Vec<RejectedRow>
}

fn cell(row: &Row, column: &str) -> Option<String> {
    let value = row.get(column).or_else(|| {
        let wanted = column.trim().to_lowercase();
        row.iter()
            .find(|(header, _)| header.trim().to_lowercase() == wanted)
            .map(|(_, value)| value)
    })?;

    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Map raw rows onto records using the configured column names.
///
/// Rows with an unknown kind are rejected when they carry a key and dropped
/// silently otherwise (blank spacer rows). Repeated keys keep the first row.
pub fn parse_rows(rows: &[Row], config: &SyncConfig) -> ParsedRows {
    let fields = &config.fields;
    let mut parsed = ParsedRows::default();
    let mut seen_keys = HashSet::new();

    for (index, row) in rows.iter().enumerate() {
        let row_number = index + 2;
        let external_key = cell(row, &fields.key).unwrap_or_default();
        let kind = cell(row, &fields.kind).unwrap_or_default();

        let Some(level) = config.hierarchy.level_for_kind(&kind) else {
            if external_key.is_empty() {
                debug!(row = row_number, "Skipping blank row");
            } else {
                warn!(row = row_number, key = %external_key, kind = %kind, "Unknown entity kind");
                parsed.rejected.push(RejectedRow {
                    row_number,
                    external_key,
                    reason: format!("unknown kind '{kind}'")
                });
            }
            continue;
        };

        if !external_key.is_empty() && !seen_keys.insert(external_key.clone()) {
            warn!(row = row_number, key = %external_key, "Duplicate key, keeping first row");
            parsed.rejected.push(RejectedRow {
                row_number,
                external_key,
                reason: "duplicate key".to_string()
            });
            continue;
        }

        let mut record = SourceRecord::new(
            external_key,
            level,
            cell(row, &fields.title).unwrap_or_default()
        );
        record.row_number = row_number;
        record.parent_key = cell(row, &fields.parent_key);
        record.assignee = cell(row, &fields.assignee);
        record.due_date = cell(row, &fields.due_date);
        record.status = cell(row, &fields.status);

        if level == HierarchyLevel::Top {
            if let Some(parent) = record.parent_key.take() {
                warn!(key = %record.external_key, parent = %parent, "Top-level row has a parent, ignoring it");
            }
            for metric in &config.metric_fields {
                if let Some(value) = cell(row, &metric.column) {
                    record.metrics.insert(metric.column.clone(), value);
                }
            }
        }

        parsed.records.push(record);
    }

    parsed
}

/// Rows read from a local JSON document.
///
/// Accepts either an array of objects, or an object mapping sheet names to
/// such arrays. Non-string cells are rendered as text; `null` becomes empty.
pub struct JsonFileSource {
    path: PathBuf
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

fn json_rows(value: serde_json::Value) -> SyncResult<Vec<Row>> {
    let serde_json::Value::Array(items) = value else {
        return Err(SyncError::SourceError("expected an array of rows".to_string()));
    };

    items
        .into_iter()
        .map(|item| match item {
            serde_json::Value::Object(map) => Ok(map
                .into_iter()
                .map(|(header, value)| {
                    let text = match value {
                        serde_json::Value::String(s) => s,
                        serde_json::Value::Null => String::new(),
                        other => other.to_string()
                    };
                    (header, text)
                })
                .collect()),
            other => Err(SyncError::SourceError(format!(
                "row is not an object: {other}"
            )))
        })
        .collect()
}

#[async_trait]
impl SourceReader for JsonFileSource {
    async fn fetch_rows(&self, sheet: &str) -> SyncResult<Vec<Row>> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            SyncError::SourceError(format!("cannot read {}: {e}", self.path.display()))
        })?;
        let document: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| SyncError::SourceError(format!("invalid JSON: {e}")))?;

        match document {
            serde_json::Value::Object(mut sheets) => {
                let rows = sheets.remove(sheet).ok_or_else(|| {
                    SyncError::SourceError(format!("sheet '{sheet}' not found"))
                })?;
                json_rows(rows)
            }
            other => json_rows(other)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        HierarchyConfig, JsonFileConfig, LevelConfig, MetricField, MetricFormat, SourceConfig,
        TrackerConfig
    };

    fn config() -> SyncConfig {
        let level = |kind: &str, id: &str| LevelConfig {
            source_kind: kind.to_string(),
            issue_type_id: id.to_string(),
            issue_type_name: None
        };
        let mut config = SyncConfig::new(
            SourceConfig::JsonFile(JsonFileConfig {
                path: "rows.json".into(),
                sheet: None
            }),
            TrackerConfig {
                base_url: "https://example.atlassian.net".to_string(),
                project_key: "RM".to_string(),
                email: String::new(),
                api_token: String::new(),
                request_timeout_seconds: 30
            },
            HierarchyConfig {
                top: level("Epic", "1"),
                mid: level("Story", "2"),
                leaf: level("Sub-task", "3")
            }
        );
        config.metric_fields.push(MetricField {
            column: "Impact".to_string(),
            remote_field: "customfield_1".to_string(),
            placeholder: "TBD".to_string(),
            format: MetricFormat::Text
        });
        config
    }

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_maps_columns() {
        let rows = vec![
            row(&[
                ("ID", "E-1"),
                ("Type", "epic"),
                ("Summary", " Launch "),
                ("Impact", "High"),
                ("Status", "")
            ]),
            row(&[
                ("ID", "S-1"),
                ("Type", "Story"),
                ("Summary", "Landing page"),
                ("Parent ID", "E-1"),
                ("Assignee", "ana@example.com"),
                ("Due Date", "1/2/2025"),
                ("Impact", "ignored for stories")
            ]),
        ];

        let parsed = parse_rows(&rows, &config());
        assert!(parsed.rejected.is_empty());
        assert_eq!(parsed.records.len(), 2);

        let epic = &parsed.records[0];
        assert_eq!(epic.level, HierarchyLevel::Top);
        assert_eq!(epic.title, "Launch");
        assert_eq!(epic.status, None);
        assert_eq!(epic.metrics.get("Impact").map(String::as_str), Some("High"));
        assert_eq!(epic.row_number, 2);

        let story = &parsed.records[1];
        assert_eq!(story.parent_key.as_deref(), Some("E-1"));
        assert_eq!(story.assignee.as_deref(), Some("ana@example.com"));
        assert!(story.metrics.is_empty());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let rows = vec![row(&[("id", "E-1"), ("TYPE", "Epic"), ("summary ", "x")])];
        let parsed = parse_rows(&rows, &config());
        assert_eq!(parsed.records[0].external_key, "E-1");
        assert_eq!(parsed.records[0].title, "x");
    }

    #[test]
    fn test_unknown_kind_and_duplicates_rejected() {
        let rows = vec![
            row(&[("ID", "B-1"), ("Type", "Bug"), ("Summary", "crash")]),
            row(&[("ID", ""), ("Type", ""), ("Summary", "")]),
            row(&[("ID", "E-1"), ("Type", "Epic"), ("Summary", "first")]),
            row(&[("ID", "E-1"), ("Type", "Epic"), ("Summary", "second")]),
        ];

        let parsed = parse_rows(&rows, &config());
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].title, "first");
        assert_eq!(parsed.rejected.len(), 2);
        assert_eq!(parsed.rejected[0].reason, "unknown kind 'Bug'");
        assert_eq!(parsed.rejected[1].reason, "duplicate key");
        assert_eq!(parsed.rejected[1].row_number, 5);
    }

    #[test]
    fn test_top_level_parent_dropped() {
        let rows = vec![row(&[
            ("ID", "E-1"),
            ("Type", "Epic"),
            ("Summary", "x"),
            ("Parent ID", "E-0")
        ])];
        let parsed = parse_rows(&rows, &config());
        assert_eq!(parsed.records[0].parent_key, None);
    }

    #[tokio::test]
    async fn test_json_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json");
        std::fs::write(
            &path,
            r#"{"Roadmap": [{"ID": "E-1", "Type": "Epic", "Summary": "x", "Points": 3, "Status": null}]}"#
        )
        .unwrap();

        let source = JsonFileSource::new(&path);
        let rows = source.fetch_rows("Roadmap").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["Points"], "3");
        assert_eq!(rows[0]["Status"], "");

        let missing = source.fetch_rows("Other").await;
        assert!(matches!(missing, Err(SyncError::SourceError(_))));
    }
}
