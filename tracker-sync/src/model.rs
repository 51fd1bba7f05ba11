use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One of the fixed, ordered entity kinds. Parents sit exactly one level up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HierarchyLevel {
    Top,
    Mid,
    Leaf
}

impl HierarchyLevel {
    /// Processing order: parents before children.
    pub const ORDERED: [HierarchyLevel; 3] = [Self::Top, Self::Mid, Self::Leaf];

    pub fn parent(self) -> Option<Self> {
        match self {
            Self::Top => None,
            Self::Mid => Some(Self::Top),
            Self::Leaf => Some(Self::Mid)
        }
    }

    pub fn child(self) -> Option<Self> {
        match self {
            Self::Top => Some(Self::Mid),
            Self::Mid => Some(Self::Leaf),
            Self::Leaf => None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Mid => "mid",
            Self::Leaf => "leaf"
        }
    }
}

impl fmt::Display for HierarchyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the tabular source, already mapped onto engine fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub external_key: String,
    pub level: HierarchyLevel,
    pub title: String,
    pub parent_key: Option<String>,
    pub assignee: Option<String>,
    pub due_date: Option<String>,
    pub status: Option<String>,
    /// Metric values keyed by source column; populated for the top level only.
    #[serde(default)]
    pub metrics: BTreeMap<String, String>,
    /// 1-based sheet row, for diagnostics.
    #[serde(default)]
    pub row_number: usize
}

impl SourceRecord {
    pub fn new(
        external_key: impl Into<String>,
        level: HierarchyLevel,
        title: impl Into<String>
    ) -> Self {
        Self {
            external_key: external_key.into(),
            level,
            title: title.into(),
            parent_key: None,
            assignee: None,
            due_date: None,
            status: None,
            metrics: BTreeMap::new(),
            row_number: 0
        }
    }

    pub fn is_managed(&self) -> bool {
        !self.external_key.trim().is_empty()
    }
}

/// An entity as the tracker currently reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntity {
    pub id: String,
    pub title: String,
    pub issue_type_id: String,
    pub issue_type_name: String,
    pub parent_id: Option<String>,
    pub status: String
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hierarchy_relations() {
        assert_eq!(HierarchyLevel::Top.parent(), None);
        assert_eq!(HierarchyLevel::Leaf.parent(), Some(HierarchyLevel::Mid));
        assert_eq!(HierarchyLevel::Top.child(), Some(HierarchyLevel::Mid));
        assert_eq!(HierarchyLevel::Leaf.child(), None);
        assert!(HierarchyLevel::Top < HierarchyLevel::Mid);
        assert!(HierarchyLevel::Mid < HierarchyLevel::Leaf);
    }

    #[test]
    fn test_level_serialization() {
        let json = serde_json::to_string(&HierarchyLevel::Leaf).unwrap();
        assert_eq!(json, "\"leaf\"");
    }

    #[test]
    fn test_unmanaged_record() {
        let record = SourceRecord::new("  ", HierarchyLevel::Top, "Orphan row");
        assert!(!record.is_managed());
    }
}
