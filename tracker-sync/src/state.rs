use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const STATE_VERSION: u32 = 1;

/// Everything remembered between runs.
///
/// Maps are ordered so the persisted file diffs cleanly between runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistentState {
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
    /// external key -> remote id
    #[serde(default)]
    pub identity_map: BTreeMap<String, String>,
    /// assignee email -> tracker account id
    #[serde(default)]
    pub user_cache: BTreeMap<String, String>,
    /// external key -> fingerprint last applied successfully
    #[serde(default)]
    pub fingerprints: BTreeMap<String, String>
}

fn current_version() -> u32 {
    STATE_VERSION
}

impl Default for PersistentState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            last_run_at: None,
            identity_map: BTreeMap::new(),
            user_cache: BTreeMap::new(),
            fingerprints: BTreeMap::new()
        }
    }
}

impl PersistentState {
    pub fn remote_id(&self, external_key: &str) -> Option<&str> {
        self.identity_map.get(external_key).map(String::as_str)
    }

    pub fn bind(&mut self, external_key: &str, remote_id: &str) {
        self.identity_map
            .insert(external_key.to_string(), remote_id.to_string());
    }

    /// Drop the mapping and the fingerprint together, so the record is
    /// treated as changed on the next selection.
    pub fn unbind(&mut self, external_key: &str) -> Option<String> {
        self.fingerprints.remove(external_key);
        self.identity_map.remove(external_key)
    }

    pub fn fingerprint_matches(&self, external_key: &str, fingerprint: &str) -> bool {
        self.fingerprints
            .get(external_key)
            .is_some_and(|stored| stored == fingerprint)
    }

    pub fn record_fingerprint(&mut self, external_key: &str, fingerprint: String) {
        self.fingerprints
            .insert(external_key.to_string(), fingerprint);
    }

    pub fn cached_account(&self, email: &str) -> Option<&str> {
        self.user_cache
            .get(&email.to_lowercase())
            .map(String::as_str)
    }

    pub fn cache_account(&mut self, email: &str, account_id: &str) {
        self.user_cache
            .insert(email.to_lowercase(), account_id.to_string());
    }
}
