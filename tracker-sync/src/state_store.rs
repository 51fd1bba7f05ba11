use crate::error::{SyncError, SyncResult};
use crate::state::{PersistentState, STATE_VERSION};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Load-once/save-once persistence for [`PersistentState`].
///
/// `load` never fails: a missing or unreadable store yields the empty state.
/// `save` replaces the whole document.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self) -> PersistentState;
    async fn save(&self, state: &PersistentState) -> SyncResult<()>;
}

/// Pretty-printed JSON file, replaced atomically on save.
pub struct FileStateStore {
    path: PathBuf
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> PersistentState {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No state file yet, starting empty");
                return PersistentState::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "State file unreadable, starting empty");
                return PersistentState::default();
            }
        };

        match serde_json::from_slice::<PersistentState>(&bytes) {
            Ok(state) => {
                if state.version > STATE_VERSION {
                    warn!(
                        found = state.version,
                        supported = STATE_VERSION,
                        "State file written by a newer version"
                    );
                }
                debug!(
                    mappings = state.identity_map.len(),
                    fingerprints = state.fingerprints.len(),
                    "Loaded sync state"
                );
                state
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "State file corrupt, starting empty");
                PersistentState::default()
            }
        }
    }

    async fn save(&self, state: &PersistentState) -> SyncResult<()> {
        let data = serde_json::to_vec_pretty(state)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomically(&path, &data))
            .await
            .map_err(|e| SyncError::PersistenceError(e.to_string()))??;

        debug!(path = %self.path.display(), "Saved sync state");
        Ok(())
    }
}

fn write_atomically(path: &Path, data: &[u8]) -> SyncResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from(".")
    };
    std::fs::create_dir_all(&dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| SyncError::PersistenceError(e.to_string()))?;
    Ok(())
}
