pub mod run;
pub mod schedule;
pub mod state;
pub mod validate;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracker_sync::config::SourceConfig;
use tracker_sync::source::SourceReader;
use tracker_sync::{
    FileStateStore, JiraClient, JsonFileSource, SheetsClient, SyncConfig, TrackerSyncService
};

#[derive(Parser)]
#[command(
    name = "tracker-sync",
    author,
    version,
    about = "Keep a Jira project in step with a roadmap spreadsheet",
    long_about = "The spreadsheet is authoritative. Each run creates or updates the matching \
                  Jira issues parent-first,\nrepairs mappings to issues deleted in Jira and rolls \
                  child statuses up the hierarchy."
)]
pub struct Cli {
    /// Configuration file (TOML or YAML)
    #[arg(long, short, global = true, env = "TRACKER_SYNC_CONFIG", default_value = "tracker-sync.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run one reconciliation")]
    Run(run::RunArgs),

    #[command(about = "Run reconciliations periodically until interrupted")]
    Schedule(schedule::ScheduleArgs),

    #[command(about = "Check the configuration file")]
    Validate(validate::ValidateArgs),

    #[command(subcommand, about = "Inspect or edit the persisted sync state")]
    State(state::StateCommand)
}

pub fn load_config(path: &Path) -> Result<SyncConfig> {
    SyncConfig::load(path).with_context(|| format!("loading {}", path.display()))
}

/// Wire the configured adapters into a service.
pub fn build_service(config: SyncConfig) -> Result<TrackerSyncService> {
    let source: Arc<dyn SourceReader> = match &config.source {
        SourceConfig::GoogleSheets(sheets) => Arc::new(SheetsClient::new(sheets.clone())?),
        SourceConfig::JsonFile(file) => Arc::new(JsonFileSource::new(&file.path))
    };
    let tracker = Arc::new(JiraClient::new(config.tracker.clone(), config.retry.clone())?);
    let store = Arc::new(FileStateStore::new(&config.state_path));

    Ok(TrackerSyncService::new(config, source, tracker, store))
}
