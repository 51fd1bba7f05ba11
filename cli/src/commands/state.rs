use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use std::path::Path;
use tracker_sync::{FileStateStore, StateStore};

use crate::output;

#[derive(Subcommand)]
pub enum StateCommand {
    #[command(about = "Show identity mappings and cache sizes")]
    Show(ShowArgs),

    #[command(about = "Drop the mapping and fingerprint of one key so it is re-resolved next run")]
    Forget(ForgetArgs)
}

#[derive(Args)]
pub struct ShowArgs {
    /// Output the whole state as JSON
    #[arg(long)]
    pub json: bool
}

#[derive(Args)]
pub struct ForgetArgs {
    /// External key from the sheet's ID column
    pub key: String
}

pub async fn run(config_path: &Path, cmd: StateCommand) -> Result<()> {
    let config = super::load_config(config_path)?;
    let store = FileStateStore::new(&config.state_path);

    match cmd {
        StateCommand::Show(args) => show(&store, args).await,
        StateCommand::Forget(args) => forget(&store, args).await
    }
}

async fn show(store: &FileStateStore, args: ShowArgs) -> Result<()> {
    let state = store.load().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    output::header("Sync State");
    println!();
    output::field("File", store.path().display());
    let last_run = state
        .last_run_at
        .map_or_else(|| "never".to_string(), |at| at.to_rfc3339());
    output::field("Last run", last_run);
    output::field("Mappings", state.identity_map.len());
    output::field("Cached users", state.user_cache.len());
    println!();

    if state.identity_map.is_empty() {
        output::hint("No mappings yet; run `tracker-sync run` first");
        return Ok(());
    }

    output::subheader("Mappings");
    for (key, remote_id) in &state.identity_map {
        let synced = if state.fingerprints.contains_key(key) {
            "synced".green()
        } else {
            "pending".yellow()
        };
        println!("  {:<16} {:<12} {}", key, remote_id.cyan(), synced);
    }
    Ok(())
}

async fn forget(store: &FileStateStore, args: ForgetArgs) -> Result<()> {
    let mut state = store.load().await;

    match state.unbind(&args.key) {
        Some(remote_id) => {
            store.save(&state).await?;
            output::success(&format!("Forgot {} (was {})", args.key, remote_id));
        }
        None => output::warn(&format!("{} has no mapping", args.key))
    }
    Ok(())
}
