use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::Path;
use tracker_sync::HierarchyLevel;
use tracker_sync::config::SourceConfig;

use crate::output;

#[derive(Args)]
pub struct ValidateArgs {
    /// Print the parsed configuration as JSON
    #[arg(long)]
    pub json: bool
}

pub fn run(config_path: &Path, args: ValidateArgs) -> Result<()> {
    let config = super::load_config(config_path)?;

    if args.json {
        let mut shown = config.clone();
        shown.tracker.api_token = redact(&shown.tracker.api_token);
        if let SourceConfig::GoogleSheets(sheets) = &mut shown.source {
            sheets.api_key = sheets.api_key.as_deref().map(redact);
            sheets.access_token = sheets.access_token.as_deref().map(redact);
        }
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    output::success(&format!("{} is valid", config_path.display()));
    println!();

    let source = match &config.source {
        SourceConfig::GoogleSheets(sheets) => {
            format!("Google Sheets {} ({})", sheets.spreadsheet_id, sheets.range)
        }
        SourceConfig::JsonFile(file) => format!("JSON file {}", file.path.display())
    };
    output::field("Source", source.cyan());
    output::field(
        "Project",
        format!("{} at {}", config.tracker.project_key.cyan(), config.tracker.base_url)
    );
    for level in HierarchyLevel::ORDERED {
        let level_config = config.hierarchy.level(level);
        output::field(
            &format!("Level {level}"),
            format!(
                "{} -> issue type {}",
                level_config.source_kind, level_config.issue_type_id
            )
        );
    }
    output::field("Metric fields", config.metric_fields.len());
    output::field("State file", config.state_path.display());

    if config.tracker.api_token.is_empty() {
        output::warn("No Jira API token configured; set TRACKER_SYNC_JIRA_TOKEN");
    }
    Ok(())
}

fn redact(secret: &str) -> String {
    if secret.is_empty() {
        String::new()
    } else {
        "********".to_string()
    }
}
