use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::Path;
use tracker_sync::SyncReport;

use crate::output;

#[derive(Args)]
pub struct RunArgs {
    /// Read everything and report planned changes without touching Jira or the state file
    #[arg(long)]
    pub dry_run: bool,

    /// Output the run report as JSON
    #[arg(long)]
    pub json: bool
}

pub async fn run(config_path: &Path, args: RunArgs) -> Result<()> {
    let mut config = super::load_config(config_path)?;
    config.dry_run |= args.dry_run;

    let service = super::build_service(config)?;
    let report = service.run().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_report(&report);
    Ok(())
}

pub fn print_report(report: &SyncReport) {
    if report.dry_run {
        output::header("Sync Plan (dry run)");
    } else {
        output::header("Sync Results");
    }
    println!();

    if report.snapshot_degraded {
        output::warn("Jira snapshot unavailable; matching relied on live queries");
    }

    let rows = [
        ("Created", report.created, false),
        ("Updated", report.updated, false),
        ("Matched existing", report.matched_existing, false),
        ("Unchanged", report.unchanged, false),
        ("Stale mappings cleaned", report.stale_mappings_cleaned, false),
        ("Status cascades", report.cascade_transitions, false),
        ("Failed", report.failed, true),
        ("  missing parent", report.failed_no_parent, true),
        ("  transition failures", report.transition_failures, true),
        ("Cascade failures", report.cascade_failures, true),
        ("Rows rejected", report.rows_rejected, true),
        ("Unresolved assignees", report.assignee_unresolved, true)
    ];
    for (label, count, is_problem) in rows {
        output::field(label, output::count(count, is_problem));
    }

    if report.has_errors() {
        println!();
        output::subheader("Problems");
        for error in &report.errors {
            println!(
                "  {} {} {}",
                error.external_key.yellow(),
                format!("[{}]", error.kind).dimmed(),
                error.error
            );
        }
    }

    if let Some(seconds) = report.duration_seconds() {
        println!();
        output::info(&format!("Completed in {seconds:.1}s"));
    }
    if report.dry_run {
        output::hint("Remove --dry-run to apply changes");
    }
}
