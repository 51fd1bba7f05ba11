use anyhow::Result;
use clap::Args;
use std::path::Path;
use tracker_sync::SyncScheduler;

use crate::output;

#[derive(Args)]
pub struct ScheduleArgs {
    /// Run once immediately before waiting for the first tick
    #[arg(long)]
    pub now: bool
}

pub async fn run(config_path: &Path, args: ScheduleArgs) -> Result<()> {
    let config = super::load_config(config_path)?;
    let interval = config.sync_interval_seconds;
    let service = super::build_service(config.clone())?;

    let mut scheduler = SyncScheduler::new(service, &config).await?;

    if args.now {
        let report = scheduler.run_now().await?;
        super::run::print_report(&report);
        println!();
    }

    scheduler.start().await?;
    output::info(&format!(
        "Syncing every {interval}s; press Ctrl-C to stop"
    ));

    tokio::signal::ctrl_c().await?;
    scheduler.stop().await?;

    if let Some(report) = scheduler.last_report().await {
        output::info(&format!(
            "Last scheduled run: {} created, {} updated, {} failed",
            report.created, report.updated, report.failed
        ));
    }
    Ok(())
}
