use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::report::SyncReport;
use crate::sync::TrackerSyncService;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

/// Cron expression firing every `interval_seconds`, rounded down to whole
/// minutes below an hour and to whole hours above. Daily at most.
pub fn cron_expression(interval_seconds: u64) -> String {
    let minutes = (interval_seconds / 60).max(1);
    if minutes < 60 {
        return format!("0 */{minutes} * * * *");
    }
    match minutes / 60 {
        hours @ 1..=23 => format!("0 0 */{hours} * * *"),
        _ => "0 0 0 * * *".to_string()
    }
}

pub struct SyncScheduler {
    scheduler: JobScheduler,
    sync_service: Arc<TrackerSyncService>,
    last_report: Arc<RwLock<Option<SyncReport>>>,
    run_lock: Arc<Mutex<()>>
}

impl SyncScheduler {
    pub async fn new(sync_service: TrackerSyncService, config: &SyncConfig) -> SyncResult<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| SyncError::SchedulerError(e.to_string()))?;

        let sync_service = Arc::new(sync_service);
        let last_report = Arc::new(RwLock::new(None));
        let run_lock = Arc::new(Mutex::new(()));

        let cron = cron_expression(config.sync_interval_seconds);

        let service_clone = sync_service.clone();
        let report_clone = last_report.clone();
        let lock_clone = run_lock.clone();

        let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
            let service = service_clone.clone();
            let report = report_clone.clone();
            let run_lock = lock_clone.clone();
            Box::pin(async move {
                let Ok(_guard) = run_lock.try_lock() else {
                    warn!("Previous sync still running, skipping this tick");
                    return;
                };
                info!("Starting scheduled sync");
                match service.run().await {
                    Ok(sync_report) => {
                        info!(
                            created = sync_report.created,
                            updated = sync_report.updated,
                            failed = sync_report.failed,
                            "Scheduled sync completed"
                        );
                        let mut guard = report.write().await;
                        *guard = Some(sync_report);
                    }
                    Err(e) => {
                        error!(error = %e, "Scheduled sync failed");
                    }
                }
            })
        })
        .map_err(|e| SyncError::SchedulerError(e.to_string()))?;

        scheduler
            .add(job)
            .await
            .map_err(|e| SyncError::SchedulerError(e.to_string()))?;

        info!(cron = %cron, "Sync job registered");

        Ok(Self {
            scheduler,
            sync_service,
            last_report,
            run_lock
        })
    }

    pub async fn start(&self) -> SyncResult<()> {
        self.scheduler
            .start()
            .await
            .map_err(|e| SyncError::SchedulerError(e.to_string()))?;
        info!("Sync scheduler started");
        Ok(())
    }

    pub async fn stop(&mut self) -> SyncResult<()> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| SyncError::SchedulerError(e.to_string()))?;
        info!("Sync scheduler stopped");
        Ok(())
    }

    /// Run immediately, waiting for any scheduled run in flight.
    pub async fn run_now(&self) -> SyncResult<SyncReport> {
        let _guard = self.run_lock.lock().await;
        let report = self.sync_service.run().await?;
        let mut last = self.last_report.write().await;
        *last = Some(report.clone());
        Ok(report)
    }

    pub async fn last_report(&self) -> Option<SyncReport> {
        self.last_report.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cron_expression_generation() {
        assert_eq!(cron_expression(300), "0 */5 * * * *");
        assert_eq!(cron_expression(3600), "0 0 */1 * * *");
        assert_eq!(cron_expression(7200), "0 0 */2 * * *");
        assert_eq!(cron_expression(86400), "0 0 0 * * *");
    }

    #[test]
    fn test_cron_expression_has_one_minute_floor() {
        assert_eq!(cron_expression(59), "0 */1 * * * *");
    }
}
