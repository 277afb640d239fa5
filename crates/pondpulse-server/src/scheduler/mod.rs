//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring aggregation jobs: five-minute sampling, the nightly day
//! rollup (which also seeds the current periods), the Monday week rollup,
//! and the first-of-month month rollup. Every job runs with default
//! periods; operators trigger explicit periods through the API or CLI.

use std::sync::Arc;

use pondpulse_agg::jobs;
use pondpulse_store::PgStore;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::sensors::HttpSensorSource;

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process — dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    store: PgStore,
    sensors: HttpSensorSource,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_sampling_job(&scheduler, store.clone(), sensors).await?;
    register_day_rollup_job(&scheduler, store.clone()).await?;
    register_week_rollup_job(&scheduler, store.clone()).await?;
    register_month_rollup_job(&scheduler, store).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Samples every owner's live sensors every five minutes.
async fn register_sampling_job(
    scheduler: &JobScheduler,
    store: PgStore,
    sensors: HttpSensorSource,
) -> Result<(), JobSchedulerError> {
    let store = Arc::new(store);
    let sensors = Arc::new(sensors);

    let job = Job::new_async("0 */5 * * * *", move |_uuid, _lock| {
        let store = Arc::clone(&store);
        let sensors = Arc::clone(&sensors);

        Box::pin(async move {
            match jobs::sample_all(store.as_ref(), sensors.as_ref()).await {
                Ok(summary) => tracing::info!(
                    processed = summary.processed,
                    skipped = summary.skipped,
                    errors = summary.errors,
                    "scheduler: sampling run complete"
                ),
                Err(e) => tracing::error!(error = %e, "scheduler: sampling run failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Rolls up yesterday for every owner shortly after midnight, then seeds
/// the new current periods.
async fn register_day_rollup_job(
    scheduler: &JobScheduler,
    store: PgStore,
) -> Result<(), JobSchedulerError> {
    let store = Arc::new(store);

    let job = Job::new_async("0 10 0 * * *", move |_uuid, _lock| {
        let store = Arc::clone(&store);

        Box::pin(async move {
            if let Err(e) = jobs::rollup_day_all(store.as_ref(), None).await {
                tracing::error!(error = %e, "scheduler: day rollup failed");
            }
            if let Err(e) = jobs::ensure_seeds_all(store.as_ref()).await {
                tracing::error!(error = %e, "scheduler: current-period seeding failed");
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Rolls up the previous ISO week every Monday.
async fn register_week_rollup_job(
    scheduler: &JobScheduler,
    store: PgStore,
) -> Result<(), JobSchedulerError> {
    let store = Arc::new(store);

    let job = Job::new_async("0 30 0 * * MON", move |_uuid, _lock| {
        let store = Arc::clone(&store);

        Box::pin(async move {
            if let Err(e) = jobs::rollup_week_all(store.as_ref(), None).await {
                tracing::error!(error = %e, "scheduler: week rollup failed");
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Rolls up the previous month on the first of each month.
async fn register_month_rollup_job(
    scheduler: &JobScheduler,
    store: PgStore,
) -> Result<(), JobSchedulerError> {
    let store = Arc::new(store);

    let job = Job::new_async("0 45 0 1 * *", move |_uuid, _lock| {
        let store = Arc::clone(&store);

        Box::pin(async move {
            if let Err(e) = jobs::rollup_month_all(store.as_ref(), None).await {
                tracing::error!(error = %e, "scheduler: month rollup failed");
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}
