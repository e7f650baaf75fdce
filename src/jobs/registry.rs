//! The recurring jobs and their triggers

use crate::core::scheduler::{job_fn, JobScheduler};
use crate::core::trigger::Trigger;
use crate::error::{AppResult, SchedulerError};
use crate::jobs::context::JobContext;
use crate::jobs::handlers;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tracing::error;

pub const FETCH_STOCK_DATA: &str = "fetch_stock_data";
pub const GENERATE_PREDICTIONS: &str = "generate_predictions";
pub const EVALUATE_PREDICTIONS: &str = "evaluate_predictions";
pub const DAILY_NOTIFICATIONS: &str = "daily_notifications";
pub const PRICE_ALERTS: &str = "price_alerts";
pub const DATABASE_CLEANUP: &str = "database_cleanup";

pub const DEFAULT_JOBS: [&str; 6] = [
    FETCH_STOCK_DATA,
    GENERATE_PREDICTIONS,
    EVALUATE_PREDICTIONS,
    DAILY_NOTIFICATIONS,
    PRICE_ALERTS,
    DATABASE_CLEANUP,
];

/// Run a job body, logging a failure instead of handing it to the scheduler
async fn contained<T, Fut>(job: &'static str, body: Fut) -> AppResult<()>
where
    Fut: Future<Output = AppResult<T>>,
{
    if let Err(e) = body.await {
        error!(
            job = %job,
            category = ?e.category(),
            error = %e,
            "Job {} failed: {}",
            job,
            e
        );
    }
    Ok(())
}

/// Register the six recurring jobs with triggers from the schedule settings
pub async fn register_default_jobs(
    scheduler: &JobScheduler,
    ctx: Arc<JobContext>,
) -> Result<(), SchedulerError> {
    let schedule = ctx.settings.schedule.clone();

    let job_ctx = ctx.clone();
    scheduler
        .register(
            FETCH_STOCK_DATA,
            Trigger::interval(schedule.data_fetch_interval)?,
            schedule.data_fetch_grace,
            job_fn(move || {
                let ctx = job_ctx.clone();
                async move { contained(FETCH_STOCK_DATA, handlers::refresh_market_data(&ctx)).await }
            }),
        )
        .await?;

    let job_ctx = ctx.clone();
    scheduler
        .register(
            GENERATE_PREDICTIONS,
            Trigger::interval(schedule.prediction_interval)?,
            schedule.prediction_grace,
            job_fn(move || {
                let ctx = job_ctx.clone();
                async move {
                    contained(
                        GENERATE_PREDICTIONS,
                        handlers::generate_predictions(&ctx, Utc::now()),
                    )
                    .await
                }
            }),
        )
        .await?;

    let job_ctx = ctx.clone();
    scheduler
        .register(
            EVALUATE_PREDICTIONS,
            Trigger::daily_at(schedule.evaluation_hour, 0)?,
            schedule.default_grace,
            job_fn(move || {
                let ctx = job_ctx.clone();
                async move {
                    contained(
                        EVALUATE_PREDICTIONS,
                        handlers::evaluate_predictions(&ctx, Utc::now()),
                    )
                    .await
                }
            }),
        )
        .await?;

    let job_ctx = ctx.clone();
    scheduler
        .register(
            DAILY_NOTIFICATIONS,
            Trigger::daily_at(schedule.notification_hour, 0)?,
            schedule.default_grace,
            job_fn(move || {
                let ctx = job_ctx.clone();
                async move {
                    contained(
                        DAILY_NOTIFICATIONS,
                        handlers::send_daily_digest(&ctx, Utc::now()),
                    )
                    .await
                }
            }),
        )
        .await?;

    let job_ctx = ctx.clone();
    scheduler
        .register(
            PRICE_ALERTS,
            Trigger::interval(schedule.price_alert_interval)?,
            schedule.default_grace,
            job_fn(move || {
                let ctx = job_ctx.clone();
                async move {
                    contained(PRICE_ALERTS, handlers::check_price_alerts(&ctx, Utc::now())).await
                }
            }),
        )
        .await?;

    let job_ctx = ctx;
    scheduler
        .register(
            DATABASE_CLEANUP,
            Trigger::weekly_at(schedule.cleanup_weekday, schedule.cleanup_hour, 0)?,
            schedule.default_grace,
            job_fn(move || {
                let ctx = job_ctx.clone();
                async move {
                    contained(DATABASE_CLEANUP, handlers::cleanup_old_data(&ctx, Utc::now())).await
                }
            }),
        )
        .await?;

    Ok(())
}
