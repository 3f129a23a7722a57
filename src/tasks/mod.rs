//! Recurring background jobs.
//!
//! `spawn_all` starts the deferred job worker and the subscription expiry
//! sweep. Call it once during startup.

use crate::config::TasksConfig;
use crate::error::{AppError, AppResult};
use crate::services::subscription_service::today;
use crate::services::task_queue::COMPLETE_EXERCISE_JOB;
use crate::services::{CompleteExercisePayload, DbTaskQueue, ProgressService, SubscriptionService};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Outcome of one pass over the due jobs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JobRunReport {
    pub done: usize,
    pub failed: usize,
}

/// Runs every job due at `now`, at most `limit` of them.
pub async fn run_due_jobs(
    queue: &DbTaskQueue,
    progress: &ProgressService,
    now: DateTime<Utc>,
    limit: u64,
) -> AppResult<JobRunReport> {
    let mut report = JobRunReport::default();
    for row in queue.due(now, limit).await? {
        let result = match row.job_name.as_str() {
            COMPLETE_EXERCISE_JOB => {
                match serde_json::from_value::<CompleteExercisePayload>(row.payload.clone()) {
                    Ok(p) => {
                        progress
                            .complete_exercise(p.user_id, p.session_id, p.exercise_id)
                            .await
                    }
                    Err(e) => Err(AppError::from(e)),
                }
            }
            other => Err(AppError::InternalError(format!("unknown job {other}"))),
        };

        let job_id = row.id;
        match result {
            Ok(()) => {
                queue.mark_done(row).await?;
                report.done += 1;
            }
            Err(e) => {
                log::error!("Job {job_id} failed: {e}");
                queue.mark_failed(row, &e.to_string(), now).await?;
                report.failed += 1;
            }
        }
    }
    Ok(report)
}

/// Spawn all background tasks. Each loop detaches via `tokio::spawn`.
pub fn spawn_all(
    config: TasksConfig,
    queue: DbTaskQueue,
    progress_service: ProgressService,
    subscription_service: SubscriptionService,
) {
    // deferred jobs
    {
        let interval = Duration::from_secs(config.job_poll_interval_secs.max(1));
        let batch = config.job_batch_size.max(1);
        tokio::spawn(async move {
            loop {
                match run_due_jobs(&queue, &progress_service, Utc::now(), batch).await {
                    Ok(r) if r.done + r.failed > 0 => {
                        log::info!("Jobs processed: {} done, {} failed", r.done, r.failed)
                    }
                    Ok(_) => {}
                    Err(e) => log::error!("Failed to poll scheduled jobs: {e:?}"),
                }
                tokio::time::sleep(interval).await;
            }
        });
    }

    // subscription expiry
    {
        let interval = Duration::from_secs(config.expiry_sweep_interval_secs.max(1));
        let svc = subscription_service;
        tokio::spawn(async move {
            loop {
                match svc.expire_lapsed(today()).await {
                    Ok(n) if n > 0 => log::info!("Expired subscriptions processed: {n}"),
                    Ok(_) => {}
                    Err(e) => log::error!("Failed to expire subscriptions: {e:?}"),
                }
                tokio::time::sleep(interval).await;
            }
        });
    }
}
