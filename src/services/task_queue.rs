use crate::entities::{JobStatus, scheduled_job_entity as job};
use crate::error::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde_json::Value;

pub const COMPLETE_EXERCISE_JOB: &str = "complete_exercise";

/// Attempts before a job is parked as failed.
const MAX_ATTEMPTS: i32 = 5;

#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Schedules `job_name` to run no earlier than `not_before`. Returns the job id.
    async fn enqueue(
        &self,
        job_name: &str,
        payload: Value,
        not_before: DateTime<Utc>,
    ) -> AppResult<i64>;
}

/// Task queue backed by the `scheduled_jobs` table.
#[derive(Clone)]
pub struct DbTaskQueue {
    pool: DatabaseConnection,
}

impl DbTaskQueue {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// Pending jobs whose time has come, oldest first.
    pub async fn due(&self, now: DateTime<Utc>, limit: u64) -> AppResult<Vec<job::Model>> {
        Ok(job::Entity::find()
            .filter(job::Column::Status.eq(JobStatus::Pending))
            .filter(job::Column::RunAt.lte(now))
            .order_by_asc(job::Column::RunAt)
            .limit(limit)
            .all(&self.pool)
            .await?)
    }

    pub async fn mark_done(&self, row: job::Model) -> AppResult<()> {
        let attempts = row.attempts + 1;
        let mut am = row.into_active_model();
        am.status = Set(JobStatus::Done);
        am.attempts = Set(attempts);
        am.updated_at = Set(Some(Utc::now()));
        am.update(&self.pool).await?;
        Ok(())
    }

    /// Records the failure and either reschedules with a linear backoff or
    /// gives up after the last attempt.
    pub async fn mark_failed(&self, row: job::Model, error: &str, now: DateTime<Utc>) -> AppResult<()> {
        let attempts = row.attempts + 1;
        let mut am = row.into_active_model();
        am.attempts = Set(attempts);
        am.last_error = Set(Some(error.to_string()));
        am.updated_at = Set(Some(Utc::now()));
        if attempts >= MAX_ATTEMPTS {
            am.status = Set(JobStatus::Failed);
        } else {
            am.run_at = Set(now + Duration::seconds(60 * i64::from(attempts)));
        }
        am.update(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl TaskQueue for DbTaskQueue {
    async fn enqueue(
        &self,
        job_name: &str,
        payload: Value,
        not_before: DateTime<Utc>,
    ) -> AppResult<i64> {
        let row = job::ActiveModel {
            job_name: Set(job_name.to_string()),
            payload: Set(payload),
            run_at: Set(not_before),
            status: Set(JobStatus::Pending),
            attempts: Set(0),
            last_error: Set(None),
            created_at: Set(Some(Utc::now())),
            updated_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        log::debug!("Enqueued job {} ({job_name}) for {not_before}", row.id);
        Ok(row.id)
    }
}
