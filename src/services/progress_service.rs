use crate::entities::{
    exercise_completion_entity as exercise_completion, exercise_entity as exercise,
    meal_completion_entity as meal_completion, program_entity as program,
    session_completion_entity as session_completion, session_entity as session,
    user_program_entity as user_program,
};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::subscription_service::today;
use crate::services::task_queue::{COMPLETE_EXERCISE_JOB, TaskQueue};
use crate::services::{ScheduleService, SubscriptionService};
use chrono::{Duration, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Payload of the deferred exercise completion job.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompleteExercisePayload {
    pub user_id: i64,
    pub session_id: i64,
    pub exercise_id: i64,
}

/// `round(100 * completed / total)`, 0 for an empty program.
pub fn progress_percent(completed: u64, total: i32) -> i32 {
    if total <= 0 {
        return 0;
    }
    ((completed as f64 * 100.0) / f64::from(total)).round().min(100.0) as i32
}

#[derive(Clone)]
pub struct ProgressService {
    pool: DatabaseConnection,
    schedule: ScheduleService,
    subscriptions: SubscriptionService,
    queue: Arc<dyn TaskQueue>,
}

impl ProgressService {
    pub fn new(
        pool: DatabaseConnection,
        schedule: ScheduleService,
        subscriptions: SubscriptionService,
        queue: Arc<dyn TaskQueue>,
    ) -> Self {
        Self {
            pool,
            schedule,
            subscriptions,
            queue,
        }
    }

    /// Creates (or reactivates) the enrollment. The schedule is generated
    /// now when the subscription is already active, otherwise on payment.
    pub async fn enroll(
        &self,
        user_id: i64,
        req: EnrollRequest,
    ) -> AppResult<EnrollmentResponse> {
        program::Entity::find_by_id(req.program_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Program not found".to_string()))?;

        let today = today();
        let start_date = req.start_date.unwrap_or(today);

        let existing = user_program::Entity::find()
            .filter(user_program::Column::UserId.eq(user_id))
            .filter(user_program::Column::ProgramId.eq(req.program_id))
            .one(&self.pool)
            .await?;

        let enrollment = match existing {
            Some(row) if row.is_active => row,
            Some(row) => {
                let mut am = row.into_active_model();
                am.is_active = Set(true);
                am.update(&self.pool).await?
            }
            None => {
                user_program::ActiveModel {
                    user_id: Set(user_id),
                    program_id: Set(req.program_id),
                    start_date: Set(start_date),
                    end_date: Set(None),
                    progress: Set(0),
                    is_active: Set(true),
                    created_at: Set(Some(Utc::now())),
                    ..Default::default()
                }
                .insert(&self.pool)
                .await?
            }
        };

        if !self
            .subscriptions
            .is_subscription_active(user_id, today)
            .await?
        {
            log::info!(
                "User {user_id} enrolled in program {} pending payment",
                req.program_id
            );
            return Ok(EnrollmentResponse::new(enrollment, false));
        }

        let program_id = enrollment.program_id;
        self.schedule.materialize_enrollment(enrollment).await?;
        let refreshed = user_program::Entity::find()
            .filter(user_program::Column::UserId.eq(user_id))
            .filter(user_program::Column::ProgramId.eq(program_id))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Enrollment not found".to_string()))?;
        Ok(EnrollmentResponse::new(refreshed, true))
    }

    pub async fn complete_session(&self, user_id: i64, session_id: i64) -> AppResult<ProgressResponse> {
        let row = session_completion::Entity::find()
            .filter(session_completion::Column::UserId.eq(user_id))
            .filter(session_completion::Column::SessionId.eq(session_id))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Session is not scheduled".to_string()))?;

        if !row.is_completed {
            let mut am = row.into_active_model();
            am.is_completed = Set(true);
            am.completed_at = Set(Some(Utc::now()));
            am.update(&self.pool).await?;
        }

        let program_id = session::Entity::find_by_id(session_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?
            .program_id;
        self.get_progress(user_id, program_id).await
    }

    pub async fn complete_meal(&self, user_id: i64, session_id: i64, meal_id: i64) -> AppResult<()> {
        let row = meal_completion::Entity::find()
            .filter(meal_completion::Column::UserId.eq(user_id))
            .filter(meal_completion::Column::SessionId.eq(session_id))
            .filter(meal_completion::Column::MealId.eq(meal_id))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Meal is not scheduled".to_string()))?;

        if !row.is_completed {
            let mut am = row.into_active_model();
            am.is_completed = Set(true);
            am.completed_at = Set(Some(Utc::now()));
            am.update(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn complete_exercise(
        &self,
        user_id: i64,
        session_id: i64,
        exercise_id: i64,
    ) -> AppResult<()> {
        let row = self
            .find_exercise_completion(user_id, session_id, exercise_id)
            .await?;

        if !row.is_completed {
            let mut am = row.into_active_model();
            am.is_completed = Set(true);
            am.completed_at = Set(Some(Utc::now()));
            am.update(&self.pool).await?;
        }
        Ok(())
    }

    /// Schedules the exercise to be marked completed once its duration has elapsed.
    pub async fn start_exercise(
        &self,
        user_id: i64,
        session_id: i64,
        exercise_id: i64,
    ) -> AppResult<StartExerciseResponse> {
        let row = self
            .find_exercise_completion(user_id, session_id, exercise_id)
            .await?;
        if row.is_completed {
            return Err(AppError::ValidationError(
                "Exercise already completed".to_string(),
            ));
        }

        let duration = exercise::Entity::find_by_id(exercise_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Exercise not found".to_string()))?
            .duration_minutes;

        let completes_at = Utc::now() + Duration::minutes(i64::from(duration));
        let payload = serde_json::to_value(CompleteExercisePayload {
            user_id,
            session_id,
            exercise_id,
        })?;
        let job_id = self
            .queue
            .enqueue(COMPLETE_EXERCISE_JOB, payload, completes_at)
            .await?;

        Ok(StartExerciseResponse {
            job_id,
            completes_at,
        })
    }

    /// Recomputes progress from session completions and refreshes the cached column.
    pub async fn get_progress(&self, user_id: i64, program_id: i64) -> AppResult<ProgressResponse> {
        let enrollment = user_program::Entity::find()
            .filter(user_program::Column::UserId.eq(user_id))
            .filter(user_program::Column::ProgramId.eq(program_id))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Enrollment not found".to_string()))?;

        let total_sessions = program::Entity::find_by_id(program_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Program not found".to_string()))?
            .total_sessions;

        let session_ids: Vec<i64> = session::Entity::find()
            .filter(session::Column::ProgramId.eq(program_id))
            .all(&self.pool)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();

        let completed_sessions = if session_ids.is_empty() {
            0
        } else {
            session_completion::Entity::find()
                .filter(session_completion::Column::UserId.eq(user_id))
                .filter(session_completion::Column::SessionId.is_in(session_ids))
                .filter(session_completion::Column::IsCompleted.eq(true))
                .count(&self.pool)
                .await?
        };

        let progress = progress_percent(completed_sessions, total_sessions);
        if enrollment.progress != progress {
            let mut am = enrollment.into_active_model();
            am.progress = Set(progress);
            if let Err(e) = am.update(&self.pool).await {
                log::warn!("Failed to cache progress for user {user_id}: {e}");
            }
        }

        Ok(ProgressResponse {
            program_id,
            completed_sessions,
            total_sessions,
            progress,
        })
    }

    pub async fn schedule_for_date(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> AppResult<Vec<ScheduledSession>> {
        let sessions = session_completion::Entity::find()
            .filter(session_completion::Column::UserId.eq(user_id))
            .filter(session_completion::Column::PlannedDate.eq(date))
            .order_by_asc(session_completion::Column::SessionId)
            .all(&self.pool)
            .await?;

        let mut schedule = Vec::with_capacity(sessions.len());
        for s in sessions {
            let meals = meal_completion::Entity::find()
                .filter(meal_completion::Column::UserId.eq(user_id))
                .filter(meal_completion::Column::SessionId.eq(s.session_id))
                .order_by_asc(meal_completion::Column::MealId)
                .all(&self.pool)
                .await?
                .into_iter()
                .map(|m| ScheduledMeal {
                    meal_id: m.meal_id,
                    completion: CompletionItem {
                        id: m.id,
                        is_completed: m.is_completed,
                        completed_at: m.completed_at,
                    },
                })
                .collect();

            let exercises = exercise_completion::Entity::find()
                .filter(exercise_completion::Column::UserId.eq(user_id))
                .filter(exercise_completion::Column::SessionId.eq(s.session_id))
                .order_by_asc(exercise_completion::Column::ExerciseId)
                .all(&self.pool)
                .await?
                .into_iter()
                .map(|e| ScheduledExercise {
                    exercise_id: e.exercise_id,
                    completion: CompletionItem {
                        id: e.id,
                        is_completed: e.is_completed,
                        completed_at: e.completed_at,
                    },
                })
                .collect();

            schedule.push(ScheduledSession {
                session_id: s.session_id,
                planned_date: s.planned_date,
                completion: CompletionItem {
                    id: s.id,
                    is_completed: s.is_completed,
                    completed_at: s.completed_at,
                },
                meals,
                exercises,
            });
        }
        Ok(schedule)
    }

    async fn find_exercise_completion(
        &self,
        user_id: i64,
        session_id: i64,
        exercise_id: i64,
    ) -> AppResult<exercise_completion::Model> {
        exercise_completion::Entity::find()
            .filter(exercise_completion::Column::UserId.eq(user_id))
            .filter(exercise_completion::Column::SessionId.eq(session_id))
            .filter(exercise_completion::Column::ExerciseId.eq(exercise_id))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Exercise is not scheduled".to_string()))
    }
}
