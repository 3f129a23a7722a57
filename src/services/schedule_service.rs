use crate::database::is_unique_violation;
use crate::entities::{
    exercise_completion_entity as exercise_completion, meal_completion_entity as meal_completion,
    program_entity as program, session_completion_entity as session_completion,
    session_entity as session, session_exercise_entity as session_exercise,
    session_meal_entity as session_meal, user_program_entity as user_program,
};
use crate::error::{AppError, AppResult};
use chrono::Duration;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, Set,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MaterializeReport {
    pub created: usize,
    /// Rows that already existed.
    pub skipped: usize,
    pub failed: usize,
}

impl MaterializeReport {
    fn record<T>(&mut self, result: Result<T, DbErr>, what: &str) {
        match result {
            Ok(_) => self.created += 1,
            Err(e) if is_unique_violation(&e) => self.skipped += 1,
            Err(e) => {
                log::error!("Failed to create {what}: {e}");
                self.failed += 1;
            }
        }
    }
}

/// Generates the per-day completion rows of an enrollment.
///
/// Every row is inserted on its own and relies on the table's unique key,
/// so running it again only fills in what is missing.
#[derive(Clone)]
pub struct ScheduleService {
    pool: DatabaseConnection,
}

impl ScheduleService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    pub async fn materialize(&self, user_id: i64, program_id: i64) -> AppResult<MaterializeReport> {
        let enrollment = user_program::Entity::find()
            .filter(user_program::Column::UserId.eq(user_id))
            .filter(user_program::Column::ProgramId.eq(program_id))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Enrollment not found".to_string()))?;

        self.materialize_enrollment(enrollment).await
    }

    pub async fn materialize_enrollment(
        &self,
        enrollment: user_program::Model,
    ) -> AppResult<MaterializeReport> {
        let user_id = enrollment.user_id;
        let start = enrollment.start_date;

        let sessions = session::Entity::find()
            .filter(session::Column::ProgramId.eq(enrollment.program_id))
            .order_by_asc(session::Column::SessionNumber)
            .all(&self.pool)
            .await?;

        let mut report = MaterializeReport::default();
        for (offset, s) in sessions.iter().enumerate() {
            let planned_date = start + Duration::days(offset as i64);

            let result = session_completion::Entity::insert(session_completion::ActiveModel {
                user_id: Set(user_id),
                session_id: Set(s.id),
                planned_date: Set(planned_date),
                is_completed: Set(false),
                completed_at: Set(None),
                ..Default::default()
            })
            .exec(&self.pool)
            .await;
            report.record(result, "session completion");

            let exercises = session_exercise::Entity::find()
                .filter(session_exercise::Column::SessionId.eq(s.id))
                .all(&self.pool)
                .await?;
            for link in exercises {
                let result = exercise_completion::Entity::insert(exercise_completion::ActiveModel {
                    user_id: Set(user_id),
                    session_id: Set(s.id),
                    exercise_id: Set(link.exercise_id),
                    planned_date: Set(planned_date),
                    is_completed: Set(false),
                    completed_at: Set(None),
                    ..Default::default()
                })
                .exec(&self.pool)
                .await;
                report.record(result, "exercise completion");
            }

            let meals = session_meal::Entity::find()
                .filter(session_meal::Column::SessionId.eq(s.id))
                .all(&self.pool)
                .await?;
            for link in meals {
                let result = meal_completion::Entity::insert(meal_completion::ActiveModel {
                    user_id: Set(user_id),
                    session_id: Set(s.id),
                    meal_id: Set(link.meal_id),
                    planned_date: Set(planned_date),
                    is_completed: Set(false),
                    completed_at: Set(None),
                    ..Default::default()
                })
                .exec(&self.pool)
                .await;
                report.record(result, "meal completion");
            }
        }

        let total_sessions = program::Entity::find_by_id(enrollment.program_id)
            .one(&self.pool)
            .await?
            .map(|p| p.total_sessions)
            .unwrap_or(sessions.len() as i32);
        let end_date = start + Duration::days(i64::from(total_sessions));

        if enrollment.end_date != Some(end_date) {
            let mut am = enrollment.into_active_model();
            am.end_date = Set(Some(end_date));
            am.update(&self.pool).await?;
        }

        log::info!(
            "Materialized schedule for user {user_id}: {} created, {} existing, {} failed",
            report.created,
            report.skipped,
            report.failed
        );
        Ok(report)
    }

    /// Runs the materializer for every active enrollment of the user.
    /// Failures are logged; they never propagate to the caller.
    pub async fn materialize_active_enrollments(&self, user_id: i64) {
        let enrollments = match user_program::Entity::find()
            .filter(user_program::Column::UserId.eq(user_id))
            .filter(user_program::Column::IsActive.eq(true))
            .all(&self.pool)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                log::error!("Failed to load enrollments of user {user_id}: {e}");
                return;
            }
        };

        for enrollment in enrollments {
            let program_id = enrollment.program_id;
            if let Err(e) = self.materialize_enrollment(enrollment).await {
                log::error!("Failed to materialize program {program_id} for user {user_id}: {e}");
            }
        }
    }
}
