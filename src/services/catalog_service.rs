use crate::database::is_unique_violation;
use crate::entities::{
    exercise_entity as exercise, meal_entity as meal, program_entity as program,
    session_entity as session, session_exercise_entity as session_exercise,
    session_meal_entity as session_meal,
};
use crate::error::{AppError, AppResult};
use crate::external::Translator;
use crate::models::*;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde_json::Value;
use std::sync::Arc;

/// Staff-side catalog authoring.
#[derive(Clone)]
pub struct CatalogService {
    pool: DatabaseConnection,
    translator: Arc<dyn Translator>,
}

impl CatalogService {
    pub fn new(pool: DatabaseConnection, translator: Arc<dyn Translator>) -> Self {
        Self { pool, translator }
    }

    /// Translation failures never block authoring; the name is kept untranslated.
    async fn translations(&self, text: &str) -> Option<Value> {
        match self.translator.translate(text).await {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Translation of {text:?} failed: {e}");
                None
            }
        }
    }

    pub async fn create_program(&self, req: CreateProgramRequest) -> AppResult<ProgramResponse> {
        let name = required_name(&req.name)?;
        let name_translations = self.translations(&name).await;

        let created = program::ActiveModel {
            name: Set(name),
            name_translations: Set(name_translations),
            description: Set(req.description),
            goal: Set(req.goal),
            total_sessions: Set(0),
            created_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        log::info!("Created program {} ({})", created.id, created.name);
        Ok(created.into())
    }

    pub async fn create_exercise(&self, req: CreateExerciseRequest) -> AppResult<ExerciseResponse> {
        let name = required_name(&req.name)?;
        if req.duration_minutes <= 0 {
            return Err(AppError::ValidationError(
                "duration_minutes must be positive".to_string(),
            ));
        }
        let name_translations = self.translations(&name).await;

        let created = exercise::ActiveModel {
            name: Set(name),
            name_translations: Set(name_translations),
            description: Set(req.description),
            duration_minutes: Set(req.duration_minutes),
            created_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;
        Ok(created.into())
    }

    pub async fn create_meal(&self, req: CreateMealRequest) -> AppResult<MealResponse> {
        let name = required_name(&req.name)?;
        if req.calories < 0 {
            return Err(AppError::ValidationError(
                "calories must not be negative".to_string(),
            ));
        }
        let name_translations = self.translations(&name).await;

        let created = meal::ActiveModel {
            name: Set(name),
            name_translations: Set(name_translations),
            meal_type: Set(req.meal_type),
            calories: Set(req.calories),
            created_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;
        Ok(created.into())
    }

    /// Adds a session to a program, links its exercises and meals and bumps
    /// the program's `total_sessions`, all in one transaction.
    pub async fn create_session(&self, req: CreateSessionRequest) -> AppResult<SessionResponse> {
        let name = required_name(&req.name)?;
        let name_translations = self.translations(&name).await;

        let txn = self.pool.begin().await?;

        let parent = program::Entity::find_by_id(req.program_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Program not found".to_string()))?;

        let known_exercises = exercise::Entity::find()
            .filter(exercise::Column::Id.is_in(req.exercise_ids.clone()))
            .count(&txn)
            .await?;
        let known_meals = meal::Entity::find()
            .filter(meal::Column::Id.is_in(req.meal_ids.clone()))
            .count(&txn)
            .await?;
        if known_exercises != distinct_len(&req.exercise_ids) || known_meals != distinct_len(&req.meal_ids) {
            return Err(AppError::ValidationError(
                "Unknown exercise or meal id".to_string(),
            ));
        }

        let session_number = match req.session_number {
            Some(n) if n > 0 => n,
            Some(_) => {
                return Err(AppError::ValidationError(
                    "session_number must be positive".to_string(),
                ));
            }
            None => {
                session::Entity::find()
                    .filter(session::Column::ProgramId.eq(parent.id))
                    .order_by_desc(session::Column::SessionNumber)
                    .one(&txn)
                    .await?
                    .map_or(1, |last| last.session_number + 1)
            }
        };

        let inserted = session::ActiveModel {
            program_id: Set(parent.id),
            session_number: Set(session_number),
            name: Set(name),
            name_translations: Set(name_translations),
            created_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .insert(&txn)
        .await;
        let created = match inserted {
            Ok(s) => s,
            Err(e) if is_unique_violation(&e) => {
                return Err(AppError::ValidationError(format!(
                    "Session {session_number} already exists in program {}",
                    parent.id
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let mut exercise_ids = req.exercise_ids;
        exercise_ids.sort_unstable();
        exercise_ids.dedup();
        for exercise_id in &exercise_ids {
            session_exercise::Entity::insert(session_exercise::ActiveModel {
                session_id: Set(created.id),
                exercise_id: Set(*exercise_id),
            })
            .exec_without_returning(&txn)
            .await?;
        }

        let mut meal_ids = req.meal_ids;
        meal_ids.sort_unstable();
        meal_ids.dedup();
        for meal_id in &meal_ids {
            session_meal::Entity::insert(session_meal::ActiveModel {
                session_id: Set(created.id),
                meal_id: Set(*meal_id),
            })
            .exec_without_returning(&txn)
            .await?;
        }

        let total_sessions = parent.total_sessions + 1;
        let program_id = parent.id;
        let mut am = parent.into_active_model();
        am.total_sessions = Set(total_sessions);
        am.update(&txn).await?;

        txn.commit().await?;

        log::info!(
            "Added session {} (#{session_number}) to program {program_id}, now {total_sessions} sessions",
            created.id
        );
        Ok(SessionResponse::new(created, exercise_ids, meal_ids))
    }
}

fn required_name(raw: &str) -> AppResult<String> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > 255 {
        return Err(AppError::ValidationError(
            "name must be between 1 and 255 characters".to_string(),
        ));
    }
    Ok(name.to_string())
}

fn distinct_len(ids: &[i64]) -> u64 {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids.len() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_name() {
        assert_eq!(required_name("  Leg day ").unwrap(), "Leg day");
        assert!(required_name("   ").is_err());
        assert!(required_name(&"x".repeat(256)).is_err());
    }

    #[test]
    fn test_distinct_len() {
        assert_eq!(distinct_len(&[3, 1, 3, 2]), 3);
        assert_eq!(distinct_len(&[]), 0);
    }
}
