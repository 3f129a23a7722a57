use crate::entities::user_program_entity;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct EnrollRequest {
    pub program_id: i64,
    /// Defaults to today.
    pub start_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EnrollmentResponse {
    pub id: i64,
    pub program_id: i64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub progress: i32,
    pub is_active: bool,
    /// True when the schedule was generated right away.
    pub materialized: bool,
}

impl EnrollmentResponse {
    pub fn new(e: user_program_entity::Model, materialized: bool) -> Self {
        Self {
            id: e.id,
            program_id: e.program_id,
            start_date: e.start_date,
            end_date: e.end_date,
            progress: e.progress,
            is_active: e.is_active,
            materialized,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompleteMealRequest {
    pub session_id: i64,
    pub meal_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompleteExerciseRequest {
    pub session_id: i64,
    pub exercise_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScheduleQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressResponse {
    pub program_id: i64,
    pub completed_sessions: u64,
    pub total_sessions: i32,
    /// Percent, rounded.
    pub progress: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompletionItem {
    pub id: i64,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScheduledMeal {
    pub meal_id: i64,
    #[serde(flatten)]
    pub completion: CompletionItem,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScheduledExercise {
    pub exercise_id: i64,
    #[serde(flatten)]
    pub completion: CompletionItem,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScheduledSession {
    pub session_id: i64,
    pub planned_date: NaiveDate,
    #[serde(flatten)]
    pub completion: CompletionItem,
    pub meals: Vec<ScheduledMeal>,
    pub exercises: Vec<ScheduledExercise>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartExerciseResponse {
    pub job_id: i64,
    pub completes_at: DateTime<Utc>,
}
