use crate::entities::{
    MealType, ProgramGoal, exercise_entity, meal_entity, program_entity, session_entity,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateProgramRequest {
    pub name: String,
    pub description: Option<String>,
    pub goal: ProgramGoal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateExerciseRequest {
    pub name: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateMealRequest {
    pub name: String,
    pub meal_type: MealType,
    pub calories: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub program_id: i64,
    pub name: String,
    /// Defaults to the next number in the program.
    pub session_number: Option<i32>,
    #[serde(default)]
    pub exercise_ids: Vec<i64>,
    #[serde(default)]
    pub meal_ids: Vec<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgramResponse {
    pub id: i64,
    pub name: String,
    pub name_translations: Option<Value>,
    pub description: Option<String>,
    pub goal: ProgramGoal,
    pub total_sessions: i32,
}

impl From<program_entity::Model> for ProgramResponse {
    fn from(p: program_entity::Model) -> Self {
        Self {
            id: p.id,
            name: p.name,
            name_translations: p.name_translations,
            description: p.description,
            goal: p.goal,
            total_sessions: p.total_sessions,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub id: i64,
    pub program_id: i64,
    pub session_number: i32,
    pub name: String,
    pub name_translations: Option<Value>,
    pub exercise_ids: Vec<i64>,
    pub meal_ids: Vec<i64>,
}

impl SessionResponse {
    pub fn new(s: session_entity::Model, exercise_ids: Vec<i64>, meal_ids: Vec<i64>) -> Self {
        Self {
            id: s.id,
            program_id: s.program_id,
            session_number: s.session_number,
            name: s.name,
            name_translations: s.name_translations,
            exercise_ids,
            meal_ids,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExerciseResponse {
    pub id: i64,
    pub name: String,
    pub name_translations: Option<Value>,
    pub description: Option<String>,
    pub duration_minutes: i32,
}

impl From<exercise_entity::Model> for ExerciseResponse {
    fn from(e: exercise_entity::Model) -> Self {
        Self {
            id: e.id,
            name: e.name,
            name_translations: e.name_translations,
            description: e.description,
            duration_minutes: e.duration_minutes,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MealResponse {
    pub id: i64,
    pub name: String,
    pub name_translations: Option<Value>,
    pub meal_type: MealType,
    pub calories: i32,
}

impl From<meal_entity::Model> for MealResponse {
    fn from(m: meal_entity::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            name_translations: m.name_translations,
            meal_type: m.meal_type,
            calories: m.calories,
        }
    }
}
