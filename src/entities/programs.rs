use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum ProgramGoal {
    #[sea_orm(string_value = "gain_muscle")]
    GainMuscle,
    #[sea_orm(string_value = "lose_weight")]
    LoseWeight,
    #[sea_orm(string_value = "gain_weight")]
    GainWeight,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "programs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub name_translations: Option<Json>,
    pub description: Option<String>,
    pub goal: ProgramGoal,
    /// Incremented whenever a session referencing this program is created.
    pub total_sessions: i32,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
