use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    #[sea_orm(string_value = "month")]
    Month,
    #[sea_orm(string_value = "quarter")]
    Quarter,
    #[sea_orm(string_value = "year")]
    Year,
}

impl std::fmt::Display for PlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanType::Month => write!(f, "month"),
            PlanType::Quarter => write!(f, "quarter"),
            PlanType::Year => write!(f, "year"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "subscriptions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub plan_type: PlanType,
    /// Price in soum (major unit).
    pub amount: i64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub active: bool,
    /// Plan requested by the checkout that is still awaiting payment.
    pub pending_extension: Option<PlanType>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Amount in tiyin, the unit both providers report.
    pub fn amount_minor(&self) -> i64 {
        self.amount * 100
    }

    pub fn is_lapsed(&self, today: NaiveDate) -> bool {
        self.end_date.is_none_or(|end| end < today)
    }

    /// Effective status: the stored flag and the validity window must agree.
    pub fn is_active_on(&self, today: NaiveDate) -> bool {
        self.active && !self.is_lapsed(today)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
