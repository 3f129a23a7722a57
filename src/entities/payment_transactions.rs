use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum PaymentProviderKind {
    #[sea_orm(string_value = "payme")]
    Payme,
    #[sea_orm(string_value = "click")]
    Click,
}

impl std::fmt::Display for PaymentProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentProviderKind::Payme => write!(f, "payme"),
            PaymentProviderKind::Click => write!(f, "click"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    #[sea_orm(string_value = "created")]
    Created,
    #[sea_orm(string_value = "performed")]
    Performed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "cancelled_after_perform")]
    CancelledAfterPerform,
}

impl TransactionState {
    /// Payme's numeric state codes.
    pub fn code(&self) -> i32 {
        match self {
            TransactionState::Created => 1,
            TransactionState::Performed => 2,
            TransactionState::Cancelled => -1,
            TransactionState::CancelledAfterPerform => -2,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            TransactionState::Cancelled | TransactionState::CancelledAfterPerform
        )
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "payment_transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub provider: PaymentProviderKind,
    /// Transaction id assigned by the provider.
    pub external_id: String,
    /// The order id handed to the provider at checkout.
    pub subscription_id: i64,
    /// Tiyin.
    pub amount: i64,
    pub state: TransactionState,
    pub reason: Option<i32>,
    /// Provider-side timestamps, milliseconds since the epoch.
    pub create_time: i64,
    pub perform_time: Option<i64>,
    pub cancel_time: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
