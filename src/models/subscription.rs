use crate::entities::{PaymentProviderKind, PlanType, subscription_entity};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub plan_type: PlanType,
    pub provider: PaymentProviderKind,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub redirect_url: String,
    pub order_id: i64,
    /// Soum.
    pub amount: i64,
    pub plan_type: PlanType,
    pub provider: PaymentProviderKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionResponse {
    pub id: i64,
    pub plan_type: PlanType,
    pub amount: i64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    /// Stored flag and validity window combined.
    pub active: bool,
    pub pending_extension: Option<PlanType>,
}

impl SubscriptionResponse {
    pub fn from_model(s: subscription_entity::Model, today: NaiveDate) -> Self {
        Self {
            active: s.is_active_on(today),
            id: s.id,
            plan_type: s.plan_type,
            amount: s.amount,
            start_date: s.start_date,
            end_date: s.end_date,
            pending_extension: s.pending_extension,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlanResponse {
    pub plan_type: PlanType,
    pub price: i64,
    pub days: i64,
}
