//! Provider-agnostic payment flow.
//!
//! Each gateway speaks its own wire protocol but reduces every callback to
//! the same three steps: check the order, commit a transaction, cancel it.

pub mod click;
pub mod payme;
pub mod settlement;

pub use click::ClickGateway;
pub use payme::PaymeGateway;
pub use settlement::Settlement;

use crate::entities::{
    PaymentProviderKind, PlanType, TransactionState, payment_transaction_entity as payment_tx,
    subscription_entity as sub,
};
use crate::error::{AppError, AppResult};
use crate::models::CheckoutResponse;
use crate::services::SubscriptionService;
use async_trait::async_trait;
use sea_orm::DbErr;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("order {0} not found")]
    UnknownOrder(i64),

    #[error("amount {actual} does not match order {order_id} (expected {expected})")]
    InvalidAmount {
        order_id: i64,
        expected: i64,
        actual: i64,
    },

    #[error("transaction {0} not found")]
    TransactionNotFound(String),

    #[error("order {0} is already paid")]
    AlreadyPaid(i64),

    #[error("order {order_id} is busy with transaction {external_id}")]
    OrderBusy { order_id: i64, external_id: String },

    #[error("transaction {0} was cancelled")]
    Cancelled(String),

    #[error("transaction {0} can no longer be performed")]
    CannotPerform(String),

    #[error(transparent)]
    Internal(#[from] AppError),
}

impl From<DbErr> for PaymentError {
    fn from(e: DbErr) -> Self {
        PaymentError::Internal(AppError::DatabaseError(e))
    }
}

impl PaymentError {
    /// Reconciliation failures are answered with a provider code and never
    /// retried; internal ones surface as HTTP 500 so the provider retries.
    pub fn is_internal(&self) -> bool {
        matches!(self, PaymentError::Internal(_))
    }
}

/// Verify an order before the provider charges the customer.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    pub order_id: i64,
    /// Tiyin.
    pub amount_minor: i64,
    /// Provider transaction id; when present the transaction is recorded.
    pub external_id: Option<String>,
    /// Provider-side creation time, ms since epoch.
    pub provider_time: Option<i64>,
}

/// Confirm a charged transaction.
#[derive(Debug, Clone)]
pub struct CommitRequest {
    pub external_id: String,
    /// Sent by providers whose confirm callback repeats the order details.
    pub order_id: Option<i64>,
    pub amount_minor: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct CancelRequest {
    pub external_id: String,
    pub reason: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionSnapshot {
    pub id: i64,
    pub provider: PaymentProviderKind,
    pub external_id: String,
    pub subscription_id: i64,
    pub amount: i64,
    pub state: TransactionState,
    pub reason: Option<i32>,
    pub create_time: i64,
    pub perform_time: Option<i64>,
    pub cancel_time: Option<i64>,
}

impl From<payment_tx::Model> for TransactionSnapshot {
    fn from(t: payment_tx::Model) -> Self {
        Self {
            id: t.id,
            provider: t.provider,
            external_id: t.external_id,
            subscription_id: t.subscription_id,
            amount: t.amount,
            state: t.state,
            reason: t.reason,
            create_time: t.create_time,
            perform_time: t.perform_time,
            cancel_time: t.cancel_time,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub order: sub::Model,
    pub transaction: Option<TransactionSnapshot>,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn kind(&self) -> PaymentProviderKind;

    async fn check(&self, request: CheckRequest) -> Result<CheckOutcome, PaymentError>;

    async fn commit(&self, request: CommitRequest) -> Result<TransactionSnapshot, PaymentError>;

    async fn cancel(&self, request: CancelRequest) -> Result<TransactionSnapshot, PaymentError>;

    /// Where the customer is sent to pay for `order`.
    fn redirect_url(&self, order: &sub::Model) -> AppResult<String>;
}

/// Routes checkouts to the configured providers.
#[derive(Clone)]
pub struct PaymentDispatcher {
    subscriptions: SubscriptionService,
    providers: HashMap<PaymentProviderKind, Arc<dyn PaymentProvider>>,
}

impl PaymentDispatcher {
    pub fn new(subscriptions: SubscriptionService) -> Self {
        Self {
            subscriptions,
            providers: HashMap::new(),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    pub fn provider(&self, kind: PaymentProviderKind) -> AppResult<Arc<dyn PaymentProvider>> {
        self.providers
            .get(&kind)
            .cloned()
            .ok_or_else(|| AppError::ValidationError(format!("Payment provider {kind} is not available")))
    }

    /// Prices the plan, parks the user's subscription as pending and returns
    /// the provider page the customer should be redirected to.
    pub async fn checkout(
        &self,
        user_id: i64,
        plan_type: PlanType,
        kind: PaymentProviderKind,
    ) -> AppResult<CheckoutResponse> {
        let provider = self.provider(kind)?;
        let order = self
            .subscriptions
            .get_or_create_pending(user_id, plan_type)
            .await?;
        let redirect_url = provider.redirect_url(&order)?;

        log::info!(
            "Checkout of order {} for user {user_id} via {kind} ({} soum)",
            order.id,
            order.amount
        );
        Ok(CheckoutResponse {
            redirect_url,
            order_id: order.id,
            amount: order.amount,
            plan_type,
            provider: kind,
        })
    }
}
