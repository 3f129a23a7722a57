use super::{
    CancelRequest, CheckOutcome, CheckRequest, CommitRequest, PaymentError, TransactionSnapshot,
};
use crate::config::PricingConfig;
use crate::database::is_unique_violation;
use crate::entities::{
    PaymentProviderKind, TransactionState, payment_transaction_entity as payment_tx,
    subscription_entity as sub,
};
use crate::error::AppError;
use crate::services::subscription_service::today;
use crate::services::{ScheduleService, SubscriptionService};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Ledger side of every provider callback. Each provider transaction is
/// committed at most once, keyed by `(provider, external_id)`.
#[derive(Clone)]
pub struct Settlement {
    pool: DatabaseConnection,
    pricing: PricingConfig,
    schedule: ScheduleService,
}

impl Settlement {
    pub fn new(pool: DatabaseConnection, pricing: PricingConfig, schedule: ScheduleService) -> Self {
        Self {
            pool,
            pricing,
            schedule,
        }
    }

    pub fn pool(&self) -> &DatabaseConnection {
        &self.pool
    }

    pub async fn find_transaction(
        &self,
        provider: PaymentProviderKind,
        external_id: &str,
    ) -> Result<Option<payment_tx::Model>, PaymentError> {
        Ok(payment_tx::Entity::find()
            .filter(payment_tx::Column::Provider.eq(provider))
            .filter(payment_tx::Column::ExternalId.eq(external_id))
            .one(&self.pool)
            .await?)
    }

    /// A transaction of `provider` for `order_id` still waiting to be performed.
    pub async fn open_transaction(
        &self,
        provider: PaymentProviderKind,
        order_id: i64,
    ) -> Result<Option<payment_tx::Model>, PaymentError> {
        Ok(payment_tx::Entity::find()
            .filter(payment_tx::Column::Provider.eq(provider))
            .filter(payment_tx::Column::SubscriptionId.eq(order_id))
            .filter(payment_tx::Column::State.eq(TransactionState::Created))
            .one(&self.pool)
            .await?)
    }

    /// Provider transactions created inside `[from, to]`, by create time.
    pub async fn statement(
        &self,
        provider: PaymentProviderKind,
        from: i64,
        to: i64,
    ) -> Result<Vec<payment_tx::Model>, PaymentError> {
        Ok(payment_tx::Entity::find()
            .filter(payment_tx::Column::Provider.eq(provider))
            .filter(payment_tx::Column::CreateTime.between(from, to))
            .order_by_asc(payment_tx::Column::CreateTime)
            .all(&self.pool)
            .await?)
    }

    pub async fn check(
        &self,
        provider: PaymentProviderKind,
        request: CheckRequest,
    ) -> Result<CheckOutcome, PaymentError> {
        if let Some(external_id) = &request.external_id
            && let Some(existing) = self.find_transaction(provider, external_id).await?
        {
            return self.recheck_existing(existing, &request).await;
        }

        let order = verify_order(&self.pool, request.order_id, request.amount_minor).await?;

        let Some(external_id) = request.external_id else {
            return Ok(CheckOutcome {
                order,
                transaction: None,
            });
        };

        let created = insert_created(
            &self.pool,
            provider,
            &external_id,
            &order,
            request.provider_time.unwrap_or_else(now_millis),
        )
        .await;

        let transaction = match created {
            Ok(row) => {
                log::info!(
                    "Recorded {provider} transaction {external_id} for order {}",
                    order.id
                );
                row
            }
            // lost a race against the same callback; the winner's row is authoritative
            Err(e) if is_unique_violation(&e) => self
                .find_transaction(provider, &external_id)
                .await?
                .ok_or_else(|| PaymentError::TransactionNotFound(external_id.clone()))?,
            Err(e) => return Err(e.into()),
        };

        Ok(CheckOutcome {
            order,
            transaction: Some(transaction.into()),
        })
    }

    async fn recheck_existing(
        &self,
        existing: payment_tx::Model,
        request: &CheckRequest,
    ) -> Result<CheckOutcome, PaymentError> {
        if existing.subscription_id != request.order_id || existing.amount != request.amount_minor
        {
            log::error!(
                "{} transaction {} replayed with different order/amount ({} / {})",
                existing.provider,
                existing.external_id,
                request.order_id,
                request.amount_minor
            );
            return Err(PaymentError::CannotPerform(existing.external_id));
        }
        match existing.state {
            TransactionState::Created => {}
            TransactionState::Performed => {
                return Err(PaymentError::AlreadyPaid(existing.subscription_id));
            }
            TransactionState::Cancelled | TransactionState::CancelledAfterPerform => {
                return Err(PaymentError::Cancelled(existing.external_id));
            }
        }

        let order = SubscriptionService::find_order(&self.pool, existing.subscription_id)
            .await
            .map_err(|_| PaymentError::UnknownOrder(existing.subscription_id))?;
        Ok(CheckOutcome {
            order,
            transaction: Some(existing.into()),
        })
    }

    /// Performs the transaction and activates its subscription in one DB
    /// transaction. Performing an already performed transaction returns the
    /// stored result without extending again.
    pub async fn commit(
        &self,
        provider: PaymentProviderKind,
        request: CommitRequest,
    ) -> Result<TransactionSnapshot, PaymentError> {
        let today = today();
        let txn = self.pool.begin().await?;

        let found = payment_tx::Entity::find()
            .filter(payment_tx::Column::Provider.eq(provider))
            .filter(payment_tx::Column::ExternalId.eq(request.external_id.as_str()))
            .lock_exclusive()
            .one(&txn)
            .await?;

        let transaction = match (found, request.order_id, request.amount_minor) {
            (Some(row), _, _) => row,
            // confirm arrived without a recorded check
            (None, Some(order_id), Some(amount)) => {
                let order = verify_order(&txn, order_id, amount).await?;
                insert_created(&txn, provider, &request.external_id, &order, now_millis()).await?
            }
            (None, _, _) => {
                return Err(PaymentError::TransactionNotFound(request.external_id));
            }
        };

        if let Some(order_id) = request.order_id
            && order_id != transaction.subscription_id
        {
            log::error!(
                "{provider} transaction {} confirmed for order {order_id} but belongs to {}",
                transaction.external_id,
                transaction.subscription_id
            );
            return Err(PaymentError::TransactionNotFound(request.external_id));
        }
        if let Some(amount) = request.amount_minor
            && amount != transaction.amount
        {
            log::error!(
                "{provider} transaction {} confirmed with amount {amount}, recorded {}",
                transaction.external_id,
                transaction.amount
            );
            return Err(PaymentError::InvalidAmount {
                order_id: transaction.subscription_id,
                expected: transaction.amount,
                actual: amount,
            });
        }

        match transaction.state {
            TransactionState::Performed => {
                log::info!(
                    "{provider} transaction {} already performed",
                    transaction.external_id
                );
                return Ok(transaction.into());
            }
            TransactionState::Cancelled | TransactionState::CancelledAfterPerform => {
                return Err(PaymentError::Cancelled(transaction.external_id));
            }
            TransactionState::Created => {}
        }

        // checked under the order lock: a commit of another transaction for
        // the same order may have cleared the pending plan meanwhile
        let order = match SubscriptionService::lock_order(&txn, transaction.subscription_id).await
        {
            Ok(order) => order,
            Err(AppError::NotFound(_)) => {
                return Err(PaymentError::UnknownOrder(transaction.subscription_id));
            }
            Err(e) => return Err(e.into()),
        };
        if order.pending_extension.is_none() {
            log::warn!(
                "{provider} transaction {} arrived for order {} that is already paid",
                transaction.external_id,
                order.id
            );
            return Err(PaymentError::AlreadyPaid(order.id));
        }
        // the order may have been repriced by a later checkout
        if !SubscriptionService::verify_amount(&order, transaction.amount) {
            log::error!(
                "Order {} now costs {} tiyin, {provider} transaction {} carries {}",
                order.id,
                order.amount_minor(),
                transaction.external_id,
                transaction.amount
            );
            return Err(PaymentError::InvalidAmount {
                order_id: order.id,
                expected: order.amount_minor(),
                actual: transaction.amount,
            });
        }

        let plan = order.pending_extension.unwrap_or(order.plan_type);
        let days = self.pricing.validity_days(&plan);
        let activated = SubscriptionService::activate(&txn, order.id, days, today).await?;

        let mut am = transaction.into_active_model();
        am.state = Set(TransactionState::Performed);
        am.perform_time = Set(Some(now_millis()));
        am.updated_at = Set(Some(Utc::now()));
        let performed = am.update(&txn).await?;

        txn.commit().await?;

        log::info!(
            "{provider} transaction {} performed: order {} active until {:?}",
            performed.external_id,
            activated.id,
            activated.end_date
        );

        self.schedule
            .materialize_active_enrollments(activated.user_id)
            .await;

        Ok(performed.into())
    }

    /// Marks the transaction cancelled. Reversing a performed transaction
    /// deactivates the subscription unless a transaction for the same order
    /// was performed after it. A transaction that never performed granted
    /// nothing, so the subscription is left as it is.
    pub async fn cancel(
        &self,
        provider: PaymentProviderKind,
        request: CancelRequest,
    ) -> Result<TransactionSnapshot, PaymentError> {
        let today = today();
        let txn = self.pool.begin().await?;

        let transaction = payment_tx::Entity::find()
            .filter(payment_tx::Column::Provider.eq(provider))
            .filter(payment_tx::Column::ExternalId.eq(request.external_id.as_str()))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| PaymentError::TransactionNotFound(request.external_id.clone()))?;

        if transaction.state.is_cancelled() {
            return Ok(transaction.into());
        }

        let was_performed = transaction.state == TransactionState::Performed;
        let next_state = if was_performed {
            TransactionState::CancelledAfterPerform
        } else {
            TransactionState::Cancelled
        };
        let reference = transaction.perform_time.unwrap_or(transaction.create_time);

        let superseded = payment_tx::Entity::find()
            .filter(payment_tx::Column::SubscriptionId.eq(transaction.subscription_id))
            .filter(payment_tx::Column::Id.ne(transaction.id))
            .filter(payment_tx::Column::State.eq(TransactionState::Performed))
            .filter(payment_tx::Column::PerformTime.gt(reference))
            .count(&txn)
            .await?
            > 0;

        let order_id = transaction.subscription_id;
        let external_id = transaction.external_id.clone();
        let mut am = transaction.into_active_model();
        am.state = Set(next_state);
        am.reason = Set(request.reason);
        am.cancel_time = Set(Some(now_millis()));
        am.updated_at = Set(Some(Utc::now()));
        let cancelled = am.update(&txn).await?;

        if !was_performed {
            log::info!("{provider} transaction {external_id} cancelled before payment");
        } else if superseded {
            log::warn!(
                "{provider} transaction {external_id} cancelled after a later payment; order {order_id} stays active"
            );
        } else {
            SubscriptionService::deactivate(&txn, order_id, today).await?;
            log::info!("{provider} transaction {external_id} cancelled; order {order_id} deactivated");
        }

        txn.commit().await?;
        Ok(cancelled.into())
    }
}

/// Order exists, still awaits payment and the amount matches exactly.
async fn verify_order<C: ConnectionTrait>(
    conn: &C,
    order_id: i64,
    amount_minor: i64,
) -> Result<sub::Model, PaymentError> {
    let order = match SubscriptionService::find_order(conn, order_id).await {
        Ok(order) => order,
        Err(AppError::NotFound(_)) => {
            log::error!("Payment references unknown order {order_id}");
            return Err(PaymentError::UnknownOrder(order_id));
        }
        Err(e) => return Err(e.into()),
    };

    if !SubscriptionService::verify_amount(&order, amount_minor) {
        log::error!(
            "Amount mismatch for order {order_id}: expected {} tiyin, got {amount_minor}",
            order.amount_minor()
        );
        return Err(PaymentError::InvalidAmount {
            order_id,
            expected: order.amount_minor(),
            actual: amount_minor,
        });
    }

    if order.pending_extension.is_none() {
        return Err(PaymentError::AlreadyPaid(order_id));
    }

    Ok(order)
}

async fn insert_created<C: ConnectionTrait>(
    conn: &C,
    provider: PaymentProviderKind,
    external_id: &str,
    order: &sub::Model,
    create_time: i64,
) -> Result<payment_tx::Model, sea_orm::DbErr> {
    payment_tx::ActiveModel {
        provider: Set(provider),
        external_id: Set(external_id.to_string()),
        subscription_id: Set(order.id),
        amount: Set(order.amount_minor()),
        state: Set(TransactionState::Created),
        reason: Set(None),
        create_time: Set(create_time),
        perform_time: Set(None),
        cancel_time: Set(None),
        created_at: Set(Some(Utc::now())),
        updated_at: Set(Some(Utc::now())),
        ..Default::default()
    }
    .insert(conn)
    .await
}
