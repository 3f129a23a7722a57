use crate::config::PricingConfig;
use crate::entities::{PlanType, subscription_entity as sub, user_entity as user};
use crate::error::{AppError, AppResult};
use chrono::{Duration, Local, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

/// Calendar day used for validity windows.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Subscription ledger. Owns the active flag, the validity window and the
/// cached `users.is_premium` copy of it.
#[derive(Clone)]
pub struct SubscriptionService {
    pool: DatabaseConnection,
    pricing: PricingConfig,
}

impl SubscriptionService {
    pub fn new(pool: DatabaseConnection, pricing: PricingConfig) -> Self {
        Self { pool, pricing }
    }

    pub fn pricing(&self) -> &PricingConfig {
        &self.pricing
    }

    /// Returns the row a checkout should be paid against: the user's active
    /// row, or a row still waiting for an earlier checkout, otherwise a fresh
    /// one. The row is repriced for `plan` and marked as awaiting that plan.
    /// A paid window that is still running stays active until it lapses; the
    /// payment only extends it once a provider confirms.
    pub async fn get_or_create_pending(
        &self,
        user_id: i64,
        plan: PlanType,
    ) -> AppResult<sub::Model> {
        self.get_or_create_pending_on(user_id, plan, today()).await
    }

    pub async fn get_or_create_pending_on(
        &self,
        user_id: i64,
        plan: PlanType,
        today: NaiveDate,
    ) -> AppResult<sub::Model> {
        let amount = self.pricing.price(&plan);
        let txn = self.pool.begin().await?;

        // serializes concurrent checkouts of the same user
        lock_user(&txn, user_id).await?;

        let existing = sub::Entity::find()
            .filter(sub::Column::UserId.eq(user_id))
            .filter(
                Condition::any()
                    .add(sub::Column::Active.eq(true))
                    .add(sub::Column::PendingExtension.is_not_null()),
            )
            .order_by_desc(sub::Column::Active)
            .order_by_desc(sub::Column::Id)
            .lock_exclusive()
            .one(&txn)
            .await?;

        let pending = match existing {
            Some(row) => {
                let running = row.active && row.end_date.is_some_and(|end| end >= today);
                let mut am = row.into_active_model();
                am.plan_type = Set(plan);
                am.amount = Set(amount);
                am.pending_extension = Set(Some(plan));
                am.active = Set(running);
                am.updated_at = Set(Some(Utc::now()));
                am.update(&txn).await?
            }
            None => {
                sub::ActiveModel {
                    user_id: Set(user_id),
                    plan_type: Set(plan),
                    amount: Set(amount),
                    start_date: Set(today),
                    end_date: Set(None),
                    active: Set(false),
                    pending_extension: Set(Some(plan)),
                    created_at: Set(Some(Utc::now())),
                    updated_at: Set(Some(Utc::now())),
                    ..Default::default()
                }
                .insert(&txn)
                .await?
            }
        };

        sync_premium_flag(&txn, user_id, today).await?;
        txn.commit().await?;

        log::info!(
            "Subscription {} awaiting {} payment for user {user_id} ({amount} soum)",
            pending.id,
            plan
        );
        Ok(pending)
    }

    /// Exact match of the provider amount (tiyin) against the stored price.
    pub fn verify_amount(subscription: &sub::Model, provider_amount_minor: i64) -> bool {
        subscription.amount_minor() == provider_amount_minor
    }

    pub async fn find_order<C: ConnectionTrait>(conn: &C, order_id: i64) -> AppResult<sub::Model> {
        sub::Entity::find_by_id(order_id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {order_id} not found")))
    }

    /// Like `find_order`, but holds the owner and row locks for the rest of
    /// the transaction so the row can be checked and then activated safely.
    pub async fn lock_order<C: ConnectionTrait>(conn: &C, order_id: i64) -> AppResult<sub::Model> {
        lock_subscription(conn, order_id).await
    }

    /// Sets the row active and extends it by `extension_days`. A running row
    /// keeps its start and grows from its current end; an inactive or lapsed
    /// one restarts at `today`. Another active row of the same user is folded
    /// in first and its remaining days carry over.
    pub async fn activate<C: ConnectionTrait>(
        conn: &C,
        subscription_id: i64,
        extension_days: i64,
        today: NaiveDate,
    ) -> AppResult<sub::Model> {
        let row = lock_subscription(conn, subscription_id).await?;

        let others = sub::Entity::find()
            .filter(sub::Column::UserId.eq(row.user_id))
            .filter(sub::Column::Active.eq(true))
            .filter(sub::Column::Id.ne(row.id))
            .lock_exclusive()
            .all(conn)
            .await?;

        // a deactivated row (refunded or lapsed) has no window left to extend
        let mut base_end = if row.active { row.end_date } else { None };
        for other in others {
            if let Some(end) = other.end_date {
                base_end = Some(base_end.map_or(end, |current| current.max(end)));
            }
            log::info!(
                "Folding subscription {} into {} for user {}",
                other.id,
                row.id,
                row.user_id
            );
            let mut am = other.into_active_model();
            am.active = Set(false);
            am.updated_at = Set(Some(Utc::now()));
            am.update(conn).await?;
        }

        let days = Duration::days(extension_days);
        let (start_date, end_date) = match base_end {
            Some(end) if end >= today => (row.start_date, end + days),
            _ => (today, today + days),
        };

        let user_id = row.user_id;
        let mut am = row.into_active_model();
        am.active = Set(true);
        am.start_date = Set(start_date);
        am.end_date = Set(Some(end_date));
        am.pending_extension = Set(None);
        am.updated_at = Set(Some(Utc::now()));
        let activated = am.update(conn).await?;

        sync_premium_flag(conn, user_id, today).await?;
        Ok(activated)
    }

    /// Clears the active flag; dates are left as they were.
    pub async fn deactivate<C: ConnectionTrait>(
        conn: &C,
        subscription_id: i64,
        today: NaiveDate,
    ) -> AppResult<sub::Model> {
        let row = lock_subscription(conn, subscription_id).await?;

        let user_id = row.user_id;
        let mut am = row.into_active_model();
        am.active = Set(false);
        am.updated_at = Set(Some(Utc::now()));
        let updated = am.update(conn).await?;

        sync_premium_flag(conn, user_id, today).await?;
        Ok(updated)
    }

    /// The user's active row, or the most recent one when none is active.
    pub async fn current_for_user(&self, user_id: i64) -> AppResult<Option<sub::Model>> {
        let active = sub::Entity::find()
            .filter(sub::Column::UserId.eq(user_id))
            .filter(sub::Column::Active.eq(true))
            .one(&self.pool)
            .await?;
        if active.is_some() {
            return Ok(active);
        }

        Ok(sub::Entity::find()
            .filter(sub::Column::UserId.eq(user_id))
            .order_by_desc(sub::Column::Id)
            .one(&self.pool)
            .await?)
    }

    pub async fn is_subscription_active(&self, user_id: i64, today: NaiveDate) -> AppResult<bool> {
        has_active_subscription(&self.pool, user_id, today).await
    }

    /// Clears the flag of rows whose window has closed and refreshes the
    /// owners' premium flag. Returns the number of rows expired.
    pub async fn expire_lapsed(&self, today: NaiveDate) -> AppResult<u64> {
        let lapsed = sub::Entity::find()
            .filter(sub::Column::Active.eq(true))
            .filter(
                Condition::any()
                    .add(sub::Column::EndDate.is_null())
                    .add(sub::Column::EndDate.lt(today)),
            )
            .all(&self.pool)
            .await?;

        let mut expired = 0;
        for row in lapsed {
            let txn = self.pool.begin().await?;
            Self::deactivate(&txn, row.id, today).await?;
            txn.commit().await?;
            log::info!(
                "Subscription {} of user {} lapsed on {:?}",
                row.id,
                row.user_id,
                row.end_date
            );
            expired += 1;
        }
        Ok(expired)
    }
}

async fn has_active_subscription<C: ConnectionTrait>(
    conn: &C,
    user_id: i64,
    today: NaiveDate,
) -> AppResult<bool> {
    let count = sub::Entity::find()
        .filter(sub::Column::UserId.eq(user_id))
        .filter(sub::Column::Active.eq(true))
        .filter(sub::Column::EndDate.gte(today))
        .count(conn)
        .await?;
    Ok(count > 0)
}

/// Recomputes `users.is_premium` from the ledger. Called by every ledger
/// mutation on the same connection/transaction as the mutation itself.
pub async fn sync_premium_flag<C: ConnectionTrait>(
    conn: &C,
    user_id: i64,
    today: NaiveDate,
) -> AppResult<bool> {
    let premium = has_active_subscription(conn, user_id, today).await?;
    let Some(row) = user::Entity::find_by_id(user_id).one(conn).await? else {
        return Err(AppError::NotFound(format!("User {user_id} not found")));
    };

    if row.is_premium != premium {
        let mut am = row.into_active_model();
        am.is_premium = Set(premium);
        am.updated_at = Set(Some(Utc::now()));
        am.update(conn).await?;
    }
    Ok(premium)
}

async fn lock_user<C: ConnectionTrait>(conn: &C, user_id: i64) -> AppResult<user::Model> {
    user::Entity::find_by_id(user_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))
}

/// Locks the owner first, then the row, matching the order used by checkout.
async fn lock_subscription<C: ConnectionTrait>(
    conn: &C,
    subscription_id: i64,
) -> AppResult<sub::Model> {
    let owner = SubscriptionService::find_order(conn, subscription_id)
        .await?
        .user_id;
    lock_user(conn, owner).await?;

    sub::Entity::find_by_id(subscription_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {subscription_id} not found")))
}
