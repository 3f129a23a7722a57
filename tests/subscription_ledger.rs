mod common;

use chrono::Duration;
use common::TestApp;
use fitsub_backend::entities::{
    PaymentProviderKind, PlanType, TransactionState, subscription_entity as sub,
};
use fitsub_backend::services::payment::{
    CancelRequest, CheckRequest, CommitRequest, TransactionSnapshot,
};
use fitsub_backend::services::payment::settlement::now_millis;
use fitsub_backend::services::subscription_service::today;
use fitsub_backend::services::{PaymentError, PaymentProvider};
use futures_util::future::join_all;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter, Set,
};

async fn pay(
    app: &TestApp,
    order_id: i64,
    amount_minor: i64,
    external_id: &str,
) -> Result<TransactionSnapshot, PaymentError> {
    app.payme
        .check(CheckRequest {
            order_id,
            amount_minor,
            external_id: Some(external_id.to_string()),
            provider_time: Some(now_millis()),
        })
        .await?;
    app.payme
        .commit(CommitRequest {
            external_id: external_id.to_string(),
            order_id: None,
            amount_minor: None,
        })
        .await
}

async fn load(app: &TestApp, id: i64) -> sub::Model {
    sub::Entity::find_by_id(id)
        .one(&app.pool)
        .await
        .unwrap()
        .unwrap()
}

async fn active_rows(app: &TestApp, user_id: i64) -> u64 {
    sub::Entity::find()
        .filter(sub::Column::UserId.eq(user_id))
        .filter(sub::Column::Active.eq(true))
        .count(&app.pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_commit_activates_each_plan() {
    let app = TestApp::new().await;
    let pricing = app.subscriptions.pricing().clone();

    for (i, plan) in [PlanType::Month, PlanType::Quarter, PlanType::Year]
        .into_iter()
        .enumerate()
    {
        let user = app.create_user(&format!("+99890000000{i}")).await;
        let checkout = app
            .dispatcher
            .checkout(user.id, plan, PaymentProviderKind::Payme)
            .await
            .unwrap();
        assert_eq!(checkout.amount, pricing.price(&plan));

        pay(&app, checkout.order_id, checkout.amount * 100, &format!("tx-{i}"))
            .await
            .unwrap();

        let row = load(&app, checkout.order_id).await;
        assert!(row.active);
        assert_eq!(row.end_date, Some(today() + Duration::days(pricing.validity_days(&plan))));
        assert_eq!(row.pending_extension, None);
        assert!(app.reload_user(user.id).await.is_premium);
    }
}

#[tokio::test]
async fn test_wrong_amount_leaves_order_untouched() {
    let app = TestApp::new().await;
    let user = app.create_user("+998901111111").await;
    let order = app
        .subscriptions
        .get_or_create_pending(user.id, PlanType::Month)
        .await
        .unwrap();

    let err = pay(&app, order.id, 1, "tx-bad").await.unwrap_err();
    assert!(matches!(err, PaymentError::InvalidAmount { actual: 1, .. }));

    // a confirm that carries the order details is verified the same way
    let err = app
        .click
        .commit(CommitRequest {
            external_id: "click-bad".to_string(),
            order_id: Some(order.id),
            amount_minor: Some(order.amount_minor() + 100),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::InvalidAmount { .. }));

    let row = load(&app, order.id).await;
    assert!(!row.active);
    assert_eq!(row.end_date, None);
    assert!(!app.reload_user(user.id).await.is_premium);
}

#[tokio::test]
async fn test_monthly_plan_amount_scenario() {
    let app = TestApp::new().await;
    let user = app.create_user("+998901111112").await;
    let order = app
        .subscriptions
        .get_or_create_pending(user.id, PlanType::Month)
        .await
        .unwrap();
    assert_eq!(order.amount, 10_000);

    let err = pay(&app, order.id, 1, "tx-one-tiyin").await.unwrap_err();
    assert!(matches!(err, PaymentError::InvalidAmount { .. }));

    let performed = pay(&app, order.id, 1_000_000, "tx-full").await.unwrap();
    assert_eq!(performed.state, TransactionState::Performed);
    assert_eq!(performed.amount, 1_000_000);
}

#[tokio::test]
async fn test_commit_is_idempotent() {
    let app = TestApp::new().await;
    let user = app.create_user("+998901111113").await;
    let order = app
        .subscriptions
        .get_or_create_pending(user.id, PlanType::Month)
        .await
        .unwrap();

    let first = pay(&app, order.id, 1_000_000, "tx-once").await.unwrap();
    let after_first = load(&app, order.id).await;

    let second = app
        .payme
        .commit(CommitRequest {
            external_id: "tx-once".to_string(),
            order_id: None,
            amount_minor: None,
        })
        .await
        .unwrap();
    let after_second = load(&app, order.id).await;

    assert_eq!(first, second);
    assert_eq!(after_first.end_date, after_second.end_date);
    assert_eq!(after_first.active, after_second.active);
}

#[tokio::test]
async fn test_renewal_extends_from_current_end() {
    let app = TestApp::new().await;
    let user = app.create_user("+998901111114").await;
    let order = app
        .subscriptions
        .get_or_create_pending(user.id, PlanType::Month)
        .await
        .unwrap();
    pay(&app, order.id, 1_000_000, "tx-first").await.unwrap();
    let first_end = load(&app, order.id).await.end_date.unwrap();

    let renewal = app
        .subscriptions
        .get_or_create_pending(user.id, PlanType::Quarter)
        .await
        .unwrap();
    assert_eq!(renewal.id, order.id);
    // the paid month stays readable while the renewal is pending
    assert!(renewal.active);
    assert_eq!(renewal.end_date, Some(first_end));
    assert_eq!(renewal.pending_extension, Some(PlanType::Quarter));
    assert!(app.reload_user(user.id).await.is_premium);

    pay(&app, renewal.id, renewal.amount_minor(), "tx-second")
        .await
        .unwrap();
    let row = load(&app, order.id).await;
    assert!(row.active);
    assert_eq!(row.start_date, order.start_date);
    assert_eq!(row.end_date, Some(first_end + Duration::days(90)));
}

#[tokio::test]
async fn test_lapsed_subscription_restarts_today() {
    let app = TestApp::new().await;
    let user = app.create_user("+998901111115").await;
    let order = app
        .subscriptions
        .get_or_create_pending(user.id, PlanType::Month)
        .await
        .unwrap();
    pay(&app, order.id, 1_000_000, "tx-old").await.unwrap();

    // push the window into the past
    let mut am = load(&app, order.id).await.into_active_model();
    am.start_date = Set(today() - Duration::days(40));
    am.end_date = Set(Some(today() - Duration::days(10)));
    am.update(&app.pool).await.unwrap();

    let renewal = app
        .subscriptions
        .get_or_create_pending(user.id, PlanType::Month)
        .await
        .unwrap();
    pay(&app, renewal.id, 1_000_000, "tx-new").await.unwrap();

    let row = load(&app, order.id).await;
    assert!(row.active);
    assert_eq!(row.start_date, today());
    assert_eq!(row.end_date, Some(today() + Duration::days(30)));
}

#[tokio::test]
async fn test_repeated_checkouts_keep_one_active_row() {
    let app = TestApp::new().await;
    let user = app.create_user("+998901111116").await;

    let results = join_all((0..5).map(|_| {
        app.subscriptions
            .get_or_create_pending(user.id, PlanType::Month)
    }))
    .await;
    for r in &results {
        assert!(r.is_ok());
    }

    // every checkout lands on the same pending row
    let mut orders: Vec<i64> = results.into_iter().map(|r| r.unwrap().id).collect();
    orders.dedup();
    assert_eq!(orders.len(), 1);

    pay(&app, orders[0], 1_000_000, "tx-race").await.unwrap();
    assert_eq!(active_rows(&app, user.id).await, 1);

    let rows = sub::Entity::find()
        .filter(sub::Column::UserId.eq(user.id))
        .count(&app.pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn test_second_checkout_keeps_remaining_days() {
    let app = TestApp::new().await;
    let user = app.create_user("+998901111122").await;
    let order = app
        .subscriptions
        .get_or_create_pending(user.id, PlanType::Month)
        .await
        .unwrap();
    pay(&app, order.id, 1_000_000, "tx-month").await.unwrap();
    let paid_end = load(&app, order.id).await.end_date.unwrap();

    // two checkouts before paying the renewal
    app.subscriptions
        .get_or_create_pending(user.id, PlanType::Month)
        .await
        .unwrap();
    let renewal = app
        .subscriptions
        .get_or_create_pending(user.id, PlanType::Month)
        .await
        .unwrap();
    assert_eq!(renewal.id, order.id);

    pay(&app, renewal.id, 1_000_000, "tx-renewal").await.unwrap();

    let row = load(&app, order.id).await;
    assert!(row.active);
    assert_eq!(row.end_date, Some(paid_end + Duration::days(30)));
    assert_eq!(active_rows(&app, user.id).await, 1);
}

#[tokio::test]
async fn test_abandoned_checkout_keeps_paid_access() {
    let app = TestApp::new().await;
    let user = app.create_user("+998901111123").await;
    let order = app
        .subscriptions
        .get_or_create_pending(user.id, PlanType::Month)
        .await
        .unwrap();
    pay(&app, order.id, 1_000_000, "tx-paid-month").await.unwrap();
    let paid_end = load(&app, order.id).await.end_date;

    // checkout for a year that is never paid
    app.subscriptions
        .get_or_create_pending(user.id, PlanType::Year)
        .await
        .unwrap();

    let row = load(&app, order.id).await;
    assert!(row.active);
    assert_eq!(row.end_date, paid_end);
    assert!(app
        .subscriptions
        .is_subscription_active(user.id, today())
        .await
        .unwrap());
    assert!(app.reload_user(user.id).await.is_premium);

    // a failed charge for the renewal does not revoke the paid month either
    app.payme
        .check(CheckRequest {
            order_id: order.id,
            amount_minor: row.amount_minor(),
            external_id: Some("tx-declined".to_string()),
            provider_time: Some(now_millis()),
        })
        .await
        .unwrap();
    let cancelled = app
        .payme
        .cancel(CancelRequest {
            external_id: "tx-declined".to_string(),
            reason: Some(3),
        })
        .await
        .unwrap();
    assert_eq!(cancelled.state, TransactionState::Cancelled);

    let row = load(&app, order.id).await;
    assert!(row.active);
    assert_eq!(row.end_date, paid_end);
    assert!(app.reload_user(user.id).await.is_premium);
}

#[tokio::test]
async fn test_two_providers_cannot_pay_the_same_checkout() {
    let app = TestApp::new().await;
    let user = app.create_user("+998901111124").await;
    let order = app
        .subscriptions
        .get_or_create_pending(user.id, PlanType::Month)
        .await
        .unwrap();

    // both providers record a transaction before either confirms
    app.click
        .check(CheckRequest {
            order_id: order.id,
            amount_minor: 1_000_000,
            external_id: Some("click-dup".to_string()),
            provider_time: None,
        })
        .await
        .unwrap();
    pay(&app, order.id, 1_000_000, "payme-dup").await.unwrap();
    let paid = load(&app, order.id).await;

    let err = app
        .click
        .commit(CommitRequest {
            external_id: "click-dup".to_string(),
            order_id: Some(order.id),
            amount_minor: Some(1_000_000),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::AlreadyPaid(id) if id == order.id));

    let row = load(&app, order.id).await;
    assert_eq!(row.end_date, paid.end_date);
    assert_eq!(row.end_date, Some(today() + Duration::days(30)));

    let click_tx = app
        .settlement
        .find_transaction(PaymentProviderKind::Click, "click-dup")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(click_tx.state, TransactionState::Created);
}

#[tokio::test]
async fn test_second_active_row_rejected_by_index() {
    let app = TestApp::new().await;
    let user = app.create_user("+998901111117").await;

    let row = |plan: PlanType| sub::ActiveModel {
        user_id: Set(user.id),
        plan_type: Set(plan),
        amount: Set(10_000),
        start_date: Set(today()),
        end_date: Set(Some(today() + Duration::days(30))),
        active: Set(true),
        pending_extension: Set(None),
        ..Default::default()
    };

    sub::Entity::insert(row(PlanType::Month))
        .exec(&app.pool)
        .await
        .unwrap();
    let second = sub::Entity::insert(row(PlanType::Year)).exec(&app.pool).await;
    assert!(second.is_err());
}

#[tokio::test]
async fn test_cancel_after_perform_deactivates() {
    let app = TestApp::new().await;
    let user = app.create_user("+998901111118").await;
    let order = app
        .subscriptions
        .get_or_create_pending(user.id, PlanType::Month)
        .await
        .unwrap();
    pay(&app, order.id, 1_000_000, "tx-refund").await.unwrap();
    let end = load(&app, order.id).await.end_date;

    let cancelled = app
        .payme
        .cancel(CancelRequest {
            external_id: "tx-refund".to_string(),
            reason: Some(5),
        })
        .await
        .unwrap();
    assert_eq!(cancelled.state, TransactionState::CancelledAfterPerform);
    assert_eq!(cancelled.reason, Some(5));

    let row = load(&app, order.id).await;
    assert!(!row.active);
    assert_eq!(row.end_date, end);
    assert!(!app.reload_user(user.id).await.is_premium);

    // a repeated cancel returns the stored result
    let again = app
        .payme
        .cancel(CancelRequest {
            external_id: "tx-refund".to_string(),
            reason: Some(3),
        })
        .await
        .unwrap();
    assert_eq!(again, cancelled);

    // and a cancelled transaction cannot be performed
    let err = app
        .payme
        .commit(CommitRequest {
            external_id: "tx-refund".to_string(),
            order_id: None,
            amount_minor: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::Cancelled(_)));
}

#[tokio::test]
async fn test_stale_cancel_keeps_later_payment() {
    let app = TestApp::new().await;
    let user = app.create_user("+998901111119").await;
    let order = app
        .subscriptions
        .get_or_create_pending(user.id, PlanType::Month)
        .await
        .unwrap();
    pay(&app, order.id, 1_000_000, "tx-early").await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    app.subscriptions
        .get_or_create_pending(user.id, PlanType::Month)
        .await
        .unwrap();
    pay(&app, order.id, 1_000_000, "tx-late").await.unwrap();

    app.payme
        .cancel(CancelRequest {
            external_id: "tx-early".to_string(),
            reason: Some(5),
        })
        .await
        .unwrap();

    let row = load(&app, order.id).await;
    assert!(row.active);
    assert_eq!(row.end_date, Some(today() + Duration::days(60)));
}

#[tokio::test]
async fn test_paid_order_rejects_new_payment() {
    let app = TestApp::new().await;
    let user = app.create_user("+998901111120").await;
    let order = app
        .subscriptions
        .get_or_create_pending(user.id, PlanType::Month)
        .await
        .unwrap();
    pay(&app, order.id, 1_000_000, "tx-paid").await.unwrap();

    let err = pay(&app, order.id, 1_000_000, "tx-extra").await.unwrap_err();
    assert!(matches!(err, PaymentError::AlreadyPaid(_)));

    let err = pay(&app, 9_999, 1_000_000, "tx-ghost").await.unwrap_err();
    assert!(matches!(err, PaymentError::UnknownOrder(9_999)));
}

#[tokio::test]
async fn test_expire_lapsed_clears_flags() {
    let app = TestApp::new().await;
    let user = app.create_user("+998901111121").await;
    let order = app
        .subscriptions
        .get_or_create_pending(user.id, PlanType::Month)
        .await
        .unwrap();
    pay(&app, order.id, 1_000_000, "tx-expiring").await.unwrap();

    assert_eq!(app.subscriptions.expire_lapsed(today()).await.unwrap(), 0);
    assert!(app
        .subscriptions
        .is_subscription_active(user.id, today())
        .await
        .unwrap());

    let later = today() + Duration::days(31);
    assert_eq!(app.subscriptions.expire_lapsed(later).await.unwrap(), 1);
    assert!(!load(&app, order.id).await.active);
    assert!(!app.reload_user(user.id).await.is_premium);
}
