mod common;

use actix_web::{App, test, web};
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::Duration;
use common::{CLICK_SECRET, CLICK_SERVICE_ID, PAYME_KEY, TestApp};
use fitsub_backend::entities::{PlanType, subscription_entity as sub};
use fitsub_backend::handlers::webhook_config;
use fitsub_backend::services::payment::settlement::now_millis;
use fitsub_backend::services::subscription_service::today;
use sea_orm::EntityTrait;
use serde_json::{Value, json};

macro_rules! webhook_app {
    ($app:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::from($app.payme.clone()))
                .app_data(web::Data::from($app.click.clone()))
                .configure(webhook_config),
        )
        .await
    };
}

fn payme_auth(key: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("Paycom:{key}")))
}

fn rpc(id: i64, method: &str, params: Value) -> Value {
    json!({ "id": id, "method": method, "params": params })
}

fn click_form(
    action: i32,
    trans_id: &str,
    order_id: i64,
    amount: &str,
    prepare_id: Option<i64>,
    error: i32,
) -> Vec<(String, String)> {
    let sign_time = "2024-01-01 10:00:00";
    let prepare = prepare_id.map(|id| id.to_string()).unwrap_or_default();
    let raw = format!(
        "{trans_id}{CLICK_SERVICE_ID}{CLICK_SECRET}{order_id}{prepare}{amount}{action}{sign_time}"
    );
    let sign = format!("{:x}", md5::compute(raw.as_bytes()));

    let mut form = vec![
        ("click_trans_id".to_string(), trans_id.to_string()),
        ("service_id".to_string(), CLICK_SERVICE_ID.to_string()),
        ("click_paydoc_id".to_string(), "777".to_string()),
        ("merchant_trans_id".to_string(), order_id.to_string()),
        ("amount".to_string(), amount.to_string()),
        ("action".to_string(), action.to_string()),
        ("error".to_string(), error.to_string()),
        ("error_note".to_string(), "Success".to_string()),
        ("sign_time".to_string(), sign_time.to_string()),
        ("sign_string".to_string(), sign),
    ];
    if let Some(id) = prepare_id {
        form.push(("merchant_prepare_id".to_string(), id.to_string()));
    }
    form
}

async fn order_row(app: &TestApp, id: i64) -> sub::Model {
    sub::Entity::find_by_id(id)
        .one(&app.pool)
        .await
        .unwrap()
        .unwrap()
}

#[actix_web::test]
async fn test_payme_full_lifecycle() {
    let app = TestApp::new().await;
    let user = app.create_user("+998902222221").await;
    let order = app
        .subscriptions
        .get_or_create_pending(user.id, PlanType::Month)
        .await
        .unwrap();
    let service = webhook_app!(app);

    let call = |body: Value| {
        test::TestRequest::post()
            .uri("/webhook/payme")
            .insert_header(("Authorization", payme_auth(PAYME_KEY)))
            .set_json(body)
            .to_request()
    };

    let resp: Value = test::call_and_read_body_json(
        &service,
        call(rpc(
            1,
            "CheckPerformTransaction",
            json!({ "amount": 1_000_000, "account": { "order_id": order.id.to_string() } }),
        )),
    )
    .await;
    assert_eq!(resp["result"]["allow"], json!(true));

    let time = now_millis();
    let resp: Value = test::call_and_read_body_json(
        &service,
        call(rpc(
            2,
            "CreateTransaction",
            json!({
                "id": "payme-1",
                "time": time,
                "amount": 1_000_000,
                "account": { "order_id": order.id }
            }),
        )),
    )
    .await;
    assert_eq!(resp["id"], json!(2));
    assert_eq!(resp["result"]["state"], json!(1));
    assert_eq!(resp["result"]["create_time"], json!(time));

    let resp: Value = test::call_and_read_body_json(
        &service,
        call(rpc(3, "PerformTransaction", json!({ "id": "payme-1" }))),
    )
    .await;
    assert_eq!(resp["result"]["state"], json!(2));
    let perform_time = resp["result"]["perform_time"].clone();

    // Payme retries perform; the answer must not change
    let again: Value = test::call_and_read_body_json(
        &service,
        call(rpc(4, "PerformTransaction", json!({ "id": "payme-1" }))),
    )
    .await;
    assert_eq!(again["result"]["perform_time"], perform_time);

    let row = order_row(&app, order.id).await;
    assert!(row.active);
    assert_eq!(row.end_date, Some(today() + Duration::days(30)));

    let resp: Value = test::call_and_read_body_json(
        &service,
        call(rpc(5, "CheckTransaction", json!({ "id": "payme-1" }))),
    )
    .await;
    assert_eq!(resp["result"]["state"], json!(2));
    assert_eq!(resp["result"]["cancel_time"], json!(0));

    let resp: Value = test::call_and_read_body_json(
        &service,
        call(rpc(
            6,
            "GetStatement",
            json!({ "from": time - 1_000, "to": time + 1_000 }),
        )),
    )
    .await;
    let transactions = resp["result"]["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0]["id"], json!("payme-1"));
    assert_eq!(transactions[0]["account"]["order_id"], json!(order.id.to_string()));

    let resp: Value = test::call_and_read_body_json(
        &service,
        call(rpc(
            7,
            "CancelTransaction",
            json!({ "id": "payme-1", "reason": 5 }),
        )),
    )
    .await;
    assert_eq!(resp["result"]["state"], json!(-2));
    assert!(!order_row(&app, order.id).await.active);
}

#[actix_web::test]
async fn test_payme_reconciliation_errors() {
    let app = TestApp::new().await;
    let user = app.create_user("+998902222222").await;
    let order = app
        .subscriptions
        .get_or_create_pending(user.id, PlanType::Month)
        .await
        .unwrap();
    let service = webhook_app!(app);

    let call = |body: Value| {
        test::TestRequest::post()
            .uri("/webhook/payme")
            .insert_header(("Authorization", payme_auth(PAYME_KEY)))
            .set_json(body)
            .to_request()
    };

    let resp: Value = test::call_and_read_body_json(
        &service,
        call(rpc(
            1,
            "CheckPerformTransaction",
            json!({ "amount": 1, "account": { "order_id": order.id } }),
        )),
    )
    .await;
    assert_eq!(resp["error"]["code"], json!(-31001));

    let resp: Value = test::call_and_read_body_json(
        &service,
        call(rpc(
            2,
            "CheckPerformTransaction",
            json!({ "amount": 1_000_000, "account": { "order_id": "404404" } }),
        )),
    )
    .await;
    assert_eq!(resp["error"]["code"], json!(-31050));

    let resp: Value = test::call_and_read_body_json(
        &service,
        call(rpc(3, "PerformTransaction", json!({ "id": "missing" }))),
    )
    .await;
    assert_eq!(resp["error"]["code"], json!(-31003));

    let resp: Value = test::call_and_read_body_json(
        &service,
        call(rpc(4, "ChargeEverything", json!({}))),
    )
    .await;
    assert_eq!(resp["error"]["code"], json!(-32601));

    // a second open transaction for the same order
    let create = |id: &str| {
        rpc(
            5,
            "CreateTransaction",
            json!({
                "id": id,
                "time": now_millis(),
                "amount": 1_000_000,
                "account": { "order_id": order.id }
            }),
        )
    };
    let resp: Value = test::call_and_read_body_json(&service, call(create("first"))).await;
    assert_eq!(resp["result"]["state"], json!(1));
    let resp: Value = test::call_and_read_body_json(&service, call(create("second"))).await;
    assert_eq!(resp["error"]["code"], json!(-31099));

    // nothing was activated along the way
    let row = order_row(&app, order.id).await;
    assert!(!row.active);
    assert_eq!(row.end_date, None);
}

#[actix_web::test]
async fn test_payme_rejects_bad_credentials_and_bodies() {
    let app = TestApp::new().await;
    let service = webhook_app!(app);

    let req = test::TestRequest::post()
        .uri("/webhook/payme")
        .insert_header(("Authorization", payme_auth("wrong-key")))
        .set_json(rpc(1, "CheckTransaction", json!({ "id": "x" })))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(resp["error"]["code"], json!(-32504));

    let req = test::TestRequest::post()
        .uri("/webhook/payme")
        .insert_header(("Authorization", payme_auth(PAYME_KEY)))
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(resp["error"]["code"], json!(-32700));
}

#[actix_web::test]
async fn test_payme_stale_transaction_times_out() {
    let app = TestApp::new().await;
    let user = app.create_user("+998902222223").await;
    let order = app
        .subscriptions
        .get_or_create_pending(user.id, PlanType::Month)
        .await
        .unwrap();
    let service = webhook_app!(app);

    let call = |body: Value| {
        test::TestRequest::post()
            .uri("/webhook/payme")
            .insert_header(("Authorization", payme_auth(PAYME_KEY)))
            .set_json(body)
            .to_request()
    };

    let thirteen_hours_ago = now_millis() - 13 * 3_600_000;
    let resp: Value = test::call_and_read_body_json(
        &service,
        call(rpc(
            1,
            "CreateTransaction",
            json!({
                "id": "old",
                "time": thirteen_hours_ago,
                "amount": 1_000_000,
                "account": { "order_id": order.id }
            }),
        )),
    )
    .await;
    assert_eq!(resp["result"]["state"], json!(1));

    let resp: Value = test::call_and_read_body_json(
        &service,
        call(rpc(2, "PerformTransaction", json!({ "id": "old" }))),
    )
    .await;
    assert_eq!(resp["error"]["code"], json!(-31008));

    let resp: Value = test::call_and_read_body_json(
        &service,
        call(rpc(3, "CheckTransaction", json!({ "id": "old" }))),
    )
    .await;
    assert_eq!(resp["result"]["state"], json!(-1));
    assert_eq!(resp["result"]["reason"], json!(4));
    assert!(!order_row(&app, order.id).await.active);
}

#[actix_web::test]
async fn test_click_prepare_and_complete() {
    let app = TestApp::new().await;
    let user = app.create_user("+998902222224").await;
    let order = app
        .subscriptions
        .get_or_create_pending(user.id, PlanType::Month)
        .await
        .unwrap();
    let service = webhook_app!(app);

    let req = test::TestRequest::post()
        .uri("/webhook/click/prepare")
        .set_form(click_form(0, "click-1", order.id, "10000", None, 0))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(resp["error"], json!(0));
    let prepare_id = resp["merchant_prepare_id"].as_i64().unwrap();

    let req = test::TestRequest::post()
        .uri("/webhook/click/complete")
        .set_form(click_form(1, "click-1", order.id, "10000", Some(prepare_id), 0))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(resp["error"], json!(0));
    assert_eq!(resp["merchant_confirm_id"], json!(prepare_id));

    let row = order_row(&app, order.id).await;
    assert!(row.active);
    assert_eq!(row.end_date, Some(today() + Duration::days(30)));

    // redelivered complete is answered the same and does not extend again
    let req = test::TestRequest::post()
        .uri("/webhook/click/complete")
        .set_form(click_form(1, "click-1", order.id, "10000", Some(prepare_id), 0))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(resp["error"], json!(0));
    assert_eq!(
        order_row(&app, order.id).await.end_date,
        Some(today() + Duration::days(30))
    );
}

#[actix_web::test]
async fn test_click_error_codes() {
    let app = TestApp::new().await;
    let user = app.create_user("+998902222225").await;
    let order = app
        .subscriptions
        .get_or_create_pending(user.id, PlanType::Month)
        .await
        .unwrap();
    let service = webhook_app!(app);

    let mut tampered = click_form(0, "click-x", order.id, "10000", None, 0);
    if let Some(sign) = tampered.iter_mut().find(|(k, _)| k == "sign_string") {
        sign.1 = "0".repeat(32);
    }
    let req = test::TestRequest::post()
        .uri("/webhook/click/prepare")
        .set_form(tampered)
        .to_request();
    let resp: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(resp["error"], json!(-1));

    let req = test::TestRequest::post()
        .uri("/webhook/click/prepare")
        .set_form(click_form(0, "click-2", order.id, "0.01", None, 0))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(resp["error"], json!(-2));

    let req = test::TestRequest::post()
        .uri("/webhook/click/prepare")
        .set_form(click_form(0, "click-3", 555_555, "10000", None, 0))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(resp["error"], json!(-5));

    let req = test::TestRequest::post()
        .uri("/webhook/click/prepare")
        .set_form(click_form(1, "click-4", order.id, "10000", None, 0))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(resp["error"], json!(-3));

    // Click reports a failed charge on complete
    let req = test::TestRequest::post()
        .uri("/webhook/click/prepare")
        .set_form(click_form(0, "click-5", order.id, "10000", None, 0))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&service, req).await;
    let prepare_id = resp["merchant_prepare_id"].as_i64().unwrap();

    let req = test::TestRequest::post()
        .uri("/webhook/click/complete")
        .set_form(click_form(1, "click-5", order.id, "10000", Some(prepare_id), -5017))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(resp["error"], json!(-9));
    assert!(!order_row(&app, order.id).await.active);
}

#[actix_web::test]
async fn test_click_complete_without_prepare() {
    let app = TestApp::new().await;
    let user = app.create_user("+998902222226").await;
    let order = app
        .subscriptions
        .get_or_create_pending(user.id, PlanType::Month)
        .await
        .unwrap();
    let service = webhook_app!(app);

    // complete arrives first, so the transaction is recorded on the spot
    let req = test::TestRequest::post()
        .uri("/webhook/click/complete")
        .set_form(click_form(1, "click-early", order.id, "10000", None, 0))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(resp["error"], json!(0));
    assert!(resp["merchant_confirm_id"].as_i64().is_some());

    let row = order_row(&app, order.id).await;
    assert!(row.active);
    assert_eq!(row.end_date, Some(today() + Duration::days(30)));
    assert!(app.reload_user(user.id).await.is_premium);

    // a prepare delivered late for the same Click transaction is refused
    let req = test::TestRequest::post()
        .uri("/webhook/click/prepare")
        .set_form(click_form(0, "click-early", order.id, "10000", None, 0))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(resp["error"], json!(-4));
    assert_eq!(resp["click_trans_id"], json!("click-early"));
    assert_eq!(
        order_row(&app, order.id).await.end_date,
        Some(today() + Duration::days(30))
    );
}

#[actix_web::test]
async fn test_click_malformed_form_gets_click_error() {
    let app = TestApp::new().await;
    let user = app.create_user("+998902222227").await;
    let order = app
        .subscriptions
        .get_or_create_pending(user.id, PlanType::Month)
        .await
        .unwrap();
    let service = webhook_app!(app);

    let mut form = click_form(0, "click-bad", order.id, "10000", None, 0);
    form.retain(|(k, _)| k != "sign_string");
    let req = test::TestRequest::post()
        .uri("/webhook/click/prepare")
        .set_form(form)
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], json!(-8));
    assert_eq!(body["error_note"], json!("Error in request from click"));
    assert_eq!(body["click_trans_id"], json!("click-bad"));
    assert_eq!(body["merchant_trans_id"], json!(order.id.to_string()));

    let req = test::TestRequest::post()
        .uri("/webhook/click/complete")
        .insert_header(("Content-Type", "application/x-www-form-urlencoded"))
        .set_payload("action=not-a-number")
        .to_request();
    let body: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(body["error"], json!(-8));
    assert_eq!(body["click_trans_id"], json!(""));

    assert!(!order_row(&app, order.id).await.active);
}
