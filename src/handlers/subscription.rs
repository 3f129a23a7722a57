use crate::entities::PlanType;
use crate::middlewares::current_user;
use crate::models::*;
use crate::services::subscription_service::today;
use crate::services::{PaymentDispatcher, SubscriptionService};
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

pub async fn list_plans(subscription_service: web::Data<SubscriptionService>) -> Result<HttpResponse> {
    let pricing = subscription_service.pricing();
    let plans: Vec<PlanResponse> = [PlanType::Month, PlanType::Quarter, PlanType::Year]
        .into_iter()
        .map(|plan_type| PlanResponse {
            plan_type,
            price: pricing.price(&plan_type),
            days: pricing.validity_days(&plan_type),
        })
        .collect();

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": plans
    })))
}

pub async fn checkout(
    dispatcher: web::Data<PaymentDispatcher>,
    req: HttpRequest,
    request: web::Json<CheckoutRequest>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };
    let request = request.into_inner();

    match dispatcher
        .checkout(user.user_id, request.plan_type, request.provider)
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub async fn current(
    subscription_service: web::Data<SubscriptionService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match subscription_service.current_for_user(user.user_id).await {
        Ok(found) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": found.map(|s| SubscriptionResponse::from_model(s, today()))
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn subscription_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/subscriptions")
            .route("/plans", web::get().to(list_plans))
            .route("/checkout", web::post().to(checkout))
            .route("/current", web::get().to(current)),
    );
}
