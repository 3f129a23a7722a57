use crate::middlewares::require_staff;
use crate::models::*;
use crate::services::{CatalogService, SubscriptionService};
use crate::services::subscription_service::today;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

pub async fn create_program(
    catalog_service: web::Data<CatalogService>,
    req: HttpRequest,
    request: web::Json<CreateProgramRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_staff(&req) {
        return Ok(e.error_response());
    }

    match catalog_service.create_program(request.into_inner()).await {
        Ok(program) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": program
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub async fn create_session(
    catalog_service: web::Data<CatalogService>,
    req: HttpRequest,
    request: web::Json<CreateSessionRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_staff(&req) {
        return Ok(e.error_response());
    }

    match catalog_service.create_session(request.into_inner()).await {
        Ok(session) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": session
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub async fn create_exercise(
    catalog_service: web::Data<CatalogService>,
    req: HttpRequest,
    request: web::Json<CreateExerciseRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_staff(&req) {
        return Ok(e.error_response());
    }

    match catalog_service.create_exercise(request.into_inner()).await {
        Ok(exercise) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": exercise
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub async fn create_meal(
    catalog_service: web::Data<CatalogService>,
    req: HttpRequest,
    request: web::Json<CreateMealRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_staff(&req) {
        return Ok(e.error_response());
    }

    match catalog_service.create_meal(request.into_inner()).await {
        Ok(meal) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": meal
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

/// Runs the lapse sweep on demand.
pub async fn expire_subscriptions(
    subscription_service: web::Data<SubscriptionService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    if let Err(e) = require_staff(&req) {
        return Ok(e.error_response());
    }

    match subscription_service.expire_lapsed(today()).await {
        Ok(count) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": {
                "expired_count": count
            }
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/programs", web::post().to(create_program))
            .route("/sessions", web::post().to(create_session))
            .route("/exercises", web::post().to(create_exercise))
            .route("/meals", web::post().to(create_meal))
            .route("/subscriptions/expire", web::post().to(expire_subscriptions)),
    );
}
