use crate::middlewares::current_user;
use crate::models::*;
use crate::services::ProgressService;
use crate::services::subscription_service::today;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

pub async fn enroll(
    progress_service: web::Data<ProgressService>,
    req: HttpRequest,
    request: web::Json<EnrollRequest>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match progress_service.enroll(user.user_id, request.into_inner()).await {
        Ok(enrollment) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": enrollment
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub async fn get_progress(
    progress_service: web::Data<ProgressService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match progress_service
        .get_progress(user.user_id, path.into_inner())
        .await
    {
        Ok(progress) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": progress
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub async fn schedule(
    progress_service: web::Data<ProgressService>,
    req: HttpRequest,
    query: web::Query<ScheduleQuery>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };
    let date = query.date.unwrap_or_else(today);

    match progress_service.schedule_for_date(user.user_id, date).await {
        Ok(sessions) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": {
                "date": date,
                "sessions": sessions
            }
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub async fn complete_session(
    progress_service: web::Data<ProgressService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match progress_service
        .complete_session(user.user_id, path.into_inner())
        .await
    {
        Ok(progress) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": progress
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub async fn complete_meal(
    progress_service: web::Data<ProgressService>,
    req: HttpRequest,
    request: web::Json<CompleteMealRequest>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match progress_service
        .complete_meal(user.user_id, request.session_id, request.meal_id)
        .await
    {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({ "success": true }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub async fn complete_exercise(
    progress_service: web::Data<ProgressService>,
    req: HttpRequest,
    request: web::Json<CompleteExerciseRequest>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match progress_service
        .complete_exercise(user.user_id, request.session_id, request.exercise_id)
        .await
    {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({ "success": true }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub async fn start_exercise(
    progress_service: web::Data<ProgressService>,
    req: HttpRequest,
    request: web::Json<CompleteExerciseRequest>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match progress_service
        .start_exercise(user.user_id, request.session_id, request.exercise_id)
        .await
    {
        Ok(started) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": started
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn program_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/programs")
            .route("/enroll", web::post().to(enroll))
            .route("/{program_id}/progress", web::get().to(get_progress)),
    )
    .service(
        web::scope("/progress")
            .route("/schedule", web::get().to(schedule))
            .route("/sessions/{session_id}/complete", web::post().to(complete_session))
            .route("/meals/complete", web::post().to(complete_meal))
            .route("/exercises/complete", web::post().to(complete_exercise))
            .route("/exercises/start", web::post().to(start_exercise)),
    );
}
