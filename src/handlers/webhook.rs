use crate::external::click::{self, ClickRequest, ClickResponse};
use crate::external::payme::{self, RpcError, RpcRequest};
use crate::services::{ClickGateway, PaymeGateway};
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::Value;
use std::collections::HashMap;

/// Payme JSON-RPC endpoint. Protocol errors are answered with HTTP 200 and
/// an RPC error body; database failures return 500 so Payme retries.
pub async fn payme_webhook(
    req: HttpRequest,
    body: web::Bytes,
    gateway: web::Data<PaymeGateway>,
) -> Result<HttpResponse> {
    let authorization = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok());

    let request: RpcRequest = match serde_json::from_slice::<Value>(&body) {
        Ok(value) => {
            let id = value.get("id").cloned().unwrap_or(Value::Null);
            match serde_json::from_value(value) {
                Ok(request) => request,
                Err(e) => {
                    log::warn!("Invalid Payme request: {e}");
                    return Ok(HttpResponse::Ok().json(payme::failure(
                        &id,
                        RpcError::new(payme::ERR_INVALID_REQUEST, None),
                    )));
                }
            }
        }
        Err(e) => {
            log::warn!("Unparseable Payme body: {e}");
            return Ok(HttpResponse::Ok().json(payme::failure(
                &Value::Null,
                RpcError::new(payme::ERR_PARSE, None),
            )));
        }
    };

    if !gateway.is_authorized(authorization) {
        log::warn!("Payme request with invalid credentials");
        return Ok(HttpResponse::Ok().json(payme::failure(
            &request.id,
            RpcError::new(payme::ERR_INSUFFICIENT_PRIVILEGES, None),
        )));
    }

    log::info!("Payme {} (id {})", request.method, request.id);
    match gateway.handle(request).await {
        Ok(body) => Ok(HttpResponse::Ok().json(body)),
        Err(e) => Ok(e.error_response()),
    }
}

/// Click posts urlencoded forms. A form that does not deserialize is
/// answered with a Click `-8` body rather than the framework's plain 400.
fn parse_click_form(body: &[u8]) -> Result<ClickRequest, ClickResponse> {
    let raw = std::str::from_utf8(body).unwrap_or_default();
    web::Query::<ClickRequest>::from_query(raw)
        .map(web::Query::into_inner)
        .map_err(|e| {
            log::warn!("Malformed Click form: {e}");
            let fields = web::Query::<HashMap<String, String>>::from_query(raw)
                .map(web::Query::into_inner)
                .unwrap_or_default();
            ClickResponse::rejected(
                fields.get("click_trans_id").map_or("", String::as_str),
                fields.get("merchant_trans_id").map_or("", String::as_str),
                click::ERR_REQUEST,
            )
        })
}

pub async fn click_prepare(
    body: web::Bytes,
    gateway: web::Data<ClickGateway>,
) -> Result<HttpResponse> {
    let request = match parse_click_form(&body) {
        Ok(request) => request,
        Err(rejected) => return Ok(HttpResponse::Ok().json(rejected)),
    };
    log::info!(
        "Click prepare {} for order {}",
        request.click_trans_id,
        request.merchant_trans_id
    );
    match gateway.prepare(&request).await {
        Ok(response) => Ok(HttpResponse::Ok().json(response)),
        Err(e) => Ok(e.error_response()),
    }
}

pub async fn click_complete(
    body: web::Bytes,
    gateway: web::Data<ClickGateway>,
) -> Result<HttpResponse> {
    let request = match parse_click_form(&body) {
        Ok(request) => request,
        Err(rejected) => return Ok(HttpResponse::Ok().json(rejected)),
    };
    log::info!(
        "Click complete {} for order {}",
        request.click_trans_id,
        request.merchant_trans_id
    );
    match gateway.complete(&request).await {
        Ok(response) => Ok(HttpResponse::Ok().json(response)),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn webhook_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/webhook")
            .route("/payme", web::post().to(payme_webhook))
            .route("/click/prepare", web::post().to(click_prepare))
            .route("/click/complete", web::post().to(click_complete)),
    );
}
