//! Payme merchant API: JSON-RPC wire types, error codes and checkout links.
//!
//! Payme calls the merchant endpoint with `{"method", "params", "id"}` and
//! always expects HTTP 200; failures travel in the `error` member.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

/// Transactions left in state 1 longer than this are auto-cancelled.
pub const TRANSACTION_TIMEOUT_MS: i64 = 43_200_000;
/// Cancel reason recorded for the timeout.
pub const REASON_TIMEOUT: i32 = 4;

pub const ERR_INVALID_AMOUNT: i32 = -31001;
pub const ERR_TRANSACTION_NOT_FOUND: i32 = -31003;
pub const ERR_CANNOT_PERFORM: i32 = -31008;
pub const ERR_ORDER_NOT_FOUND: i32 = -31050;
pub const ERR_ORDER_BUSY: i32 = -31099;
pub const ERR_INSUFFICIENT_PRIVILEGES: i32 = -32504;
pub const ERR_METHOD_NOT_FOUND: i32 = -32601;
pub const ERR_INVALID_REQUEST: i32 = -32600;
pub const ERR_PARSE: i32 = -32700;
pub const ERR_SYSTEM: i32 = -32400;

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    CheckPerformTransaction,
    CreateTransaction,
    PerformTransaction,
    CancelTransaction,
    CheckTransaction,
    GetStatement,
}

impl Method {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "CheckPerformTransaction" => Some(Method::CheckPerformTransaction),
            "CreateTransaction" => Some(Method::CreateTransaction),
            "PerformTransaction" => Some(Method::PerformTransaction),
            "CancelTransaction" => Some(Method::CancelTransaction),
            "CheckTransaction" => Some(Method::CheckTransaction),
            "GetStatement" => Some(Method::GetStatement),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    #[serde(deserialize_with = "order_id_from_any")]
    pub order_id: i64,
}

/// Payme sends account fields as configured in the cashbox, usually strings.
fn order_id_from_any<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    match &raw {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| serde::de::Error::custom(format!("invalid order_id: {raw}")))
}

#[derive(Debug, Deserialize)]
pub struct CheckPerformParams {
    pub amount: i64,
    pub account: Account,
}

#[derive(Debug, Deserialize)]
pub struct CreateParams {
    pub id: String,
    pub time: i64,
    pub amount: i64,
    pub account: Account,
}

#[derive(Debug, Deserialize)]
pub struct TransactionIdParams {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelParams {
    pub id: String,
    pub reason: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct StatementParams {
    pub from: i64,
    pub to: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LocalizedMessage {
    pub ru: String,
    pub uz: String,
    pub en: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RpcError {
    pub code: i32,
    pub message: LocalizedMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl RpcError {
    pub fn new(code: i32, data: Option<&str>) -> Self {
        let (ru, uz, en) = match code {
            ERR_INVALID_AMOUNT => ("Неверная сумма", "Noto'g'ri summa", "Invalid amount"),
            ERR_TRANSACTION_NOT_FOUND => (
                "Транзакция не найдена",
                "Tranzaksiya topilmadi",
                "Transaction not found",
            ),
            ERR_CANNOT_PERFORM => (
                "Невозможно выполнить операцию",
                "Amalni bajarib bo'lmaydi",
                "Unable to perform operation",
            ),
            ERR_ORDER_NOT_FOUND => ("Заказ не найден", "Buyurtma topilmadi", "Order not found"),
            ERR_ORDER_BUSY => (
                "Заказ ожидает оплаты",
                "Buyurtma to'lovni kutmoqda",
                "Order is busy with another transaction",
            ),
            ERR_INSUFFICIENT_PRIVILEGES => (
                "Недостаточно привилегий",
                "Huquqlar yetarli emas",
                "Insufficient privileges",
            ),
            ERR_METHOD_NOT_FOUND => ("Метод не найден", "Usul topilmadi", "Method not found"),
            ERR_INVALID_REQUEST => ("Неверный запрос", "Noto'g'ri so'rov", "Invalid request"),
            ERR_PARSE => ("Ошибка разбора JSON", "JSON xatosi", "Parse error"),
            _ => ("Системная ошибка", "Tizim xatosi", "System error"),
        };
        Self {
            code,
            message: LocalizedMessage {
                ru: ru.to_string(),
                uz: uz.to_string(),
                en: en.to_string(),
            },
            data: data.map(str::to_string),
        }
    }
}

pub fn success(id: &Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

pub fn failure(id: &Value, error: RpcError) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": error })
}

/// Checks `Authorization: Basic base64(Paycom:<key>)`.
pub fn verify_authorization(header: Option<&str>, key: &str) -> bool {
    let Some(encoded) = header.and_then(|h| h.strip_prefix("Basic ")) else {
        return false;
    };
    let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
        return false;
    };
    let Ok(credentials) = String::from_utf8(decoded) else {
        return false;
    };
    match credentials.split_once(':') {
        Some((login, password)) => login == "Paycom" && !key.is_empty() && password == key,
        None => false,
    }
}

/// `https://checkout.paycom.uz/<base64(m=..;ac.order_id=..;a=..;c=..)>`
pub fn checkout_url(
    base: &str,
    merchant_id: &str,
    order_id: i64,
    amount_minor: i64,
    return_url: Option<&str>,
) -> String {
    let mut params = format!("m={merchant_id};ac.order_id={order_id};a={amount_minor}");
    if let Some(url) = return_url {
        params.push_str(&format!(";c={url}"));
    }
    format!("{}/{}", base.trim_end_matches('/'), STANDARD.encode(params))
}
