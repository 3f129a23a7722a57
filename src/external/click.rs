//! Click SHOP-API: prepare/complete callbacks, md5 signatures and checkout links.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};

pub const ACTION_PREPARE: i32 = 0;
pub const ACTION_COMPLETE: i32 = 1;

pub const SUCCESS: i32 = 0;
pub const ERR_SIGN_CHECK_FAILED: i32 = -1;
pub const ERR_INCORRECT_AMOUNT: i32 = -2;
pub const ERR_ACTION_NOT_FOUND: i32 = -3;
pub const ERR_ALREADY_PAID: i32 = -4;
pub const ERR_ORDER_NOT_FOUND: i32 = -5;
pub const ERR_TRANSACTION_NOT_FOUND: i32 = -6;
pub const ERR_REQUEST: i32 = -8;
pub const ERR_TRANSACTION_CANCELLED: i32 = -9;

/// Form body shared by both callbacks; `merchant_prepare_id` only arrives on complete.
#[derive(Debug, Clone, Deserialize)]
pub struct ClickRequest {
    pub click_trans_id: String,
    pub service_id: String,
    #[serde(default)]
    pub click_paydoc_id: Option<String>,
    pub merchant_trans_id: String,
    #[serde(default)]
    pub merchant_prepare_id: Option<String>,
    /// Soum, decimal string such as `10000` or `10000.00`.
    pub amount: String,
    pub action: i32,
    #[serde(default)]
    pub error: Option<i32>,
    #[serde(default)]
    pub error_note: Option<String>,
    pub sign_time: String,
    pub sign_string: String,
}

impl ClickRequest {
    /// md5 of the concatenated fields; complete inserts `merchant_prepare_id` before amount.
    pub fn expected_sign(&self, secret_key: &str) -> String {
        let prepare_id = if self.action == ACTION_COMPLETE {
            self.merchant_prepare_id.as_deref().unwrap_or_default()
        } else {
            ""
        };
        let raw = format!(
            "{}{}{}{}{}{}{}{}",
            self.click_trans_id,
            self.service_id,
            secret_key,
            self.merchant_trans_id,
            prepare_id,
            self.amount,
            self.action,
            self.sign_time
        );
        format!("{:x}", md5::compute(raw.as_bytes()))
    }

    pub fn verify_sign(&self, secret_key: &str) -> bool {
        !secret_key.is_empty() && self.sign_string.eq_ignore_ascii_case(&self.expected_sign(secret_key))
    }

    pub fn order_id(&self) -> Option<i64> {
        self.merchant_trans_id.trim().parse().ok()
    }

    /// Amount in tiyin; `None` when the string is not a non-negative decimal with at most two fractional digits.
    pub fn amount_minor(&self) -> Option<i64> {
        parse_minor_units(&self.amount)
    }
}

pub fn parse_minor_units(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let (whole, fraction) = match raw.split_once('.') {
        Some((w, f)) => (w, f),
        None => (raw, ""),
    };
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if fraction.len() > 2 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let whole: i64 = whole.parse().ok()?;
    let cents: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().ok()? * 10,
        _ => fraction.parse().ok()?,
    };
    whole.checked_mul(100)?.checked_add(cents)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ClickResponse {
    pub click_trans_id: String,
    pub merchant_trans_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_prepare_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_confirm_id: Option<i64>,
    pub error: i32,
    pub error_note: String,
}

impl ClickResponse {
    pub fn for_request(request: &ClickRequest, error: i32) -> Self {
        Self::rejected(&request.click_trans_id, &request.merchant_trans_id, error)
    }

    /// Error body built from whatever ids could be read off the request.
    pub fn rejected(click_trans_id: &str, merchant_trans_id: &str, error: i32) -> Self {
        Self {
            click_trans_id: click_trans_id.to_string(),
            merchant_trans_id: merchant_trans_id.to_string(),
            merchant_prepare_id: None,
            merchant_confirm_id: None,
            error,
            error_note: error_note(error).to_string(),
        }
    }

    pub fn prepared(request: &ClickRequest, prepare_id: i64) -> Self {
        Self {
            merchant_prepare_id: Some(prepare_id),
            ..Self::for_request(request, SUCCESS)
        }
    }

    pub fn confirmed(request: &ClickRequest, confirm_id: i64) -> Self {
        Self {
            merchant_confirm_id: Some(confirm_id),
            ..Self::for_request(request, SUCCESS)
        }
    }
}

pub fn error_note(code: i32) -> &'static str {
    match code {
        SUCCESS => "Success",
        ERR_SIGN_CHECK_FAILED => "SIGN CHECK FAILED!",
        ERR_INCORRECT_AMOUNT => "Incorrect parameter amount",
        ERR_ACTION_NOT_FOUND => "Action not found",
        ERR_ALREADY_PAID => "Already paid",
        ERR_ORDER_NOT_FOUND => "User does not exist",
        ERR_TRANSACTION_NOT_FOUND => "Transaction does not exist",
        ERR_TRANSACTION_CANCELLED => "Transaction cancelled",
        _ => "Error in request from click",
    }
}

/// `https://my.click.uz/services/pay?service_id=..&merchant_id=..&amount=..&transaction_param=..`
pub fn checkout_url(
    base: &str,
    service_id: &str,
    merchant_id: &str,
    order_id: i64,
    amount: i64,
    return_url: Option<&str>,
) -> AppResult<String> {
    let amount = amount.to_string();
    let order_id = order_id.to_string();
    let mut params = vec![
        ("service_id", service_id),
        ("merchant_id", merchant_id),
        ("amount", amount.as_str()),
        ("transaction_param", order_id.as_str()),
    ];
    if let Some(url) = return_url {
        params.push(("return_url", url));
    }
    let url = reqwest::Url::parse_with_params(base, &params)
        .map_err(|e| AppError::InternalError(format!("click checkout url: {e}")))?;
    Ok(url.to_string())
}
