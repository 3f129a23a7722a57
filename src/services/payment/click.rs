use super::{
    CancelRequest, CheckOutcome, CheckRequest, CommitRequest, PaymentError, PaymentProvider,
    Settlement, TransactionSnapshot,
};
use crate::config::ClickConfig;
use crate::entities::{PaymentProviderKind, subscription_entity as sub};
use crate::error::{AppError, AppResult};
use crate::external::click::{self as wire, ClickRequest, ClickResponse};
use async_trait::async_trait;

const KIND: PaymentProviderKind = PaymentProviderKind::Click;

/// Click SHOP-API on top of the shared settlement flow.
#[derive(Clone)]
pub struct ClickGateway {
    config: ClickConfig,
    settlement: Settlement,
}

impl ClickGateway {
    pub fn new(config: ClickConfig, settlement: Settlement) -> Self {
        Self { config, settlement }
    }

    /// Signature, service and basic field checks shared by both callbacks.
    fn validate(&self, request: &ClickRequest, action: i32) -> Result<(i64, i64), i32> {
        if !request.verify_sign(&self.config.secret_key) {
            log::warn!(
                "Click sign check failed for transaction {}",
                request.click_trans_id
            );
            return Err(wire::ERR_SIGN_CHECK_FAILED);
        }
        if request.service_id != self.config.service_id {
            return Err(wire::ERR_REQUEST);
        }
        if request.action != action {
            return Err(wire::ERR_ACTION_NOT_FOUND);
        }
        let order_id = request.order_id().ok_or(wire::ERR_ORDER_NOT_FOUND)?;
        let amount = request.amount_minor().ok_or(wire::ERR_INCORRECT_AMOUNT)?;
        Ok((order_id, amount))
    }

    pub async fn prepare(&self, request: &ClickRequest) -> AppResult<ClickResponse> {
        let (order_id, amount_minor) = match self.validate(request, wire::ACTION_PREPARE) {
            Ok(parsed) => parsed,
            Err(code) => return Ok(ClickResponse::for_request(request, code)),
        };

        let outcome = self
            .check(CheckRequest {
                order_id,
                amount_minor,
                external_id: Some(request.click_trans_id.clone()),
                provider_time: None,
            })
            .await;

        match outcome {
            Ok(CheckOutcome {
                transaction: Some(tx),
                ..
            }) => Ok(ClickResponse::prepared(request, tx.id)),
            Ok(_) => Err(AppError::InternalError(
                "click prepare did not record a transaction".to_string(),
            )),
            Err(e) => reject(request, e),
        }
    }

    pub async fn complete(&self, request: &ClickRequest) -> AppResult<ClickResponse> {
        let (order_id, amount_minor) = match self.validate(request, wire::ACTION_COMPLETE) {
            Ok(parsed) => parsed,
            Err(code) => return Ok(ClickResponse::for_request(request, code)),
        };

        // a prepare id that does not match the recorded transaction
        if let Some(prepare_id) = request.merchant_prepare_id.as_deref()
            && let Some(tx) = self
                .settlement
                .find_transaction(KIND, &request.click_trans_id)
                .await
                .map_err(into_app_error)?
            && prepare_id.trim().parse::<i64>().ok() != Some(tx.id)
        {
            return Ok(ClickResponse::for_request(
                request,
                wire::ERR_TRANSACTION_NOT_FOUND,
            ));
        }

        // Click reports a failed charge through the `error` field
        if request.error.is_some_and(|code| code < 0) {
            log::warn!(
                "Click reported failure {:?} ({:?}) for transaction {}",
                request.error,
                request.error_note,
                request.click_trans_id
            );
            let cancelled = self
                .cancel(CancelRequest {
                    external_id: request.click_trans_id.clone(),
                    reason: request.error,
                })
                .await;
            return match cancelled {
                Ok(_) => Ok(ClickResponse::for_request(
                    request,
                    wire::ERR_TRANSACTION_CANCELLED,
                )),
                Err(e) => reject(request, e),
            };
        }

        let committed = self
            .commit(CommitRequest {
                external_id: request.click_trans_id.clone(),
                order_id: Some(order_id),
                amount_minor: Some(amount_minor),
            })
            .await;

        match committed {
            Ok(tx) => Ok(ClickResponse::confirmed(request, tx.id)),
            Err(e) => reject(request, e),
        }
    }
}

#[async_trait]
impl PaymentProvider for ClickGateway {
    fn kind(&self) -> PaymentProviderKind {
        KIND
    }

    async fn check(&self, request: CheckRequest) -> Result<CheckOutcome, PaymentError> {
        self.settlement.check(KIND, request).await
    }

    async fn commit(&self, request: CommitRequest) -> Result<TransactionSnapshot, PaymentError> {
        self.settlement.commit(KIND, request).await
    }

    async fn cancel(&self, request: CancelRequest) -> Result<TransactionSnapshot, PaymentError> {
        self.settlement.cancel(KIND, request).await
    }

    fn redirect_url(&self, order: &sub::Model) -> AppResult<String> {
        wire::checkout_url(
            &self.config.checkout_url,
            &self.config.service_id,
            &self.config.merchant_id,
            order.id,
            order.amount,
            self.config.return_url.as_deref(),
        )
    }
}

fn error_code(e: &PaymentError) -> i32 {
    match e {
        PaymentError::UnknownOrder(_) => wire::ERR_ORDER_NOT_FOUND,
        PaymentError::InvalidAmount { .. } => wire::ERR_INCORRECT_AMOUNT,
        PaymentError::TransactionNotFound(_) => wire::ERR_TRANSACTION_NOT_FOUND,
        PaymentError::AlreadyPaid(_) => wire::ERR_ALREADY_PAID,
        PaymentError::Cancelled(_) => wire::ERR_TRANSACTION_CANCELLED,
        PaymentError::OrderBusy { .. }
        | PaymentError::CannotPerform(_)
        | PaymentError::Internal(_) => wire::ERR_REQUEST,
    }
}

/// Provider error body for reconciliation failures; internal failures
/// propagate so Click gets a 5xx and retries.
fn reject(request: &ClickRequest, e: PaymentError) -> AppResult<ClickResponse> {
    if e.is_internal() {
        return Err(into_app_error(e));
    }
    log::error!(
        "Click transaction {} rejected: {e}",
        request.click_trans_id
    );
    Ok(ClickResponse::for_request(request, error_code(&e)))
}

fn into_app_error(e: PaymentError) -> AppError {
    match e {
        PaymentError::Internal(inner) => inner,
        other => AppError::PaymentError(other.to_string()),
    }
}
