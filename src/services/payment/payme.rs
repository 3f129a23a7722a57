use super::settlement::now_millis;
use super::{
    CancelRequest, CheckOutcome, CheckRequest, CommitRequest, PaymentError, PaymentProvider,
    Settlement, TransactionSnapshot,
};
use crate::config::PaymeConfig;
use crate::entities::{PaymentProviderKind, TransactionState, subscription_entity as sub};
use crate::error::{AppError, AppResult};
use crate::external::payme::{self as wire, Method, RpcError, RpcRequest};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

const KIND: PaymentProviderKind = PaymentProviderKind::Payme;

/// Payme merchant API on top of the shared settlement flow.
#[derive(Clone)]
pub struct PaymeGateway {
    config: PaymeConfig,
    settlement: Settlement,
}

impl PaymeGateway {
    pub fn new(config: PaymeConfig, settlement: Settlement) -> Self {
        Self { config, settlement }
    }

    pub fn is_authorized(&self, authorization: Option<&str>) -> bool {
        wire::verify_authorization(authorization, &self.config.secret_key)
    }

    /// Answers one JSON-RPC call. Protocol errors come back as an RPC error
    /// body; only internal failures are returned as `Err`.
    pub async fn handle(&self, request: RpcRequest) -> AppResult<Value> {
        let id = request.id.clone();
        let Some(method) = Method::parse(&request.method) else {
            log::warn!("Payme called unknown method {}", request.method);
            return Ok(wire::failure(
                &id,
                RpcError::new(wire::ERR_METHOD_NOT_FOUND, Some(request.method.as_str())),
            ));
        };

        let outcome = match method {
            Method::CheckPerformTransaction => self.check_perform(request.params).await,
            Method::CreateTransaction => self.create_transaction(request.params).await,
            Method::PerformTransaction => self.perform_transaction(request.params).await,
            Method::CancelTransaction => self.cancel_transaction(request.params).await,
            Method::CheckTransaction => self.check_transaction(request.params).await,
            Method::GetStatement => self.get_statement(request.params).await,
        };

        match outcome {
            Ok(result) => Ok(wire::success(&id, result)),
            Err(RpcFailure::Protocol(error)) => {
                log::warn!("Payme {method:?} rejected with {}", error.code);
                Ok(wire::failure(&id, error))
            }
            Err(RpcFailure::Internal(e)) => Err(e),
        }
    }

    async fn check_perform(&self, params: Value) -> Result<Value, RpcFailure> {
        let params: wire::CheckPerformParams = parse_params(params)?;
        self.check(CheckRequest {
            order_id: params.account.order_id,
            amount_minor: params.amount,
            external_id: None,
            provider_time: None,
        })
        .await?;
        Ok(json!({ "allow": true }))
    }

    async fn create_transaction(&self, params: Value) -> Result<Value, RpcFailure> {
        let params: wire::CreateParams = parse_params(params)?;
        let outcome = self
            .check(CheckRequest {
                order_id: params.account.order_id,
                amount_minor: params.amount,
                external_id: Some(params.id.clone()),
                provider_time: Some(params.time),
            })
            .await?;

        let tx = outcome
            .transaction
            .ok_or_else(|| PaymentError::TransactionNotFound(params.id))?;
        Ok(json!({
            "create_time": tx.create_time,
            "transaction": tx.id.to_string(),
            "state": tx.state.code(),
        }))
    }

    async fn perform_transaction(&self, params: Value) -> Result<Value, RpcFailure> {
        let params: wire::TransactionIdParams = parse_params(params)?;
        let tx = self
            .commit(CommitRequest {
                external_id: params.id,
                order_id: None,
                amount_minor: None,
            })
            .await?;
        Ok(json!({
            "transaction": tx.id.to_string(),
            "perform_time": tx.perform_time.unwrap_or(0),
            "state": tx.state.code(),
        }))
    }

    async fn cancel_transaction(&self, params: Value) -> Result<Value, RpcFailure> {
        let params: wire::CancelParams = parse_params(params)?;
        let tx = self
            .cancel(CancelRequest {
                external_id: params.id,
                reason: params.reason,
            })
            .await?;
        Ok(json!({
            "transaction": tx.id.to_string(),
            "cancel_time": tx.cancel_time.unwrap_or(0),
            "state": tx.state.code(),
        }))
    }

    async fn check_transaction(&self, params: Value) -> Result<Value, RpcFailure> {
        let params: wire::TransactionIdParams = parse_params(params)?;
        let tx: TransactionSnapshot = self
            .settlement
            .find_transaction(KIND, &params.id)
            .await?
            .ok_or(PaymentError::TransactionNotFound(params.id))?
            .into();
        Ok(json!({
            "create_time": tx.create_time,
            "perform_time": tx.perform_time.unwrap_or(0),
            "cancel_time": tx.cancel_time.unwrap_or(0),
            "transaction": tx.id.to_string(),
            "state": tx.state.code(),
            "reason": tx.reason,
        }))
    }

    async fn get_statement(&self, params: Value) -> Result<Value, RpcFailure> {
        let params: wire::StatementParams = parse_params(params)?;
        let rows = self
            .settlement
            .statement(KIND, params.from, params.to)
            .await?;
        let transactions: Vec<Value> = rows
            .into_iter()
            .map(|t| {
                json!({
                    "id": t.external_id,
                    "time": t.create_time,
                    "amount": t.amount,
                    "account": { "order_id": t.subscription_id.to_string() },
                    "create_time": t.create_time,
                    "perform_time": t.perform_time.unwrap_or(0),
                    "cancel_time": t.cancel_time.unwrap_or(0),
                    "transaction": t.id.to_string(),
                    "state": t.state.code(),
                    "reason": t.reason,
                })
            })
            .collect();
        Ok(json!({ "transactions": transactions }))
    }

    /// Cancels a transaction left in state 1 past the Payme timeout.
    /// Returns true when it did.
    async fn expire_if_stale(&self, external_id: &str) -> Result<bool, PaymentError> {
        let Some(tx) = self.settlement.find_transaction(KIND, external_id).await? else {
            return Ok(false);
        };
        if tx.state != TransactionState::Created
            || now_millis() - tx.create_time <= wire::TRANSACTION_TIMEOUT_MS
        {
            return Ok(false);
        }

        log::warn!("Payme transaction {external_id} timed out, cancelling");
        self.settlement
            .cancel(
                KIND,
                CancelRequest {
                    external_id: external_id.to_string(),
                    reason: Some(wire::REASON_TIMEOUT),
                },
            )
            .await?;
        Ok(true)
    }
}

#[async_trait]
impl PaymentProvider for PaymeGateway {
    fn kind(&self) -> PaymentProviderKind {
        KIND
    }

    async fn check(&self, request: CheckRequest) -> Result<CheckOutcome, PaymentError> {
        if let Some(external_id) = &request.external_id {
            if self.expire_if_stale(external_id).await? {
                return Err(PaymentError::CannotPerform(external_id.clone()));
            }
            // one open Payme transaction per order
            if let Some(open) = self.settlement.open_transaction(KIND, request.order_id).await?
                && &open.external_id != external_id
                && !self.expire_if_stale(&open.external_id).await?
            {
                return Err(PaymentError::OrderBusy {
                    order_id: request.order_id,
                    external_id: open.external_id,
                });
            }
        }
        self.settlement.check(KIND, request).await
    }

    async fn commit(&self, request: CommitRequest) -> Result<TransactionSnapshot, PaymentError> {
        if self.expire_if_stale(&request.external_id).await? {
            return Err(PaymentError::CannotPerform(request.external_id));
        }
        self.settlement.commit(KIND, request).await
    }

    async fn cancel(&self, request: CancelRequest) -> Result<TransactionSnapshot, PaymentError> {
        self.settlement.cancel(KIND, request).await
    }

    fn redirect_url(&self, order: &sub::Model) -> AppResult<String> {
        Ok(wire::checkout_url(
            &self.config.checkout_url,
            &self.config.merchant_id,
            order.id,
            order.amount_minor(),
            self.config.return_url.as_deref(),
        ))
    }
}

enum RpcFailure {
    Protocol(RpcError),
    Internal(AppError),
}

impl From<PaymentError> for RpcFailure {
    fn from(e: PaymentError) -> Self {
        let (code, data) = match &e {
            PaymentError::UnknownOrder(_) => (wire::ERR_ORDER_NOT_FOUND, Some("order_id")),
            PaymentError::InvalidAmount { .. } => (wire::ERR_INVALID_AMOUNT, Some("amount")),
            PaymentError::TransactionNotFound(_) => (wire::ERR_TRANSACTION_NOT_FOUND, None),
            PaymentError::OrderBusy { .. } => (wire::ERR_ORDER_BUSY, Some("order_id")),
            PaymentError::AlreadyPaid(_)
            | PaymentError::Cancelled(_)
            | PaymentError::CannotPerform(_) => (wire::ERR_CANNOT_PERFORM, None),
            PaymentError::Internal(_) => (wire::ERR_SYSTEM, None),
        };
        match e {
            PaymentError::Internal(inner) => RpcFailure::Internal(inner),
            other => {
                log::error!("Payme reconciliation failed: {other}");
                RpcFailure::Protocol(RpcError::new(code, data))
            }
        }
    }
}

impl From<AppError> for RpcFailure {
    fn from(e: AppError) -> Self {
        RpcFailure::Internal(e)
    }
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, RpcFailure> {
    serde_json::from_value(params).map_err(|e| {
        log::warn!("Malformed Payme params: {e}");
        RpcFailure::Protocol(RpcError::new(wire::ERR_INVALID_REQUEST, None))
    })
}
