use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    app_error::{AppError, AppResult},
    application::helpers::order_info::normalize_order_info,
    domain::entities::{
        order_status::OrderStatus,
        payment_flow::{PaymentFlow, PaymentFlowState},
        transaction_status::TransactionStatus,
    },
    infra::{
        config::VnPayConfig,
        vnpay::{FIELD_PREFIX, PaymentParams, PaymentRequest, VnPayGateway, random_digits},
    },
};

pub const PROVIDER_VNPAY: &str = "VNPay";
/// Gateway code for an approved payment.
const GATEWAY_APPROVED: &str = "00";
/// Digits appended to the order id so retries get a fresh `vnp_TxnRef`.
const TXN_REF_SUFFIX_LEN: usize = 8;
const GATEWAY_LOCALE: &str = "vn";

// ============================================================================
// Profiles
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct OrderProfile {
    pub id: i64,
    pub user_id: i64,
    pub pack_id: i64,
    pub pack_name: Option<String>,
    pub price_vnd: i64,
    pub status: OrderStatus,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StudyPackProfile {
    pub id: i64,
    pub name: String,
    pub price_vnd: i64,
    pub duration_days: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionProfile {
    pub id: i64,
    pub order_id: i64,
    pub provider: String,
    pub provider_txn_id: Option<String>,
    pub method: Option<String>,
    pub amount_vnd: i64,
    pub status: TransactionStatus,
    pub message: Option<String>,
    pub raw_payload: serde_json::Value,
}

/// Fields written when a transaction row is created or replaced.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub order_id: i64,
    pub provider: String,
    pub provider_txn_id: Option<String>,
    pub method: Option<String>,
    pub amount_vnd: i64,
    pub status: TransactionStatus,
    pub message: Option<String>,
    pub raw_payload: serde_json::Value,
}

// ============================================================================
// Ports
// ============================================================================

#[async_trait]
pub trait OrderRepo: Send + Sync {
    async fn create(&self, user_id: i64, pack: &StudyPackProfile) -> AppResult<OrderProfile>;
    async fn get_by_id(&self, order_id: i64) -> AppResult<Option<OrderProfile>>;
    /// Newest first.
    async fn list_by_user(&self, user_id: i64) -> AppResult<Vec<OrderProfile>>;
}

#[async_trait]
pub trait StudyPackRepo: Send + Sync {
    /// Soft-deleted packs are not returned.
    async fn get_active(&self, pack_id: i64) -> AppResult<Option<StudyPackProfile>>;
}

#[async_trait]
pub trait TransactionRepo: Send + Sync {
    async fn find_by_order(&self, order_id: i64) -> AppResult<Option<TransactionProfile>>;
    /// One transaction per order; an existing row is replaced.
    async fn upsert(&self, record: TransactionRecord) -> AppResult<TransactionProfile>;
}

/// Everything a verified IPN result writes.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub order_id: i64,
    pub user_id: i64,
    pub order_status: OrderStatus,
    /// Only set when the order is paid.
    pub expires_at: Option<DateTime<Utc>>,
    pub grant_premium: bool,
    pub transaction: TransactionRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    Applied,
    /// The order's transaction had already succeeded; nothing was written.
    AlreadyConfirmed,
}

#[async_trait]
pub trait SettlementRepo: Send + Sync {
    /// Apply `settlement` all-or-nothing while holding the order exclusively.
    /// Deliveries for the same order are serialised, and a failed write
    /// leaves no partial state behind, so the gateway's retry can finish it.
    async fn settle(&self, settlement: Settlement) -> AppResult<SettleOutcome>;
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PaymentRedirect {
    pub payment_url: String,
    pub order_id: i64,
    pub txn_ref: String,
    pub message: String,
}

/// Reply body expected by the gateway's IPN caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpnResponse {
    #[serde(rename = "RspCode")]
    pub rsp_code: String,
    #[serde(rename = "Message")]
    pub message: String,
}

impl IpnResponse {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            rsp_code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn confirmed() -> Self {
        Self::new("00", "Confirm Success")
    }

    pub fn order_not_found() -> Self {
        Self::new("01", "Order not found")
    }

    pub fn already_confirmed() -> Self {
        Self::new("02", "Order already confirmed")
    }

    pub fn invalid_amount() -> Self {
        Self::new("04", "Invalid amount")
    }

    pub fn invalid_signature() -> Self {
        Self::new("97", "Invalid signature")
    }

    pub fn unknown_error(detail: impl std::fmt::Display) -> Self {
        Self::new("99", format!("Unknown error: {detail}"))
    }
}

/// What the customer's browser return tells us. Never mutates state; the IPN
/// callback is authoritative.
#[derive(Debug, Clone, Serialize)]
pub struct ReturnOutcome {
    pub verified: bool,
    pub success: bool,
    pub response_code: Option<String>,
    pub order_id: Option<i64>,
    pub transaction_no: Option<String>,
    pub bank_code: Option<String>,
    pub amount_vnd: Option<i64>,
    pub message: String,
}

// ============================================================================
// Use cases
// ============================================================================

#[derive(Clone)]
pub struct PaymentUseCases {
    orders: Arc<dyn OrderRepo>,
    packs: Arc<dyn StudyPackRepo>,
    transactions: Arc<dyn TransactionRepo>,
    settlements: Arc<dyn SettlementRepo>,
    vnpay: Arc<VnPayConfig>,
}

impl PaymentUseCases {
    pub fn new(
        orders: Arc<dyn OrderRepo>,
        packs: Arc<dyn StudyPackRepo>,
        transactions: Arc<dyn TransactionRepo>,
        settlements: Arc<dyn SettlementRepo>,
        vnpay: Arc<VnPayConfig>,
    ) -> Self {
        Self {
            orders,
            packs,
            transactions,
            settlements,
            vnpay,
        }
    }

    #[instrument(skip(self))]
    pub async fn create_order(&self, user_id: i64, pack_id: i64) -> AppResult<OrderProfile> {
        let pack = self
            .packs
            .get_active(pack_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let order = self.orders.create(user_id, &pack).await?;
        tracing::info!(order_id = order.id, price_vnd = order.price_vnd, "Order created");
        Ok(order)
    }

    #[instrument(skip(self))]
    pub async fn list_orders(&self, user_id: i64) -> AppResult<Vec<OrderProfile>> {
        self.orders.list_by_user(user_id).await
    }

    #[instrument(skip(self))]
    pub async fn create_vnpay_payment(
        &self,
        order_id: i64,
        user_id: i64,
        client_ip: &str,
    ) -> AppResult<PaymentRedirect> {
        self.create_vnpay_payment_at(order_id, user_id, client_ip, Utc::now())
            .await
    }

    pub async fn create_vnpay_payment_at(
        &self,
        order_id: i64,
        user_id: i64,
        client_ip: &str,
        now: DateTime<Utc>,
    ) -> AppResult<PaymentRedirect> {
        let order = self
            .orders
            .get_by_id(order_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if order.user_id != user_id {
            return Err(AppError::Forbidden);
        }
        if !order.status.is_payable() {
            return Err(AppError::InvalidInput(format!(
                "Order {} is {}, not PENDING",
                order.id, order.status
            )));
        }

        self.transactions
            .upsert(TransactionRecord {
                order_id: order.id,
                provider: PROVIDER_VNPAY.to_string(),
                provider_txn_id: None,
                method: None,
                amount_vnd: order.price_vnd,
                status: TransactionStatus::Init,
                message: Some("Awaiting payment".to_string()),
                raw_payload: serde_json::json!({}),
            })
            .await?;

        let txn_ref = format!("{}_{}", order.id, random_digits(TXN_REF_SUFFIX_LEN));
        let mut flow = PaymentFlow::built(txn_ref.clone());

        let gateway = VnPayGateway::new(&self.vnpay);
        let request = PaymentRequest {
            txn_ref: txn_ref.clone(),
            amount_vnd: order.price_vnd,
            order_info: normalize_order_info(Some(
                format!("Thanh toan don hang {}", order.id).as_str(),
            )),
            ip_addr: client_ip.to_string(),
            locale: GATEWAY_LOCALE.to_string(),
        };
        let signed = gateway.sign(gateway.build_params(&request, now))?;
        flow.advance(PaymentFlowState::Signed)
            .map_err(AppError::Internal)?;

        let payment_url = signed.redirect_url(gateway.base_url());
        flow.advance(PaymentFlowState::Redirected)
            .map_err(AppError::Internal)?;

        tracing::info!(
            order_id = order.id,
            txn_ref = %txn_ref,
            amount_vnd = order.price_vnd,
            "VNPay payment URL created"
        );

        Ok(PaymentRedirect {
            payment_url,
            order_id: order.id,
            txn_ref,
            message: "OK".to_string(),
        })
    }

    /// Gateway IPN callback. Always answers with a gateway response code,
    /// never an error.
    #[instrument(skip_all, fields(txn_ref = ?params.get("vnp_TxnRef")))]
    pub async fn handle_ipn(&self, params: PaymentParams) -> IpnResponse {
        match self.process_ipn(params).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(error = ?err, "VNPay IPN processing failed");
                IpnResponse::unknown_error(err)
            }
        }
    }

    async fn process_ipn(&self, params: PaymentParams) -> AppResult<IpnResponse> {
        let params = gateway_fields(params);
        let txn_ref = params.get("vnp_TxnRef").cloned().unwrap_or_default();

        let mut flow = PaymentFlow::resume(txn_ref.clone(), PaymentFlowState::Redirected);
        flow.advance(PaymentFlowState::CallbackReceived)
            .map_err(AppError::Internal)?;

        let valid = VnPayGateway::new(&self.vnpay).verify(&params);
        flow.advance(PaymentFlowState::verification_outcome(valid))
            .map_err(AppError::Internal)?;
        if !valid {
            return Ok(IpnResponse::invalid_signature());
        }

        let Some(order_id) = parse_txn_ref(&txn_ref) else {
            tracing::warn!(txn_ref = %txn_ref, "Unparseable vnp_TxnRef");
            return Ok(IpnResponse::order_not_found());
        };
        let Some(order) = self.orders.get_by_id(order_id).await? else {
            return Ok(IpnResponse::order_not_found());
        };

        let paid_amount = params
            .get("vnp_Amount")
            .and_then(|a| a.parse::<i64>().ok());
        if paid_amount != Some(order.price_vnd * 100) {
            tracing::warn!(
                order_id,
                expected = order.price_vnd * 100,
                received = ?paid_amount,
                "VNPay amount mismatch"
            );
            return Ok(IpnResponse::invalid_amount());
        }

        let code = params
            .get("vnp_ResponseCode")
            .or_else(|| params.get("vnp_TransactionStatus"))
            .cloned()
            .unwrap_or_default();
        let approved = code == GATEWAY_APPROVED;

        let (order_status, txn_status, message) = if approved {
            (
                OrderStatus::Paid,
                TransactionStatus::Succeeded,
                "Payment succeeded".to_string(),
            )
        } else {
            (
                OrderStatus::Canceled,
                TransactionStatus::Failed,
                format!("Payment failed: {code}"),
            )
        };

        let expires_at = if approved {
            self.packs
                .get_active(order.pack_id)
                .await?
                .map(|pack| Utc::now() + chrono::Duration::days(pack.duration_days.into()))
        } else {
            None
        };

        let settlement = Settlement {
            order_id,
            user_id: order.user_id,
            order_status,
            expires_at,
            grant_premium: approved,
            transaction: TransactionRecord {
                order_id,
                provider: PROVIDER_VNPAY.to_string(),
                provider_txn_id: params.get("vnp_TransactionNo").cloned(),
                method: params.get("vnp_BankCode").cloned(),
                amount_vnd: order.price_vnd,
                status: txn_status,
                message: Some(message),
                raw_payload: serde_json::to_value(&params)
                    .map_err(|e| AppError::Internal(e.to_string()))?,
            },
        };

        match self.settlements.settle(settlement).await? {
            SettleOutcome::AlreadyConfirmed => return Ok(IpnResponse::already_confirmed()),
            SettleOutcome::Applied if approved => {
                tracing::info!(order_id, "VNPay payment succeeded");
            }
            SettleOutcome::Applied => {
                tracing::warn!(order_id, code = %code, "VNPay payment failed");
            }
        }

        Ok(IpnResponse::confirmed())
    }

    /// Browser return from the gateway.
    #[instrument(skip_all)]
    pub fn handle_return(&self, params: PaymentParams) -> AppResult<ReturnOutcome> {
        let params = gateway_fields(params);
        let txn_ref = params.get("vnp_TxnRef").cloned().unwrap_or_default();

        let mut flow = PaymentFlow::resume(txn_ref.clone(), PaymentFlowState::Redirected);
        flow.advance(PaymentFlowState::Returned)
            .map_err(AppError::Internal)?;
        let verified = VnPayGateway::new(&self.vnpay).verify(&params);
        flow.advance(PaymentFlowState::verification_outcome(verified))
            .map_err(AppError::Internal)?;

        let response_code = params.get("vnp_ResponseCode").cloned();
        let success = verified && response_code.as_deref() == Some(GATEWAY_APPROVED);
        let message = match (verified, success) {
            (false, _) => "Invalid signature".to_string(),
            (true, true) => "Payment succeeded".to_string(),
            (true, false) => format!(
                "Payment failed: {}",
                response_code.as_deref().unwrap_or("unknown")
            ),
        };

        Ok(ReturnOutcome {
            verified,
            success,
            response_code,
            order_id: parse_txn_ref(&txn_ref),
            transaction_no: params.get("vnp_TransactionNo").cloned(),
            bank_code: params.get("vnp_BankCode").cloned(),
            amount_vnd: params
                .get("vnp_Amount")
                .and_then(|a| a.parse::<i64>().ok())
                .map(|a| a / 100),
            message,
        })
    }
}

/// Only `vnp_*` fields take part in gateway signatures; anything a proxy or
/// client appended to the query string is dropped.
fn gateway_fields(params: PaymentParams) -> PaymentParams {
    params
        .into_iter()
        .filter(|(k, _)| k.starts_with(FIELD_PREFIX))
        .collect()
}

/// `vnp_TxnRef` is `<order id>` or `<order id>_<digits>`.
pub fn parse_txn_ref(txn_ref: &str) -> Option<i64> {
    txn_ref
        .split('_')
        .next()
        .and_then(|id| id.parse::<i64>().ok())
}
