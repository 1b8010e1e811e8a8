//! VNPay request signing and callback verification.
//!
//! Outbound payments and inbound callbacks share one canonical form: fields
//! sorted by key (byte order), empty values dropped, key and value
//! form-urlencoded, pairs joined with `&`. The HMAC-SHA512 of that string,
//! keyed with the merchant hash secret, travels as `vnp_SecureHash`.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use secrecy::ExposeSecret;
use sha2::Sha512;
use subtle::ConstantTimeEq;
use thiserror::Error;
use url::form_urlencoded;

use crate::app_error::{AppError, AppResult};
use crate::infra::config::VnPayConfig;

type HmacSha512 = Hmac<Sha512>;

pub const SECURE_HASH_FIELD: &str = "vnp_SecureHash";
pub const SECURE_HASH_TYPE_FIELD: &str = "vnp_SecureHashType";
pub const FIELD_PREFIX: &str = "vnp_";

/// `vnp_CreateDate` / `vnp_ExpireDate` layout.
const GATEWAY_DATE_FORMAT: &str = "%Y%m%d%H%M%S";
/// Gateway timestamps are Vietnam local time.
const GATEWAY_UTC_OFFSET_SECS: i32 = 7 * 3600;

pub type PaymentParams = BTreeMap<String, String>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("HMAC key is empty")]
    EmptyKey,

    #[error("HMAC initialisation failed: {0}")]
    Crypto(String),
}

// ============================================================================
// Canonical form
// ============================================================================

/// The signed string and the query string embedded in the redirect URL.
/// Both are built from the same pairs so the URL order always matches what
/// was signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalForm {
    pub hash_payload: String,
    pub query_payload: String,
}

pub fn canonicalize<K, V, I>(params: I) -> CanonicalForm
where
    K: AsRef<str>,
    V: AsRef<str>,
    I: IntoIterator<Item = (K, V)>,
{
    let sorted: BTreeMap<String, String> = params
        .into_iter()
        .filter(|(_, v)| !v.as_ref().is_empty())
        .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
        .collect();

    let encoded = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", form_encode(k), form_encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    CanonicalForm {
        hash_payload: encoded.clone(),
        query_payload: encoded,
    }
}

/// `application/x-www-form-urlencoded` encoding: spaces become `+`, only
/// `A-Za-z0-9*-._` stay literal.
fn form_encode(s: &str) -> String {
    form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

// ============================================================================
// Signing
// ============================================================================

/// Lowercase hex HMAC-SHA512 of `data` keyed by `secret`.
pub fn hmac_sha512(secret: &str, data: &str) -> Result<String, SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::EmptyKey);
    }
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|e| SignatureError::Crypto(e.to_string()))?;
    mac.update(data.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Legacy shape of [`hmac_sha512`]: any failure yields `""`. An empty result
/// must be treated as a failed signature, never as a valid one.
pub fn sign_or_empty(secret: &str, data: &str) -> String {
    hmac_sha512(secret, data).unwrap_or_else(|err| {
        tracing::error!(error = %err, "VNPay signing failed");
        String::new()
    })
}

/// Check a gateway-supplied signature against the remaining fields.
///
/// `vnp_SecureHash` and `vnp_SecureHashType` are excluded from the re-signed
/// set. The hex comparison is case-insensitive and constant-time. A missing or
/// empty signature, or a signing failure, is a mismatch.
pub fn verify_callback<K, V, I>(params: I, secret: &str) -> bool
where
    K: AsRef<str>,
    V: AsRef<str>,
    I: IntoIterator<Item = (K, V)>,
{
    let mut received: Option<String> = None;
    let mut signed: Vec<(String, String)> = Vec::new();
    for (k, v) in params {
        match k.as_ref() {
            SECURE_HASH_FIELD => received = Some(v.as_ref().to_string()),
            SECURE_HASH_TYPE_FIELD => {}
            key => signed.push((key.to_string(), v.as_ref().to_string())),
        }
    }

    let Some(received) = received.filter(|s| !s.is_empty()) else {
        tracing::warn!("VNPay callback without secure hash");
        return false;
    };

    let canonical = canonicalize(signed);
    let Ok(expected) = hmac_sha512(secret, &canonical.hash_payload) else {
        return false;
    };

    let matches: bool = expected
        .as_bytes()
        .ct_eq(received.to_ascii_lowercase().as_bytes())
        .into();
    if !matches {
        tracing::warn!("VNPay signature mismatch");
    }
    matches
}

// ============================================================================
// Request helpers
// ============================================================================

/// `n` pseudo-random ASCII digits. Seeds gateway reference codes only; not a
/// security credential.
pub fn random_digits(n: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..n)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// First entry of `X-Forwarded-For` if present and non-empty, else the peer
/// address verbatim. The result is not guaranteed to be a valid IP literal.
pub fn resolve_client_ip(forwarded_for: Option<&str>, remote_addr: &str) -> String {
    match forwarded_for.filter(|h| !h.is_empty()) {
        Some(header) => header
            .split(',')
            .next()
            .map(str::trim)
            .unwrap_or_default()
            .to_string(),
        None => remote_addr.to_string(),
    }
}

/// The gateway rejects IPv6 loopback; report it as IPv4.
pub fn normalize_loopback(ip: &str) -> String {
    match ip {
        "::1" | "0:0:0:0:0:0:0:1" => "127.0.0.1".to_string(),
        other => other.to_string(),
    }
}

pub fn format_gateway_date(at: DateTime<Utc>) -> String {
    let offset = FixedOffset::east_opt(GATEWAY_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix());
    at.with_timezone(&offset)
        .format(GATEWAY_DATE_FORMAT)
        .to_string()
}

// ============================================================================
// Gateway
// ============================================================================

/// One outbound payment, before signing.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub txn_ref: String,
    /// Whole VND; the gateway receives this ×100.
    pub amount_vnd: i64,
    /// Already normalised with `normalize_order_info`.
    pub order_info: String,
    pub ip_addr: String,
    pub locale: String,
}

#[derive(Debug, Clone)]
pub struct SignedPayment {
    pub params: PaymentParams,
    pub canonical: CanonicalForm,
    pub signature: String,
}

impl SignedPayment {
    pub fn redirect_url(&self, base_url: &str) -> String {
        format!(
            "{}?{}&{}={}",
            base_url, self.canonical.query_payload, SECURE_HASH_FIELD, self.signature
        )
    }
}

pub struct VnPayGateway<'a> {
    config: &'a VnPayConfig,
}

impl<'a> VnPayGateway<'a> {
    pub fn new(config: &'a VnPayConfig) -> Self {
        Self { config }
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Outbound parameter set for `request`, stamped at `now`.
    pub fn build_params(&self, request: &PaymentRequest, now: DateTime<Utc>) -> PaymentParams {
        let cfg = self.config;
        let expire_at = now + chrono::Duration::minutes(cfg.expire_minutes);

        let mut params = PaymentParams::new();
        params.insert("vnp_Version".into(), cfg.version.clone());
        params.insert("vnp_Command".into(), cfg.command.clone());
        params.insert("vnp_TmnCode".into(), cfg.merchant_code.clone());
        params.insert("vnp_Amount".into(), (request.amount_vnd * 100).to_string());
        params.insert("vnp_CurrCode".into(), "VND".into());
        if !cfg.bank_code.is_empty() {
            params.insert("vnp_BankCode".into(), cfg.bank_code.clone());
        }
        params.insert("vnp_TxnRef".into(), request.txn_ref.clone());
        params.insert("vnp_OrderInfo".into(), request.order_info.clone());
        params.insert("vnp_OrderType".into(), cfg.order_type.clone());
        params.insert("vnp_Locale".into(), request.locale.clone());
        params.insert("vnp_ReturnUrl".into(), cfg.return_url.clone());
        params.insert("vnp_IpAddr".into(), request.ip_addr.clone());
        params.insert("vnp_CreateDate".into(), format_gateway_date(now));
        params.insert("vnp_ExpireDate".into(), format_gateway_date(expire_at));
        params
    }

    pub fn sign(&self, params: PaymentParams) -> AppResult<SignedPayment> {
        let missing = self.config.missing_fields();
        if !missing.is_empty() {
            return Err(AppError::Internal(format!(
                "VNPay config incomplete: {}",
                missing.join(", ")
            )));
        }

        let canonical = canonicalize(&params);
        let signature = hmac_sha512(
            self.config.hash_secret.expose_secret(),
            &canonical.hash_payload,
        )
        .map_err(|e| AppError::Internal(format!("VNPay signing failed: {e}")))?;

        Ok(SignedPayment {
            params,
            canonical,
            signature,
        })
    }

    pub fn verify(&self, params: &PaymentParams) -> bool {
        verify_callback(params, self.config.hash_secret.expose_secret())
    }
}
