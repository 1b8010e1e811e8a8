use std::net::SocketAddr;

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::{ExposeSecret, SecretString};
use time::Duration;

/// Signing secret and lifetime for session tokens.
#[derive(Clone)]
pub struct TokenConfig {
    pub secret: SecretString,
    pub expiration_millis: i64,
}

impl TokenConfig {
    pub fn ttl(&self) -> Duration {
        Duration::milliseconds(self.expiration_millis)
    }
}

/// Merchant settings for the VNPay gateway.
#[derive(Clone)]
pub struct VnPayConfig {
    /// `vnp_TmnCode`
    pub merchant_code: String,
    pub hash_secret: SecretString,
    /// Payment page the customer is redirected to.
    pub base_url: String,
    pub return_url: String,
    /// Merchant query/refund API endpoint.
    pub api_url: String,
    pub version: String,
    pub command: String,
    pub order_type: String,
    /// Empty means the customer picks a bank on the gateway page.
    pub bank_code: String,
    pub expire_minutes: i64,
}

impl VnPayConfig {
    /// Names of required settings that are empty. Checked when a payment is
    /// built rather than at startup.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.merchant_code.trim().is_empty() {
            missing.push("merchant_code");
        }
        if self.hash_secret.expose_secret().is_empty() {
            missing.push("hash_secret");
        }
        if self.base_url.trim().is_empty() {
            missing.push("base_url");
        }
        if self.return_url.trim().is_empty() {
            missing.push("return_url");
        }
        missing
    }
}

pub struct AppConfig {
    pub token: TokenConfig,
    pub vnpay: VnPayConfig,
    pub bind_addr: SocketAddr,
    pub cors_origin: HeaderValue,
    pub database_url: String,
    /// Whether to trust X-Forwarded-For / X-Real-IP. Only enable behind a reverse proxy.
    pub trust_proxy: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let jwt_secret: SecretString = SecretString::new(get_env::<String>("JWT_SECRET").into());
        let expiration_millis: i64 = get_env_default("JWT_EXPIRATION_MS", 86_400_000);
        if jwt_secret.expose_secret().len() < 32 {
            tracing::warn!("JWT_SECRET is shorter than 32 bytes; HS256 keys should be at least 256 bits");
        }

        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .expect("CORS_ORIGIN must be a valid header value");
        let bind_addr: SocketAddr = get_env_default("BIND_ADDR", "127.0.0.1:8080".parse().unwrap());
        let database_url: String = get_env("DATABASE_URL");
        // Default to false for security - must explicitly enable when behind a trusted proxy
        let trust_proxy: bool = get_env_default("TRUST_PROXY", false);

        let vnpay = VnPayConfig {
            merchant_code: get_env("VNPAY_TMN_CODE"),
            hash_secret: SecretString::new(get_env::<String>("VNPAY_HASH_SECRET").into()),
            base_url: get_env_default(
                "VNPAY_URL",
                "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
            ),
            return_url: get_env("VNPAY_RETURN_URL"),
            api_url: get_env_default(
                "VNPAY_API_URL",
                "https://sandbox.vnpayment.vn/merchant_webapi/api/transaction".to_string(),
            ),
            version: get_env_default("VNPAY_VERSION", "2.1.0".to_string()),
            command: get_env_default("VNPAY_COMMAND", "pay".to_string()),
            order_type: get_env_default("VNPAY_ORDER_TYPE", "other".to_string()),
            bank_code: get_env_default("VNPAY_BANK_CODE", "NCB".to_string()),
            expire_minutes: get_env_default("VNPAY_EXPIRE_MINUTES", 15),
        };

        Self {
            token: TokenConfig {
                secret: jwt_secret,
                expiration_millis,
            },
            vnpay,
            bind_addr,
            cors_origin,
            database_url,
            trust_proxy,
        }
    }
}
