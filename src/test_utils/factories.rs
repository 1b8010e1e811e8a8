//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields as needed.

use chrono::{DateTime, TimeZone, Utc};
use secrecy::SecretString;

use crate::{
    application::use_cases::payment::{OrderProfile, StudyPackProfile},
    domain::entities::order_status::OrderStatus,
    infra::config::VnPayConfig,
};

pub const TEST_JWT_SECRET: &str = "test-jwt-secret-that-is-long-enough-for-hs256";
pub const TEST_HASH_SECRET: &str = "TESTHASHSECRET0123456789";

/// Fixed timestamp for deterministic fixtures.
pub fn test_datetime() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
        .single()
        .unwrap()
}

/// Sandbox-shaped gateway settings signed with [`TEST_HASH_SECRET`].
pub fn test_vnpay_config() -> VnPayConfig {
    VnPayConfig {
        merchant_code: "DEMO0001".to_string(),
        hash_secret: SecretString::from(TEST_HASH_SECRET.to_string()),
        base_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
        return_url: "http://localhost:3000/payment/return".to_string(),
        api_url: "https://sandbox.vnpayment.vn/merchant_webapi/api/transaction".to_string(),
        version: "2.1.0".to_string(),
        command: "pay".to_string(),
        order_type: "other".to_string(),
        bank_code: "NCB".to_string(),
        expire_minutes: 15,
    }
}

/// Create a test study pack with sensible defaults.
pub fn create_test_pack(overrides: impl FnOnce(&mut StudyPackProfile)) -> StudyPackProfile {
    let mut pack = StudyPackProfile {
        id: 1,
        name: "Premium 30 days".to_string(),
        price_vnd: 99_000,
        duration_days: 30,
    };
    overrides(&mut pack);
    pack
}

/// Create a pending test order with sensible defaults.
pub fn create_test_order(overrides: impl FnOnce(&mut OrderProfile)) -> OrderProfile {
    let mut order = OrderProfile {
        id: 1,
        user_id: 1,
        pack_id: 1,
        pack_name: Some("Premium 30 days".to_string()),
        price_vnd: 99_000,
        status: OrderStatus::Pending,
        started_at: test_datetime(),
        expires_at: None,
        created_at: test_datetime(),
    };
    overrides(&mut order);
    order
}
