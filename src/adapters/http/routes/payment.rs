use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;

use crate::{
    adapters::http::{
        app_state::AppState,
        auth::{ClientIp, RequireUserId},
    },
    app_error::AppResult,
    application::use_cases::payment::PaymentUseCases,
    infra::vnpay::PaymentParams,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create-order", post(create_order))
        .route("/vnpay/create", post(create_vnpay_payment))
        .route(
            "/vnpay/callback",
            get(vnpay_callback_query).post(vnpay_callback_form),
        )
        .route("/vnpay/return", get(vnpay_return))
        .route("/my-orders", get(my_orders))
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderPayload {
    pack_id: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePaymentQuery {
    order_id: i64,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/payment/create-order
async fn create_order(
    State(app_state): State<AppState>,
    RequireUserId(user_id): RequireUserId,
    Json(payload): Json<CreateOrderPayload>,
) -> AppResult<impl IntoResponse> {
    let order = app_state
        .payment_use_cases
        .create_order(user_id, payload.pack_id)
        .await?;
    Ok(Json(order))
}

/// POST /api/payment/vnpay/create?orderId=
async fn create_vnpay_payment(
    State(app_state): State<AppState>,
    RequireUserId(user_id): RequireUserId,
    ClientIp(client_ip): ClientIp,
    Query(query): Query<CreatePaymentQuery>,
) -> AppResult<impl IntoResponse> {
    let redirect = app_state
        .payment_use_cases
        .create_vnpay_payment(query.order_id, user_id, &client_ip)
        .await?;
    Ok(Json(redirect))
}

/// GET /api/payment/vnpay/callback
/// Gateway IPN. Always 200 with a `RspCode` body.
async fn vnpay_callback_query(
    State(payments): State<Arc<PaymentUseCases>>,
    Query(params): Query<PaymentParams>,
) -> impl IntoResponse {
    Json(payments.handle_ipn(params).await)
}

/// POST /api/payment/vnpay/callback
async fn vnpay_callback_form(
    State(payments): State<Arc<PaymentUseCases>>,
    Form(params): Form<PaymentParams>,
) -> impl IntoResponse {
    Json(payments.handle_ipn(params).await)
}

/// GET /api/payment/vnpay/return
async fn vnpay_return(
    State(payments): State<Arc<PaymentUseCases>>,
    Query(params): Query<PaymentParams>,
) -> AppResult<impl IntoResponse> {
    let outcome = payments.handle_return(params)?;
    Ok(Json(outcome))
}

/// GET /api/payment/my-orders
async fn my_orders(
    State(app_state): State<AppState>,
    RequireUserId(user_id): RequireUserId,
) -> AppResult<impl IntoResponse> {
    let orders = app_state.payment_use_cases.list_orders(user_id).await?;
    Ok(Json(orders))
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, middleware};
    use axum_test::TestServer;

    use super::*;
    use crate::{
        adapters::http::middleware::auth_gate,
        domain::entities::{order_status::OrderStatus, role::Role},
        infra::vnpay::{SECURE_HASH_FIELD, canonicalize, hmac_sha512},
        test_utils::{TEST_HASH_SECRET, TestAppStateBuilder, create_test_order, create_test_pack},
    };

    fn build_test_router(app_state: AppState) -> Router<()> {
        Router::new()
            .nest("/api/payment", router())
            .layer(middleware::from_fn_with_state(app_state.clone(), auth_gate))
            .with_state(app_state)
    }

    fn signed_query(pairs: &[(&str, &str)]) -> PaymentParams {
        let mut params: PaymentParams = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let sig = hmac_sha512(TEST_HASH_SECRET, &canonicalize(&params).hash_payload).unwrap();
        params.insert(SECURE_HASH_FIELD.to_string(), sig);
        params
    }

    fn owned_order() -> crate::application::use_cases::payment::OrderProfile {
        create_test_order(|o| {
            o.id = 42;
            o.user_id = 5;
            o.price_vnd = 99_000;
        })
    }

    // ========================================================================
    // POST /vnpay/create
    // ========================================================================

    #[tokio::test]
    async fn create_payment_requires_token() {
        let app_state = TestAppStateBuilder::new().with_order(owned_order()).build();
        let server = TestServer::new(build_test_router(app_state)).unwrap();

        let response = server.post("/api/payment/vnpay/create?orderId=42").await;

        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_payment_returns_gateway_url() {
        let builder = TestAppStateBuilder::new().with_order(owned_order());
        let token = builder.token_for("buyer@lexicard.test", Role::User, 5);
        let server = TestServer::new(build_test_router(builder.build())).unwrap();

        let response = server
            .post("/api/payment/vnpay/create?orderId=42")
            .add_header("Authorization", format!("Bearer {token}"))
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["order_id"], 42);
        let url = body["payment_url"].as_str().unwrap();
        assert!(url.starts_with("https://sandbox.vnpayment.vn/paymentv2/vpcpay.html?"));
        assert!(url.contains("vnp_Amount=9900000"));
        // No peer address in tests; reported as loopback.
        assert!(url.contains("vnp_IpAddr=127.0.0.1"));
        assert!(url.contains("&vnp_SecureHash="));
    }

    #[tokio::test]
    async fn forwarded_ip_is_used_behind_trusted_proxy() {
        let builder = TestAppStateBuilder::new()
            .with_order(owned_order())
            .with_trust_proxy(true);
        let token = builder.token_for("buyer@lexicard.test", Role::User, 5);
        let server = TestServer::new(build_test_router(builder.build())).unwrap();

        let response = server
            .post("/api/payment/vnpay/create?orderId=42")
            .add_header("Authorization", format!("Bearer {token}"))
            .add_header("X-Forwarded-For", "203.0.113.7, 10.0.0.1")
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert!(
            body["payment_url"]
                .as_str()
                .unwrap()
                .contains("vnp_IpAddr=203.0.113.7")
        );
    }

    #[tokio::test]
    async fn forwarded_ip_is_ignored_without_trusted_proxy() {
        let builder = TestAppStateBuilder::new().with_order(owned_order());
        let token = builder.token_for("buyer@lexicard.test", Role::User, 5);
        let server = TestServer::new(build_test_router(builder.build())).unwrap();

        let response = server
            .post("/api/payment/vnpay/create?orderId=42")
            .add_header("Authorization", format!("Bearer {token}"))
            .add_header("X-Forwarded-For", "203.0.113.7")
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert!(!body["payment_url"].as_str().unwrap().contains("203.0.113.7"));
    }

    #[tokio::test]
    async fn create_payment_rejects_legacy_token() {
        let builder = TestAppStateBuilder::new().with_order(owned_order());
        let token = builder.legacy_token_for("buyer@lexicard.test", Role::User);
        let server = TestServer::new(build_test_router(builder.build())).unwrap();

        let response = server
            .post("/api/payment/vnpay/create?orderId=42")
            .add_header("Authorization", format!("Bearer {token}"))
            .await;

        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_payment_for_foreign_order_is_forbidden() {
        let builder = TestAppStateBuilder::new().with_order(owned_order());
        let token = builder.token_for("intruder@lexicard.test", Role::User, 6);
        let server = TestServer::new(build_test_router(builder.build())).unwrap();

        let response = server
            .post("/api/payment/vnpay/create?orderId=42")
            .add_header("Authorization", format!("Bearer {token}"))
            .await;

        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn tampered_token_is_rejected() {
        let builder = TestAppStateBuilder::new().with_order(owned_order());
        let token = builder.token_for("buyer@lexicard.test", Role::User, 5);
        let server = TestServer::new(build_test_router(builder.build())).unwrap();

        let response = server
            .post("/api/payment/vnpay/create?orderId=42")
            .add_header("Authorization", format!("Bearer {token}x"))
            .await;

        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    }

    // ========================================================================
    // Gateway callbacks
    // ========================================================================

    #[tokio::test]
    async fn ipn_is_public_and_confirms_payment() {
        let app_state = TestAppStateBuilder::new().with_order(owned_order()).build();
        let server = TestServer::new(build_test_router(app_state)).unwrap();
        let params = signed_query(&[
            ("vnp_TxnRef", "42_00000001"),
            ("vnp_Amount", "9900000"),
            ("vnp_ResponseCode", "00"),
            ("vnp_OrderInfo", "Thanh toan don hang 42"),
        ]);

        let response = server
            .get("/api/payment/vnpay/callback")
            .add_query_params(&params)
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["RspCode"], "00");
        assert_eq!(body["Message"], "Confirm Success");
    }

    #[tokio::test]
    async fn ipn_post_form_is_accepted() {
        let app_state = TestAppStateBuilder::new().with_order(owned_order()).build();
        let server = TestServer::new(build_test_router(app_state)).unwrap();
        let params = signed_query(&[
            ("vnp_TxnRef", "42"),
            ("vnp_Amount", "9900000"),
            ("vnp_ResponseCode", "00"),
        ]);

        let response = server
            .post("/api/payment/vnpay/callback")
            .form(&params)
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["RspCode"], "00");
    }

    #[tokio::test]
    async fn ipn_with_bad_signature_answers_97_with_200() {
        let app_state = TestAppStateBuilder::new().with_order(owned_order()).build();
        let server = TestServer::new(build_test_router(app_state)).unwrap();

        let response = server
            .get("/api/payment/vnpay/callback")
            .add_query_param("vnp_TxnRef", "42")
            .add_query_param("vnp_Amount", "9900000")
            .add_query_param("vnp_SecureHash", "deadbeef")
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["RspCode"], "97");
    }

    #[tokio::test]
    async fn return_reports_outcome() {
        let app_state = TestAppStateBuilder::new().with_order(owned_order()).build();
        let server = TestServer::new(build_test_router(app_state)).unwrap();
        let params = signed_query(&[
            ("vnp_TxnRef", "42"),
            ("vnp_Amount", "9900000"),
            ("vnp_ResponseCode", "24"),
        ]);

        let response = server
            .get("/api/payment/vnpay/return")
            .add_query_params(&params)
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["verified"], true);
        assert_eq!(body["success"], false);
        assert_eq!(body["order_id"], 42);
    }

    // ========================================================================
    // Orders
    // ========================================================================

    #[tokio::test]
    async fn create_order_then_list() {
        let builder = TestAppStateBuilder::new();
        let token = builder.token_for("buyer@lexicard.test", Role::User, 5);
        let server = TestServer::new(build_test_router(builder.build())).unwrap();

        let created = server
            .post("/api/payment/create-order")
            .add_header("Authorization", format!("Bearer {token}"))
            .json(&serde_json::json!({ "packId": 1 }))
            .await;
        created.assert_status_ok();
        let order: serde_json::Value = created.json();
        assert_eq!(order["status"], OrderStatus::Pending.as_ref());

        let listed = server
            .get("/api/payment/my-orders")
            .add_header("Authorization", format!("Bearer {token}"))
            .await;
        listed.assert_status_ok();
        let orders: Vec<serde_json::Value> = listed.json();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0]["user_id"], 5);
    }

    #[tokio::test]
    async fn create_order_uses_pack_price() {
        let builder = TestAppStateBuilder::new().with_pack(create_test_pack(|p| {
            p.id = 3;
            p.price_vnd = 249_000;
        }));
        let token = builder.token_for("buyer@lexicard.test", Role::User, 5);
        let server = TestServer::new(build_test_router(builder.build())).unwrap();

        let response = server
            .post("/api/payment/create-order")
            .add_header("Authorization", format!("Bearer {token}"))
            .json(&serde_json::json!({ "packId": 3 }))
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["price_vnd"], 249_000);
        assert_eq!(body["pack_id"], 3);
    }

    #[tokio::test]
    async fn create_order_for_unknown_pack_is_404() {
        let builder = TestAppStateBuilder::new();
        let token = builder.token_for("buyer@lexicard.test", Role::User, 5);
        let server = TestServer::new(build_test_router(builder.build())).unwrap();

        let response = server
            .post("/api/payment/create-order")
            .add_header("Authorization", format!("Bearer {token}"))
            .json(&serde_json::json!({ "packId": 999 }))
            .await;

        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }
}
