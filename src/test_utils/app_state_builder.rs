//! Test app state builder for HTTP-level testing.
//!
//! Creates an `AppState` backed by the in-memory repositories, so routers can
//! be exercised with `axum_test::TestServer` without Postgres.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use secrecy::SecretString;
use time::{Duration, OffsetDateTime};

use crate::{
    adapters::http::app_state::AppState,
    application::{
        jwt::TokenAuthority,
        use_cases::payment::{OrderProfile, PaymentUseCases, StudyPackProfile},
    },
    domain::entities::role::Role,
    infra::config::{AppConfig, TokenConfig},
    test_utils::{
        InMemoryOrderRepo, InMemorySettlementRepo, InMemoryStudyPackRepo, InMemoryTransactionRepo,
        TEST_JWT_SECRET, create_test_pack, test_vnpay_config,
    },
};

const TEST_TOKEN_TTL_MILLIS: i64 = 86_400_000;

pub struct TestAppStateBuilder {
    orders: Vec<OrderProfile>,
    packs: Vec<StudyPackProfile>,
    trust_proxy: bool,
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestAppStateBuilder {
    /// A builder seeded with the default study pack (id 1).
    pub fn new() -> Self {
        Self {
            orders: Vec::new(),
            packs: vec![create_test_pack(|_| {})],
            trust_proxy: false,
        }
    }

    pub fn with_order(mut self, order: OrderProfile) -> Self {
        self.orders.push(order);
        self
    }

    pub fn with_pack(mut self, pack: StudyPackProfile) -> Self {
        self.packs.push(pack);
        self
    }

    pub fn with_trust_proxy(mut self, trust_proxy: bool) -> Self {
        self.trust_proxy = trust_proxy;
        self
    }

    fn token_authority() -> TokenAuthority {
        TokenAuthority::new(
            SecretString::from(TEST_JWT_SECRET.to_string()),
            Duration::milliseconds(TEST_TOKEN_TTL_MILLIS),
        )
    }

    /// A valid identity-bound token for the state this builder produces.
    pub fn token_for(&self, email: &str, role: Role, user_id: i64) -> String {
        Self::token_authority()
            .issue(email, role, user_id)
            .expect("Failed to issue test token")
    }

    pub fn legacy_token_for(&self, email: &str, role: Role) -> String {
        Self::token_authority()
            .issue_without_user_id(email, role)
            .expect("Failed to issue test token")
    }

    pub fn expired_token_for(&self, email: &str, role: Role, user_id: i64) -> String {
        let issued = OffsetDateTime::now_utc() - Duration::days(2);
        Self::token_authority()
            .issue_at(email, role, Some(user_id), issued)
            .expect("Failed to issue test token")
    }

    pub fn build(self) -> AppState {
        let vnpay = test_vnpay_config();
        let config = AppConfig {
            token: TokenConfig {
                secret: SecretString::from(TEST_JWT_SECRET.to_string()),
                expiration_millis: TEST_TOKEN_TTL_MILLIS,
            },
            vnpay: vnpay.clone(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            cors_origin: HeaderValue::from_static("http://localhost:3000"),
            database_url: "postgres://unused".to_string(),
            trust_proxy: self.trust_proxy,
        };

        let orders = Arc::new(InMemoryOrderRepo::with_orders(self.orders));
        let transactions = Arc::new(InMemoryTransactionRepo::new());
        let payment_use_cases = PaymentUseCases::new(
            orders.clone(),
            Arc::new(InMemoryStudyPackRepo::with_packs(self.packs)),
            transactions.clone(),
            Arc::new(InMemorySettlementRepo::new(orders, transactions)),
            Arc::new(vnpay),
        );

        AppState {
            config: Arc::new(config),
            token_authority: Arc::new(Self::token_authority()),
            payment_use_cases: Arc::new(payment_use_cases),
        }
    }
}
