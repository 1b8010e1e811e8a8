use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    application::{jwt::TokenAuthority, use_cases::payment::PaymentUseCases},
    infra::config::AppConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub token_authority: Arc<TokenAuthority>,
    pub payment_use_cases: Arc<PaymentUseCases>,
}

impl FromRef<AppState> for Arc<PaymentUseCases> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.payment_use_cases.clone()
    }
}
