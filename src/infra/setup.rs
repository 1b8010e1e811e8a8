use std::fs::File;
use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::http::app_state::AppState,
    application::{
        jwt::TokenAuthority,
        use_cases::payment::{
            OrderRepo, PaymentUseCases, SettlementRepo, StudyPackRepo, TransactionRepo,
        },
    },
    infra::{config::AppConfig, postgres_persistence},
};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env();

    let postgres_arc = Arc::new(postgres_persistence(&config.database_url).await?);

    let token_authority = TokenAuthority::new(config.token.secret.clone(), config.token.ttl());

    let vnpay_missing = config.vnpay.missing_fields();
    if !vnpay_missing.is_empty() {
        tracing::warn!(missing = ?vnpay_missing, "VNPay is not fully configured; payment creation will fail");
    }

    let config = Arc::new(config);
    let payment_use_cases = PaymentUseCases::new(
        postgres_arc.clone() as Arc<dyn OrderRepo>,
        postgres_arc.clone() as Arc<dyn StudyPackRepo>,
        postgres_arc.clone() as Arc<dyn TransactionRepo>,
        postgres_arc as Arc<dyn SettlementRepo>,
        Arc::new(config.vnpay.clone()),
    );

    Ok(AppState {
        config,
        token_authority: Arc::new(token_authority),
        payment_use_cases: Arc::new(payment_use_cases),
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lexicard_api=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer);

    // File (structured JSON logs)
    match File::create("app.log") {
        Ok(file) => {
            let json_layer = fmt::layer()
                .json()
                .with_writer(file)
                .with_current_span(true)
                .with_span_list(true);
            registry.with(json_layer).try_init().ok();
        }
        Err(err) => {
            registry.try_init().ok();
            tracing::warn!(error = %err, "Cannot create app.log; logging to console only");
        }
    }
}
