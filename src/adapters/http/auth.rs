use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};
use serde::Serialize;

use crate::{
    adapters::http::{app_state::AppState, middleware::forwarded_ip},
    app_error::AppError,
    domain::entities::role::Role,
    infra::vnpay::normalize_loopback,
};

/// Caller identity established by the auth gate from a valid session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    pub email: String,
    pub role: Role,
    /// Absent on legacy tokens issued before identity binding.
    pub user_id: Option<i64>,
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AppError::InvalidCredentials)
    }
}

/// The caller's numeric user id. Legacy tokens without `userId` are refused,
/// so ownership checks never fall back to the email subject.
#[derive(Debug, Clone, Copy)]
pub struct RequireUserId(pub i64);

impl<S: Send + Sync> FromRequestParts<S> for RequireUserId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        match user.user_id {
            Some(id) => Ok(RequireUserId(id)),
            None => {
                tracing::warn!(email = %user.email, "Token without userId used for identity-bound request");
                Err(AppError::InvalidCredentials)
            }
        }
    }
}

/// Client address as reported to the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

const FALLBACK_IP: &str = "127.0.0.1";

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        // Only trust forwarded headers if explicitly configured (when behind a reverse proxy)
        let forwarded = if state.config.trust_proxy {
            forwarded_ip(&parts.headers)
        } else {
            None
        };

        let ip = forwarded
            .or(peer)
            .unwrap_or_else(|| FALLBACK_IP.to_string());
        Ok(ClientIp(normalize_loopback(&ip)))
    }
}
