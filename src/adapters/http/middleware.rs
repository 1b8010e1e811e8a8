use std::str::FromStr;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};

use crate::{
    adapters::http::{
        access_policy::{Access, access_for},
        app_state::AppState,
        auth::AuthUser,
    },
    app_error::AppError,
    domain::entities::role::Role,
    infra::vnpay::resolve_client_ip,
};

/// Enforces the access policy for every request. On success the caller's
/// [`AuthUser`] is attached to the request for downstream extractors.
pub async fn auth_gate(
    State(app_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let access = access_for(request.method(), request.uri().path());
    let user = bearer_token(request.headers())
        .map(|token| authenticate(&app_state, token))
        .transpose();

    match (access, user) {
        (Access::Public, Ok(Some(user))) => {
            request.extensions_mut().insert(user);
        }
        // A bad token on a public route is ignored, not rejected.
        (Access::Public, _) => {}
        (_, Err(err)) => return Err(err),
        (_, Ok(None)) => {
            tracing::debug!(path = %request.uri().path(), "Missing bearer token");
            return Err(AppError::InvalidCredentials);
        }
        (access, Ok(Some(user))) => {
            if !access.permits(user.role) {
                tracing::warn!(
                    email = %user.email,
                    role = %user.role,
                    path = %request.uri().path(),
                    "Role not allowed"
                );
                return Err(AppError::Forbidden);
            }
            request.extensions_mut().insert(user);
        }
    }

    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn authenticate(app_state: &AppState, token: &str) -> Result<AuthUser, AppError> {
    let claims = app_state.token_authority.parse(token)?;
    if claims.is_expired_at(time::OffsetDateTime::now_utc()) {
        tracing::debug!(subject = %claims.sub, "Expired session token");
        return Err(AppError::InvalidCredentials);
    }
    let role = Role::from_str(&claims.role).map_err(|_| {
        tracing::warn!(subject = %claims.sub, role = %claims.role, "Unknown role claim");
        AppError::InvalidCredentials
    })?;
    Ok(AuthUser {
        email: claims.sub,
        role,
        user_id: claims.user_id,
    })
}

/// Client IP from `X-Forwarded-For` (first hop) or `X-Real-IP`.
pub fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for")
        && let Ok(val) = forwarded.to_str()
    {
        let first = resolve_client_ip(Some(val), "");
        if !first.is_empty() {
            return Some(first);
        }
    }
    if let Some(real) = headers.get("x-real-ip")
        && let Ok(val) = real.to_str()
        && !val.trim().is_empty()
    {
        return Some(val.trim().to_string());
    }
    None
}
