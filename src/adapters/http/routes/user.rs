use axum::{Json, Router, response::IntoResponse, routing::get};

use crate::{
    adapters::http::{app_state::AppState, auth::AuthUser},
    app_error::AppResult,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/profile", get(profile))
}

/// GET /api/users/profile
/// Echoes the identity carried by the caller's token.
async fn profile(user: AuthUser) -> AppResult<impl IntoResponse> {
    Ok(Json(user))
}
