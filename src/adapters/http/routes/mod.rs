pub mod payment;
pub mod user;

use axum::Router;

use crate::adapters::http::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/payment", payment::router())
        .nest("/users", user::router())
}
