pub mod access_policy;
pub mod app_error_impl;
pub mod app_state;
pub mod auth;
pub mod middleware;
pub mod routes;
