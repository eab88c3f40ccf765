use crate::state::AppState;
use axum::Router;

mod dto;
pub mod extractors;
pub mod handlers;
pub mod otp;
pub mod repo_types;
pub mod session;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::session_routes())
        .merge(handlers::reset_routes())
}
