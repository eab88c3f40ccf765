use crate::state::AppState;
use axum::Router;

pub mod handlers;
pub mod model;
pub mod resource;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::record_routes())
        .merge(handlers::contractor_routes())
}
