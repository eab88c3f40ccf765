use crate::state::AppState;
use axum::Router;

pub mod duration;
pub mod handlers;
pub mod mapping;
pub mod workbook;

pub fn router(upload_limit_bytes: usize) -> Router<AppState> {
    handlers::upload_routes(upload_limit_bytes)
}
