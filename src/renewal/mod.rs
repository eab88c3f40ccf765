use crate::state::AppState;
use axum::Router;

pub mod handlers;
pub mod scan;

pub fn router() -> Router<AppState> {
    handlers::renewal_routes()
}
