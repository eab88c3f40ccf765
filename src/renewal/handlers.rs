use axum::{extract::State, routing::get, Json, Router};
use time::{Date, OffsetDateTime, UtcOffset};
use tracing::{debug, instrument};

use super::scan::{scan, window, ExpiringContract};
use crate::{auth::extractors::AuthUser, error::ApiError, state::AppState};

pub fn renewal_routes() -> Router<AppState> {
    Router::new().route("/contract-renewal/expiring", get(expiring_contracts))
}

/// Contracts ending within the next 30 days, soonest first.
#[instrument(skip_all)]
pub async fn expiring_contracts(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<Vec<ExpiringContract>>, ApiError> {
    let today = local_today(OffsetDateTime::now_utc(), state.config.utc_offset);
    let (from, to) = window(today);
    let candidates = state.store.contracts_ending_between(from, to).await?;
    let contracts = scan(candidates, today);
    debug!(%today, count = contracts.len(), "expiry scan");
    Ok(Json(contracts))
}

fn local_today(now: OffsetDateTime, offset: UtcOffset) -> Date {
    now.to_offset(offset).date()
}
