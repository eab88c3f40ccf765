use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::{
    model::Contractor,
    resource::{BillTracker, ContractorList, Epbg, Resource},
};
use crate::{
    auth::extractors::{AuthUser, RequireEditor},
    error::ApiError,
    state::AppState,
};

pub fn record_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/contractor-list",
            get(list_records::<ContractorList>).post(save_records::<ContractorList>),
        )
        .route(
            "/bill-tracker",
            get(list_records::<BillTracker>).post(save_records::<BillTracker>),
        )
        .route("/epbg", get(list_records::<Epbg>).post(save_records::<Epbg>))
}

pub fn contractor_routes() -> Router<AppState> {
    Router::new().route("/contractors", get(list_contractors).post(add_contractor))
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub message: String,
    pub count: usize,
}

#[instrument(skip_all, fields(resource = R::LABEL))]
pub async fn list_records<R: Resource>(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<Vec<R::Record>>, ApiError> {
    let rows = R::list(state.store.as_ref()).await?;
    Ok(Json(rows))
}

/// Replaces the whole table with `{"records": [...]}`.
#[instrument(skip_all, fields(resource = R::LABEL))]
pub async fn save_records<R: Resource>(
    State(state): State<AppState>,
    RequireEditor(editor): RequireEditor,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<SaveResponse>, ApiError> {
    let Json(mut body) = payload?;
    let records = body
        .get_mut("records")
        .map(Value::take)
        .filter(Value::is_array)
        .ok_or_else(|| ApiError::validation("Invalid data format"))?;
    let records: Vec<R::New> = serde_json::from_value(records).map_err(|e| {
        warn!(error = %e, "rejected record payload");
        ApiError::validation(e.to_string())
    })?;

    let count = R::replace(state.store.as_ref(), &records).await?;
    info!(count, user_id = editor.user.id, "table replaced");
    Ok(Json(SaveResponse {
        message: format!("{} saved successfully", R::LABEL),
        count,
    }))
}

#[derive(Debug, Serialize)]
pub struct ContractorsResponse {
    pub contractors: Vec<Contractor>,
}

#[derive(Debug, Deserialize)]
pub struct NewContractorRequest {
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ContractorCreated {
    pub message: &'static str,
    pub contractor: Contractor,
}

#[instrument(skip_all)]
pub async fn list_contractors(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<ContractorsResponse>, ApiError> {
    let contractors = state.store.list_contractors().await?;
    Ok(Json(ContractorsResponse { contractors }))
}

#[instrument(skip_all, fields(user_id = auth.user.id))]
pub async fn add_contractor(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<NewContractorRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ContractorCreated>), ApiError> {
    let Json(payload) = payload?;
    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::validation("Contractor name is required"))?;

    let contractor = state.store.add_contractor(name).await?;
    info!(contractor_id = contractor.id, name = %contractor.name, "contractor added");
    Ok((
        StatusCode::CREATED,
        Json(ContractorCreated {
            message: "Contractor added successfully",
            contractor,
        }),
    ))
}
