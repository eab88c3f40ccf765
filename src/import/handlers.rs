use axum::{
    extract::{DefaultBodyLimit, Multipart},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::{
    mapping::{map_rows, MappedRow, PageType},
    workbook::{read_first_sheet, Sheet},
};
use crate::{auth::extractors::RequireEditor, error::ApiError, state::AppState};

pub fn upload_routes(limit_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/excel-upload", post(upload_excel))
        .layer(DefaultBodyLimit::max(limit_bytes))
}

fn is_excel_name(name: &str) -> bool {
    lazy_static! {
        static ref EXCEL_RE: Regex = Regex::new(r"(?i)\.xlsx?$").unwrap();
    }
    EXCEL_RE.is_match(name)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub data: Vec<MappedRow>,
    pub columns: Vec<String>,
    pub row_count: usize,
}

struct Upload {
    file_name: String,
    bytes: Bytes,
}

/// Parses an uploaded workbook into rows keyed by record field names. Nothing
/// is stored; the client reviews the rows and saves them itself.
#[instrument(skip_all)]
pub async fn upload_excel(
    RequireEditor(editor): RequireEditor,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload = None;
    let mut page_type = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                upload = Some(Upload { file_name, bytes });
            }
            Some("page_type") => {
                page_type = Some(field.text().await?);
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| ApiError::validation("No file provided"))?;
    if upload.file_name.trim().is_empty() {
        return Err(ApiError::validation("No file selected"));
    }
    if !is_excel_name(&upload.file_name) {
        warn!(file_name = %upload.file_name, "rejected non-excel upload");
        return Err(ApiError::validation("Invalid file format. Please upload Excel file"));
    }
    let page = PageType::parse(page_type.as_deref().unwrap_or("contractor_list"))
        .ok_or_else(|| ApiError::validation("Invalid page type"))?;

    let Sheet { headers, rows } = tokio::task::spawn_blocking(move || read_first_sheet(upload.bytes))
        .await
        .map_err(|e| ApiError::Internal(e.into()))?
        .map_err(|e| ApiError::validation(e.to_string()))?;

    let data = map_rows(page, &headers, &rows);
    info!(user_id = editor.user.id, page = ?page, rows = rows.len(), columns = headers.len(), "workbook parsed");
    Ok(Json(UploadResponse {
        success: true,
        data,
        columns: headers,
        row_count: rows.len(),
    }))
}
