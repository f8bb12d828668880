//! Meter reading routes.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::errors::{ApiResponse, AppError};
use crate::middleware::auth::CurrentUser;
use crate::middleware::extract::ApiJson;
use crate::models::reading::{MeterReadingPayload, MeterReadingRecord, QuickReadingEntry, ReadingPatch};
use crate::routes::services::BatchResult;
use crate::services::access;
use crate::services::reading as reading_service;
use crate::AppState;

/// GET /api/v1/addresses/{id}/years/{year}/readings
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, year)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Vec<MeterReadingRecord>>>, AppError> {
    access::ensure_access(&user, &id)?;
    let records = state.store.list_reading_records(&id, &year).await?;
    Ok(ApiResponse::success(records))
}

/// POST /api/v1/addresses/{id}/years/{year}/readings
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, year)): Path<(String, String)>,
    ApiJson(body): ApiJson<MeterReadingPayload>,
) -> Result<Json<ApiResponse<MeterReadingRecord>>, AppError> {
    access::ensure_access(&user, &id)?;
    let record = reading_service::add_meter_reading(state.store.as_ref(), &id, &year, &body).await?;
    Ok(ApiResponse::success(record))
}

/// PATCH /api/v1/addresses/{id}/years/{year}/readings/{doc}
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, year, doc)): Path<(String, String, String)>,
    ApiJson(body): ApiJson<ReadingPatch>,
) -> Result<Json<ApiResponse<MeterReadingRecord>>, AppError> {
    access::ensure_access(&user, &id)?;
    let record =
        reading_service::update_reading(state.store.as_ref(), &id, &year, &doc, &body).await?;
    Ok(ApiResponse::success(record))
}

/// DELETE /api/v1/addresses/{id}/years/{year}/readings/{doc}
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, year, doc)): Path<(String, String, String)>,
) -> Result<Json<ApiResponse<&'static str>>, AppError> {
    access::ensure_access(&user, &id)?;
    reading_service::delete_reading(state.store.as_ref(), &id, &year, &doc).await?;
    Ok(ApiResponse::success("deleted"))
}

/// POST /api/v1/addresses/{id}/years/{year}/readings/quick-entry
pub async fn quick_entry(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, year)): Path<(String, String)>,
    ApiJson(body): ApiJson<QuickReadingEntry>,
) -> Result<Json<ApiResponse<BatchResult>>, AppError> {
    access::ensure_access(&user, &id)?;
    let updated =
        reading_service::quick_reading_entry(state.store.as_ref(), &id, &year, &body).await?;
    Ok(ApiResponse::success(BatchResult { updated }))
}
