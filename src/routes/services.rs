//! Utility service routes: payments per address and year.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::errors::{ApiResponse, AppError};
use crate::middleware::auth::CurrentUser;
use crate::middleware::extract::ApiJson;
use crate::models::utility::{QuickEntry, ServicePatch, UtilityDataPayload, UtilityServiceRecord};
use crate::services::access;
use crate::services::utility as utility_service;
use crate::AppState;

/// Number of documents touched by a batch entry.
#[derive(Debug, Serialize)]
pub struct BatchResult {
    pub updated: usize,
}

/// GET /api/v1/addresses/{id}/years/{year}/services
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, year)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Vec<UtilityServiceRecord>>>, AppError> {
    access::ensure_access(&user, &id)?;
    let records = state.store.list_service_records(&id, &year).await?;
    Ok(ApiResponse::success(records))
}

/// POST /api/v1/addresses/{id}/years/{year}/services: record a full year for one service.
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, year)): Path<(String, String)>,
    ApiJson(body): ApiJson<UtilityDataPayload>,
) -> Result<Json<ApiResponse<UtilityServiceRecord>>, AppError> {
    access::ensure_access(&user, &id)?;
    let record = utility_service::add_utility_data(state.store.as_ref(), &id, &year, &body).await?;
    Ok(ApiResponse::success(record))
}

/// GET /api/v1/addresses/{id}/years/{year}/services/{service}
pub async fn get_by_id(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, year, service)): Path<(String, String, String)>,
) -> Result<Json<ApiResponse<UtilityServiceRecord>>, AppError> {
    access::ensure_access(&user, &id)?;
    let record = state
        .store
        .get_service_record(&id, &year, &service)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Service '{service}' not found in {year}")))?;
    Ok(ApiResponse::success(record))
}

/// PATCH /api/v1/addresses/{id}/years/{year}/services/{service}
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, year, service)): Path<(String, String, String)>,
    ApiJson(body): ApiJson<ServicePatch>,
) -> Result<Json<ApiResponse<UtilityServiceRecord>>, AppError> {
    access::ensure_access(&user, &id)?;
    let record =
        utility_service::update_service(state.store.as_ref(), &id, &year, &service, &body).await?;
    Ok(ApiResponse::success(record))
}

/// DELETE /api/v1/addresses/{id}/years/{year}/services/{service}
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, year, service)): Path<(String, String, String)>,
) -> Result<Json<ApiResponse<&'static str>>, AppError> {
    access::ensure_access(&user, &id)?;
    utility_service::delete_service(state.store.as_ref(), &id, &year, &service).await?;
    Ok(ApiResponse::success("deleted"))
}

/// POST /api/v1/addresses/{id}/years/{year}/quick-entry: one month across many services.
pub async fn quick_entry(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, year)): Path<(String, String)>,
    ApiJson(body): ApiJson<QuickEntry>,
) -> Result<Json<ApiResponse<BatchResult>>, AppError> {
    access::ensure_access(&user, &id)?;
    let updated = utility_service::quick_entry(state.store.as_ref(), &id, &year, &body).await?;
    Ok(ApiResponse::success(BatchResult { updated }))
}
