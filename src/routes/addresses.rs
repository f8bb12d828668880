//! Address routes: listing by access, CRUD (admin), and year archives.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::errors::{ApiResponse, AppError};
use crate::middleware::auth::CurrentUser;
use crate::middleware::extract::ApiJson;
use crate::middleware::rbac::RequireAdmin;
use crate::models::address::{AddressDoc, AddressEntry, ServiceTemplate};
use crate::models::utility::UtilityServiceRecord;
use crate::models::year::YearRecord;
use crate::services::access;
use crate::services::utility::{self as utility_service, YearSummary};
use crate::AppState;

/// GET /api/v1/addresses: addresses visible to the current user.
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<Vec<AddressEntry>>>, AppError> {
    let addresses = access::visible_addresses(state.store.as_ref(), &user).await?;
    Ok(ApiResponse::success(addresses))
}

/// GET /api/v1/addresses/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<AddressEntry>>, AppError> {
    access::ensure_access(&user, &id)?;
    let data = state
        .store
        .get_address(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Address '{id}' not found")))?;
    Ok(ApiResponse::success(AddressEntry { id, data }))
}

/// PUT /api/v1/addresses/{id}: create or merge an address (admin).
pub async fn upsert(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<AddressDoc>,
) -> Result<Json<ApiResponse<AddressEntry>>, AppError> {
    if id.trim().is_empty() {
        return Err(AppError::Validation("Address id must not be empty".to_string()));
    }
    body.validate()?;
    state.store.upsert_address(&id, &body).await?;
    let data = state.store.get_address(&id).await?.unwrap_or(body);
    tracing::info!(address_id = %id, "Address created/updated");
    Ok(ApiResponse::success(AddressEntry { id, data }))
}

/// DELETE /api/v1/addresses/{id}: delete an address with all its years (admin).
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<&'static str>>, AppError> {
    if !state.store.delete_address(&id).await? {
        return Err(AppError::NotFound(format!("Address '{id}' not found")));
    }
    tracing::info!(address_id = %id, "Address deleted");
    Ok(ApiResponse::success("deleted"))
}

/// GET /api/v1/addresses/{id}/years: year archives, most recent first.
pub async fn list_years(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<YearRecord>>>, AppError> {
    access::ensure_access(&user, &id)?;
    let mut years = state.store.list_years(&id).await?;
    years.sort_by(|a, b| b.id.cmp(&a.id));
    Ok(ApiResponse::success(years))
}

#[derive(Debug, Deserialize)]
pub struct CreateYearRequest {
    pub year: String,
    /// Services to create; defaults to the address's own service list.
    pub services: Option<Vec<ServiceTemplate>>,
}

/// POST /api/v1/addresses/{id}/years: create a year archive with empty services.
pub async fn create_year(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<CreateYearRequest>,
) -> Result<Json<ApiResponse<Vec<UtilityServiceRecord>>>, AppError> {
    access::ensure_access(&user, &id)?;
    let created =
        utility_service::create_year_with_services(state.store.as_ref(), &id, &body.year, body.services)
            .await?;
    Ok(ApiResponse::success(created))
}

/// DELETE /api/v1/addresses/{id}/years/{year}: delete a year with its services and readings.
pub async fn delete_year(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, year)): Path<(String, String)>,
) -> Result<Json<ApiResponse<&'static str>>, AppError> {
    access::ensure_access(&user, &id)?;
    utility_service::delete_year_and_services(state.store.as_ref(), &id, &year).await?;
    Ok(ApiResponse::success("deleted"))
}

/// GET /api/v1/addresses/{id}/years/{year}/summary: per-service and per-month totals.
pub async fn year_summary(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, year)): Path<(String, String)>,
) -> Result<Json<ApiResponse<YearSummary>>, AppError> {
    access::ensure_access(&user, &id)?;
    let records = state.store.list_service_records(&id, &year).await?;
    Ok(ApiResponse::success(utility_service::year_summary(&records)))
}
