//! User administration routes (admin only).

use axum::{
    extract::{Path, State},
    Json,
};

use crate::errors::{ApiResponse, AppError};
use crate::middleware::extract::ApiJson;
use crate::middleware::rbac::RequireAdmin;
use crate::models::user::{UpdateAllowedAddresses, UpdateRole, UserProfile};
use crate::services::access;
use crate::AppState;

/// GET /api/v1/users
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<ApiResponse<Vec<UserProfile>>>, AppError> {
    let users = state.store.list_users().await?;
    Ok(ApiResponse::success(users))
}

/// PUT /api/v1/users/{uid}/role
pub async fn set_role(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(uid): Path<String>,
    ApiJson(body): ApiJson<UpdateRole>,
) -> Result<Json<ApiResponse<UserProfile>>, AppError> {
    let user = access::set_role(state.store.as_ref(), &uid, body.role).await?;
    Ok(ApiResponse::success(user))
}

/// PUT /api/v1/users/{uid}/addresses
pub async fn set_allowed_addresses(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(uid): Path<String>,
    ApiJson(body): ApiJson<UpdateAllowedAddresses>,
) -> Result<Json<ApiResponse<UserProfile>>, AppError> {
    let user =
        access::set_allowed_addresses(state.store.as_ref(), &uid, &body.allowed_addresses).await?;
    Ok(ApiResponse::success(user))
}
