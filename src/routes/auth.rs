//! Authentication routes: current user profile.

use axum::{extract::State, Json};

use crate::errors::{ApiResponse, AppError};
use crate::middleware::auth::CurrentUser;
use crate::middleware::extract::ApiJson;
use crate::models::user::{UpdateProfile, UserProfile};
use crate::services::auth as auth_service;
use crate::AppState;

/// GET /api/v1/auth/me: current user profile
pub async fn me(CurrentUser(user): CurrentUser) -> Json<ApiResponse<UserProfile>> {
    ApiResponse::success(user)
}

/// PUT /api/v1/auth/me: update the caller's display name
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<UpdateProfile>,
) -> Result<Json<ApiResponse<UserProfile>>, AppError> {
    let profile = auth_service::update_profile(state.store.as_ref(), &user, &body).await?;
    Ok(ApiResponse::success(profile))
}
