//! JWT authentication extractor for Axum handlers.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::errors::AppError;
use crate::models::user::UserProfile;
use crate::services::auth as auth_service;
use crate::AppState;

/// Authenticated user extracted from a JWT Bearer token, with the stored
/// profile (role and allowed addresses) attached.
///
/// Use as an Axum extractor in handlers that require authentication:
/// ```ignore
/// async fn handler(CurrentUser(user): CurrentUser) -> impl IntoResponse { ... }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserProfile);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AppError::Unauthorized)?;

        let claims = auth_service::validate_token(token, &state.config.jwt_secret)?;
        let profile = auth_service::resolve_profile(state.store.as_ref(), &claims).await?;

        Ok(CurrentUser(profile))
    }
}
