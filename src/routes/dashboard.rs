//! Dashboard routes: aggregated statistics and chart series for one address.

use axum::{
    extract::State,
    Json,
};

use crate::errors::{ApiResponse, AppError};
use crate::middleware::auth::CurrentUser;
use crate::middleware::extract::ApiQuery;
use crate::services::access;
use crate::services::dashboard::{self, DashboardData, DashboardParams, DashboardQuery};
use crate::AppState;

/// GET /api/v1/dashboard?address=&type=&year=&service=&month=
pub async fn get(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiQuery(params): ApiQuery<DashboardParams>,
) -> Result<Json<ApiResponse<DashboardData>>, AppError> {
    let query = DashboardQuery::try_from(params)?;
    if !query.address_id.is_empty() {
        access::ensure_access(&user, &query.address_id)?;
    }

    let data = dashboard::load(state.store.as_ref(), &query, &state.dashboard_settings()).await?;
    Ok(ApiResponse::success(data))
}
