//! Route definitions for the utiltrack API.

pub mod addresses;
pub mod auth;
pub mod dashboard;
pub mod health;
pub mod readings;
pub mod services;
pub mod users;

use axum::http::HeaderValue;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Largest accepted request body; payloads are a single year of numbers.
const MAX_BODY_BYTES: usize = 256 * 1024;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let cors = match state.config.frontend_url.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(_) => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    let address_routes = Router::new()
        .route("/addresses", get(addresses::list))
        .route(
            "/addresses/{id}",
            get(addresses::get_by_id)
                .put(addresses::upsert)
                .delete(addresses::delete),
        )
        .route(
            "/addresses/{id}/years",
            get(addresses::list_years).post(addresses::create_year),
        )
        .route(
            "/addresses/{id}/years/{year}",
            axum::routing::delete(addresses::delete_year),
        )
        .route(
            "/addresses/{id}/years/{year}/summary",
            get(addresses::year_summary),
        );

    let service_routes = Router::new()
        .route(
            "/addresses/{id}/years/{year}/services",
            get(services::list).post(services::create),
        )
        .route(
            "/addresses/{id}/years/{year}/services/{service}",
            get(services::get_by_id)
                .patch(services::update)
                .delete(services::delete),
        )
        .route(
            "/addresses/{id}/years/{year}/quick-entry",
            post(services::quick_entry),
        );

    let reading_routes = Router::new()
        .route(
            "/addresses/{id}/years/{year}/readings",
            get(readings::list).post(readings::create),
        )
        .route(
            "/addresses/{id}/years/{year}/readings/quick-entry",
            post(readings::quick_entry),
        )
        .route(
            "/addresses/{id}/years/{year}/readings/{doc}",
            axum::routing::patch(readings::update).delete(readings::delete),
        );

    let user_routes = Router::new()
        .route("/users", get(users::list))
        .route("/users/{uid}/role", put(users::set_role))
        .route("/users/{uid}/addresses", put(users::set_allowed_addresses));

    Router::new()
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .nest(
            "/api/v1",
            Router::new()
                .route("/auth/me", get(auth::me).put(auth::update_me))
                .route("/dashboard", get(dashboard::get))
                .merge(address_routes)
                .merge(service_routes)
                .merge(reading_routes)
                .merge(user_routes),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
