pub mod config;
pub mod db;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

use std::sync::Arc;

use services::dashboard::DashboardSettings;
use store::UtilityStore;

/// Shared application state passed to all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UtilityStore>,
    pub config: config::AppConfig,
}

impl AppState {
    pub fn dashboard_settings(&self) -> DashboardSettings {
        DashboardSettings {
            others_label: self.config.dashboard_others_label.clone(),
        }
    }
}
