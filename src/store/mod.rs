//! Document store abstraction: addresses → years → services / meter readings, plus user profiles.
//!
//! Every read decodes raw documents through the model `from_document`
//! coercion, so callers never see malformed month entries.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::AppError;
use crate::models::address::{AddressDoc, AddressEntry};
use crate::models::reading::MeterReadingRecord;
use crate::models::user::{UserProfile, UserRole};
use crate::models::utility::UtilityServiceRecord;
use crate::models::year::YearRecord;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Read/write API of the utility document store.
///
/// Writes follow document-store merge semantics: `upsert_*` and `merge_*`
/// deep-merge into an existing document (creating it when absent), `set_*`
/// replaces it. A year can only be written under an existing address, and
/// services/readings only under an existing year; violations are `NotFound`.
#[async_trait]
pub trait UtilityStore: Send + Sync {
    async fn list_addresses(&self) -> Result<Vec<AddressEntry>, AppError>;

    async fn get_address(&self, address_id: &str) -> Result<Option<AddressDoc>, AppError>;

    async fn upsert_address(&self, address_id: &str, doc: &AddressDoc) -> Result<(), AppError>;

    /// Delete an address with all of its years. Returns `false` if it did not exist.
    async fn delete_address(&self, address_id: &str) -> Result<bool, AppError>;

    async fn list_years(&self, address_id: &str) -> Result<Vec<YearRecord>, AppError>;

    async fn upsert_year(&self, address_id: &str, year: &YearRecord) -> Result<(), AppError>;

    /// Delete a year together with every service and reading under it.
    async fn delete_year(&self, address_id: &str, year_id: &str) -> Result<bool, AppError>;

    async fn list_service_records(
        &self,
        address_id: &str,
        year_id: &str,
    ) -> Result<Vec<UtilityServiceRecord>, AppError>;

    async fn get_service_record(
        &self,
        address_id: &str,
        year_id: &str,
        service_id: &str,
    ) -> Result<Option<UtilityServiceRecord>, AppError>;

    async fn set_service_record(
        &self,
        address_id: &str,
        year_id: &str,
        service_id: &str,
        record: &UtilityServiceRecord,
    ) -> Result<(), AppError>;

    async fn merge_service_record(
        &self,
        address_id: &str,
        year_id: &str,
        service_id: &str,
        patch: Value,
    ) -> Result<UtilityServiceRecord, AppError>;

    async fn delete_service_record(
        &self,
        address_id: &str,
        year_id: &str,
        service_id: &str,
    ) -> Result<bool, AppError>;

    async fn list_reading_records(
        &self,
        address_id: &str,
        year_id: &str,
    ) -> Result<Vec<MeterReadingRecord>, AppError>;

    async fn merge_reading_record(
        &self,
        address_id: &str,
        year_id: &str,
        doc_id: &str,
        patch: Value,
    ) -> Result<MeterReadingRecord, AppError>;

    async fn delete_reading_record(
        &self,
        address_id: &str,
        year_id: &str,
        doc_id: &str,
    ) -> Result<bool, AppError>;

    async fn list_users(&self) -> Result<Vec<UserProfile>, AppError>;

    async fn get_user(&self, uid: &str) -> Result<Option<UserProfile>, AppError>;

    async fn upsert_user(&self, profile: &UserProfile) -> Result<(), AppError>;

    async fn update_user_role(&self, uid: &str, role: UserRole) -> Result<UserProfile, AppError>;

    async fn update_allowed_addresses(
        &self,
        uid: &str,
        address_ids: &[String],
    ) -> Result<UserProfile, AppError>;

    async fn update_display_name(
        &self,
        uid: &str,
        display_name: Option<&str>,
    ) -> Result<UserProfile, AppError>;

    /// Connectivity check for readiness probes.
    async fn ping(&self) -> Result<(), AppError>;
}

fn year_missing(address_id: &str, year_id: &str) -> AppError {
    AppError::NotFound(format!("Year '{year_id}' not found for address '{address_id}'"))
}

fn address_missing(address_id: &str) -> AppError {
    AppError::NotFound(format!("Address '{address_id}' not found"))
}

fn user_missing(uid: &str) -> AppError {
    AppError::NotFound(format!("User '{uid}' not found"))
}
