//! In-memory implementation of UtilityStore for tests and local development.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{address_missing, user_missing, year_missing, UtilityStore};
use crate::errors::AppError;
use crate::models::address::{AddressDoc, AddressEntry};
use crate::models::document::merge_document;
use crate::models::reading::MeterReadingRecord;
use crate::models::user::{UserProfile, UserRole};
use crate::models::utility::UtilityServiceRecord;
use crate::models::year::YearRecord;

#[derive(Debug, Default)]
struct YearNode {
    year: i32,
    services: BTreeMap<String, Value>,
    readings: BTreeMap<String, Value>,
}

#[derive(Debug)]
struct AddressNode {
    doc: Value,
    years: BTreeMap<String, YearNode>,
}

#[derive(Debug, Default)]
struct Data {
    addresses: BTreeMap<String, AddressNode>,
    users: BTreeMap<String, UserProfile>,
}

impl Data {
    fn year_mut(&mut self, address_id: &str, year_id: &str) -> Result<&mut YearNode, AppError> {
        self.addresses
            .get_mut(address_id)
            .and_then(|a| a.years.get_mut(year_id))
            .ok_or_else(|| year_missing(address_id, year_id))
    }

    fn year(&self, address_id: &str, year_id: &str) -> Option<&YearNode> {
        self.addresses
            .get(address_id)
            .and_then(|a| a.years.get(year_id))
    }

    fn user_mut(&mut self, uid: &str) -> Result<&mut UserProfile, AppError> {
        self.users.get_mut(uid).ok_or_else(|| user_missing(uid))
    }
}

/// Thread-safe in-memory document store. Documents are kept as raw JSON and
/// decoded on every read, exactly like a remote store.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    data: Arc<RwLock<Data>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Data>, AppError> {
        self.data
            .read()
            .map_err(|e| AppError::Store(format!("Failed to acquire read lock: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Data>, AppError> {
        self.data
            .write()
            .map_err(|e| AppError::Store(format!("Failed to acquire write lock: {e}")))
    }
}

#[async_trait]
impl UtilityStore for InMemoryStore {
    async fn list_addresses(&self) -> Result<Vec<AddressEntry>, AppError> {
        let data = self.read()?;
        Ok(data
            .addresses
            .iter()
            .map(|(id, node)| AddressEntry {
                id: id.clone(),
                data: AddressDoc::from_document(id, &node.doc),
            })
            .collect())
    }

    async fn get_address(&self, address_id: &str) -> Result<Option<AddressDoc>, AppError> {
        let data = self.read()?;
        Ok(data
            .addresses
            .get(address_id)
            .map(|node| AddressDoc::from_document(address_id, &node.doc)))
    }

    async fn upsert_address(&self, address_id: &str, doc: &AddressDoc) -> Result<(), AppError> {
        let mut data = self.write()?;
        let node = data
            .addresses
            .entry(address_id.to_string())
            .or_insert_with(|| AddressNode {
                doc: json!({}),
                years: BTreeMap::new(),
            });
        merge_document(&mut node.doc, doc.to_document());
        Ok(())
    }

    async fn delete_address(&self, address_id: &str) -> Result<bool, AppError> {
        let mut data = self.write()?;
        Ok(data.addresses.remove(address_id).is_some())
    }

    async fn list_years(&self, address_id: &str) -> Result<Vec<YearRecord>, AppError> {
        let data = self.read()?;
        Ok(data
            .addresses
            .get(address_id)
            .map(|node| {
                node.years
                    .iter()
                    .map(|(id, y)| YearRecord {
                        id: id.clone(),
                        year: y.year,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn upsert_year(&self, address_id: &str, year: &YearRecord) -> Result<(), AppError> {
        let mut data = self.write()?;
        let node = data
            .addresses
            .get_mut(address_id)
            .ok_or_else(|| address_missing(address_id))?;
        node.years.entry(year.id.clone()).or_default().year = year.year;
        Ok(())
    }

    async fn delete_year(&self, address_id: &str, year_id: &str) -> Result<bool, AppError> {
        let mut data = self.write()?;
        Ok(data
            .addresses
            .get_mut(address_id)
            .and_then(|node| node.years.remove(year_id))
            .is_some())
    }

    async fn list_service_records(
        &self,
        address_id: &str,
        year_id: &str,
    ) -> Result<Vec<UtilityServiceRecord>, AppError> {
        let data = self.read()?;
        Ok(data
            .year(address_id, year_id)
            .map(|y| {
                y.services
                    .iter()
                    .map(|(id, doc)| UtilityServiceRecord::from_document(id, doc))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_service_record(
        &self,
        address_id: &str,
        year_id: &str,
        service_id: &str,
    ) -> Result<Option<UtilityServiceRecord>, AppError> {
        let data = self.read()?;
        Ok(data
            .year(address_id, year_id)
            .and_then(|y| y.services.get(service_id))
            .map(|doc| UtilityServiceRecord::from_document(service_id, doc)))
    }

    async fn set_service_record(
        &self,
        address_id: &str,
        year_id: &str,
        service_id: &str,
        record: &UtilityServiceRecord,
    ) -> Result<(), AppError> {
        let mut data = self.write()?;
        data.year_mut(address_id, year_id)?
            .services
            .insert(service_id.to_string(), record.to_document());
        Ok(())
    }

    async fn merge_service_record(
        &self,
        address_id: &str,
        year_id: &str,
        service_id: &str,
        patch: Value,
    ) -> Result<UtilityServiceRecord, AppError> {
        let mut data = self.write()?;
        let doc = data
            .year_mut(address_id, year_id)?
            .services
            .entry(service_id.to_string())
            .or_insert_with(|| json!({ "name": service_id }));
        merge_document(doc, patch);
        Ok(UtilityServiceRecord::from_document(service_id, doc))
    }

    async fn delete_service_record(
        &self,
        address_id: &str,
        year_id: &str,
        service_id: &str,
    ) -> Result<bool, AppError> {
        let mut data = self.write()?;
        Ok(data
            .year_mut(address_id, year_id)
            .map(|y| y.services.remove(service_id).is_some())
            .unwrap_or(false))
    }

    async fn list_reading_records(
        &self,
        address_id: &str,
        year_id: &str,
    ) -> Result<Vec<MeterReadingRecord>, AppError> {
        let data = self.read()?;
        Ok(data
            .year(address_id, year_id)
            .map(|y| {
                y.readings
                    .iter()
                    .map(|(id, doc)| MeterReadingRecord::from_document(id, doc))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn merge_reading_record(
        &self,
        address_id: &str,
        year_id: &str,
        doc_id: &str,
        patch: Value,
    ) -> Result<MeterReadingRecord, AppError> {
        let mut data = self.write()?;
        let doc = data
            .year_mut(address_id, year_id)?
            .readings
            .entry(doc_id.to_string())
            .or_insert_with(|| json!({}));
        merge_document(doc, patch);
        Ok(MeterReadingRecord::from_document(doc_id, doc))
    }

    async fn delete_reading_record(
        &self,
        address_id: &str,
        year_id: &str,
        doc_id: &str,
    ) -> Result<bool, AppError> {
        let mut data = self.write()?;
        Ok(data
            .year_mut(address_id, year_id)
            .map(|y| y.readings.remove(doc_id).is_some())
            .unwrap_or(false))
    }

    async fn list_users(&self) -> Result<Vec<UserProfile>, AppError> {
        let data = self.read()?;
        Ok(data.users.values().cloned().collect())
    }

    async fn get_user(&self, uid: &str) -> Result<Option<UserProfile>, AppError> {
        let data = self.read()?;
        Ok(data.users.get(uid).cloned())
    }

    async fn upsert_user(&self, profile: &UserProfile) -> Result<(), AppError> {
        let mut data = self.write()?;
        data.users.insert(profile.uid.clone(), profile.clone());
        Ok(())
    }

    async fn update_user_role(&self, uid: &str, role: UserRole) -> Result<UserProfile, AppError> {
        let mut data = self.write()?;
        let user = data.user_mut(uid)?;
        user.role = role;
        Ok(user.clone())
    }

    async fn update_allowed_addresses(
        &self,
        uid: &str,
        address_ids: &[String],
    ) -> Result<UserProfile, AppError> {
        let mut data = self.write()?;
        let user = data.user_mut(uid)?;
        user.allowed_addresses = address_ids.to_vec();
        Ok(user.clone())
    }

    async fn update_display_name(
        &self,
        uid: &str,
        display_name: Option<&str>,
    ) -> Result<UserProfile, AppError> {
        let mut data = self.write()?;
        let user = data.user_mut(uid)?;
        user.display_name = display_name.map(str::to_string);
        Ok(user.clone())
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.read().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::month::Month;

    async fn store_with_year() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .upsert_address("mazepy", &AddressDoc::default())
            .await
            .unwrap();
        store
            .upsert_year("mazepy", &YearRecord::from_id("2024").unwrap())
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn year_requires_existing_address() {
        let store = InMemoryStore::new();
        let err = store
            .upsert_year("nowhere", &YearRecord::from_id("2024").unwrap())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn service_requires_existing_year() {
        let store = store_with_year().await;
        let err = store
            .merge_service_record("mazepy", "2023", "gas", json!({}))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn merge_keeps_untouched_months() {
        let store = store_with_year().await;
        store
            .merge_service_record(
                "mazepy",
                "2024",
                "gas",
                json!({"monthly_payments": {"january": {"amount": 10, "currency": "UAH"}}}),
            )
            .await
            .unwrap();
        let rec = store
            .merge_service_record(
                "mazepy",
                "2024",
                "gas",
                json!({"monthly_payments": {"february": {"amount": "20", "currency": "UAH"}}}),
            )
            .await
            .unwrap();
        assert_eq!(rec.name, "gas");
        assert_eq!(rec.amount(Month::January), 10.0);
        assert_eq!(rec.amount(Month::February), 20.0);
    }

    #[tokio::test]
    async fn address_merge_keeps_services_when_omitted() {
        let store = InMemoryStore::new();
        let with_services: AddressDoc = serde_json::from_value(json!({
            "street": "Mazepy", "services": ["gas"]
        }))
        .unwrap();
        store.upsert_address("mazepy", &with_services).await.unwrap();

        let rename = AddressDoc {
            street: "Mazepy St".to_string(),
            ..AddressDoc::default()
        };
        store.upsert_address("mazepy", &rename).await.unwrap();

        let doc = store.get_address("mazepy").await.unwrap().unwrap();
        assert_eq!(doc.street, "Mazepy St");
        assert_eq!(doc.services.len(), 1);
    }

    #[tokio::test]
    async fn delete_year_cascades() {
        let store = store_with_year().await;
        store
            .merge_service_record("mazepy", "2024", "gas", json!({}))
            .await
            .unwrap();
        store
            .merge_reading_record("mazepy", "2024", "gas_1", json!({"name": "gas"}))
            .await
            .unwrap();

        assert!(store.delete_year("mazepy", "2024").await.unwrap());
        assert!(store.list_years("mazepy").await.unwrap().is_empty());
        assert!(store
            .list_service_records("mazepy", "2024")
            .await
            .unwrap()
            .is_empty());
        assert!(store
            .list_reading_records("mazepy", "2024")
            .await
            .unwrap()
            .is_empty());
        assert!(!store.delete_year("mazepy", "2024").await.unwrap());
    }

    #[tokio::test]
    async fn unknown_user_updates_are_not_found() {
        let store = InMemoryStore::new();
        let err = store
            .update_user_role("ghost", UserRole::Admin)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
