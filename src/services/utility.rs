//! Utility payment workflows: full-year submissions, partial edits, quick
//! entry and year archives.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Map};
use validator::Validate;

use crate::errors::AppError;
use crate::models::address::{AddressDoc, ServiceTemplate};
use crate::models::month::{Month, MONTHS};
use crate::models::utility::{
    QuickEntry, ServicePatch, UtilityDataPayload, UtilityServiceRecord,
};
use crate::models::year::YearRecord;
use crate::store::UtilityStore;

fn parse_year(year_id: &str) -> Result<YearRecord, AppError> {
    YearRecord::from_id(year_id)
        .ok_or_else(|| AppError::Validation(format!("Year '{year_id}' is not a number")))
}

async fn ensure_year(store: &dyn UtilityStore, address_id: &str, year_id: &str) -> Result<(), AppError> {
    let exists = store
        .list_years(address_id)
        .await?
        .iter()
        .any(|y| y.id == year_id);
    if exists {
        Ok(())
    } else {
        Err(AppError::NotFound(format!(
            "Year '{year_id}' not found for address '{address_id}'"
        )))
    }
}

/// Record a full year of payments for one service.
///
/// Address fields in the payload are merged into the address document first
/// (an empty one is created if missing), then the year,
/// then the service document is replaced wholesale.
pub async fn add_utility_data(
    store: &dyn UtilityStore,
    address_id: &str,
    year_id: &str,
    payload: &UtilityDataPayload,
) -> Result<UtilityServiceRecord, AppError> {
    payload.validate()?;
    let year = parse_year(year_id)?;

    match &payload.address {
        Some(address) => {
            address.validate()?;
            store.upsert_address(address_id, address).await?;
        }
        None if store.get_address(address_id).await?.is_none() => {
            store.upsert_address(address_id, &AddressDoc::default()).await?;
        }
        None => {}
    }
    store.upsert_year(address_id, &year).await?;

    let record = payload.to_record();
    store
        .set_service_record(address_id, year_id, &payload.service_id, &record)
        .await?;

    tracing::info!(
        address_id,
        year_id,
        service_id = %payload.service_id,
        "Utility data added/updated"
    );
    Ok(record)
}

/// Merge a partial edit into one service; months not in the patch are untouched.
pub async fn update_service(
    store: &dyn UtilityStore,
    address_id: &str,
    year_id: &str,
    service_id: &str,
    patch: &ServicePatch,
) -> Result<UtilityServiceRecord, AppError> {
    patch.validate()?;
    ensure_year(store, address_id, year_id).await?;
    let record = store
        .merge_service_record(address_id, year_id, service_id, patch.to_merge_document())
        .await?;
    tracing::info!(address_id, year_id, service_id, "Service updated");
    Ok(record)
}

pub async fn delete_service(
    store: &dyn UtilityStore,
    address_id: &str,
    year_id: &str,
    service_id: &str,
) -> Result<(), AppError> {
    if !store
        .delete_service_record(address_id, year_id, service_id)
        .await?
    {
        return Err(AppError::NotFound(format!(
            "Service '{service_id}' not found in {year_id}"
        )));
    }
    tracing::info!(address_id, year_id, service_id, "Service deleted");
    Ok(())
}

/// Create a year archive with an empty record for every service template.
///
/// Without explicit templates the address's own service list is used.
pub async fn create_year_with_services(
    store: &dyn UtilityStore,
    address_id: &str,
    year_id: &str,
    templates: Option<Vec<ServiceTemplate>>,
) -> Result<Vec<UtilityServiceRecord>, AppError> {
    let year = parse_year(year_id)?;
    let address: AddressDoc = store
        .get_address(address_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Address '{address_id}' not found")))?;
    let templates = templates.unwrap_or(address.services);

    store.upsert_year(address_id, &year).await?;

    let mut created = Vec::with_capacity(templates.len());
    for template in &templates {
        let record = UtilityServiceRecord {
            id: Some(template.name().to_string()),
            name: template.name().to_string(),
            account_number: template.account_number().to_string(),
            monthly_payments: BTreeMap::new(),
        };
        store
            .set_service_record(address_id, year_id, template.name(), &record)
            .await?;
        created.push(record);
    }

    tracing::info!(address_id, year_id, services = created.len(), "Year created with services");
    Ok(created)
}

pub async fn delete_year_and_services(
    store: &dyn UtilityStore,
    address_id: &str,
    year_id: &str,
) -> Result<(), AppError> {
    if !store.delete_year(address_id, year_id).await? {
        return Err(AppError::NotFound(format!(
            "Year '{year_id}' not found for address '{address_id}'"
        )));
    }
    tracing::info!(address_id, year_id, "Year deleted with its services and readings");
    Ok(())
}

/// Record one month's payment for many services at once.
///
/// Lines without a positive amount are skipped. Returns how many services were updated.
pub async fn quick_entry(
    store: &dyn UtilityStore,
    address_id: &str,
    year_id: &str,
    entry: &QuickEntry,
) -> Result<usize, AppError> {
    entry.validate()?;
    ensure_year(store, address_id, year_id).await?;

    let mut updated = 0;
    for line in &entry.payments {
        let Some(amount) = line.amount.filter(|a| a.is_finite() && *a > 0.0) else {
            continue;
        };
        let mut months = Map::new();
        months.insert(
            entry.month.name().to_string(),
            json!({ "amount": amount, "currency": line.currency }),
        );
        let patch = json!({ "monthly_payments": months });
        store
            .merge_service_record(address_id, year_id, &line.service_id, patch)
            .await?;
        updated += 1;
    }

    tracing::info!(address_id, year_id, month = %entry.month, updated, "Quick entry applied");
    Ok(updated)
}

/// Totals shown on a year archive page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct YearSummary {
    pub services: Vec<ServiceTotal>,
    /// Only months with a positive sum.
    pub monthly: BTreeMap<Month, f64>,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceTotal {
    pub name: String,
    pub total: f64,
}

pub fn year_summary(records: &[UtilityServiceRecord]) -> YearSummary {
    let services: Vec<ServiceTotal> = records
        .iter()
        .map(|r| ServiceTotal {
            name: r.name.clone(),
            total: r.yearly_total(),
        })
        .collect();

    let monthly = MONTHS
        .iter()
        .filter_map(|m| {
            let sum: f64 = records.iter().map(|r| r.amount(*m)).sum();
            (sum > 0.0).then_some((*m, sum))
        })
        .collect();

    YearSummary {
        total: services.iter().map(|s| s.total).sum(),
        services,
        monthly,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::utility::QuickPayment;
    use crate::store::InMemoryStore;

    fn payload(service: &str, amounts: &[(Month, f64)]) -> UtilityDataPayload {
        UtilityDataPayload {
            service_id: service.to_string(),
            account_number: "ACC".to_string(),
            currency: "UAH".to_string(),
            amounts: amounts.iter().copied().collect(),
            address: Some(AddressDoc {
                street: "Mazepy".to_string(),
                city: "Lviv".to_string(),
                services: vec![
                    ServiceTemplate::Named("gas".to_string()),
                    ServiceTemplate::Detailed {
                        name: "internet".to_string(),
                        account_number: "778".to_string(),
                    },
                ],
                ..AddressDoc::default()
            }),
        }
    }

    #[tokio::test]
    async fn add_utility_data_creates_address_year_and_service() {
        let store = InMemoryStore::new();
        add_utility_data(&store, "mazepy", "2024", &payload("gas", &[(Month::January, 100.0)]))
            .await
            .unwrap();

        assert_eq!(store.get_address("mazepy").await.unwrap().unwrap().street, "Mazepy");
        assert_eq!(store.list_years("mazepy").await.unwrap()[0].year, 2024);
        let rec = store
            .get_service_record("mazepy", "2024", "gas")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rec.amount(Month::January), 100.0);
        assert_eq!(rec.monthly_payments.len(), 12);
    }

    #[tokio::test]
    async fn add_utility_data_rejects_non_numeric_year() {
        let store = InMemoryStore::new();
        let err = add_utility_data(&store, "mazepy", "this-year", &payload("gas", &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn quick_entry_skips_empty_and_keeps_other_months() {
        let store = InMemoryStore::new();
        add_utility_data(&store, "mazepy", "2024", &payload("gas", &[(Month::January, 100.0)]))
            .await
            .unwrap();

        let entry = QuickEntry {
            month: Month::February,
            payments: vec![
                QuickPayment {
                    service_id: "gas".to_string(),
                    amount: Some(55.0),
                    currency: "UAH".to_string(),
                },
                QuickPayment {
                    service_id: "water".to_string(),
                    amount: None,
                    currency: "UAH".to_string(),
                },
                QuickPayment {
                    service_id: "power".to_string(),
                    amount: Some(0.0),
                    currency: "UAH".to_string(),
                },
            ],
        };
        let updated = quick_entry(&store, "mazepy", "2024", &entry).await.unwrap();
        assert_eq!(updated, 1);

        let records = store.list_service_records("mazepy", "2024").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].amount(Month::January), 100.0);
        assert_eq!(records[0].amount(Month::February), 55.0);
    }

    #[tokio::test]
    async fn quick_entry_requires_year() {
        let store = InMemoryStore::new();
        let entry = QuickEntry {
            month: Month::March,
            payments: Vec::new(),
        };
        let err = quick_entry(&store, "mazepy", "2024", &entry).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn quick_entry_rejects_blank_service_and_ignores_negative_amounts() {
        let store = InMemoryStore::new();
        add_utility_data(&store, "mazepy", "2024", &payload("gas", &[]))
            .await
            .unwrap();

        let blank = QuickEntry {
            month: Month::April,
            payments: vec![QuickPayment {
                service_id: String::new(),
                amount: Some(10.0),
                currency: "UAH".to_string(),
            }],
        };
        let err = quick_entry(&store, "mazepy", "2024", &blank).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let negative = QuickEntry {
            month: Month::April,
            payments: vec![QuickPayment {
                service_id: "gas".to_string(),
                amount: Some(-3.0),
                currency: "UAH".to_string(),
            }],
        };
        assert_eq!(quick_entry(&store, "mazepy", "2024", &negative).await.unwrap(), 0);
        let records = store.list_service_records("mazepy", "2024").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].amount(Month::April), 0.0);
    }

    #[tokio::test]
    async fn create_year_uses_address_services_by_default() {
        let store = InMemoryStore::new();
        add_utility_data(&store, "mazepy", "2024", &payload("gas", &[]))
            .await
            .unwrap();

        let created = create_year_with_services(&store, "mazepy", "2025", None)
            .await
            .unwrap();
        assert_eq!(created.len(), 2);
        let internet = store
            .get_service_record("mazepy", "2025", "internet")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(internet.account_number, "778");
        assert!(internet.monthly_payments.is_empty());
    }

    #[tokio::test]
    async fn update_and_delete_service() {
        let store = InMemoryStore::new();
        add_utility_data(&store, "mazepy", "2024", &payload("gas", &[(Month::January, 100.0)]))
            .await
            .unwrap();

        let patch = ServicePatch {
            account_number: Some("NEW".to_string()),
            currency: Some("EUR".to_string()),
            monthly_payments: BTreeMap::from([(Month::January, 120.0)]),
        };
        let rec = update_service(&store, "mazepy", "2024", "gas", &patch)
            .await
            .unwrap();
        assert_eq!(rec.account_number, "NEW");
        assert_eq!(rec.amount(Month::January), 120.0);
        assert_eq!(rec.monthly_payments[&Month::January].currency, "EUR");
        assert_eq!(rec.amount(Month::February), 0.0);

        delete_service(&store, "mazepy", "2024", "gas").await.unwrap();
        assert!(delete_service(&store, "mazepy", "2024", "gas")
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn year_summary_totals() {
        let gas = UtilityServiceRecord::from_document(
            "gas",
            &json!({"name": "gas", "monthly_payments": {
                "january": {"amount": 100, "currency": "UAH"},
                "february": {"amount": 50, "currency": "UAH"},
                "march": {"amount": 0, "currency": "UAH"}
            }}),
        );
        let water = UtilityServiceRecord::from_document(
            "water",
            &json!({"name": "water", "monthly_payments": {"january": {"amount": "30", "currency": "UAH"}}}),
        );
        let summary = year_summary(&[gas, water]);
        assert_eq!(summary.total, 180.0);
        assert_eq!(summary.services[0].total, 150.0);
        assert_eq!(summary.monthly.get(&Month::January), Some(&130.0));
        assert_eq!(summary.monthly.get(&Month::February), Some(&50.0));
        assert!(!summary.monthly.contains_key(&Month::March));
    }
}
