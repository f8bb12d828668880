//! Meter reading workflows.

use serde_json::{json, Map};
use validator::Validate;

use crate::errors::AppError;
use crate::models::reading::{
    reading_doc_id, MeterReadingPayload, MeterReadingRecord, QuickReadingEntry, ReadingPatch,
};
use crate::models::year::YearRecord;
use crate::store::UtilityStore;

/// Add a reading sheet for one meter; the year is created when missing.
pub async fn add_meter_reading(
    store: &dyn UtilityStore,
    address_id: &str,
    year_id: &str,
    payload: &MeterReadingPayload,
) -> Result<MeterReadingRecord, AppError> {
    payload.validate()?;
    let year = YearRecord::from_id(year_id)
        .ok_or_else(|| AppError::Validation(format!("Year '{year_id}' is not a number")))?;
    if store.get_address(address_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Address '{address_id}' not found")));
    }
    store.upsert_year(address_id, &year).await?;

    let record = payload.to_record();
    let doc_id = record.doc_id();
    let saved = store
        .merge_reading_record(address_id, year_id, &doc_id, record.to_document())
        .await?;
    tracing::info!(address_id, year_id, doc_id = %doc_id, "Meter reading added");
    Ok(saved)
}

pub async fn update_reading(
    store: &dyn UtilityStore,
    address_id: &str,
    year_id: &str,
    doc_id: &str,
    patch: &ReadingPatch,
) -> Result<MeterReadingRecord, AppError> {
    patch.validate()?;
    let exists = store
        .list_reading_records(address_id, year_id)
        .await?
        .iter()
        .any(|r| r.id.as_deref() == Some(doc_id));
    if !exists {
        return Err(AppError::NotFound(format!("Meter '{doc_id}' not found in {year_id}")));
    }
    store
        .merge_reading_record(address_id, year_id, doc_id, patch.to_merge_document())
        .await
}

pub async fn delete_reading(
    store: &dyn UtilityStore,
    address_id: &str,
    year_id: &str,
    doc_id: &str,
) -> Result<(), AppError> {
    if !store
        .delete_reading_record(address_id, year_id, doc_id)
        .await?
    {
        return Err(AppError::NotFound(format!("Meter '{doc_id}' not found in {year_id}")));
    }
    tracing::info!(address_id, year_id, doc_id, "Meter reading deleted");
    Ok(())
}

/// Record one month's value for many meters at once. Lines without a positive value are skipped.
pub async fn quick_reading_entry(
    store: &dyn UtilityStore,
    address_id: &str,
    year_id: &str,
    entry: &QuickReadingEntry,
) -> Result<usize, AppError> {
    entry.validate()?;
    if !store
        .list_years(address_id)
        .await?
        .iter()
        .any(|y| y.id == year_id)
    {
        return Err(AppError::NotFound(format!(
            "Year '{year_id}' not found for address '{address_id}'"
        )));
    }

    let mut updated = 0;
    for line in &entry.readings {
        let Some(value) = line.value.filter(|v| v.is_finite() && *v > 0.0) else {
            continue;
        };
        let mut months = Map::new();
        months.insert(entry.month.name().to_string(), json!({ "value": value }));
        let patch = json!({
            "name": line.service_id,
            "meter_number": line.meter_number,
            "monthly_readings": months,
        });
        let doc_id = reading_doc_id(&line.service_id, &line.meter_number);
        store
            .merge_reading_record(address_id, year_id, &doc_id, patch)
            .await?;
        updated += 1;
    }

    tracing::info!(address_id, year_id, month = %entry.month, updated, "Quick reading entry applied");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::address::AddressDoc;
    use crate::models::month::Month;
    use crate::models::reading::QuickReading;
    use crate::store::InMemoryStore;
    use std::collections::BTreeMap;

    async fn store_with_address() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .upsert_address("levandivska", &AddressDoc::default())
            .await
            .unwrap();
        store
    }

    fn sheet(name: &str, meter: &str, values: &[(Month, f64)]) -> MeterReadingPayload {
        MeterReadingPayload {
            service_id: name.to_string(),
            meter_number: meter.to_string(),
            values: values.iter().copied().collect(),
        }
    }

    #[tokio::test]
    async fn add_reading_creates_year() {
        let store = store_with_address().await;
        let rec = add_meter_reading(
            &store,
            "levandivska",
            "2024",
            &sheet("cold water", "A 1", &[(Month::January, 12.0)]),
        )
        .await
        .unwrap();
        assert_eq!(rec.id.as_deref(), Some("cold_water_A_1"));
        assert_eq!(store.list_years("levandivska").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn add_reading_requires_address() {
        let store = InMemoryStore::new();
        let err = add_meter_reading(&store, "nowhere", "2024", &sheet("gas", "1", &[]))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn quick_reading_entry_merges_month() {
        let store = store_with_address().await;
        add_meter_reading(
            &store,
            "levandivska",
            "2024",
            &sheet("gas", "7", &[(Month::January, 100.0)]),
        )
        .await
        .unwrap();

        let entry = QuickReadingEntry {
            month: Month::February,
            readings: vec![
                QuickReading {
                    service_id: "gas".to_string(),
                    meter_number: "7".to_string(),
                    value: Some(130.0),
                },
                QuickReading {
                    service_id: "power".to_string(),
                    meter_number: "8".to_string(),
                    value: None,
                },
            ],
        };
        assert_eq!(
            quick_reading_entry(&store, "levandivska", "2024", &entry)
                .await
                .unwrap(),
            1
        );

        let readings = store
            .list_reading_records("levandivska", "2024")
            .await
            .unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].value(Month::January), 100.0);
        assert_eq!(readings[0].value(Month::February), 130.0);
    }

    #[tokio::test]
    async fn quick_reading_entry_skips_negative_values() {
        let store = store_with_address().await;
        add_meter_reading(&store, "levandivska", "2024", &sheet("gas", "1", &[]))
            .await
            .unwrap();

        let entry = QuickReadingEntry {
            month: Month::January,
            readings: vec![QuickReading {
                service_id: "gas".to_string(),
                meter_number: "1".to_string(),
                value: Some(-5.0),
            }],
        };
        assert_eq!(
            quick_reading_entry(&store, "levandivska", "2024", &entry)
                .await
                .unwrap(),
            0
        );
        let readings = store
            .list_reading_records("levandivska", "2024")
            .await
            .unwrap();
        assert_eq!(readings[0].value(Month::January), 0.0);
        assert!(readings[0].monthly_readings.is_empty());
    }

    #[tokio::test]
    async fn quick_reading_entry_rejects_blank_service() {
        let store = store_with_address().await;
        add_meter_reading(&store, "levandivska", "2024", &sheet("gas", "1", &[]))
            .await
            .unwrap();

        let entry = QuickReadingEntry {
            month: Month::January,
            readings: vec![QuickReading {
                service_id: String::new(),
                meter_number: "1".to_string(),
                value: Some(10.0),
            }],
        };
        let err = quick_reading_entry(&store, "levandivska", "2024", &entry)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(
            store
                .list_reading_records("levandivska", "2024")
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn update_unknown_reading_is_not_found() {
        let store = store_with_address().await;
        add_meter_reading(&store, "levandivska", "2024", &sheet("gas", "7", &[]))
            .await
            .unwrap();
        let patch = ReadingPatch {
            monthly_readings: BTreeMap::from([(Month::March, 1.0)]),
        };
        let err = update_reading(&store, "levandivska", "2024", "power_8", &patch)
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let rec = update_reading(&store, "levandivska", "2024", "gas_7", &patch)
            .await
            .unwrap();
        assert_eq!(rec.value(Month::March), 1.0);
    }

    #[tokio::test]
    async fn delete_reading_twice() {
        let store = store_with_address().await;
        add_meter_reading(&store, "levandivska", "2024", &sheet("gas", "7", &[]))
            .await
            .unwrap();
        delete_reading(&store, "levandivska", "2024", "gas_7")
            .await
            .unwrap();
        assert!(delete_reading(&store, "levandivska", "2024", "gas_7")
            .await
            .unwrap_err()
            .is_not_found());
    }
}
