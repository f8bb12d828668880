//! Meter reading records: consumption values per meter per month.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use validator::{Validate, ValidationError};

use super::document::{coerce_number, coerce_string, month_entries};
use super::month::Month;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Document id of a meter: `{name}_{meter_number}` with whitespace runs collapsed to `_`.
pub fn reading_doc_id(name: &str, meter_number: &str) -> String {
    WHITESPACE
        .replace_all(&format!("{name}_{meter_number}"), "_")
        .into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthReading {
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterReadingRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub meter_number: String,
    pub monthly_readings: BTreeMap<Month, MonthReading>,
}

impl MeterReadingRecord {
    pub fn from_document(id: &str, doc: &Value) -> Self {
        let empty = Map::new();
        let obj = doc.as_object().unwrap_or(&empty);

        let name = match coerce_string(obj.get("name")) {
            n if n.is_empty() => id.to_string(),
            n => n,
        };

        let monthly_readings = month_entries(obj, "monthly_readings", id)
            .into_iter()
            .map(|(month, entry)| {
                (
                    month,
                    MonthReading {
                        value: coerce_number(entry.get("value")),
                    },
                )
            })
            .collect();

        Self {
            id: Some(id.to_string()),
            name,
            meter_number: coerce_string(obj.get("meter_number")),
            monthly_readings,
        }
    }

    pub fn to_document(&self) -> Value {
        json!({
            "name": self.name,
            "meter_number": self.meter_number,
            "monthly_readings": self.monthly_readings,
        })
    }

    /// Label used on dashboards: `name (#meter)`.
    pub fn display_name(&self) -> String {
        format!("{} (#{})", self.name, self.meter_number)
    }

    pub fn value(&self, month: Month) -> f64 {
        self.monthly_readings.get(&month).map_or(0.0, |r| r.value)
    }

    pub fn doc_id(&self) -> String {
        reading_doc_id(&self.name, &self.meter_number)
    }
}

fn validate_values(values: &BTreeMap<Month, f64>) -> Result<(), ValidationError> {
    if values.values().all(|v| v.is_finite() && *v >= 0.0) {
        Ok(())
    } else {
        Err(ValidationError::new("readings_must_be_non_negative"))
    }
}

/// New meter reading sheet for one meter and year.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MeterReadingPayload {
    #[validate(length(min = 1, max = 128))]
    pub service_id: String,
    #[validate(length(max = 64))]
    #[serde(default)]
    pub meter_number: String,
    #[serde(default)]
    #[validate(custom(function = "validate_values"))]
    pub values: BTreeMap<Month, f64>,
}

impl MeterReadingPayload {
    pub fn to_record(&self) -> MeterReadingRecord {
        MeterReadingRecord {
            id: Some(reading_doc_id(&self.service_id, &self.meter_number)),
            name: self.service_id.clone(),
            meter_number: self.meter_number.clone(),
            monthly_readings: self
                .values
                .iter()
                .map(|(m, v)| (*m, MonthReading { value: *v }))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ReadingPatch {
    #[serde(default)]
    #[validate(custom(function = "validate_values"))]
    pub monthly_readings: BTreeMap<Month, f64>,
}

impl ReadingPatch {
    pub fn to_merge_document(&self) -> Value {
        let readings: Map<String, Value> = self
            .monthly_readings
            .iter()
            .map(|(m, v)| (m.name().to_string(), json!({ "value": v })))
            .collect();
        json!({ "monthly_readings": readings })
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QuickReading {
    #[validate(length(min = 1, max = 128))]
    pub service_id: String,
    #[validate(length(max = 64))]
    #[serde(default)]
    pub meter_number: String,
    #[serde(default)]
    pub value: Option<f64>,
}

/// Batch entry of one month's readings across the meters of a year.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QuickReadingEntry {
    pub month: Month,
    #[validate(nested)]
    pub readings: Vec<QuickReading>,
}
