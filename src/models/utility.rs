//! Utility service records: one service's payments for one year at one address.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use validator::{Validate, ValidationError};

use super::address::AddressDoc;
use super::document::{coerce_number, coerce_string, month_entries};
use super::month::{Month, MONTHS};

/// Currency used when a payment does not carry one.
pub const DEFAULT_CURRENCY: &str = "UAH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthPayment {
    pub amount: f64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UtilityServiceRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub account_number: String,
    pub monthly_payments: BTreeMap<Month, MonthPayment>,
}

impl UtilityServiceRecord {
    /// Decode a stored document, coercing every malformed field instead of failing.
    pub fn from_document(id: &str, doc: &Value) -> Self {
        let empty = Map::new();
        let obj = doc.as_object().unwrap_or(&empty);

        let name = match coerce_string(obj.get("name")) {
            n if n.is_empty() => id.to_string(),
            n => n,
        };

        let monthly_payments = month_entries(obj, "monthly_payments", id)
            .into_iter()
            .map(|(month, entry)| {
                let currency = match coerce_string(entry.get("currency")) {
                    c if c.is_empty() => DEFAULT_CURRENCY.to_string(),
                    c => c,
                };
                (
                    month,
                    MonthPayment {
                        amount: coerce_number(entry.get("amount")),
                        currency,
                    },
                )
            })
            .collect();

        Self {
            id: Some(id.to_string()),
            name,
            account_number: coerce_string(obj.get("account_number")),
            monthly_payments,
        }
    }

    /// Stored representation (the id lives in the document key, not the body).
    pub fn to_document(&self) -> Value {
        json!({
            "name": self.name,
            "account_number": self.account_number,
            "monthly_payments": self.monthly_payments,
        })
    }

    /// Amount paid in `month`, zero when nothing was recorded.
    pub fn amount(&self, month: Month) -> f64 {
        self.monthly_payments.get(&month).map_or(0.0, |p| p.amount)
    }

    pub fn yearly_total(&self) -> f64 {
        self.monthly_payments.values().map(|p| p.amount).sum()
    }
}

fn validate_amounts(amounts: &BTreeMap<Month, f64>) -> Result<(), ValidationError> {
    if amounts.values().all(|v| v.is_finite() && *v >= 0.0) {
        Ok(())
    } else {
        Err(ValidationError::new("amounts_must_be_non_negative"))
    }
}

/// Full-year payment submission for one service.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UtilityDataPayload {
    #[validate(length(min = 1, max = 128))]
    pub service_id: String,
    #[serde(default)]
    pub account_number: String,
    #[validate(length(min = 1, max = 8))]
    pub currency: String,
    #[serde(default)]
    #[validate(custom(function = "validate_amounts"))]
    pub amounts: BTreeMap<Month, f64>,
    /// Address fields merged into the address document alongside the payments.
    #[serde(default)]
    pub address: Option<AddressDoc>,
}

impl UtilityDataPayload {
    /// Build the record written to the store: all twelve months, one currency.
    pub fn to_record(&self) -> UtilityServiceRecord {
        let monthly_payments = MONTHS
            .iter()
            .map(|m| {
                (
                    *m,
                    MonthPayment {
                        amount: self.amounts.get(m).copied().unwrap_or(0.0),
                        currency: self.currency.clone(),
                    },
                )
            })
            .collect();

        UtilityServiceRecord {
            id: Some(self.service_id.clone()),
            name: self.service_id.clone(),
            account_number: self.account_number.clone(),
            monthly_payments,
        }
    }
}

/// Partial update of a service: only the listed months are touched.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ServicePatch {
    pub account_number: Option<String>,
    #[validate(length(min = 1, max = 8))]
    pub currency: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "validate_amounts"))]
    pub monthly_payments: BTreeMap<Month, f64>,
}

impl ServicePatch {
    /// Document fragment to deep-merge into the stored service.
    pub fn to_merge_document(&self) -> Value {
        let currency = self.currency.as_deref().unwrap_or(DEFAULT_CURRENCY);
        let payments: Map<String, Value> = self
            .monthly_payments
            .iter()
            .map(|(m, amount)| {
                (
                    m.name().to_string(),
                    json!({ "amount": amount, "currency": currency }),
                )
            })
            .collect();

        let mut doc = Map::new();
        if let Some(account) = &self.account_number {
            doc.insert("account_number".to_string(), json!(account));
        }
        if !payments.is_empty() {
            doc.insert("monthly_payments".to_string(), Value::Object(payments));
        }
        Value::Object(doc)
    }
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

/// One line of a quick entry form.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QuickPayment {
    #[validate(length(min = 1, max = 128))]
    pub service_id: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default = "default_currency")]
    #[validate(length(min = 1, max = 8))]
    pub currency: String,
}

/// Batch entry of one month's payments across the services of a year.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QuickEntry {
    pub month: Month,
    #[validate(nested)]
    pub payments: Vec<QuickPayment>,
}
