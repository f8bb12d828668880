//! Address documents: the top-level grouping key for all utility data.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

/// A service an address is expected to have every year.
///
/// Older documents store just the name; newer ones carry the account number too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceTemplate {
    Named(String),
    Detailed {
        name: String,
        #[serde(rename = "accountNumber", alias = "account_number", default)]
        account_number: String,
    },
}

impl ServiceTemplate {
    pub fn name(&self) -> &str {
        match self {
            ServiceTemplate::Named(name) => name,
            ServiceTemplate::Detailed { name, .. } => name,
        }
    }

    pub fn account_number(&self) -> &str {
        match self {
            ServiceTemplate::Named(_) => "",
            ServiceTemplate::Detailed { account_number, .. } => account_number,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct AddressDoc {
    #[serde(default)]
    #[validate(length(max = 200))]
    pub street: String,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub house_number: String,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub flat_number: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub city: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceTemplate>,
}

impl AddressDoc {
    /// Decode a stored address, falling back to an empty document on a shape mismatch.
    pub fn from_document(id: &str, doc: &Value) -> Self {
        serde_json::from_value(doc.clone()).unwrap_or_else(|e| {
            tracing::warn!(address_id = id, error = %e, "Malformed address document");
            Self::default()
        })
    }

    pub fn to_document(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Human readable form: `street, house[/flat], city`.
    pub fn display(&self) -> String {
        let flat = if self.flat_number.is_empty() {
            String::new()
        } else {
            format!("/{}", self.flat_number)
        };
        format!("{}, {}{}, {}", self.street, self.house_number, flat, self.city)
    }
}

/// Address with its document id, as returned by list endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressEntry {
    pub id: String,
    pub data: AddressDoc,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn services_accept_both_shapes() {
        let doc = json!({
            "street": "Mazepy",
            "house_number": "1",
            "flat_number": "",
            "city": "Lviv",
            "services": ["gas", {"name": "internet", "accountNumber": "778"}]
        });
        let addr = AddressDoc::from_document("mazepy", &doc);
        assert_eq!(addr.services.len(), 2);
        assert_eq!(addr.services[0].name(), "gas");
        assert_eq!(addr.services[0].account_number(), "");
        assert_eq!(addr.services[1].name(), "internet");
        assert_eq!(addr.services[1].account_number(), "778");
    }

    #[test]
    fn display_omits_empty_flat() {
        let mut addr = AddressDoc {
            street: "Levandivska".to_string(),
            house_number: "5".to_string(),
            flat_number: String::new(),
            city: "Lviv".to_string(),
            services: Vec::new(),
        };
        assert_eq!(addr.display(), "Levandivska, 5, Lviv");
        addr.flat_number = "12".to_string();
        assert_eq!(addr.display(), "Levandivska, 5/12, Lviv");
    }

    #[test]
    fn malformed_document_falls_back_to_default() {
        let addr = AddressDoc::from_document("x", &json!({"street": 5}));
        assert_eq!(addr, AddressDoc::default());
    }
}
