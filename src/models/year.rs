//! Year archives: which years hold data for an address.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct YearRecord {
    pub id: String,
    pub year: i32,
}

impl YearRecord {
    /// Year record for a year id such as `"2024"`; `None` when the id is not numeric.
    pub fn from_id(id: &str) -> Option<Self> {
        id.trim().parse().ok().map(|year| Self {
            id: id.to_string(),
            year,
        })
    }
}

/// Year ids, most recent first. Ids are compared as strings, matching how they are keyed.
pub fn sorted_year_ids(years: &[YearRecord]) -> Vec<String> {
    let mut ids: Vec<String> = years.iter().map(|y| y.id.clone()).collect();
    ids.sort_by(|a, b| b.cmp(a));
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_id_parses_numeric_years() {
        assert_eq!(
            YearRecord::from_id("2024"),
            Some(YearRecord {
                id: "2024".to_string(),
                year: 2024
            })
        );
        assert_eq!(YearRecord::from_id("last"), None);
    }

    #[test]
    fn year_ids_sort_descending() {
        let years = vec![
            YearRecord::from_id("2022").unwrap(),
            YearRecord::from_id("2024").unwrap(),
            YearRecord::from_id("2023").unwrap(),
        ];
        assert_eq!(sorted_year_ids(&years), vec!["2024", "2023", "2022"]);
    }
}
