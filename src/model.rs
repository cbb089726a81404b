use serde::{Serialize, Deserialize};
use std::collections::HashMap;

/// Timestamp the price API reports for fields that were never observed.
pub const NEVER_RECORDED: &str = "0001-01-01T00:00:00";

/// One row of the price API response: the current order-book extremes for an
/// item in one city at one quality level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRecord {
    pub item_id: String,
    pub city: String,
    #[serde(default)]
    pub quality: u8,
    pub sell_price_min: u64,
    pub sell_price_min_date: String,
    pub sell_price_max: u64,
    pub sell_price_max_date: String,
    pub buy_price_min: u64,
    pub buy_price_min_date: String,
    pub buy_price_max: u64,
    pub buy_price_max_date: String,
}

impl PriceRecord {
    fn dates(&self) -> [&str; 4] {
        [
            &self.sell_price_min_date,
            &self.sell_price_max_date,
            &self.buy_price_min_date,
            &self.buy_price_max_date,
        ]
    }
}

/// How tolerant a fetch is of rows the API has only partially observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFilter {
    /// Drop a row if any tracked date is the never-recorded sentinel.
    Strict,
    /// Keep a row as long as at least one tracked date is real.
    Lenient,
}

impl DateFilter {
    pub fn retains(&self, record: &PriceRecord) -> bool {
        match self {
            DateFilter::Strict => record.dates().iter().all(|d| *d != NEVER_RECORDED),
            DateFilter::Lenient => record.dates().iter().any(|d| *d != NEVER_RECORDED),
        }
    }
}

/// A profitable buy-low/sell-high pairing for one item across two cities.
/// `profit` is strictly positive by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub item_id: String,
    pub buy_city: String,
    pub buy_price: u64,
    pub buy_price_date: String,
    pub sell_city: String,
    pub sell_price: u64,
    pub sell_price_date: String,
    pub profit: u64,
}

/// Entry in the static item catalog (`items.json`), as dumped upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemCatalogEntry {
    #[serde(rename = "UniqueName")]
    pub unique_name: String,
    #[serde(rename = "Index")]
    pub index: String,
    #[serde(rename = "LocalizedNames", default)]
    pub localized_names: Option<HashMap<String, String>>,
}

impl ItemCatalogEntry {
    pub fn display_name(&self) -> &str {
        self.localized_names
            .as_ref()
            .and_then(|names| names.get("EN-US"))
            .map(|s| s.as_str())
            .unwrap_or(&self.unique_name)
    }
}

#[cfg(test)]
pub fn test_record(city: &str, sell_min: u64) -> PriceRecord {
    PriceRecord {
        item_id: "T4_PLANKS".into(),
        city: city.into(),
        quality: 1,
        sell_price_min: sell_min,
        sell_price_min_date: "2024-06-01T12:00:00".into(),
        sell_price_max: sell_min,
        sell_price_max_date: "2024-06-01T12:00:00".into(),
        buy_price_min: 0,
        buy_price_min_date: "2024-06-01T12:00:00".into(),
        buy_price_max: 0,
        buy_price_max_date: "2024-06-01T12:00:00".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_filter_drops_any_sentinel() {
        let mut r = test_record("Thetford", 100);
        assert!(DateFilter::Strict.retains(&r));
        r.buy_price_max_date = NEVER_RECORDED.into();
        assert!(!DateFilter::Strict.retains(&r));
    }

    #[test]
    fn lenient_filter_needs_one_real_date() {
        let mut r = test_record("Thetford", 100);
        r.sell_price_min_date = NEVER_RECORDED.into();
        r.sell_price_max_date = NEVER_RECORDED.into();
        r.buy_price_min_date = NEVER_RECORDED.into();
        assert!(DateFilter::Lenient.retains(&r));
        r.buy_price_max_date = NEVER_RECORDED.into();
        assert!(!DateFilter::Lenient.retains(&r));
    }

    #[test]
    fn display_name_falls_back_to_unique_name() {
        let entry: ItemCatalogEntry = serde_json::from_str(
            r#"{"UniqueName": "T4_RUNE", "Index": "1047"}"#,
        )
        .unwrap();
        assert_eq!(entry.display_name(), "T4_RUNE");

        let entry: ItemCatalogEntry = serde_json::from_str(
            r#"{"UniqueName": "T4_RUNE", "Index": "1047",
                "LocalizedNames": {"EN-US": "Adept's Rune"}}"#,
        )
        .unwrap();
        assert_eq!(entry.display_name(), "Adept's Rune");
    }
}
