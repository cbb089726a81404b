use std::fs;
use std::path::Path;

use crate::error::{MarketError, Result};
use crate::model::ItemCatalogEntry;

/// Builds the market API identifier for a refined resource.
/// Enchanted goods carry both the LEVEL suffix and the @ enchantment marker.
pub fn item_id(resource: &str, tier: u8, enchantment: u8) -> String {
    if enchantment == 0 {
        format!("T{}_{}", tier, resource)
    } else {
        format!("T{}_{}_LEVEL{}@{}", tier, resource, enchantment, enchantment)
    }
}

/// Loads the static item catalog. A missing or corrupt file aborts the
/// calling scan before any network traffic happens.
pub fn load_catalog(path: &str) -> Result<Vec<ItemCatalogEntry>> {
    let data = fs::read_to_string(Path::new(path)).map_err(|e| MarketError::CatalogUnavailable {
        path: path.to_string(),
        reason: e.to_string(),
    })?;

    serde_json::from_str(&data).map_err(|e| MarketError::CatalogUnavailable {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_item_id_has_no_enchant_suffix() {
        assert_eq!(item_id("PLANKS", 4, 0), "T4_PLANKS");
        assert_eq!(item_id("METALBAR", 8, 0), "T8_METALBAR");
    }

    #[test]
    fn enchanted_item_id_carries_level_and_marker() {
        assert_eq!(item_id("ORE", 5, 2), "T5_ORE_LEVEL2@2");
        assert_eq!(item_id("FIBER", 6, 4), "T6_FIBER_LEVEL4@4");
    }

    #[test]
    fn loads_catalog_from_disk() {
        let path = std::env::temp_dir().join("albion_catalog_ok.json");
        fs::write(
            &path,
            r#"[{"UniqueName": "T4_RUNE", "Index": "1047",
                "LocalizedNames": {"EN-US": "Adept's Rune"}},
               {"UniqueName": "T5_RUNE", "Index": "1048"}]"#,
        )
        .unwrap();

        let entries = load_catalog(path.to_str().unwrap()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].unique_name, "T4_RUNE");
        assert_eq!(entries[0].display_name(), "Adept's Rune");

        let _ = fs::remove_file(path);
    }

    #[test]
    fn missing_catalog_is_an_explicit_error() {
        let err = load_catalog("/definitely/not/here/items.json").unwrap_err();
        match err {
            MarketError::CatalogUnavailable { path, .. } => {
                assert!(path.contains("items.json"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
