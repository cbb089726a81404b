/// Resource lines tracked by the arbitrage scan.
pub const RESOURCE_TYPES: [&str; 8] = [
    "PLANKS",
    "ORE",
    "FIBER",
    "HIDE",
    "CLOTH",
    "LEATHER",
    "STONEBLOCK",
    "METALBAR",
];

/// Inclusive tier range for tracked resources.
pub const TIER_MIN: u8 = 4;
pub const TIER_MAX: u8 = 8;

/// Inclusive enchantment range (0 = unenchanted).
pub const ENCHANT_MIN: u8 = 0;
pub const ENCHANT_MAX: u8 = 4;

/// Royal cities plus the two special markets. "Black Market" only buys.
pub const CITIES: [&str; 8] = [
    "Thetford",
    "Martlock",
    "Bridgewatch",
    "Lymhurst",
    "Fort Sterling",
    "Caerleon",
    "Black Market",
    "Brecilien",
];

pub const BLACK_MARKET: &str = "Black Market";

pub const BASE_URL: &str = "https://www.albion-online-data.com/api/v2/stats/prices/";

/// Published albion-online-data.com request ceilings.
pub const RATE_LIMIT_PER_MINUTE: usize = 180;
pub const RATE_LIMIT_PER_5_MINUTES: usize = 300;

pub const MAX_URL_LENGTH: usize = 4096;

/// Preferred number of item ids per request, independent of URL length.
pub const BATCH_SIZE: usize = 50;

/// Static item catalog dumped from the game client data.
pub const CATALOG_PATH: &str = "items.json";

fn tiered(stem: &str) -> Vec<String> {
    (TIER_MIN..=TIER_MAX).map(|t| format!("T{}_{}", t, stem)).collect()
}

pub fn rune_items() -> Vec<String> {
    tiered("RUNE")
}

pub fn soul_items() -> Vec<String> {
    tiered("SOUL")
}

pub fn relic_items() -> Vec<String> {
    tiered("RELIC")
}

pub fn avalonian_items() -> Vec<String> {
    tiered("SHARD_AVALONIAN")
}

/// Every artifact-foundry material in one list, runes first.
pub fn artifact_items() -> Vec<String> {
    let mut items = rune_items();
    items.extend(soul_items());
    items.extend(relic_items());
    items.extend(avalonian_items());
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_list_covers_all_four_lines() {
        let items = artifact_items();
        assert_eq!(items.len(), 4 * (TIER_MAX - TIER_MIN + 1) as usize);
        assert!(items.contains(&"T4_RUNE".to_string()));
        assert!(items.contains(&"T8_SHARD_AVALONIAN".to_string()));
    }
}
