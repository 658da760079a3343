//! Pure helpers over resolved catalog entries: warehouse-location link
//! extraction, physical-dimension parsing and the (item, variation) →
//! location map used for sales attribution.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::adapters::marketplace::{Attribute, ItemDetail};
use crate::store::models::{Dimensions, NewCatalogItem};

/// One (warehouse-location, variation) link emitted by an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InventoryLink {
    pub inventory_id: Option<String>,
    pub variation_id: Option<i64>,
}

/// Emit the location links of one entry: one per variation (falling back
/// to the entry-level reference), or a single entry-level link when there
/// are no variations. Duplicates by (location, variation) are removed.
pub fn extract_inventory_links(item: &ItemDetail) -> Vec<InventoryLink> {
    let mut links = Vec::new();
    if item.variations.is_empty() {
        links.push(InventoryLink {
            inventory_id: item.inventory_id.clone(),
            variation_id: None,
        });
    } else {
        for variation in &item.variations {
            links.push(InventoryLink {
                inventory_id: variation
                    .inventory_id
                    .clone()
                    .or_else(|| item.inventory_id.clone()),
                variation_id: Some(variation.id),
            });
        }
    }

    let mut seen = HashSet::new();
    links.retain(|link| seen.insert(link.clone()));
    links
}

/// Map (item, variation-or-none) to its location reference for every
/// resolved entry; used to attribute order lines to warehouse stock.
pub fn build_inventory_map(
    items: &[ItemDetail],
) -> HashMap<(String, Option<i64>), Option<String>> {
    let mut map = HashMap::new();
    for item in items {
        if item.variations.is_empty() {
            map.insert((item.id.clone(), None), item.inventory_id.clone());
        } else {
            for variation in &item.variations {
                map.insert(
                    (item.id.clone(), Some(variation.id)),
                    variation
                        .inventory_id
                        .clone()
                        .or_else(|| item.inventory_id.clone()),
                );
            }
        }
    }
    map
}

/// Scan an attribute list for the four recognized dimension keys.
/// Unrecognized or unparsable values stay absent rather than defaulting.
pub fn extract_package_dimensions(attributes: &[Attribute]) -> Dimensions {
    let mut dims = Dimensions::default();
    for attr in attributes {
        let Some(value) = attr.value() else { continue };
        match attr.id.as_str() {
            "PACKAGE_HEIGHT" => dims.height = parse_dimension(value),
            "PACKAGE_WIDTH" => dims.width = parse_dimension(value),
            "PACKAGE_LENGTH" => dims.length = parse_dimension(value),
            "PACKAGE_WEIGHT" => dims.weight = parse_dimension(value),
            _ => {}
        }
    }
    dims
}

/// Dimensions for a specific link: entry-level attributes first, falling
/// back to the variation's own attributes when the entry has none.
pub fn dimensions_for_link(item: &ItemDetail, variation_id: Option<i64>) -> Dimensions {
    let dims = extract_package_dimensions(&item.attributes);
    if !dims.is_empty() {
        return dims;
    }
    if let Some(var_id) = variation_id {
        if let Some(variation) = item.variations.iter().find(|v| v.id == var_id) {
            return extract_package_dimensions(&variation.attributes);
        }
    }
    dims
}

/// Values carry a unit suffix and a locale-specific decimal separator,
/// e.g. "25,5 cm" or "1,2 kg".
fn parse_dimension(raw: &str) -> Option<Decimal> {
    let normalized = raw
        .replace(" cm", "")
        .replace(" kg", "")
        .replace(" g", "")
        .replace(',', ".");
    Decimal::from_str(normalized.trim()).ok()
}

/// Build the persistable record for one (entry, link) pair.
pub fn catalog_item_for_link(
    item: &ItemDetail,
    inventory_id: Option<&str>,
    variation_id: Option<i64>,
) -> NewCatalogItem {
    NewCatalogItem {
        item_id: item.id.clone(),
        variation_id,
        inventory_id: inventory_id.map(str::to_string),
        title: item.title.clone(),
        sku: item.seller_custom_field.clone(),
        thumbnail_url: item.thumbnail(),
        is_full: item.is_fulfillment(),
        dimensions: dimensions_for_link(item, variation_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item_json(value: serde_json::Value) -> ItemDetail {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn variations_emit_one_link_each_with_entry_fallback() {
        let item = item_json(serde_json::json!({
            "id": "MLB1",
            "inventory_id": "BASE",
            "variations": [
                { "id": 11, "inventory_id": "VAR_A" },
                { "id": 12 }
            ]
        }));
        let links = extract_inventory_links(&item);
        assert_eq!(
            links,
            vec![
                InventoryLink {
                    inventory_id: Some("VAR_A".into()),
                    variation_id: Some(11)
                },
                InventoryLink {
                    inventory_id: Some("BASE".into()),
                    variation_id: Some(12)
                },
            ]
        );
    }

    #[test]
    fn shared_location_keeps_distinct_variation_links() {
        // Two variations on the same location are two links, not one.
        let item = item_json(serde_json::json!({
            "id": "MLB2",
            "variations": [
                { "id": 21, "inventory_id": "SHARED" },
                { "id": 22, "inventory_id": "SHARED" }
            ]
        }));
        assert_eq!(extract_inventory_links(&item).len(), 2);
    }

    #[test]
    fn duplicate_location_variation_pairs_are_removed() {
        let item = item_json(serde_json::json!({
            "id": "MLB3",
            "variations": [
                { "id": 31, "inventory_id": "X" },
                { "id": 31, "inventory_id": "X" }
            ]
        }));
        assert_eq!(extract_inventory_links(&item).len(), 1);
    }

    #[test]
    fn entry_without_variations_emits_single_possibly_absent_link() {
        let item = item_json(serde_json::json!({ "id": "MLB4" }));
        let links = extract_inventory_links(&item);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].inventory_id, None);
        assert_eq!(links[0].variation_id, None);
    }

    #[test]
    fn dimension_values_normalize_suffix_and_decimal_separator() {
        let item = item_json(serde_json::json!({
            "id": "MLB5",
            "attributes": [
                { "id": "PACKAGE_HEIGHT", "value_name": "25,5 cm" },
                { "id": "PACKAGE_WIDTH", "value_name": "10 cm" },
                { "id": "PACKAGE_LENGTH", "value_name": "N/A" },
                { "id": "PACKAGE_WEIGHT", "value_name": "1,2 kg" },
                { "id": "BRAND", "value_name": "Acme" }
            ]
        }));
        let dims = extract_package_dimensions(&item.attributes);
        assert_eq!(dims.height, Some(dec!(25.5)));
        assert_eq!(dims.width, Some(dec!(10)));
        assert_eq!(dims.length, None);
        assert_eq!(dims.weight, Some(dec!(1.2)));
    }

    #[test]
    fn variation_attributes_back_fill_missing_entry_dimensions() {
        let item = item_json(serde_json::json!({
            "id": "MLB6",
            "variations": [{
                "id": 61,
                "attributes": [
                    { "id": "PACKAGE_HEIGHT", "value_name": "5 cm" }
                ]
            }]
        }));
        let dims = dimensions_for_link(&item, Some(61));
        assert_eq!(dims.height, Some(dec!(5)));
        // No variation selected: entry-level (empty) wins.
        assert!(dimensions_for_link(&item, None).is_empty());
    }

    #[test]
    fn inventory_map_covers_variations_and_plain_entries() {
        let items = vec![
            item_json(serde_json::json!({
                "id": "A",
                "inventory_id": "BASE",
                "variations": [{ "id": 1, "inventory_id": "V1" }, { "id": 2 }]
            })),
            item_json(serde_json::json!({ "id": "B", "inventory_id": "INV_B" })),
        ];
        let map = build_inventory_map(&items);
        assert_eq!(map[&("A".to_string(), Some(1))], Some("V1".to_string()));
        assert_eq!(map[&("A".to_string(), Some(2))], Some("BASE".to_string()));
        assert_eq!(map[&("B".to_string(), None)], Some("INV_B".to_string()));
    }
}
