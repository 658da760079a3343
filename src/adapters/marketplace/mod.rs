//! Minimal typed contract against the marketplace API.
//!
//! Raw payloads are parsed once, here, into records with optional fields
//! made explicit; the pipeline never touches loose JSON. The trait is the
//! seam the sync engine depends on, so tests drive it with an in-memory
//! implementation.

pub mod client;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::MarketResult;

/// One page of the catalog scan. The cursor is opaque and must be carried
/// into the next request whenever present.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanPage {
    #[serde(default)]
    pub results: Vec<String>,
    pub scroll_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Picture {
    pub secure_url: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Attribute {
    pub id: String,
    pub value_name: Option<String>,
    pub value_id: Option<String>,
}

impl Attribute {
    /// Display value, falling back to the raw value identifier.
    pub fn value(&self) -> Option<&str> {
        self.value_name.as_deref().or(self.value_id.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Variation {
    pub id: i64,
    pub inventory_id: Option<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShippingInfo {
    pub logistic_type: Option<String>,
}

/// A fully or partially resolved catalog entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemDetail {
    pub id: String,
    pub title: Option<String>,
    pub seller_custom_field: Option<String>,
    pub inventory_id: Option<String>,
    #[serde(default)]
    pub pictures: Vec<Picture>,
    #[serde(default)]
    pub variations: Vec<Variation>,
    pub shipping: Option<ShippingInfo>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl ItemDetail {
    /// Entries are fulfillment-handled when shipped from the remote
    /// warehouse rather than by the seller.
    pub fn is_fulfillment(&self) -> bool {
        self.shipping
            .as_ref()
            .and_then(|s| s.logistic_type.as_deref())
            == Some("fulfillment")
    }

    pub fn thumbnail(&self) -> Option<String> {
        let first = self.pictures.first()?;
        first.secure_url.clone().or_else(|| first.url.clone())
    }
}

/// Bulk item responses wrap each body in an envelope; empty bodies are
/// skipped by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkItemEnvelope {
    pub body: Option<ItemDetail>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotAvailableDetail {
    pub state: Option<String>,
    pub quantity: Option<i64>,
}

/// Per-location fulfillment stock as reported by the warehouse endpoint.
/// `external_references` is normalized to a list even when the API returns
/// a bare object.
#[derive(Debug, Clone, Deserialize)]
pub struct FulfillmentStock {
    pub available_quantity: Option<i64>,
    pub total: Option<i64>,
    pub not_available_quantity: Option<i64>,
    #[serde(default)]
    pub not_available_detail: Vec<NotAvailableDetail>,
    #[serde(default, deserialize_with = "list_or_single")]
    pub external_references: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderShipping {
    pub id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderBuyer {
    pub id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderLineItem {
    pub id: Option<String>,
    pub variation_id: Option<i64>,
    pub title: Option<String>,
    pub seller_custom_field: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderLine {
    pub item: OrderLineItem,
    pub quantity: Option<i64>,
    pub unit_price: Option<Decimal>,
    pub currency_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Order {
    pub id: i64,
    pub status: Option<String>,
    pub date_created: Option<DateTime<Utc>>,
    pub date_closed: Option<DateTime<Utc>>,
    pub shipping: Option<OrderShipping>,
    pub total_amount: Option<Decimal>,
    pub currency_id: Option<String>,
    pub buyer: Option<OrderBuyer>,
    #[serde(default)]
    pub order_items: Vec<OrderLine>,
}

impl Order {
    pub fn shipping_id(&self) -> Option<i64> {
        self.shipping.as_ref().and_then(|s| s.id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Shipment {
    pub id: Option<i64>,
    pub logistic_type: Option<String>,
}

impl Shipment {
    pub fn is_fulfillment(&self) -> bool {
        self.logistic_type.as_deref() == Some("fulfillment")
    }
}

/// Trailing-window order query.
#[derive(Debug, Clone)]
pub struct OrderQuery {
    pub seller_id: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub status: Option<String>,
}

#[async_trait]
pub trait MarketplaceApi: Send + Sync {
    /// One page of the catalog identifier scan.
    async fn scan_page(
        &self,
        seller_id: &str,
        limit: u32,
        scroll_id: Option<&str>,
    ) -> MarketResult<ScanPage>;

    /// Singleton detail fetch with the full attribute set.
    async fn item_detail(&self, item_id: &str) -> MarketResult<Option<ItemDetail>>;

    /// Bulk fetch with a projected attribute list; empty bodies are skipped.
    async fn items_bulk(&self, item_ids: &[String]) -> MarketResult<Vec<ItemDetail>>;

    /// Per-location fulfillment stock. Not bulk-batchable upstream.
    async fn fulfillment_stock(&self, inventory_id: &str) -> MarketResult<FulfillmentStock>;

    /// One offset/limit page of the order search, descending by creation
    /// date.
    async fn orders_page(
        &self,
        query: &OrderQuery,
        offset: u32,
        limit: u32,
    ) -> MarketResult<Vec<Order>>;

    async fn shipment(&self, shipment_id: i64) -> MarketResult<Shipment>;
}

/// Accepts either a JSON array or a bare object, normalizing to a list.
fn list_or_single<'de, D>(deserializer: D) -> Result<Vec<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Null => Vec::new(),
        other => vec![other],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_references_object_is_wrapped_into_list() {
        let stock: FulfillmentStock = serde_json::from_value(serde_json::json!({
            "available_quantity": 4,
            "total": 6,
            "not_available_quantity": 2,
            "external_references": { "type": "item", "id": "MLB1" }
        }))
        .unwrap();
        assert_eq!(stock.external_references.len(), 1);
    }

    #[test]
    fn external_references_list_and_absence_pass_through() {
        let stock: FulfillmentStock = serde_json::from_value(serde_json::json!({
            "external_references": [{ "id": "a" }, { "id": "b" }]
        }))
        .unwrap();
        assert_eq!(stock.external_references.len(), 2);

        let stock: FulfillmentStock = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(stock.external_references.is_empty());
        assert_eq!(stock.available_quantity, None);
    }

    #[test]
    fn bulk_envelopes_without_a_body_are_skipped() {
        let envelopes: Vec<BulkItemEnvelope> = serde_json::from_value(serde_json::json!([
            { "code": 200, "body": { "id": "MLB1", "title": "Widget" } },
            { "code": 404, "body": null },
            { "code": 200 },
            { "code": 200, "body": { "id": "MLB2" } }
        ]))
        .unwrap();

        let items: Vec<ItemDetail> = envelopes.into_iter().filter_map(|e| e.body).collect();
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["MLB1", "MLB2"]);
    }

    #[test]
    fn fulfillment_flag_requires_exact_logistic_type() {
        let item: ItemDetail = serde_json::from_value(serde_json::json!({
            "id": "MLB1",
            "shipping": { "logistic_type": "fulfillment" }
        }))
        .unwrap();
        assert!(item.is_fulfillment());

        let item: ItemDetail = serde_json::from_value(serde_json::json!({
            "id": "MLB2",
            "shipping": { "logistic_type": "drop_off" }
        }))
        .unwrap();
        assert!(!item.is_fulfillment());

        let item: ItemDetail = serde_json::from_value(serde_json::json!({ "id": "MLB3" })).unwrap();
        assert!(!item.is_fulfillment());
    }
}
