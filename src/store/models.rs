use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use sqlx::Type;

use crate::adapters::marketplace::FulfillmentStock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "sync_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Running,
    Completed,
    Failed,
}

/// Optional physical dimensions, attached at entry or variation
/// granularity. Absence means unknown, never zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dimensions {
    pub height: Option<Decimal>,
    pub width: Option<Decimal>,
    pub length: Option<Decimal>,
    pub weight: Option<Decimal>,
}

impl Dimensions {
    pub fn is_empty(&self) -> bool {
        self.height.is_none() && self.width.is_none() && self.length.is_none() && self.weight.is_none()
    }
}

/// Catalog entry ready for persistence, keyed by (item_id, variation).
#[derive(Debug, Clone)]
pub struct NewCatalogItem {
    pub item_id: String,
    pub variation_id: Option<i64>,
    pub inventory_id: Option<String>,
    pub title: Option<String>,
    pub sku: Option<String>,
    pub thumbnail_url: Option<String>,
    pub is_full: bool,
    pub dimensions: Dimensions,
}

/// Normalized per-location stock, ready for upsert. The two derived
/// quantities are summed from the not-available detail list by state.
#[derive(Debug, Clone)]
pub struct StockSnapshot {
    pub inventory_id: String,
    pub available_quantity: Option<i64>,
    pub total_quantity: Option<i64>,
    pub not_available_quantity: Option<i64>,
    pub transfer_quantity: i64,
    pub inbound_quantity: i64,
    pub not_available_detail: serde_json::Value,
    pub external_references: serde_json::Value,
}

impl StockSnapshot {
    /// Normalize a raw fulfillment-stock payload: inter-warehouse transfer
    /// states fold into `transfer_quantity`, the inbound state into
    /// `inbound_quantity`.
    pub fn from_payload(inventory_id: &str, payload: FulfillmentStock) -> Self {
        let mut transfer_quantity = 0;
        let mut inbound_quantity = 0;
        for detail in &payload.not_available_detail {
            let quantity = detail.quantity.unwrap_or(0);
            match detail.state.as_deref() {
                Some("in_transfer") | Some("transfer_in_progress") => {
                    transfer_quantity += quantity;
                }
                Some("inbound") => inbound_quantity += quantity,
                _ => {}
            }
        }

        Self {
            inventory_id: inventory_id.to_string(),
            available_quantity: payload.available_quantity,
            total_quantity: payload.total,
            not_available_quantity: payload.not_available_quantity,
            transfer_quantity,
            inbound_quantity,
            not_available_detail: serde_json::to_value(&payload.not_available_detail)
                .unwrap_or(serde_json::Value::Null),
            external_references: serde_json::Value::Array(payload.external_references),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: i64,
    pub order_status: Option<String>,
    pub date_created: Option<DateTime<Utc>>,
    pub date_closed: Option<DateTime<Utc>>,
    pub shipping_id: Option<i64>,
    pub is_full: bool,
    pub total_amount: Option<Decimal>,
    pub currency_id: Option<String>,
    pub buyer_id: Option<i64>,
    pub seller_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub order_id: i64,
    pub item_id: String,
    pub variation_id: Option<i64>,
    pub inventory_id: Option<String>,
    pub title: Option<String>,
    pub sku: Option<String>,
    pub quantity: i64,
    pub unit_price: Decimal,
    /// Recomputed as quantity × unit_price; the server-reported order
    /// total is never trusted.
    pub total_price: Decimal,
    pub currency_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewSalesSummary {
    pub item_id: String,
    pub variation_id: Option<i64>,
    pub inventory_id: Option<String>,
    pub units: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SyncCounters {
    pub orders_processed: i64,
    pub lines_processed: i64,
    pub full_orders_found: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SyncRunRow {
    pub id: i64,
    pub sync_kind: String,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub orders_processed: i64,
    pub lines_processed: i64,
    pub full_orders_found: i64,
    pub status: SyncStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// One row of the reconciliation join: catalog rollup per location with
/// stock, trailing-window sales and the optional WMS figure.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReportRow {
    pub inventory_id: String,
    pub sku: Option<String>,
    pub title: Option<String>,
    pub listing_count: i64,
    pub available_quantity: Option<i64>,
    pub total_quantity: Option<i64>,
    pub not_available_quantity: Option<i64>,
    pub transfer_quantity: Option<i64>,
    pub inbound_quantity: Option<i64>,
    pub units: Option<i64>,
    pub revenue: Option<Decimal>,
    pub height: Option<Decimal>,
    pub width: Option<Decimal>,
    pub length: Option<Decimal>,
    pub weight: Option<Decimal>,
    pub wms_available: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct StoreStats {
    pub items: i64,
    pub stocks: i64,
    pub summaries: i64,
    pub full_orders: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::marketplace::NotAvailableDetail;

    fn detail(state: &str, quantity: i64) -> NotAvailableDetail {
        NotAvailableDetail {
            state: Some(state.to_string()),
            quantity: Some(quantity),
        }
    }

    #[test]
    fn transfer_and_inbound_quantities_are_summed_by_state() {
        let payload = FulfillmentStock {
            available_quantity: Some(10),
            total: Some(20),
            not_available_quantity: Some(10),
            not_available_detail: vec![
                detail("in_transfer", 3),
                detail("transfer_in_progress", 2),
                detail("inbound", 4),
                detail("damaged", 1),
            ],
            external_references: vec![],
        };
        let snapshot = StockSnapshot::from_payload("INV1", payload);
        assert_eq!(snapshot.transfer_quantity, 5);
        assert_eq!(snapshot.inbound_quantity, 4);
        assert_eq!(snapshot.available_quantity, Some(10));
    }

    #[test]
    fn missing_detail_quantities_count_as_zero() {
        let payload = FulfillmentStock {
            available_quantity: None,
            total: None,
            not_available_quantity: None,
            not_available_detail: vec![NotAvailableDetail {
                state: Some("inbound".to_string()),
                quantity: None,
            }],
            external_references: vec![],
        };
        let snapshot = StockSnapshot::from_payload("INV2", payload);
        assert_eq!(snapshot.inbound_quantity, 0);
        assert_eq!(snapshot.transfer_quantity, 0);
    }
}
