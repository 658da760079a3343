//! In-memory marketplace double for pipeline tests.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::adapters::marketplace::{
    FulfillmentStock, ItemDetail, MarketplaceApi, Order, OrderQuery, ScanPage, Shipment,
};
use crate::error::{MarketError, MarketResult};

#[derive(Default)]
pub struct MockApi {
    scan_pages: Mutex<VecDeque<MarketResult<ScanPage>>>,
    scan_calls: Mutex<u32>,
    last_scroll_id: Mutex<Option<String>>,
    items: Mutex<HashMap<String, ItemDetail>>,
    /// Item ids that fail every detail attempt.
    failing_items: Mutex<Vec<String>>,
    stocks: Mutex<HashMap<String, serde_json::Value>>,
    order_pages: Mutex<VecDeque<MarketResult<Vec<Order>>>>,
    order_calls: Mutex<u32>,
    shipments: Mutex<HashMap<i64, Shipment>>,
}

impl MockApi {
    pub fn push_scan(&self, page: MarketResult<ScanPage>) {
        self.scan_pages.lock().push_back(page);
    }

    pub fn scan_calls(&self) -> u32 {
        *self.scan_calls.lock()
    }

    pub fn last_scroll_id(&self) -> Option<String> {
        self.last_scroll_id.lock().clone()
    }

    pub fn add_item(&self, json: serde_json::Value) {
        let item: ItemDetail = serde_json::from_value(json).unwrap();
        self.items.lock().insert(item.id.clone(), item);
    }

    pub fn fail_item(&self, item_id: &str) {
        self.failing_items.lock().push(item_id.to_string());
    }

    pub fn add_stock(&self, inventory_id: &str, json: serde_json::Value) {
        self.stocks.lock().insert(inventory_id.to_string(), json);
    }

    pub fn push_orders(&self, page: MarketResult<Vec<Order>>) {
        self.order_pages.lock().push_back(page);
    }

    pub fn order_calls(&self) -> u32 {
        *self.order_calls.lock()
    }

    pub fn add_shipment(&self, id: i64, logistic_type: &str) {
        self.shipments.lock().insert(
            id,
            Shipment {
                id: Some(id),
                logistic_type: Some(logistic_type.to_string()),
            },
        );
    }

    fn not_found() -> MarketError {
        MarketError::Status {
            status: 404,
            body: String::new(),
        }
    }
}

#[async_trait]
impl MarketplaceApi for MockApi {
    async fn scan_page(
        &self,
        _seller_id: &str,
        _limit: u32,
        scroll_id: Option<&str>,
    ) -> MarketResult<ScanPage> {
        *self.scan_calls.lock() += 1;
        if let Some(cursor) = scroll_id {
            *self.last_scroll_id.lock() = Some(cursor.to_string());
        }
        self.scan_pages
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(Self::not_found()))
    }

    async fn item_detail(&self, item_id: &str) -> MarketResult<Option<ItemDetail>> {
        if self.failing_items.lock().iter().any(|id| id == item_id) {
            return Err(MarketError::Status {
                status: 500,
                body: String::new(),
            });
        }
        Ok(self.items.lock().get(item_id).cloned())
    }

    async fn items_bulk(&self, item_ids: &[String]) -> MarketResult<Vec<ItemDetail>> {
        let items = self.items.lock();
        Ok(item_ids.iter().filter_map(|id| items.get(id).cloned()).collect())
    }

    async fn fulfillment_stock(&self, inventory_id: &str) -> MarketResult<FulfillmentStock> {
        let stocks = self.stocks.lock();
        let json = stocks.get(inventory_id).ok_or_else(Self::not_found)?;
        serde_json::from_value(json.clone()).map_err(|e| MarketError::Decode(e.to_string()))
    }

    async fn orders_page(
        &self,
        _query: &OrderQuery,
        _offset: u32,
        _limit: u32,
    ) -> MarketResult<Vec<Order>> {
        *self.order_calls.lock() += 1;
        self.order_pages
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn shipment(&self, shipment_id: i64) -> MarketResult<Shipment> {
        self.shipments
            .lock()
            .get(&shipment_id)
            .cloned()
            .ok_or_else(Self::not_found)
    }
}
