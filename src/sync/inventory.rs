//! Inventory phase: catalog scan → detail resolution → link extraction →
//! per-location stock resolution → idempotent persistence.

use std::collections::HashSet;

use serde::Serialize;
use tracing::info;

use super::catalog::{catalog_item_for_link, extract_inventory_links};
use super::progress::{ObserverTarget, SyncPhase, SyncProgress};
use super::scan::scan_catalog_ids;
use crate::adapters::marketplace::{ItemDetail, MarketplaceApi};
use crate::config::SyncTuning;
use crate::error::AppResult;
use crate::executor::{run_batches, BatchConfig, BatchObserver, BatchOutcome};
use crate::store::models::StockSnapshot;
use crate::store::repository::InventoryRepository;

/// How the detail resolver hits the catalog source: one call per entry
/// with the full attribute set, or batched identifier lists with a
/// projected attribute subset.
#[derive(Debug, Clone, Copy)]
pub enum DetailMode {
    Full,
    Bulk(usize),
}

impl DetailMode {
    pub fn for_group_size(group_size: usize) -> Self {
        match group_size {
            0 | 1 => Self::Full,
            n => Self::Bulk(n),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InventorySyncReport {
    pub items_processed: usize,
    pub items_saved: usize,
    pub stocks_saved: usize,
    pub stock_changes: usize,
    pub missing_inventory: usize,
    pub unique_inventories: usize,
    pub item_groups_requested: usize,
    pub item_groups_resolved: usize,
    pub stock_groups_requested: usize,
    pub stock_groups_resolved: usize,
}

/// Resolve catalog identifiers to full records. Units that fail both
/// executor passes are simply absent from the output; the outcome counts
/// make the degradation observable.
pub(crate) async fn resolve_item_details(
    api: &dyn MarketplaceApi,
    ids: Vec<String>,
    mode: DetailMode,
    workers: usize,
    observer: &dyn BatchObserver,
) -> BatchOutcome<ItemDetail> {
    match mode {
        DetailMode::Full => {
            let cfg = BatchConfig::singleton(workers);
            run_batches(ids, &cfg, observer, |group| async move {
                let mut out = Vec::new();
                for id in &group {
                    if let Some(item) = api.item_detail(id).await? {
                        out.push(item);
                    }
                }
                Ok(out)
            })
            .await
        }
        DetailMode::Bulk(group_size) => {
            let cfg = BatchConfig::bulk(group_size, workers);
            run_batches(ids, &cfg, observer, |group| async move {
                api.items_bulk(&group).await
            })
            .await
        }
    }
}

/// Fetch per-location fulfillment stock. This endpoint is not
/// bulk-batchable, so groups are singletons; a location that fails both
/// passes is missing from the result, which callers must read as
/// "unknown", never as "zero stock".
pub(crate) async fn resolve_stock_snapshots(
    api: &dyn MarketplaceApi,
    inventory_ids: Vec<String>,
    workers: usize,
    observer: &dyn BatchObserver,
) -> BatchOutcome<StockSnapshot> {
    let cfg = BatchConfig::singleton(workers).with_attempts(4);
    run_batches(inventory_ids, &cfg, observer, |group| async move {
        let mut out = Vec::new();
        for inventory_id in &group {
            let payload = api.fulfillment_stock(inventory_id).await?;
            out.push(StockSnapshot::from_payload(inventory_id, payload));
        }
        Ok(out)
    })
    .await
}

pub async fn run_inventory_sync(
    api: &dyn MarketplaceApi,
    repo: &InventoryRepository,
    tuning: &SyncTuning,
    progress: &SyncProgress,
    seller_id: &str,
) -> AppResult<InventorySyncReport> {
    progress.set_phase(SyncPhase::ScanIds, "Scanning catalog identifiers...");
    let ids = scan_catalog_ids(api, seller_id, tuning.scan_page_limit, progress).await?;

    progress.set_phase(SyncPhase::ItemDetails, "Resolving entry details...");
    let details = resolve_item_details(
        api,
        ids,
        DetailMode::for_group_size(tuning.item_group_size),
        tuning.item_workers,
        &progress.observer(ObserverTarget::Items),
    )
    .await;

    let full_items: Vec<&ItemDetail> = details
        .results
        .iter()
        .filter(|item| item.is_fulfillment())
        .collect();

    let mut unique_inventories: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut missing_inventory = 0;
    let mut items_saved = 0;

    for item in &full_items {
        for link in extract_inventory_links(item) {
            match link.inventory_id {
                None => missing_inventory += 1,
                Some(inventory_id) => {
                    repo.upsert_item(&catalog_item_for_link(
                        item,
                        Some(&inventory_id),
                        link.variation_id,
                    ))
                    .await?;
                    items_saved += 1;
                    if seen.insert(inventory_id.clone()) {
                        unique_inventories.push(inventory_id);
                    }
                }
            }
        }
    }

    progress.update(|s| {
        s.phase = SyncPhase::FullStock;
        s.full_count = full_items.len();
        s.full_missing_inventory = missing_inventory;
        s.last_message = "Fetching per-location fulfillment stock...".to_string();
    });

    let unique_count = unique_inventories.len();
    let stocks = resolve_stock_snapshots(
        api,
        unique_inventories,
        tuning.stock_workers,
        &progress.observer(ObserverTarget::Stock),
    )
    .await;

    let mut stocks_saved = 0;
    let mut stock_changes = 0;
    for snapshot in &stocks.results {
        if repo.upsert_stock(snapshot).await? {
            stock_changes += 1;
        }
        stocks_saved += 1;
    }

    let report = InventorySyncReport {
        items_processed: full_items.len(),
        items_saved,
        stocks_saved,
        stock_changes,
        missing_inventory,
        unique_inventories: unique_count,
        item_groups_requested: details.requested_groups,
        item_groups_resolved: details.resolved_groups,
        stock_groups_requested: stocks.requested_groups,
        stock_groups_resolved: stocks.resolved_groups,
    };

    progress.set_phase(
        SyncPhase::InventoryDone,
        format!(
            "Inventory: {} entries saved, {} stock records",
            report.items_saved, report.stocks_saved
        ),
    );
    info!(
        "Inventory sync done: {}/{} detail groups, {}/{} stock groups",
        report.item_groups_resolved,
        report.item_groups_requested,
        report.stock_groups_resolved,
        report.stock_groups_requested
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::NullObserver;
    use crate::sync::testing::MockApi;

    #[tokio::test]
    async fn unresolved_items_are_dropped_with_visible_counts() {
        let api = MockApi::default();
        api.add_item(serde_json::json!({ "id": "A" }));
        api.add_item(serde_json::json!({ "id": "B" }));
        api.fail_item("C");

        let outcome = resolve_item_details(
            &api,
            vec!["A".into(), "B".into(), "C".into()],
            DetailMode::Full,
            4,
            &NullObserver,
        )
        .await;

        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.requested_groups, 3);
        assert_eq!(outcome.resolved_groups, 2);
        assert!(!outcome.is_complete());
    }

    #[tokio::test]
    async fn bulk_mode_partitions_identifier_lists() {
        let api = MockApi::default();
        for i in 0..45 {
            api.add_item(serde_json::json!({ "id": format!("I{}", i) }));
        }
        let ids: Vec<String> = (0..45).map(|i| format!("I{}", i)).collect();
        let outcome =
            resolve_item_details(&api, ids, DetailMode::Bulk(20), 4, &NullObserver).await;
        assert_eq!(outcome.requested_groups, 3);
        assert_eq!(outcome.results.len(), 45);
    }

    #[tokio::test]
    async fn failed_stock_lookup_is_absent_not_zero() {
        let api = MockApi::default();
        api.add_stock(
            "INV1",
            serde_json::json!({
                "available_quantity": 7,
                "total": 9,
                "not_available_quantity": 2,
                "not_available_detail": [
                    { "state": "inbound", "quantity": 2 }
                ]
            }),
        );
        // INV2 has no payload registered: every lookup fails.

        let outcome = resolve_stock_snapshots(
            &api,
            vec!["INV1".into(), "INV2".into()],
            4,
            &NullObserver,
        )
        .await;

        assert_eq!(outcome.results.len(), 1);
        let snapshot = &outcome.results[0];
        assert_eq!(snapshot.inventory_id, "INV1");
        assert_eq!(snapshot.available_quantity, Some(7));
        assert_eq!(snapshot.inbound_quantity, 2);
        assert_eq!(outcome.resolved_groups, 1);
        assert_eq!(outcome.requested_groups, 2);
    }
}
