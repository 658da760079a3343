//! Sales phase: trailing-window paid orders → shipment qualification →
//! line aggregation into the per-(item, variation) sales summary.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::catalog::{build_inventory_map, catalog_item_for_link, extract_inventory_links};
use super::inventory::{resolve_item_details, DetailMode};
use super::progress::{ObserverTarget, SyncPhase, SyncProgress};
use crate::adapters::marketplace::{MarketplaceApi, Order, OrderQuery};
use crate::config::SyncTuning;
use crate::error::{AppError, AppResult, SyncError};
use crate::executor::{run_batches, BatchConfig};
use crate::store::models::{
    NewOrder, NewOrderLine, NewSalesSummary, SyncCounters,
};
use crate::store::repository::{InventoryRepository, SalesRepository};

#[derive(Debug, Clone, Serialize)]
pub struct SalesSyncReport {
    pub run_id: i64,
    pub counters: SyncCounters,
    pub summaries_saved: usize,
    pub shipment_groups_requested: usize,
    pub shipment_groups_resolved: usize,
}

/// Fetch every paid order in the window with sequential offset pagination.
/// Like the catalog scan, a lost page would skew the aggregates, so a page
/// is retried once and a second failure aborts the phase. An empty page or
/// a short page ends the walk.
pub async fn fetch_window_orders(
    api: &dyn MarketplaceApi,
    query: &OrderQuery,
    page_limit: u32,
    progress: &SyncProgress,
) -> Result<Vec<Order>, SyncError> {
    let mut orders: Vec<Order> = Vec::new();
    let mut offset: u32 = 0;

    loop {
        let result = match api.orders_page(query, offset, page_limit).await {
            Ok(page) => Ok(page),
            Err(first) => {
                debug!("Order page at offset {} failed ({}), retrying once", offset, first);
                sleep(std::time::Duration::from_secs(1)).await;
                api.orders_page(query, offset, page_limit).await
            }
        };

        let page = match result {
            Ok(page) => page,
            Err(source) => return Err(SyncError::OrderSearchAborted { offset, source }),
        };

        let count = page.len();
        orders.extend(page);
        progress.update(|s| {
            s.sales_orders_total = orders.len();
            s.last_message = format!("+{} orders (total {})", count, orders.len());
        });

        if count < page_limit as usize {
            break;
        }
        offset += page_limit;
    }

    info!("Order search finished: {} orders in the window", orders.len());
    Ok(orders)
}

/// Everything the save step needs, precomputed without I/O.
pub struct PreparedSales {
    pub orders: Vec<(NewOrder, Vec<NewOrderLine>)>,
    pub summaries: Vec<NewSalesSummary>,
    pub counters: SyncCounters,
}

/// Qualify, flatten and aggregate the fetched orders. An order qualifies
/// when its shipment resolved to the fulfillment network; everything else
/// is counted but neither persisted nor aggregated. Line revenue is always
/// quantity × unit price; the server-reported order total is ignored.
pub fn prepare_sales(
    orders: &[Order],
    full_shipment_ids: &HashSet<i64>,
    inventory_map: &HashMap<(String, Option<i64>), Option<String>>,
    seller_id: Option<i64>,
) -> PreparedSales {
    let mut prepared_orders = Vec::new();
    let mut totals: BTreeMap<(String, Option<i64>), (i64, Decimal)> = BTreeMap::new();
    let mut counters = SyncCounters::default();

    for order in orders {
        counters.orders_processed += 1;
        let qualifies = order
            .shipping_id()
            .map(|id| full_shipment_ids.contains(&id))
            .unwrap_or(false);
        if !qualifies {
            continue;
        }
        counters.full_orders_found += 1;

        let mut lines = Vec::new();
        for line in &order.order_items {
            let Some(item_id) = line.item.id.clone() else {
                continue;
            };
            let quantity = line.quantity.unwrap_or(0);
            let unit_price = line.unit_price.unwrap_or_default();
            let total_price = Decimal::from(quantity) * unit_price;
            let key = (item_id.clone(), line.item.variation_id);

            let entry = totals.entry(key.clone()).or_insert((0, Decimal::ZERO));
            entry.0 += quantity;
            entry.1 += total_price;

            lines.push(NewOrderLine {
                order_id: order.id,
                item_id,
                variation_id: line.item.variation_id,
                inventory_id: inventory_map.get(&key).cloned().flatten(),
                title: line.item.title.clone(),
                sku: line.item.seller_custom_field.clone(),
                quantity,
                unit_price,
                total_price,
                currency_id: line.currency_id.clone(),
            });
            counters.lines_processed += 1;
        }

        prepared_orders.push((
            NewOrder {
                order_id: order.id,
                order_status: order.status.clone(),
                date_created: order.date_created,
                date_closed: order.date_closed,
                shipping_id: order.shipping_id(),
                is_full: true,
                total_amount: order.total_amount,
                currency_id: order.currency_id.clone(),
                buyer_id: order.buyer.as_ref().and_then(|b| b.id),
                seller_id,
            },
            lines,
        ));
    }

    let summaries = totals
        .into_iter()
        .map(|((item_id, variation_id), (units, revenue))| NewSalesSummary {
            inventory_id: inventory_map
                .get(&(item_id.clone(), variation_id))
                .cloned()
                .flatten(),
            item_id,
            variation_id,
            units,
            revenue,
        })
        .collect();

    PreparedSales {
        orders: prepared_orders,
        summaries,
        counters,
    }
}

pub async fn run_sales_sync(
    api: &dyn MarketplaceApi,
    inventory_repo: &InventoryRepository,
    sales_repo: &SalesRepository,
    tuning: &SyncTuning,
    progress: &SyncProgress,
    seller_id: &str,
) -> AppResult<SalesSyncReport> {
    let period_end = Utc::now();
    let period_start = period_end - Duration::days(tuning.window_days);

    progress.set_phase(SyncPhase::SalesOrders, "Searching paid orders...");
    let query = OrderQuery {
        seller_id: seller_id.to_string(),
        from: period_start,
        to: period_end,
        status: Some("paid".to_string()),
    };
    let orders = fetch_window_orders(api, &query, tuning.order_page_limit, progress).await?;

    progress.set_phase(SyncPhase::SalesShipments, "Qualifying shipments...");
    let mut shipment_ids: Vec<i64> = orders.iter().filter_map(Order::shipping_id).collect();
    shipment_ids.sort_unstable();
    shipment_ids.dedup();

    let shipment_cfg = BatchConfig::singleton(tuning.sales_workers);
    let shipments = run_batches(
        shipment_ids,
        &shipment_cfg,
        &progress.observer(ObserverTarget::Shipments),
        |group| async move {
            let mut out = Vec::new();
            for id in &group {
                out.push(api.shipment(*id).await?);
            }
            Ok(out)
        },
    )
    .await;

    let full_shipment_ids: HashSet<i64> = shipments
        .results
        .iter()
        .filter(|s| s.is_fulfillment())
        .filter_map(|s| s.id)
        .collect();

    progress.set_phase(SyncPhase::SalesItems, "Resolving sold entries...");
    let mut item_ids: Vec<String> = orders
        .iter()
        .flat_map(|o| o.order_items.iter())
        .filter_map(|line| line.item.id.clone())
        .collect();
    item_ids.sort();
    item_ids.dedup();

    let details = resolve_item_details(
        api,
        item_ids,
        DetailMode::Full,
        tuning.sales_workers,
        &progress.observer(ObserverTarget::Items),
    )
    .await;
    let inventory_map = build_inventory_map(&details.results);

    // Sold entries refresh the catalog too, so a sales-only run still
    // keeps titles, SKUs and dimensions current.
    for item in &details.results {
        for link in extract_inventory_links(item) {
            if let Some(inventory_id) = link.inventory_id {
                inventory_repo
                    .upsert_item(&catalog_item_for_link(
                        item,
                        Some(&inventory_id),
                        link.variation_id,
                    ))
                    .await?;
            }
        }
    }

    let prepared = prepare_sales(
        &orders,
        &full_shipment_ids,
        &inventory_map,
        seller_id.parse::<i64>().ok(),
    );

    progress.set_phase(SyncPhase::SalesSave, "Saving orders and summaries...");
    let run_id = sales_repo
        .create_run("sales_window", period_start, period_end)
        .await?;

    match persist_sales(sales_repo, &prepared).await {
        Ok(summaries_saved) => {
            sales_repo.complete_run(run_id, prepared.counters).await?;
            let report = SalesSyncReport {
                run_id,
                counters: prepared.counters,
                summaries_saved,
                shipment_groups_requested: shipments.requested_groups,
                shipment_groups_resolved: shipments.resolved_groups,
            };
            progress.update(|s| {
                s.phase = SyncPhase::SalesDone;
                s.sales_orders_processed = prepared.counters.orders_processed as usize;
                s.sales_lines_processed = prepared.counters.lines_processed as usize;
                s.last_message = format!(
                    "Sales: {} orders, {} via fulfillment, {} summaries",
                    prepared.counters.orders_processed,
                    prepared.counters.full_orders_found,
                    summaries_saved
                );
            });
            info!(
                "Sales sync done: run {}, {} summaries",
                run_id, summaries_saved
            );
            Ok(report)
        }
        Err(err) => {
            warn!("Sales save failed for run {}: {}", run_id, err);
            if let Err(mark_err) = sales_repo.fail_run(run_id, &err.to_string()).await {
                warn!("Could not mark run {} failed: {}", run_id, mark_err);
            }
            Err(AppError::Sync(SyncError::SalesPhase(err.to_string())))
        }
    }
}

async fn persist_sales(
    sales_repo: &SalesRepository,
    prepared: &PreparedSales,
) -> AppResult<usize> {
    for (order, lines) in &prepared.orders {
        sales_repo.upsert_order(order).await?;
        sales_repo.replace_order_lines(order.order_id, lines).await?;
    }
    for summary in &prepared.summaries {
        sales_repo.upsert_summary(summary).await?;
    }
    Ok(prepared.summaries.len())
}
