//! Idempotent persistence for the reconciliation pipeline.
//!
//! Every write is an insert-or-update keyed by the entity's natural key;
//! each save step commits independently, so a mid-pipeline failure leaves
//! earlier steps' results intact.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

use super::models::*;
use crate::error::AppResult;

pub struct InventoryRepository {
    pool: PgPool,
}

impl InventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert_item(&self, item: &NewCatalogItem) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_items
                (item_id, variation_id, inventory_id, title, sku, thumbnail_url,
                 is_full, height, width, length, weight, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW())
            ON CONFLICT (item_id, COALESCE(variation_id, 0)) DO UPDATE SET
                inventory_id = EXCLUDED.inventory_id,
                title = EXCLUDED.title,
                sku = EXCLUDED.sku,
                thumbnail_url = EXCLUDED.thumbnail_url,
                is_full = EXCLUDED.is_full,
                height = EXCLUDED.height,
                width = EXCLUDED.width,
                length = EXCLUDED.length,
                weight = EXCLUDED.weight,
                updated_at = NOW()
            "#,
        )
        .bind(&item.item_id)
        .bind(item.variation_id)
        .bind(&item.inventory_id)
        .bind(&item.title)
        .bind(&item.sku)
        .bind(&item.thumbnail_url)
        .bind(item.is_full)
        .bind(item.dimensions.height)
        .bind(item.dimensions.width)
        .bind(item.dimensions.length)
        .bind(item.dimensions.weight)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upsert one stock snapshot. Appends a history row only when the
    /// available quantity actually changed; returns whether it did.
    pub async fn upsert_stock(&self, snapshot: &StockSnapshot) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        let old_available: Option<Option<i64>> = sqlx::query_scalar(
            "SELECT available_quantity FROM inventory_stock WHERE inventory_id = $1",
        )
        .bind(&snapshot.inventory_id)
        .fetch_optional(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO inventory_stock
                (inventory_id, available_quantity, total_quantity,
                 not_available_quantity, transfer_quantity, inbound_quantity,
                 not_available_detail, external_references, last_updated)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            ON CONFLICT (inventory_id) DO UPDATE SET
                available_quantity = EXCLUDED.available_quantity,
                total_quantity = EXCLUDED.total_quantity,
                not_available_quantity = EXCLUDED.not_available_quantity,
                transfer_quantity = EXCLUDED.transfer_quantity,
                inbound_quantity = EXCLUDED.inbound_quantity,
                not_available_detail = EXCLUDED.not_available_detail,
                external_references = EXCLUDED.external_references,
                last_updated = NOW()
            "#,
        )
        .bind(&snapshot.inventory_id)
        .bind(snapshot.available_quantity)
        .bind(snapshot.total_quantity)
        .bind(snapshot.not_available_quantity)
        .bind(snapshot.transfer_quantity)
        .bind(snapshot.inbound_quantity)
        .bind(&snapshot.not_available_detail)
        .bind(&snapshot.external_references)
        .execute(&mut *tx)
        .await?;

        let changed = available_changed(old_available, snapshot.available_quantity);

        if changed {
            let note = stock_change_note(
                old_available.flatten(),
                snapshot.available_quantity,
            );
            sqlx::query(
                r#"
                INSERT INTO stock_history
                    (inventory_id, available_quantity, total_quantity,
                     not_available_quantity, change_type, notes)
                VALUES ($1, $2, $3, $4, 'sync', $5)
                "#,
            )
            .bind(&snapshot.inventory_id)
            .bind(snapshot.available_quantity)
            .bind(snapshot.total_quantity)
            .bind(snapshot.not_available_quantity)
            .bind(note)
            .execute(&mut *tx)
            .await?;
            debug!("Stock changed for {}", snapshot.inventory_id);
        }

        tx.commit().await?;
        Ok(changed)
    }

    pub async fn distinct_skus(&self) -> AppResult<Vec<String>> {
        let skus: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT sku FROM inventory_items WHERE sku IS NOT NULL AND sku <> ''",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(skus)
    }

    pub async fn upsert_wms_stock(
        &self,
        sku: &str,
        available: Option<i64>,
        status: &str,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO wms_stock (sku, available, status, last_updated)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (sku) DO UPDATE SET
                available = EXCLUDED.available,
                status = EXCLUDED.status,
                last_updated = NOW()
            "#,
        )
        .bind(sku)
        .bind(available)
        .bind(status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The reconciliation join: one row per (location, catalog rollup),
    /// sorted by consolidated trailing-window units.
    pub async fn report_rows(&self) -> AppResult<Vec<ReportRow>> {
        let rows = sqlx::query_as::<_, ReportRow>(
            r#"
            SELECT
                ii.inventory_id,
                MAX(ii.sku) AS sku,
                MAX(ii.title) AS title,
                COUNT(ii.item_id) AS listing_count,
                ist.available_quantity,
                ist.total_quantity,
                ist.not_available_quantity,
                ist.transfer_quantity,
                ist.inbound_quantity,
                SUM(ss.units) AS units,
                SUM(ss.revenue) AS revenue,
                MAX(ii.height) AS height,
                MAX(ii.width) AS width,
                MAX(ii.length) AS length,
                MAX(ii.weight) AS weight,
                MAX(ws.available) AS wms_available
            FROM inventory_items ii
            LEFT JOIN inventory_stock ist ON ii.inventory_id = ist.inventory_id
            LEFT JOIN sales_summary ss ON ii.item_id = ss.item_id
                AND COALESCE(ii.variation_id, 0) = COALESCE(ss.variation_id, 0)
            LEFT JOIN wms_stock ws ON ii.sku = ws.sku
            WHERE ii.is_full = TRUE AND ii.inventory_id IS NOT NULL
            GROUP BY ii.inventory_id, ist.available_quantity, ist.total_quantity,
                     ist.not_available_quantity, ist.transfer_quantity,
                     ist.inbound_quantity
            ORDER BY units DESC NULLS LAST
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn stats(&self) -> AppResult<StoreStats> {
        let items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inventory_items")
            .fetch_one(&self.pool)
            .await?;
        let stocks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inventory_stock")
            .fetch_one(&self.pool)
            .await?;
        let summaries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales_summary")
            .fetch_one(&self.pool)
            .await?;
        let full_orders: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sales_orders WHERE is_full = TRUE")
                .fetch_one(&self.pool)
                .await?;
        Ok(StoreStats {
            items,
            stocks,
            summaries,
            full_orders,
        })
    }
}

/// Whether a stock upsert counts as a change worth a history row.
/// `previous` is None when no row existed yet; a first insert whose
/// available quantity is itself unknown records nothing.
pub fn available_changed(previous: Option<Option<i64>>, current: Option<i64>) -> bool {
    match previous {
        None => current.is_some(),
        Some(old) => old != current,
    }
}

/// Free-text old→new note for the stock history, built only on change.
pub fn stock_change_note(old: Option<i64>, new: Option<i64>) -> String {
    let fmt = |v: Option<i64>| match v {
        Some(n) => n.to_string(),
        None => "unknown".to_string(),
    };
    format!("sync: {} → {}", fmt(old), fmt(new))
}

pub struct SalesRepository {
    pool: PgPool,
}

impl SalesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a sync run in `running` state. Failed runs are terminal; a new
    /// run is created for every sales sync.
    pub async fn create_run(
        &self,
        kind: &str,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> AppResult<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sync_runs (sync_kind, period_start, period_end, status)
            VALUES ($1, $2, $3, 'running')
            RETURNING id
            "#,
        )
        .bind(kind)
        .bind(period_start)
        .bind(period_end)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn complete_run(&self, run_id: i64, counters: SyncCounters) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE sync_runs SET
                orders_processed = $2,
                lines_processed = $3,
                full_orders_found = $4,
                status = 'completed',
                completed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(run_id)
        .bind(counters.orders_processed)
        .bind(counters.lines_processed)
        .bind(counters.full_orders_found)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn fail_run(&self, run_id: i64, error: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE sync_runs SET
                status = 'failed',
                error_message = $2,
                completed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(run_id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn latest_runs(&self, limit: i64) -> AppResult<Vec<SyncRunRow>> {
        let runs = sqlx::query_as::<_, SyncRunRow>(
            "SELECT * FROM sync_runs ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(runs)
    }

    pub async fn upsert_order(&self, order: &NewOrder) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sales_orders
                (order_id, order_status, date_created, date_closed, shipping_id,
                 logistic_type, is_full, total_amount, currency_id, buyer_id, seller_id)
            VALUES ($1, $2, $3, $4, $5, 'fulfillment', $6, $7, $8, $9, $10)
            ON CONFLICT (order_id) DO UPDATE SET
                order_status = EXCLUDED.order_status,
                date_created = EXCLUDED.date_created,
                date_closed = EXCLUDED.date_closed,
                shipping_id = EXCLUDED.shipping_id,
                is_full = EXCLUDED.is_full,
                total_amount = EXCLUDED.total_amount,
                currency_id = EXCLUDED.currency_id,
                buyer_id = EXCLUDED.buyer_id,
                seller_id = EXCLUDED.seller_id
            "#,
        )
        .bind(order.order_id)
        .bind(&order.order_status)
        .bind(order.date_created)
        .bind(order.date_closed)
        .bind(order.shipping_id)
        .bind(order.is_full)
        .bind(order.total_amount)
        .bind(&order.currency_id)
        .bind(order.buyer_id)
        .bind(order.seller_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Replace the line set of one order wholesale, keeping the re-run of a
    /// sales sync idempotent.
    pub async fn replace_order_lines(
        &self,
        order_id: i64,
        lines: &[NewOrderLine],
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM sales_order_lines WHERE order_id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;
        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO sales_order_lines
                    (order_id, item_id, variation_id, inventory_id, title, sku,
                     quantity, unit_price, total_price, currency_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(line.order_id)
            .bind(&line.item_id)
            .bind(line.variation_id)
            .bind(&line.inventory_id)
            .bind(&line.title)
            .bind(&line.sku)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.total_price)
            .bind(&line.currency_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn upsert_summary(&self, summary: &NewSalesSummary) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sales_summary
                (item_id, variation_id, inventory_id, units, revenue, last_updated)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (item_id, COALESCE(variation_id, 0)) DO UPDATE SET
                inventory_id = EXCLUDED.inventory_id,
                units = EXCLUDED.units,
                revenue = EXCLUDED.revenue,
                last_updated = NOW()
            "#,
        )
        .bind(&summary.item_id)
        .bind(summary.variation_id)
        .bind(&summary.inventory_id)
        .bind(summary.units)
        .bind(summary.revenue)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_note_formats_old_and_new() {
        assert_eq!(stock_change_note(Some(8), Some(5)), "sync: 8 → 5");
        assert_eq!(stock_change_note(None, Some(3)), "sync: unknown → 3");
    }

    #[test]
    fn history_row_only_when_available_actually_moves() {
        // 8 → 5 is one history row; 5 → 5 is none.
        assert!(available_changed(Some(Some(8)), Some(5)));
        assert!(!available_changed(Some(Some(5)), Some(5)));
        // A quantity appearing or disappearing is a move too.
        assert!(available_changed(Some(None), Some(3)));
        assert!(available_changed(Some(Some(3)), None));
    }

    #[test]
    fn first_insert_records_history_only_with_a_known_quantity() {
        assert!(available_changed(None, Some(7)));
        assert!(!available_changed(None, None));
    }
}
