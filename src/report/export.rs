//! Snapshot rows and the semicolon-delimited tabular export.
//!
//! One row per (location, catalog rollup); the column set is the
//! externally visible contract of the pipeline and must stay stable.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use super::replenish::{classify_package, cubage_m3, fulfillable, ShipmentNeed};
use crate::error::{AppError, AppResult};
use crate::store::models::{Dimensions, ReportRow};
use crate::store::repository::InventoryRepository;

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotRow {
    pub inventory_id: String,
    pub sku: Option<String>,
    pub title: Option<String>,
    pub listing_count: i64,
    pub available_quantity: Option<i64>,
    pub total_quantity: Option<i64>,
    pub not_available_quantity: Option<i64>,
    pub transfer_quantity: i64,
    pub inbound_quantity: i64,
    pub units_30d: i64,
    pub revenue_30d: Decimal,
    pub shipment_need: String,
    pub fulfillable: Option<i64>,
    pub wms_available: Option<i64>,
    pub height_cm: Option<Decimal>,
    pub width_cm: Option<Decimal>,
    pub length_cm: Option<Decimal>,
    pub weight_g: Option<Decimal>,
    pub cubage_m3: Option<Decimal>,
    pub size_class: Option<&'static str>,
}

impl SnapshotRow {
    pub fn from_report(row: &ReportRow) -> Self {
        let units = row.units.unwrap_or(0);
        let transfer = row.transfer_quantity.unwrap_or(0);
        let inbound = row.inbound_quantity.unwrap_or(0);
        let need = ShipmentNeed::compute(
            units,
            row.available_quantity.unwrap_or(0),
            transfer,
            inbound,
        );
        let dims = Dimensions {
            height: row.height,
            width: row.width,
            length: row.length,
            weight: row.weight,
        };

        Self {
            inventory_id: row.inventory_id.clone(),
            sku: row.sku.clone(),
            title: row.title.clone(),
            listing_count: row.listing_count,
            available_quantity: row.available_quantity,
            total_quantity: row.total_quantity,
            not_available_quantity: row.not_available_quantity,
            transfer_quantity: transfer,
            inbound_quantity: inbound,
            units_30d: units,
            revenue_30d: row.revenue.unwrap_or_default(),
            shipment_need: need.to_string(),
            fulfillable: fulfillable(need, row.wms_available),
            wms_available: row.wms_available,
            height_cm: row.height,
            width_cm: row.width,
            length_cm: row.length,
            weight_g: row.weight,
            cubage_m3: cubage_m3(&dims),
            size_class: classify_package(&dims).map(|c| c.label()),
        }
    }
}

pub fn build_snapshot(rows: &[ReportRow]) -> Vec<SnapshotRow> {
    rows.iter().map(SnapshotRow::from_report).collect()
}

pub fn snapshot_csv_bytes(rows: &[SnapshotRow]) -> AppResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_writer(Vec::new());
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| AppError::Export(e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| AppError::Export(e.to_string()))
}

/// Write the current snapshot as a timestamped CSV file under
/// `export_dir`, returning the path.
pub async fn write_snapshot_csv(
    repo: &InventoryRepository,
    export_dir: &str,
) -> AppResult<String> {
    let rows = build_snapshot(&repo.report_rows().await?);
    let bytes = snapshot_csv_bytes(&rows)?;

    tokio::fs::create_dir_all(export_dir)
        .await
        .map_err(|e| AppError::Export(e.to_string()))?;
    let path = format!(
        "{}/restock_snapshot_{}.csv",
        export_dir.trim_end_matches('/'),
        Utc::now().format("%Y%m%d_%H%M%S")
    );
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| AppError::Export(e.to_string()))?;

    info!("📄 Snapshot exported: {} rows to {}", rows.len(), path);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn report_row() -> ReportRow {
        ReportRow {
            inventory_id: "INV1".into(),
            sku: Some("SKU-1".into()),
            title: Some("Widget; blue".into()),
            listing_count: 2,
            available_quantity: Some(3),
            total_quantity: Some(5),
            not_available_quantity: Some(2),
            transfer_quantity: Some(2),
            inbound_quantity: Some(0),
            units: Some(10),
            revenue: Some(dec!(60.00)),
            height: Some(dec!(10)),
            width: Some(dec!(12)),
            length: Some(dec!(20)),
            weight: Some(dec!(2000)),
            wms_available: Some(3),
        }
    }

    #[test]
    fn snapshot_row_derives_need_fulfillable_and_size() {
        let row = SnapshotRow::from_report(&report_row());
        assert_eq!(row.shipment_need, "5");
        assert_eq!(row.fulfillable, Some(3));
        assert_eq!(row.size_class, Some("small"));
        assert_eq!(row.cubage_m3, Some(dec!(0.0024)));
    }

    #[test]
    fn opportunity_rows_carry_the_sentinel_not_a_number() {
        let mut report = report_row();
        report.units = None;
        report.available_quantity = Some(0);
        let row = SnapshotRow::from_report(&report);
        assert_eq!(row.shipment_need, "opportunity");
        assert_eq!(row.fulfillable, Some(0));
    }

    #[test]
    fn missing_stock_record_means_unknown_quantities_zero_need_inputs() {
        let mut report = report_row();
        report.available_quantity = None;
        report.transfer_quantity = None;
        report.inbound_quantity = None;
        report.units = Some(4);
        let row = SnapshotRow::from_report(&report);
        assert_eq!(row.shipment_need, "4");
        assert_eq!(row.available_quantity, None);
    }

    #[test]
    fn csv_uses_semicolons_and_quotes_embedded_delimiters() {
        let rows = build_snapshot(&[report_row()]);
        let bytes = snapshot_csv_bytes(&rows).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert_eq!(
            header,
            "inventory_id;sku;title;listing_count;available_quantity;\
             total_quantity;not_available_quantity;transfer_quantity;\
             inbound_quantity;units_30d;revenue_30d;shipment_need;\
             fulfillable;wms_available;height_cm;width_cm;length_cm;\
             weight_g;cubage_m3;size_class"
        );
        let data = lines.next().unwrap();
        assert!(data.contains("\"Widget; blue\""));
        assert!(data.contains(";5;"));
    }
}
