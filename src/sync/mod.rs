//! Sync orchestration: phase functions plus the service facade that the
//! HTTP surface drives. At most one sync runs at a time per process.

pub mod catalog;
pub mod inventory;
pub mod progress;
pub mod sales;
pub mod scan;
#[cfg(test)]
pub mod testing;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{stream, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use crate::adapters::marketplace::MarketplaceApi;
use crate::adapters::wms::WmsClient;
use crate::config::SyncTuning;
use crate::error::{AppError, AppResult};
use crate::report::export::write_snapshot_csv;
use crate::store::repository::{InventoryRepository, SalesRepository};

use inventory::{run_inventory_sync, InventorySyncReport};
use progress::{SyncPhase, SyncProgress};
use sales::{run_sales_sync, SalesSyncReport};

const WMS_LOOKUP_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Serialize)]
pub struct FullSyncReport {
    pub inventory: InventorySyncReport,
    pub sales: SalesSyncReport,
    pub export_path: String,
    pub wms_refreshed: Option<usize>,
}

pub struct SyncService {
    api: Arc<dyn MarketplaceApi>,
    inventory_repo: Arc<InventoryRepository>,
    sales_repo: Arc<SalesRepository>,
    wms: Option<Arc<WmsClient>>,
    progress: SyncProgress,
    tuning: SyncTuning,
    seller_id: String,
    export_dir: String,
    running: AtomicBool,
}

/// Resets the in-flight flag when the sync scope ends, error paths
/// included.
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl SyncService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api: Arc<dyn MarketplaceApi>,
        inventory_repo: Arc<InventoryRepository>,
        sales_repo: Arc<SalesRepository>,
        wms: Option<Arc<WmsClient>>,
        tuning: SyncTuning,
        seller_id: String,
        export_dir: String,
    ) -> Self {
        Self {
            api,
            inventory_repo,
            sales_repo,
            wms,
            progress: SyncProgress::new(),
            tuning,
            seller_id,
            export_dir,
            running: AtomicBool::new(false),
        }
    }

    pub fn progress(&self) -> &SyncProgress {
        &self.progress
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn wms_configured(&self) -> bool {
        self.wms.is_some()
    }

    /// Connectivity of the optional WMS collaborator; `None` when
    /// unconfigured.
    pub async fn wms_online(&self) -> Option<bool> {
        let wms = self.wms.as_ref()?;
        Some(wms.ping().await.unwrap_or(false))
    }

    fn try_begin(&self) -> AppResult<RunGuard<'_>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AppError::SyncAlreadyRunning);
        }
        Ok(RunGuard {
            flag: &self.running,
        })
    }

    pub async fn sync_inventory(&self) -> AppResult<InventorySyncReport> {
        let _guard = self.try_begin()?;
        match run_inventory_sync(
            self.api.as_ref(),
            &self.inventory_repo,
            &self.tuning,
            &self.progress,
            &self.seller_id,
        )
        .await
        {
            Ok(report) => Ok(report),
            Err(err) => {
                self.progress.set_phase(SyncPhase::Failed, err.to_string());
                Err(err)
            }
        }
    }

    pub async fn sync_sales(&self) -> AppResult<SalesSyncReport> {
        let _guard = self.try_begin()?;
        match run_sales_sync(
            self.api.as_ref(),
            &self.inventory_repo,
            &self.sales_repo,
            &self.tuning,
            &self.progress,
            &self.seller_id,
        )
        .await
        {
            Ok(report) => Ok(report),
            Err(err) => {
                self.progress.set_phase(SyncPhase::Failed, err.to_string());
                Err(err)
            }
        }
    }

    /// Inventory, sales and the snapshot export in sequence; the WMS
    /// refresh runs alongside them and its failure never fails the run.
    pub async fn sync_full(&self) -> AppResult<FullSyncReport> {
        let _guard = self.try_begin()?;

        let marketplace = async {
            let inventory = run_inventory_sync(
                self.api.as_ref(),
                &self.inventory_repo,
                &self.tuning,
                &self.progress,
                &self.seller_id,
            )
            .await?;
            let sales = run_sales_sync(
                self.api.as_ref(),
                &self.inventory_repo,
                &self.sales_repo,
                &self.tuning,
                &self.progress,
                &self.seller_id,
            )
            .await?;
            Ok::<_, AppError>((inventory, sales))
        };

        let warehouse = async {
            match &self.wms {
                None => None,
                Some(_) => Some(self.refresh_wms_inner().await),
            }
        };

        let (marketplace_result, warehouse_result) = tokio::join!(marketplace, warehouse);

        let wms_refreshed = match warehouse_result {
            None => None,
            Some(Ok(count)) => Some(count),
            Some(Err(err)) => {
                warn!("WMS refresh failed: {}", err);
                None
            }
        };

        let (inventory, sales) = match marketplace_result {
            Ok(parts) => parts,
            Err(err) => {
                self.progress.set_phase(SyncPhase::Failed, err.to_string());
                return Err(err);
            }
        };

        self.progress.message("Exporting reconciliation snapshot...");
        let export_path =
            write_snapshot_csv(&self.inventory_repo, &self.export_dir).await?;

        self.progress.set_phase(
            SyncPhase::Finished,
            format!("Full sync finished, snapshot at {}", export_path),
        );
        info!("✅ Full sync finished, snapshot at {}", export_path);

        Ok(FullSyncReport {
            inventory,
            sales,
            export_path,
            wms_refreshed,
        })
    }

    /// Refresh the cached external-warehouse figures for every known SKU.
    pub async fn refresh_wms(&self) -> AppResult<usize> {
        let _guard = self.try_begin()?;
        self.progress
            .set_phase(SyncPhase::WmsRefresh, "Refreshing WMS stock...");
        let refreshed = self.refresh_wms_inner().await?;
        self.progress.set_phase(
            SyncPhase::Finished,
            format!("WMS refresh finished: {} codes", refreshed),
        );
        Ok(refreshed)
    }

    async fn refresh_wms_inner(&self) -> AppResult<usize> {
        let wms = self
            .wms
            .as_ref()
            .ok_or(AppError::CollaboratorUnavailable("wms"))?;
        let skus = self.inventory_repo.distinct_skus().await?;
        let total = skus.len();

        let lookups: Vec<(String, Result<Option<i64>, crate::error::WmsError>)> =
            stream::iter(skus.into_iter().map(|sku| {
                let wms = Arc::clone(wms);
                async move {
                    let result = wms.stock_by_code(&sku).await;
                    (sku, result)
                }
            }))
            .buffer_unordered(WMS_LOOKUP_CONCURRENCY)
            .collect()
            .await;

        let mut refreshed = 0;
        for (sku, result) in lookups {
            match result {
                Ok(Some(available)) => {
                    self.inventory_repo
                        .upsert_wms_stock(&sku, Some(available), "found")
                        .await?;
                    refreshed += 1;
                }
                Ok(None) => {
                    // Unknown codes stay unknown, never zero.
                    self.inventory_repo
                        .upsert_wms_stock(&sku, None, "not_found")
                        .await?;
                }
                Err(err) => warn!("WMS lookup failed for {}: {}", sku, err),
            }
        }

        info!("WMS refresh: {}/{} codes resolved", refreshed, total);
        Ok(refreshed)
    }
}
