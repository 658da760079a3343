//! Shared live-progress state for the sync pipeline.
//!
//! Worker tasks are the only concurrent writers; every mutation goes
//! through one mutex and no reader depends on a particular interleaving.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::executor::BatchObserver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    ScanIds,
    ItemDetails,
    FullStock,
    InventoryDone,
    SalesOrders,
    SalesShipments,
    SalesItems,
    SalesSave,
    SalesDone,
    WmsRefresh,
    Finished,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressState {
    pub phase: SyncPhase,
    pub scan_pages: u32,
    pub ids_collected: usize,
    pub item_groups_total: usize,
    pub item_groups_ok: usize,
    pub item_groups_redone: usize,
    pub full_count: usize,
    pub full_missing_inventory: usize,
    pub inventories_total: usize,
    pub inventories_ok: usize,
    pub inventories_redone: usize,
    pub shipment_groups_total: usize,
    pub shipment_groups_ok: usize,
    pub shipment_groups_redone: usize,
    pub sales_orders_total: usize,
    pub sales_orders_processed: usize,
    pub sales_lines_processed: usize,
    pub last_message: String,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            phase: SyncPhase::Idle,
            scan_pages: 0,
            ids_collected: 0,
            item_groups_total: 0,
            item_groups_ok: 0,
            item_groups_redone: 0,
            full_count: 0,
            full_missing_inventory: 0,
            inventories_total: 0,
            inventories_ok: 0,
            inventories_redone: 0,
            shipment_groups_total: 0,
            shipment_groups_ok: 0,
            shipment_groups_redone: 0,
            sales_orders_total: 0,
            sales_orders_processed: 0,
            sales_lines_processed: 0,
            last_message: String::new(),
        }
    }
}

/// Cheap-to-clone handle over the shared progress state.
#[derive(Clone)]
pub struct SyncProgress {
    inner: Arc<Mutex<ProgressState>>,
}

impl SyncProgress {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ProgressState::default())),
        }
    }

    pub fn snapshot(&self) -> ProgressState {
        self.inner.lock().clone()
    }

    pub fn set_phase(&self, phase: SyncPhase, message: impl Into<String>) {
        let mut state = self.inner.lock();
        state.phase = phase;
        state.last_message = message.into();
    }

    pub fn message(&self, message: impl Into<String>) {
        self.inner.lock().last_message = message.into();
    }

    pub fn update(&self, f: impl FnOnce(&mut ProgressState)) {
        f(&mut self.inner.lock());
    }

    /// Batch-executor observer bound to one phase's counters.
    pub fn observer(&self, target: ObserverTarget) -> PhaseObserver {
        PhaseObserver {
            progress: self.clone(),
            target,
        }
    }
}

impl Default for SyncProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ObserverTarget {
    Items,
    Stock,
    Shipments,
}

pub struct PhaseObserver {
    progress: SyncProgress,
    target: ObserverTarget,
}

impl BatchObserver for PhaseObserver {
    fn groups_planned(&self, total: usize) {
        self.progress.update(|s| match self.target {
            ObserverTarget::Items => {
                s.item_groups_total = total;
                s.item_groups_ok = 0;
                s.item_groups_redone = 0;
            }
            ObserverTarget::Stock => {
                s.inventories_total = total;
                s.inventories_ok = 0;
                s.inventories_redone = 0;
            }
            ObserverTarget::Shipments => {
                s.shipment_groups_total = total;
                s.shipment_groups_ok = 0;
                s.shipment_groups_redone = 0;
            }
        });
    }

    fn group_succeeded(&self) {
        self.progress.update(|s| match self.target {
            ObserverTarget::Items => s.item_groups_ok += 1,
            ObserverTarget::Stock => s.inventories_ok += 1,
            ObserverTarget::Shipments => s.shipment_groups_ok += 1,
        });
    }

    fn group_redone(&self) {
        self.progress.update(|s| match self.target {
            ObserverTarget::Items => s.item_groups_redone += 1,
            ObserverTarget::Stock => s.inventories_redone += 1,
            ObserverTarget::Shipments => s.shipment_groups_redone += 1,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observer_routes_counters_to_its_phase() {
        let progress = SyncProgress::new();
        let items = progress.observer(ObserverTarget::Items);
        let stock = progress.observer(ObserverTarget::Stock);

        items.groups_planned(5);
        items.group_succeeded();
        items.group_succeeded();
        items.group_redone();
        stock.groups_planned(3);
        stock.group_succeeded();

        let state = progress.snapshot();
        assert_eq!(state.item_groups_total, 5);
        assert_eq!(state.item_groups_ok, 2);
        assert_eq!(state.item_groups_redone, 1);
        assert_eq!(state.inventories_total, 3);
        assert_eq!(state.inventories_ok, 1);
        assert_eq!(state.shipment_groups_total, 0);
    }

    #[test]
    fn replanning_resets_phase_counters() {
        let progress = SyncProgress::new();
        let items = progress.observer(ObserverTarget::Items);
        items.groups_planned(2);
        items.group_succeeded();
        items.groups_planned(4);
        let state = progress.snapshot();
        assert_eq!(state.item_groups_total, 4);
        assert_eq!(state.item_groups_ok, 0);
    }
}
