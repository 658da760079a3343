use serde::Serialize;

use crate::adapters::sheets::CompositionRow;
use crate::report::export::SnapshotRow;
use crate::store::models::{StoreStats, SyncRunRow};
use crate::sync::progress::ProgressState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Acknowledgement for a sync started in the background.
#[derive(Serialize)]
pub struct SyncAccepted {
    pub started: bool,
    pub kind: &'static str,
    pub progress_url: &'static str,
}

#[derive(Serialize)]
pub struct ProgressResponse {
    pub running: bool,
    #[serde(flatten)]
    pub state: ProgressState,
}

#[derive(Serialize)]
pub struct ReportResponse {
    pub rows: Vec<SnapshotRow>,
    pub row_count: usize,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub wms_configured: bool,
    pub wms_online: Option<bool>,
    pub sheets_configured: bool,
    pub stats: StoreStats,
    pub latest_runs: Vec<SyncRunRow>,
}

#[derive(Serialize)]
pub struct CompositionResponse {
    pub universal_code: String,
    pub rows: Vec<CompositionRow>,
}
