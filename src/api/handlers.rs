use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use tokio::spawn;
use tracing::{error, info};

use super::models::*;
use crate::{
    adapters::sheets::SheetsClient,
    error::{AppError, AppResult},
    report::export::{build_snapshot, snapshot_csv_bytes},
    store::repository::{InventoryRepository, SalesRepository},
    sync::SyncService,
};

#[derive(Clone)]
pub struct AppState {
    pub inventory_repo: Arc<InventoryRepository>,
    pub sales_repo: Arc<SalesRepository>,
    pub sync: Arc<SyncService>,
    pub sheets: Option<Arc<SheetsClient>>,
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "restock-backend",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// POST /api/v1/sync/full
///
/// Starts the full pipeline in the background and answers immediately;
/// callers follow the progress endpoint. A second trigger while one is
/// in flight gets a conflict.
pub async fn trigger_full_sync(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<SyncAccepted>)> {
    ensure_idle(&state)?;
    info!("🔄 Full sync requested");
    let sync = Arc::clone(&state.sync);
    spawn(async move {
        if let Err(err) = sync.sync_full().await {
            error!("Full sync failed: {}", err);
        }
    });
    Ok(accepted("full"))
}

/// POST /api/v1/sync/inventory
pub async fn trigger_inventory_sync(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<SyncAccepted>)> {
    ensure_idle(&state)?;
    info!("🔄 Inventory sync requested");
    let sync = Arc::clone(&state.sync);
    spawn(async move {
        if let Err(err) = sync.sync_inventory().await {
            error!("Inventory sync failed: {}", err);
        }
    });
    Ok(accepted("inventory"))
}

/// POST /api/v1/sync/sales
pub async fn trigger_sales_sync(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<SyncAccepted>)> {
    ensure_idle(&state)?;
    info!("🔄 Sales sync requested");
    let sync = Arc::clone(&state.sync);
    spawn(async move {
        if let Err(err) = sync.sync_sales().await {
            error!("Sales sync failed: {}", err);
        }
    });
    Ok(accepted("sales"))
}

/// POST /api/v1/sync/wms
pub async fn trigger_wms_refresh(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<SyncAccepted>)> {
    if !state.sync.wms_configured() {
        return Err(AppError::CollaboratorUnavailable("wms"));
    }
    ensure_idle(&state)?;
    info!("🔄 WMS refresh requested");
    let sync = Arc::clone(&state.sync);
    spawn(async move {
        if let Err(err) = sync.refresh_wms().await {
            error!("WMS refresh failed: {}", err);
        }
    });
    Ok(accepted("wms"))
}

/// GET /api/v1/progress
pub async fn get_progress(State(state): State<AppState>) -> Json<ProgressResponse> {
    Json(ProgressResponse {
        running: state.sync.is_running(),
        state: state.sync.progress().snapshot(),
    })
}

/// GET /api/v1/report
pub async fn get_report(State(state): State<AppState>) -> AppResult<Json<ReportResponse>> {
    let rows = build_snapshot(&state.inventory_repo.report_rows().await?);
    Ok(Json(ReportResponse {
        row_count: rows.len(),
        rows,
    }))
}

/// GET /api/v1/report/csv
pub async fn download_report_csv(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let rows = build_snapshot(&state.inventory_repo.report_rows().await?);
    let bytes = snapshot_csv_bytes(&rows)?;

    let filename = format!(
        "attachment; filename=\"restock_snapshot_{}.csv\"",
        Utc::now().format("%Y%m%d_%H%M%S")
    );
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&filename).map_err(|e| AppError::Export(e.to_string()))?,
    );
    Ok((headers, bytes))
}

/// GET /api/v1/status
pub async fn get_status(State(state): State<AppState>) -> AppResult<Json<StatusResponse>> {
    Ok(Json(StatusResponse {
        running: state.sync.is_running(),
        wms_configured: state.sync.wms_configured(),
        wms_online: state.sync.wms_online().await,
        sheets_configured: state.sheets.is_some(),
        stats: state.inventory_repo.stats().await?,
        latest_runs: state.sales_repo.latest_runs(20).await?,
    }))
}

/// GET /api/v1/compositions/:code
pub async fn get_compositions(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<Json<CompositionResponse>> {
    let sheets = state
        .sheets
        .as_ref()
        .ok_or(AppError::CollaboratorUnavailable("sheets"))?;
    let rows = sheets.compositions_for(&code).await.map_err(AppError::from)?;
    if rows.is_empty() {
        return Err(AppError::NotFound(format!("universal code {}", code)));
    }
    Ok(Json(CompositionResponse {
        universal_code: code,
        rows,
    }))
}

fn ensure_idle(state: &AppState) -> AppResult<()> {
    if state.sync.is_running() {
        return Err(AppError::SyncAlreadyRunning);
    }
    Ok(())
}

fn accepted(kind: &'static str) -> (StatusCode, Json<SyncAccepted>) {
    (
        StatusCode::ACCEPTED,
        Json(SyncAccepted {
            started: true,
            kind,
            progress_url: "/api/v1/progress",
        }),
    )
}
