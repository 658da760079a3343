use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::api::handlers::{
    download_report_csv, get_compositions, get_progress, get_report, get_status, health_check,
    trigger_full_sync, trigger_inventory_sync, trigger_sales_sync, trigger_wms_refresh, AppState,
};

pub async fn create_app(state: AppState) -> Router {
    info!("⚙️ Setting up HTTP routes...");

    let app = Router::new()
        // Public health check endpoint
        .route("/health", get(health_check))
        .nest(
            "/api/v1",
            Router::new()
                // Sync triggers (background, answer 202)
                .route("/sync/full", post(trigger_full_sync))
                .route("/sync/inventory", post(trigger_inventory_sync))
                .route("/sync/sales", post(trigger_sales_sync))
                .route("/sync/wms", post(trigger_wms_refresh))
                // Observability
                .route("/progress", get(get_progress))
                .route("/status", get(get_status))
                // Reconciliation snapshot
                .route("/report", get(get_report))
                .route("/report/csv", get(download_report_csv))
                // Auxiliary cross-reference lookup
                .route("/compositions/:code", get(get_compositions)),
        )
        .layer(CompressionLayer::new())
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("✓ HTTP routes configured");
    app
}

pub async fn run_server(app: Router, bind_address: &str) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("🌐 Server listening on: {}", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}
