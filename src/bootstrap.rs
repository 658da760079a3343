use std::sync::Arc;
use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

use crate::{
    adapters::{marketplace::client::MarketplaceClient, sheets::SheetsClient, wms::WmsClient},
    api::handlers::AppState,
    config::Config,
    error::{AppError, AppResult},
    store::repository::{InventoryRepository, SalesRepository},
    sync::SyncService,
};

pub async fn initialize_app_state(config: &Config) -> AppResult<AppState> {
    info!("Initializing application components ...");

    let pool = initialize_database(&config.database_url).await?;

    let inventory_repo = Arc::new(InventoryRepository::new(pool.clone()));
    let sales_repo = Arc::new(SalesRepository::new(pool));

    let marketplace = Arc::new(MarketplaceClient::new(config)?);
    info!("✅ Marketplace client initialized for {}", config.marketplace_base_url);

    let wms = match (&config.wms_base_url, &config.wms_api_key) {
        (Some(base_url), Some(api_key)) => {
            let client = Arc::new(WmsClient::new(base_url, api_key)?);
            info!("✅ WMS collaborator configured: {}", base_url);
            Some(client)
        }
        _ => {
            warn!("⚠️  WMS not configured - fulfillable estimates will be unknown");
            None
        }
    };

    let sheets = match &config.sheets_url {
        Some(url) => {
            let client =
                Arc::new(SheetsClient::new(url).map_err(AppError::Warehouse)?);
            info!("✅ Composition sheet configured");
            Some(client)
        }
        None => {
            warn!("⚠️  Composition sheet not configured - cross-reference lookups disabled");
            None
        }
    };

    let sync = Arc::new(SyncService::new(
        marketplace,
        Arc::clone(&inventory_repo),
        Arc::clone(&sales_repo),
        wms,
        config.tuning.clone(),
        config.seller_id.clone(),
        config.export_dir.clone(),
    ));

    info!("✓ Application components ready");
    Ok(AppState {
        inventory_repo,
        sales_repo,
        sync,
        sheets,
    })
}

async fn initialize_database(database_url: &str) -> AppResult<PgPool> {
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("✅ Database connected and migrated");
    Ok(pool)
}
