use serde::Deserialize;

/// Per-phase fan-out tuning. Each remote-call phase has its own worker
/// limit so the heavy per-item detail phase can run at lower parallelism
/// than the light stock and shipment lookups.
#[derive(Debug, Deserialize, Clone)]
pub struct SyncTuning {
    pub scan_page_limit: u32,
    pub item_workers: usize,
    pub stock_workers: usize,
    pub sales_workers: usize,
    /// Identifiers per detail call. 1 fetches full attributes per item;
    /// larger values use the bulk endpoint with a projected attribute
    /// subset (no package dimensions).
    pub item_group_size: usize,
    pub order_page_limit: u32,
    pub window_days: i64,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            scan_page_limit: 100,
            item_workers: 8,
            stock_workers: 12,
            sales_workers: 16,
            item_group_size: 1,
            order_page_limit: 50,
            window_days: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub marketplace_base_url: String,
    pub seller_id: String,
    pub app_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub access_token: Option<String>,
    pub wms_base_url: Option<String>,
    pub wms_api_key: Option<String>,
    pub sheets_url: Option<String>,
    pub export_dir: String,
    pub tuning: SyncTuning,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let mut tuning = SyncTuning::default();
        if let Ok(v) = std::env::var("ITEM_WORKERS") {
            tuning.item_workers = parse_env("ITEM_WORKERS", &v)?;
        }
        if let Ok(v) = std::env::var("STOCK_WORKERS") {
            tuning.stock_workers = parse_env("STOCK_WORKERS", &v)?;
        }
        if let Ok(v) = std::env::var("SALES_WORKERS") {
            tuning.sales_workers = parse_env("SALES_WORKERS", &v)?;
        }
        if let Ok(v) = std::env::var("ITEM_GROUP_SIZE") {
            tuning.item_group_size = parse_env("ITEM_GROUP_SIZE", &v)?;
        }
        if let Ok(v) = std::env::var("SALES_WINDOW_DAYS") {
            tuning.window_days = parse_env("SALES_WINDOW_DAYS", &v)?;
        }

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/restock".to_string()),
            bind_address: std::env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            marketplace_base_url: std::env::var("MARKETPLACE_BASE_URL")
                .unwrap_or_else(|_| "https://api.mercadolibre.com".to_string()),
            seller_id: std::env::var("SELLER_ID").unwrap_or_default(),
            app_id: std::env::var("MARKET_APP_ID").unwrap_or_default(),
            client_secret: std::env::var("MARKET_CLIENT_SECRET").unwrap_or_default(),
            refresh_token: std::env::var("MARKET_REFRESH_TOKEN").unwrap_or_default(),
            access_token: std::env::var("MARKET_ACCESS_TOKEN").ok().filter(|s| !s.is_empty()),
            wms_base_url: std::env::var("WMS_BASE_URL").ok().filter(|s| !s.is_empty()),
            wms_api_key: std::env::var("WMS_API_KEY").ok().filter(|s| !s.is_empty()),
            sheets_url: std::env::var("SHEETS_URL").ok().filter(|s| !s.is_empty()),
            export_dir: std::env::var("EXPORT_DIR").unwrap_or_else(|_| "out".to_string()),
            tuning,
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, config::ConfigError> {
    raw.parse().map_err(|_| {
        config::ConfigError::Message(format!("invalid value for {}: {:?}", key, raw))
    })
}
