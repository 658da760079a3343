use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Top-level error type for the entire application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Marketplace error: {0}")]
    Market(#[from] MarketError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Warehouse error: {0}")]
    Warehouse(#[from] WmsError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("A sync is already running")]
    SyncAlreadyRunning,

    #[error("Collaborator not configured: {0}")]
    CollaboratorUnavailable(&'static str),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Export error: {0}")]
    Export(String),
}

/// Errors talking to the marketplace API
#[derive(Error, Debug)]
pub enum MarketError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Marketplace returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unauthorized after token refresh")]
    Unauthorized,

    #[error("Response decode error: {0}")]
    Decode(String),

    #[error("Missing credential: {0}")]
    MissingCredentials(&'static str),
}

impl MarketError {
    /// Transient failures are retried by the batch executor. A refreshed-and-
    /// still-rejected token is the only terminal case at this layer.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            MarketError::Unauthorized | MarketError::MissingCredentials(_)
        )
    }
}

/// Pipeline-phase errors
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Catalog scan aborted at page {page}: {source}")]
    ScanAborted {
        page: u32,
        #[source]
        source: MarketError,
    },

    #[error("Order search aborted at offset {offset}: {source}")]
    OrderSearchAborted {
        offset: u32,
        #[source]
        source: MarketError,
    },

    #[error("Sales aggregation failed: {0}")]
    SalesPhase(String),
}

/// Errors from the optional external warehouse collaborator
#[derive(Error, Debug)]
pub enum WmsError {
    #[error("WMS transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("WMS returned status {0}")]
    Status(u16),

    #[error("WMS decode error: {0}")]
    Decode(String),
}

pub type AppResult<T> = Result<T, AppError>;
pub type MarketResult<T> = Result<T, MarketError>;

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Not found: {}", what),
                None,
            ),
            AppError::SyncAlreadyRunning => (
                StatusCode::CONFLICT,
                "SYNC_ALREADY_RUNNING",
                "A sync is already running; check /api/v1/progress".to_string(),
                None,
            ),
            AppError::CollaboratorUnavailable(name) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "COLLABORATOR_UNAVAILABLE",
                format!("Optional collaborator not configured: {}", name),
                None,
            ),
            AppError::Market(MarketError::Unauthorized) => (
                StatusCode::BAD_GATEWAY,
                "MARKETPLACE_UNAUTHORIZED",
                "Marketplace rejected credentials after a token refresh".to_string(),
                None,
            ),
            AppError::Market(MarketError::Status { status, ref body }) => (
                StatusCode::BAD_GATEWAY,
                "MARKETPLACE_ERROR",
                format!("Marketplace returned status {}", status),
                Some(serde_json::json!({ "upstream_status": status, "body": body })),
            ),
            AppError::Market(err) => (
                StatusCode::BAD_GATEWAY,
                "MARKETPLACE_ERROR",
                err.to_string(),
                None,
            ),
            AppError::Sync(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "SYNC_FAILED",
                err.to_string(),
                None,
            ),
            AppError::Warehouse(err) => (
                StatusCode::BAD_GATEWAY,
                "WMS_ERROR",
                err.to_string(),
                None,
            ),
            AppError::Config(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                msg,
                None,
            ),
            AppError::Export(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "EXPORT_FAILED",
                msg,
                None,
            ),
            AppError::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database operation failed".to_string(),
                    None,
                )
            }
            AppError::Migrate(err) => {
                tracing::error!("Migration error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database migration failed".to_string(),
                    None,
                )
            }
        };

        let body = ErrorBody {
            error: error_code,
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}
