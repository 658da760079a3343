//! Optional external warehouse (WMS) collaborator.
//!
//! Absence of this client degrades the fulfillable-quantity estimate to
//! "unknown"; it never fails the pipeline.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::WmsError;

#[derive(Debug, Clone, Deserialize)]
pub struct WmsProduct {
    pub available_quantity: Option<i64>,
}

pub struct WmsClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl WmsClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, WmsError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Available quantity for a universal product code, or None when the
    /// WMS does not know the code.
    pub async fn stock_by_code(&self, code: &str) -> Result<Option<i64>, WmsError> {
        let response = self
            .http
            .get(format!("{}/products", self.base_url))
            .header("x-api-key", &self.api_key)
            .query(&[("code", code)])
            .send()
            .await?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(WmsError::Status(response.status().as_u16()));
        }

        // The endpoint answers with a list for ambiguous codes and a bare
        // object for exact matches.
        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| WmsError::Decode(e.to_string()))?;
        let product: Option<WmsProduct> = match value {
            serde_json::Value::Array(items) => items
                .into_iter()
                .next()
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| WmsError::Decode(e.to_string()))?,
            serde_json::Value::Null => None,
            other => Some(
                serde_json::from_value(other).map_err(|e| WmsError::Decode(e.to_string()))?,
            ),
        };

        let available = product.and_then(|p| p.available_quantity);
        debug!("WMS stock for {}: {:?}", code, available);
        Ok(available)
    }

    /// Connectivity probe for the status endpoint.
    pub async fn ping(&self) -> Result<bool, WmsError> {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .header("x-api-key", &self.api_key)
            .send()
            .await?;
        Ok(response.status().is_success())
    }
}
