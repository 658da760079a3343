//! Optional composition-spreadsheet collaborator.
//!
//! Maps a universal product code to the catalog entries containing it,
//! with quantity per entry. Used only by the auxiliary cross-reference
//! report, never by the core need computation.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::WmsError;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompositionRow {
    pub universal_code: String,
    pub item_sku: String,
    pub quantity: i64,
}

pub struct SheetsClient {
    http: Client,
    sheet_url: String,
}

impl SheetsClient {
    pub fn new(sheet_url: &str) -> Result<Self, WmsError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            sheet_url: sheet_url.to_string(),
        })
    }

    /// The whole composition table. Small enough to fetch wholesale on each
    /// lookup; the sheet is the source of truth, nothing is cached.
    pub async fn composition_rows(&self) -> Result<Vec<CompositionRow>, WmsError> {
        let response = self.http.get(&self.sheet_url).send().await?;
        if !response.status().is_success() {
            return Err(WmsError::Status(response.status().as_u16()));
        }
        response
            .json()
            .await
            .map_err(|e| WmsError::Decode(e.to_string()))
    }

    /// Catalog entries containing the given universal code.
    pub async fn compositions_for(&self, code: &str) -> Result<Vec<CompositionRow>, WmsError> {
        let rows = self.composition_rows().await?;
        Ok(rows
            .into_iter()
            .filter(|r| r.universal_code == code)
            .collect())
    }
}
