//! reqwest implementation of the marketplace contract.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::{
    BulkItemEnvelope, FulfillmentStock, ItemDetail, MarketplaceApi, Order, OrderQuery, ScanPage,
    Shipment,
};
use crate::config::Config;
use crate::error::{MarketError, MarketResult};

/// Attribute projection for bulk item fetches; full attributes are only
/// requested on singleton calls.
const BULK_ATTRIBUTES: &str =
    "id,title,seller_custom_field,pictures,variations,inventory_id,shipping";

#[derive(Debug, Clone)]
pub struct MarketCredentials {
    pub app_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
}

pub struct MarketplaceClient {
    http: Client,
    base_url: String,
    credentials: RwLock<MarketCredentials>,
    access_token: RwLock<Option<String>>,
}

impl MarketplaceClient {
    pub fn new(config: &Config) -> MarketResult<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(64)
            .build()?;

        Ok(Self {
            http,
            base_url: config.marketplace_base_url.trim_end_matches('/').to_string(),
            credentials: RwLock::new(MarketCredentials {
                app_id: config.app_id.clone(),
                client_secret: config.client_secret.clone(),
                refresh_token: config.refresh_token.clone(),
            }),
            access_token: RwLock::new(config.access_token.clone()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Exchange the refresh token for a fresh access token. The rotated
    /// refresh token, when returned, replaces the stored one.
    async fn refresh_access_token(&self) -> MarketResult<String> {
        let creds = self.credentials.read().await.clone();
        if creds.app_id.is_empty() || creds.client_secret.is_empty() || creds.refresh_token.is_empty()
        {
            return Err(MarketError::MissingCredentials(
                "MARKET_APP_ID / MARKET_CLIENT_SECRET / MARKET_REFRESH_TOKEN",
            ));
        }

        info!("Refreshing marketplace access token");
        let response = self
            .http
            .post(self.url("/oauth/token"))
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", creds.app_id.as_str()),
                ("client_secret", creds.client_secret.as_str()),
                ("refresh_token", creds.refresh_token.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(MarketError::Status { status, body });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| MarketError::Decode(e.to_string()))?;

        if let Some(rotated) = token.refresh_token {
            self.credentials.write().await.refresh_token = rotated;
        }
        *self.access_token.write().await = Some(token.access_token.clone());
        Ok(token.access_token)
    }

    async fn bearer(&self) -> MarketResult<String> {
        if let Some(token) = self.access_token.read().await.clone() {
            return Ok(token);
        }
        self.refresh_access_token().await
    }

    /// Send a request with the bearer header; on 401 refresh the token once
    /// and retry the same call. A second 401 is terminal.
    async fn send_authorized<T>(&self, build: impl Fn(&Client) -> RequestBuilder) -> MarketResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let token = self.bearer().await?;
        let response = build(&self.http).bearer_auth(&token).send().await?;

        let response = if response.status() == StatusCode::UNAUTHORIZED {
            warn!("Marketplace returned 401, refreshing token and retrying once");
            let token = self.refresh_access_token().await?;
            let retried = build(&self.http).bearer_auth(&token).send().await?;
            if retried.status() == StatusCode::UNAUTHORIZED {
                return Err(MarketError::Unauthorized);
            }
            retried
        } else {
            response
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(200).collect();
            return Err(MarketError::Status { status, body });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| MarketError::Decode(e.to_string()))
    }
}

#[async_trait]
impl MarketplaceApi for MarketplaceClient {
    async fn scan_page(
        &self,
        seller_id: &str,
        limit: u32,
        scroll_id: Option<&str>,
    ) -> MarketResult<ScanPage> {
        let url = self.url(&format!("/users/{}/items/search", seller_id));
        let limit = limit.to_string();
        self.send_authorized(move |http| {
            let mut req = http
                .get(&url)
                .query(&[("search_type", "scan"), ("limit", limit.as_str())]);
            if let Some(cursor) = scroll_id {
                req = req.query(&[("scroll_id", cursor)]);
            }
            req
        })
        .await
    }

    async fn item_detail(&self, item_id: &str) -> MarketResult<Option<ItemDetail>> {
        let url = self.url(&format!("/items/{}", item_id));
        // A deleted or never-existing entry is an absence, not a failure.
        match self
            .send_authorized::<ItemDetail>(move |http| {
                http.get(&url).query(&[("include_attributes", "all")])
            })
            .await
        {
            Ok(detail) => Ok(Some(detail)),
            Err(MarketError::Status { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn items_bulk(&self, item_ids: &[String]) -> MarketResult<Vec<ItemDetail>> {
        let url = self.url("/items");
        let ids = item_ids.join(",");
        let envelopes: Vec<BulkItemEnvelope> = self
            .send_authorized(move |http| {
                http.get(&url)
                    .query(&[("ids", ids.as_str()), ("attributes", BULK_ATTRIBUTES)])
            })
            .await?;
        Ok(envelopes.into_iter().filter_map(|e| e.body).collect())
    }

    async fn fulfillment_stock(&self, inventory_id: &str) -> MarketResult<FulfillmentStock> {
        let url = self.url(&format!("/inventories/{}/stock/fulfillment", inventory_id));
        self.send_authorized(move |http| http.get(&url)).await
    }

    async fn orders_page(
        &self,
        query: &OrderQuery,
        offset: u32,
        limit: u32,
    ) -> MarketResult<Vec<Order>> {
        #[derive(Deserialize)]
        struct OrderSearchPage {
            #[serde(default)]
            results: Vec<Order>,
        }

        let url = self.url("/orders/search");
        let from = query.from.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let to = query.to.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let offset = offset.to_string();
        let limit = limit.to_string();

        let page: OrderSearchPage = self
            .send_authorized(move |http| {
                let mut req = http.get(&url).query(&[
                    ("seller", query.seller_id.as_str()),
                    ("order.date_created.from", from.as_str()),
                    ("order.date_created.to", to.as_str()),
                    ("sort", "date_desc"),
                    ("offset", offset.as_str()),
                    ("limit", limit.as_str()),
                ]);
                if let Some(status) = &query.status {
                    req = req.query(&[("order.status", status.as_str())]);
                }
                req
            })
            .await?;
        Ok(page.results)
    }

    async fn shipment(&self, shipment_id: i64) -> MarketResult<Shipment> {
        let url = self.url(&format!("/shipments/{}", shipment_id));
        self.send_authorized(move |http| http.get(&url)).await
    }
}
