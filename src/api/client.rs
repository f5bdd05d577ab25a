//! HTTP client for the Leonardo backend.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::{DecodeError, StoreError, StoreResult};
use crate::models::{
    AccountSummary, CandleBatch, Holding, InstrumentSummary, OrderReceipt, OrderRequest, Quote,
    SettingsPatch,
};

use super::decode;
use super::gateway::{Gateway, MutationAck};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5051";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`HttpGateway`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// [`Gateway`] over the backend's JSON API.
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    /// Create a client against the default local backend.
    pub fn new() -> Result<Self> {
        Self::with_config(GatewayConfig::default())
    }

    pub fn with_config(config: GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request and return status plus parsed body.
    ///
    /// Only failures to send or to read a JSON body are transport errors;
    /// status handling is left to the caller.
    async fn exchange<B: Serialize + Sync + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> StoreResult<(StatusCode, Value)> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(method = %method, url = %url, "Gateway request");

        let mut request = self.client.request(method, &url).query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::transport(endpoint, e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| StoreError::transport(endpoint, e))?;

        let body = serde_json::from_str::<Value>(&text).map_err(|_| {
            StoreError::decode(endpoint, DecodeError::Shape { expected: "JSON body" })
        });
        match body {
            Ok(value) => Ok((status, value)),
            // Error pages are often HTML; the status is the useful part.
            Err(_) if !status.is_success() => Err(StoreError::rejected(endpoint, status.as_u16(), text)),
            Err(e) => Err(e),
        }
    }

    /// GET a read endpoint; non-2xx is a rejection.
    async fn get(&self, endpoint: &str, query: &[(&str, &str)]) -> StoreResult<Value> {
        let (status, body) = self
            .exchange::<Value>(Method::GET, endpoint, query, None)
            .await?;
        if !status.is_success() {
            let message = decode::reply_message(&body).unwrap_or_else(|| body.to_string());
            return Err(StoreError::rejected(endpoint, status.as_u16(), message));
        }
        Ok(body)
    }

    /// Send a mutation and require an explicit confirmation in the reply.
    async fn mutate<B: Serialize + Sync + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        body: &B,
    ) -> StoreResult<MutationAck> {
        let (status, reply) = self.exchange(method, endpoint, &[], Some(body)).await?;
        let message = decode::reply_message(&reply).unwrap_or_default();

        if !status.is_success() || !decode::is_confirmation(&reply) {
            return Err(StoreError::rejected(endpoint, status.as_u16(), message));
        }

        info!(endpoint = endpoint, message = %message, "Mutation confirmed");
        Ok(MutationAck { message })
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn fetch_settings(&self) -> StoreResult<SettingsPatch> {
        const EP: &str = "/settings";
        let body = self.get(EP, &[]).await?;
        decode::settings(&body).map_err(|e| StoreError::decode(EP, e))
    }

    async fn update_settings(&self, patch: &SettingsPatch) -> StoreResult<MutationAck> {
        self.mutate(Method::POST, "/settings", patch).await
    }

    async fn fetch_watchlist(&self) -> StoreResult<Vec<String>> {
        const EP: &str = "/watchlist";
        let body = self.get(EP, &[]).await?;
        decode::watchlist(&body).map_err(|e| StoreError::decode(EP, e))
    }

    async fn add_to_watchlist(&self, code: &str) -> StoreResult<MutationAck> {
        self.mutate(Method::POST, "/watchlist", &json!({ "code": code })).await
    }

    async fn remove_from_watchlist(&self, code: &str) -> StoreResult<MutationAck> {
        self.mutate(Method::DELETE, "/watchlist", &json!({ "code": code })).await
    }

    async fn fetch_directory(&self) -> StoreResult<Vec<InstrumentSummary>> {
        const EP: &str = "/high52";
        let body = self.get(EP, &[]).await?;
        decode::directory(&body).map_err(|e| StoreError::decode(EP, e))
    }

    async fn fetch_name(&self, code: &str) -> StoreResult<String> {
        const EP: &str = "/stockname";
        let body = self.get(EP, &[("code", code)]).await?;
        decode::name(&body).map_err(|e| StoreError::decode(EP, e))
    }

    async fn fetch_account_summary(&self) -> StoreResult<AccountSummary> {
        const EP: &str = "/total_asset/summary";
        let body = self.get(EP, &[]).await?;
        decode::account_summary(&body).map_err(|e| StoreError::decode(EP, e))
    }

    async fn fetch_candles(&self, code: &str) -> StoreResult<CandleBatch> {
        const EP: &str = "/candle";
        let body = self.get(EP, &[("code", code)]).await?;
        decode::candles(&body).map_err(|e| StoreError::decode(EP, e))
    }

    async fn fetch_quote(&self, code: &str) -> StoreResult<Quote> {
        const EP: &str = "/price";
        let body = self.get(EP, &[("stock_no", code)]).await?;
        decode::quote(code, &body).map_err(|e| StoreError::decode(EP, e))
    }

    async fn fetch_holdings(&self) -> StoreResult<Vec<Holding>> {
        const EP: &str = "/holdings";
        let body = self.get(EP, &[]).await?;
        decode::holdings(&body).map_err(|e| StoreError::decode(EP, e))
    }

    async fn submit_order(&self, order: &OrderRequest) -> StoreResult<OrderReceipt> {
        const EP: &str = "/buy";
        let (status, reply) = self.exchange(Method::POST, EP, &[], Some(order)).await?;
        let message = decode::reply_message(&reply).unwrap_or_default();

        if !status.is_success() {
            return Err(StoreError::rejected(EP, status.as_u16(), message));
        }

        Ok(OrderReceipt {
            accepted: decode::is_confirmation(&reply),
            message,
        })
    }
}
