//! Abstract contract with the remote trading-data service.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::models::{
    AccountSummary, CandleBatch, Holding, InstrumentSummary, OrderReceipt, OrderRequest, Quote,
    SettingsPatch,
};

/// Confirmation returned by a mutating endpoint.
///
/// A transport success alone is not a confirmation; implementations return
/// `Ok` only when the server explicitly acknowledged the change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationAck {
    pub message: String,
}

/// Request/response contract the store depends on.
///
/// Read operations are idempotent. Mutations resolve to `Ok` only on an
/// explicit acknowledgement and to `StoreError::Rejected` otherwise.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Current settings; keys the backend has never stored come back `None`.
    async fn fetch_settings(&self) -> StoreResult<SettingsPatch>;

    async fn update_settings(&self, patch: &SettingsPatch) -> StoreResult<MutationAck>;

    /// Canonical watchlist codes, order irrelevant.
    async fn fetch_watchlist(&self) -> StoreResult<Vec<String>>;

    async fn add_to_watchlist(&self, code: &str) -> StoreResult<MutationAck>;

    async fn remove_from_watchlist(&self, code: &str) -> StoreResult<MutationAck>;

    async fn fetch_directory(&self) -> StoreResult<Vec<InstrumentSummary>>;

    async fn fetch_name(&self, code: &str) -> StoreResult<String>;

    async fn fetch_account_summary(&self) -> StoreResult<AccountSummary>;

    /// Chronological candle history with malformed rows already dropped.
    async fn fetch_candles(&self, code: &str) -> StoreResult<CandleBatch>;

    async fn fetch_quote(&self, code: &str) -> StoreResult<Quote>;

    async fn fetch_holdings(&self) -> StoreResult<Vec<Holding>>;

    async fn submit_order(&self, order: &OrderRequest) -> StoreResult<OrderReceipt>;
}
