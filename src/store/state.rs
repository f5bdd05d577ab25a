//! The synchronized state store.
//!
//! `Store` owns every entity mirrored from the backend. Consumers read
//! snapshots through the accessors; only the store's own operations write.
//!
//! The trading mode partitions the account total, watchlist, directory, and
//! holdings. When it changes, those entities are invalidated under the
//! settings write lock, so no reader can pair the new mode with a figure
//! loaded under the old one, and then reloaded.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::api::Gateway;
use crate::error::{StoreError, StoreResult};
use crate::models::{
    total_from_summary, AccountTotal, CandleBatch, Holding, InstrumentSummary, OrderReceipt,
    OrderRequest, Quote, Settings, SettingsPatch, TradingMode, WatchlistEntry,
};
use crate::sizing::{PositionSizer, SizingConfig, SizingInput, SizingOutcome};

use super::failures::{Entity, FailureLog, StoreFailure};
use super::names::NameResolver;
use super::slot::Slot;

/// Per-entity outcome of [`Store::reload_all`].
#[derive(Debug, Clone)]
pub struct ReloadReport {
    pub settings: StoreResult<Settings>,
    pub account_total: StoreResult<Option<AccountTotal>>,
    pub watchlist: StoreResult<Vec<WatchlistEntry>>,
    /// Number of directory rows loaded
    pub directory: StoreResult<usize>,
}

impl ReloadReport {
    pub fn is_complete(&self) -> bool {
        self.failures().is_empty()
    }

    pub fn failures(&self) -> Vec<&StoreError> {
        [
            self.settings.as_ref().err(),
            self.account_total.as_ref().err(),
            self.watchlist.as_ref().err(),
            self.directory.as_ref().err(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Sizing result for one instrument together with what it was computed from.
#[derive(Debug, Clone)]
pub struct Recommendation {
    pub code: String,
    pub quote: Quote,
    pub mode: TradingMode,
    /// Candles the calculator saw
    pub candles: usize,
    /// Malformed rows dropped from the history
    pub discarded: usize,
    pub outcome: SizingOutcome,
}

const ACCOUNT_SUMMARY: &str = "account summary";

pub struct Store {
    gateway: Arc<dyn Gateway>,
    settings: Slot<Settings>,
    settings_ready: AtomicBool,
    account_total: Slot<Option<AccountTotal>>,
    watchlist: Slot<BTreeSet<String>>,
    directory: Slot<Vec<InstrumentSummary>>,
    holdings: Slot<Vec<Holding>>,
    names: NameResolver,
    failures: Arc<FailureLog>,
}

impl Store {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        let failures = Arc::new(FailureLog::default());
        Self {
            names: NameResolver::new(gateway.clone(), failures.clone()),
            gateway,
            settings: Slot::new(Settings::default()),
            settings_ready: AtomicBool::new(false),
            account_total: Slot::new(None),
            watchlist: Slot::new(BTreeSet::new()),
            directory: Slot::new(Vec::new()),
            holdings: Slot::new(Vec::new()),
            failures,
        }
    }

    // ========== Settings ==========

    /// Current settings. Defaults until [`is_settings_ready`](Self::is_settings_ready).
    pub async fn settings(&self) -> Settings {
        self.settings.get().await
    }

    /// Whether settings have been loaded from the backend at least once.
    pub fn is_settings_ready(&self) -> bool {
        self.settings_ready.load(Ordering::SeqCst)
    }

    /// Fetch settings and merge them over the local copy.
    ///
    /// If the backend reports a different trading mode than the local one,
    /// the mode-scoped entities are invalidated and reloaded.
    pub async fn load_settings(&self) -> StoreResult<Settings> {
        let ticket = self.settings.issue();
        let patch = match self.gateway.fetch_settings().await {
            Ok(patch) => patch,
            Err(e) => return Err(self.fail(Entity::Settings, e).await),
        };

        let (settings, switched) = {
            let mut slot = self.settings.lock().await;
            if !slot.accepts(ticket) {
                self.discarded(Entity::Settings);
                return Ok(slot.value.clone());
            }

            // A full object overrides every field, so merging equals replacing.
            let previous = slot.value.clone();
            let next = patch.merge_into(&previous);
            // Before the first load, requests already issued for mode-scoped
            // entities were tagged with the default mode and must be redone.
            let switched = next.mode() != previous.mode()
                && (self.is_settings_ready() || self.mode_scoped_requested());
            if switched {
                self.invalidate_mode_scoped().await;
            }

            slot.apply(ticket, next.clone());
            self.settings_ready.store(true, Ordering::SeqCst);
            (next, switched)
        };

        debug!(
            atr_period = settings.atr_period,
            max_loss_ratio = %settings.max_loss_ratio,
            mode = %settings.mode(),
            "Settings loaded"
        );

        if switched {
            info!(mode = %settings.mode(), "Backend switched trading mode, reloading");
            self.reload_mode_scoped().await;
        }
        Ok(settings)
    }

    /// Send a settings update and apply it once the backend confirms.
    ///
    /// A patch that flips `is_paper_trading` cascades into
    /// [`reload_all`](Self::reload_all) before returning.
    pub async fn save_settings(&self, patch: SettingsPatch) -> StoreResult<Settings> {
        if let Err(e) = patch.validate() {
            return Err(self.fail(Entity::Settings, e).await);
        }

        let ticket = self.settings.issue();
        if let Err(e) = self.gateway.update_settings(&patch).await {
            return Err(self.fail(Entity::Settings, e).await);
        }

        let (saved, switched) = {
            let mut slot = self.settings.lock().await;
            let previous = slot.value.clone();

            // Before the first load the local mode is only a default.
            let switched = if self.is_settings_ready() {
                patch.mode_change(&previous).is_some()
            } else {
                patch.is_paper_trading.is_some()
            };
            if switched {
                self.invalidate_mode_scoped().await;
            }

            let next = patch.merge_into(&previous);
            slot.modify(ticket, |settings| *settings = next.clone());
            if patch.is_full() {
                self.settings_ready.store(true, Ordering::SeqCst);
            }
            (next, switched)
        };

        if !switched {
            info!(
                atr_period = saved.atr_period,
                max_loss_ratio = %saved.max_loss_ratio,
                "Settings saved"
            );
            return Ok(saved);
        }

        info!(mode = %saved.mode(), "Trading mode switched, reloading");
        let report = self.reload_all().await;
        if !report.is_complete() {
            warn!(
                failures = report.failures().len(),
                "Reload after mode switch incomplete"
            );
        }
        Ok(self.settings().await)
    }

    pub async fn set_trading_mode(&self, is_paper_trading: bool) -> StoreResult<Settings> {
        self.save_settings(SettingsPatch::trading_mode(is_paper_trading))
            .await
    }

    // ========== Account total ==========

    pub async fn account_total(&self) -> Option<AccountTotal> {
        self.account_total.get().await
    }

    /// Reload the total evaluation amount, tagged with the mode it was
    /// requested under.
    pub async fn load_account_total(&self) -> StoreResult<Option<AccountTotal>> {
        let ticket = self.account_total.issue();
        // Read after issuing: a switch landing in between invalidates the ticket.
        let mode = self.settings.get().await.mode();

        let total = self.gateway.fetch_account_summary().await.and_then(|summary| {
            total_from_summary(&summary).map_err(|e| StoreError::decode(ACCOUNT_SUMMARY, e))
        });
        let total_asset_value = match total {
            Ok(value) => value,
            Err(e) => return Err(self.fail(Entity::AccountTotal, e).await),
        };

        let value = AccountTotal {
            total_asset_value,
            mode,
            loaded_at: Utc::now(),
        };
        if self.account_total.apply(ticket, Some(value)).await {
            debug!(total = total_asset_value, mode = %mode, "Account total updated");
        } else {
            self.discarded(Entity::AccountTotal);
        }
        Ok(self.account_total().await)
    }

    // ========== Watchlist ==========

    /// Watchlist rows sorted by code, named from the cache where resolved.
    pub async fn watchlist(&self) -> Vec<WatchlistEntry> {
        let codes = self.watchlist.get().await;
        let names = self.names.snapshot().await;
        codes
            .into_iter()
            .map(|code| WatchlistEntry {
                name: names.get(&code).cloned(),
                code,
            })
            .collect()
    }

    /// Replace the watchlist from the backend and start resolving names.
    ///
    /// Returns as soon as the codes are applied; names fill in as each lookup
    /// settles and a failed lookup leaves its row pending.
    pub async fn fetch_watchlist(&self) -> StoreResult<Vec<WatchlistEntry>> {
        let ticket = self.watchlist.issue();
        let codes: BTreeSet<String> = match self.gateway.fetch_watchlist().await {
            Ok(codes) => codes.into_iter().collect(),
            Err(e) => return Err(self.fail(Entity::Watchlist, e).await),
        };

        if !self.watchlist.apply(ticket, codes.clone()).await {
            self.discarded(Entity::Watchlist);
            return Ok(self.watchlist().await);
        }
        debug!(count = codes.len(), "Watchlist replaced");

        for code in &codes {
            self.names.prefetch(code).await;
        }
        Ok(self.watchlist().await)
    }

    /// Add `code` once the backend confirms. Adding a present code is a no-op.
    pub async fn add_to_watchlist(&self, code: &str) -> StoreResult<()> {
        let code = self.checked_code(Entity::Watchlist, code).await?;

        let ticket = self.watchlist.issue();
        if let Err(e) = self.gateway.add_to_watchlist(&code).await {
            return Err(self.fail(Entity::Watchlist, e).await);
        }

        let mut inserted = false;
        let landed = self
            .watchlist
            .modify(ticket, |set| inserted = set.insert(code.clone()))
            .await;
        if !landed {
            self.discarded(Entity::Watchlist);
            return Ok(());
        }

        info!(code = %code, inserted, "Added to watchlist");
        self.names.prefetch(&code).await;
        Ok(())
    }

    /// Remove `code` once the backend confirms. Removing an absent code is a
    /// no-op.
    pub async fn remove_from_watchlist(&self, code: &str) -> StoreResult<()> {
        let code = self.checked_code(Entity::Watchlist, code).await?;

        let ticket = self.watchlist.issue();
        if let Err(e) = self.gateway.remove_from_watchlist(&code).await {
            return Err(self.fail(Entity::Watchlist, e).await);
        }

        let mut removed = false;
        let landed = self
            .watchlist
            .modify(ticket, |set| removed = set.remove(&code))
            .await;
        if landed {
            info!(code = %code, removed, "Removed from watchlist");
        } else {
            self.discarded(Entity::Watchlist);
        }
        Ok(())
    }

    // ========== Names ==========

    /// Cached display name for `code`, without a lookup.
    pub async fn name(&self, code: &str) -> Option<String> {
        self.names.cached(code).await
    }

    /// Name for `code`, looked up at most once at a time per code. A failed
    /// lookup is recorded by the lookup itself.
    pub async fn resolve_name(&self, code: &str) -> StoreResult<String> {
        self.names.resolve(code).await
    }

    // ========== Instrument directory ==========

    pub async fn directory(&self) -> Vec<InstrumentSummary> {
        self.directory.get().await
    }

    /// Replace the directory wholesale. Returns the number of rows.
    pub async fn load_instrument_directory(&self) -> StoreResult<usize> {
        let ticket = self.directory.issue();
        let rows = match self.gateway.fetch_directory().await {
            Ok(rows) => rows,
            Err(e) => return Err(self.fail(Entity::Directory, e).await),
        };

        let count = rows.len();
        if self.directory.apply(ticket, rows).await {
            debug!(count, "Instrument directory replaced");
        } else {
            self.discarded(Entity::Directory);
        }
        Ok(self.directory.read().await.value.len())
    }

    /// Directory rows worth recommending: SPACs excluded, closest to the
    /// 52-week high first.
    pub async fn recommendations(&self) -> Vec<InstrumentSummary> {
        let mut rows: Vec<InstrumentSummary> = self
            .directory
            .get()
            .await
            .into_iter()
            .filter(|row| !row.is_spac())
            .collect();
        rows.sort_by(|a, b| b.ratio.cmp(&a.ratio));
        rows
    }

    /// Directory rows whose name contains `query` (case-insensitive) or whose
    /// code contains it, in directory order. A blank query matches nothing.
    pub async fn search(&self, query: &str, limit: usize) -> Vec<InstrumentSummary> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }
        let needle = query.to_lowercase();

        self.directory
            .read()
            .await
            .value
            .iter()
            .filter(|row| row.name.to_lowercase().contains(&needle) || row.code.contains(query))
            .take(limit)
            .cloned()
            .collect()
    }

    // ========== Holdings ==========

    pub async fn holdings(&self) -> Vec<Holding> {
        self.holdings.get().await
    }

    pub async fn load_holdings(&self) -> StoreResult<Vec<Holding>> {
        let ticket = self.holdings.issue();
        let holdings = match self.gateway.fetch_holdings().await {
            Ok(holdings) => holdings,
            Err(e) => return Err(self.fail(Entity::Holdings, e).await),
        };

        let count = holdings.len();
        if self.holdings.apply(ticket, holdings).await {
            debug!(count, "Holdings replaced");
        } else {
            self.discarded(Entity::Holdings);
        }
        Ok(self.holdings().await)
    }

    // ========== Reload ==========

    /// Issue the settings, account total, watchlist, and directory loads
    /// together and wait for all of them.
    ///
    /// Until settings are ready the local mode is only a default, so the
    /// settings load goes first and the mode-scoped loads follow under the
    /// backend's mode.
    pub async fn reload_all(&self) -> ReloadReport {
        let (settings, account_total, watchlist, directory) = if self.is_settings_ready() {
            futures::join!(
                self.load_settings(),
                self.load_account_total(),
                self.fetch_watchlist(),
                self.load_instrument_directory(),
            )
        } else {
            let settings = self.load_settings().await;
            let (account_total, watchlist, directory) = futures::join!(
                self.load_account_total(),
                self.fetch_watchlist(),
                self.load_instrument_directory(),
            );
            (settings, account_total, watchlist, directory)
        };

        let report = ReloadReport {
            settings,
            account_total,
            watchlist,
            directory,
        };
        debug!(complete = report.is_complete(), "Reload finished");
        report
    }

    async fn reload_mode_scoped(&self) {
        // Failures are recorded by each load.
        let _ = futures::join!(
            self.load_account_total(),
            self.fetch_watchlist(),
            self.load_instrument_directory(),
        );
    }

    fn mode_scoped_requested(&self) -> bool {
        self.account_total.has_issued()
            || self.watchlist.has_issued()
            || self.directory.has_issued()
            || self.holdings.has_issued()
    }

    /// Caller holds the settings write lock.
    async fn invalidate_mode_scoped(&self) {
        self.account_total.invalidate(None).await;
        self.watchlist.invalidate(BTreeSet::new()).await;
        self.directory.invalidate(Vec::new()).await;
        self.holdings.invalidate(Vec::new()).await;
        self.names.clear().await;
        debug!("Mode-scoped state invalidated");
    }

    // ========== Market data and orders ==========

    /// Candle history for `code`. Not kept in the store.
    pub async fn fetch_candles(&self, code: &str) -> StoreResult<CandleBatch> {
        let code = self.checked_code(Entity::Candles, code).await?;
        match self.gateway.fetch_candles(&code).await {
            Ok(batch) => {
                if batch.discarded > 0 {
                    debug!(code = %code, discarded = batch.discarded, "Dropped malformed candles");
                }
                Ok(batch)
            }
            Err(e) => Err(self.fail(Entity::Candles, e).await),
        }
    }

    pub async fn fetch_quote(&self, code: &str) -> StoreResult<Quote> {
        let code = self.checked_code(Entity::Quote, code).await?;
        match self.gateway.fetch_quote(&code).await {
            Ok(quote) => Ok(quote),
            Err(e) => Err(self.fail(Entity::Quote, e).await),
        }
    }

    pub async fn submit_order(&self, order: &OrderRequest) -> StoreResult<OrderReceipt> {
        if let Err(e) = order.validate() {
            return Err(self.fail(Entity::Order, e).await);
        }

        let receipt = match self.gateway.submit_order(order).await {
            Ok(receipt) => receipt,
            Err(e) => return Err(self.fail(Entity::Order, e).await),
        };

        if receipt.accepted {
            info!(
                code = %order.code,
                quantity = order.quantity,
                price = %order.price,
                message = %receipt.message,
                "Order accepted"
            );
        } else {
            warn!(code = %order.code, message = %receipt.message, "Order not accepted");
        }
        Ok(receipt)
    }

    /// Size a position in `code` from its history and live price.
    ///
    /// Market data is fetched first; settings and the account total are then
    /// read under one lock so both come from the same mode.
    pub async fn recommend(&self, code: &str, config: &SizingConfig) -> StoreResult<Recommendation> {
        let (batch, quote) = futures::join!(self.fetch_candles(code), self.fetch_quote(code));
        let (batch, quote) = (batch?, quote?);

        let (settings, total) = {
            let settings = self.settings.read().await;
            let total = self.account_total.get().await;
            (settings.value.clone(), total)
        };
        let mode = settings.mode();
        let total_asset = match total {
            Some(total) if total.mode == mode => total.total_asset_value,
            _ => 0,
        };

        let outcome = PositionSizer::new(config.clone()).calculate(&SizingInput {
            total_asset,
            max_loss_ratio: settings.max_loss_ratio,
            atr_period: settings.atr_period,
            candles: &batch.candles,
            current_price: quote.current_price,
        });

        Ok(Recommendation {
            code: quote.code.clone(),
            quote,
            mode,
            candles: batch.candles.len(),
            discarded: batch.discarded,
            outcome,
        })
    }

    // ========== Failures ==========

    pub async fn last_error(&self) -> Option<StoreFailure> {
        self.failures.last().await
    }

    pub async fn clear_last_error(&self) {
        self.failures.clear().await;
    }

    async fn fail(&self, entity: Entity, error: StoreError) -> StoreError {
        self.failures.record(entity, error).await
    }

    fn discarded(&self, entity: Entity) {
        debug!(entity = %entity, "Discarding stale response");
    }

    async fn checked_code(&self, entity: Entity, code: &str) -> StoreResult<String> {
        let code = code.trim();
        if code.is_empty() {
            let e = StoreError::InvalidRequest("empty instrument code".to_string());
            return Err(self.fail(entity, e).await);
        }
        Ok(code.to_string())
    }
}
