//! Failure bookkeeping shared by the store and its background lookups.

use std::fmt;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::StoreError;

/// What a failed operation was about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Settings,
    AccountTotal,
    Watchlist,
    Directory,
    Name,
    Holdings,
    Candles,
    Quote,
    Order,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Settings => "settings",
            Self::AccountTotal => "account_total",
            Self::Watchlist => "watchlist",
            Self::Directory => "directory",
            Self::Name => "name",
            Self::Holdings => "holdings",
            Self::Candles => "candles",
            Self::Quote => "quote",
            Self::Order => "order",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The most recent failure, kept for the display layer.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreFailure {
    pub entity: Entity,
    pub error: StoreError,
    pub at: DateTime<Utc>,
}

#[derive(Default)]
pub(crate) struct FailureLog {
    last: RwLock<Option<StoreFailure>>,
}

impl FailureLog {
    /// Log and keep `error`, handing it back for propagation.
    pub async fn record(&self, entity: Entity, error: StoreError) -> StoreError {
        warn!(entity = %entity, error = %error, "Store operation failed");
        *self.last.write().await = Some(StoreFailure {
            entity,
            error: error.clone(),
            at: Utc::now(),
        });
        error
    }

    pub async fn last(&self) -> Option<StoreFailure> {
        self.last.read().await.clone()
    }

    pub async fn clear(&self) {
        *self.last.write().await = None;
    }
}
