//! Instrument directory rows and watchlist entries.

use rust_decimal::Decimal;
use serde::Serialize;

/// Placeholder shown for a watchlist row whose name has not resolved yet.
pub const PENDING_NAME: &str = "pending";

/// Marker the exchange uses in SPAC listing names.
const SPAC_MARKER: &str = "스팩";

/// One row of the 52-week-high instrument directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentSummary {
    /// Exchange instrument code (e.g. "005930")
    pub code: String,

    /// Display name
    pub name: String,

    /// Last traded price
    pub current_price: Decimal,

    /// Highest price of the trailing 52 weeks
    pub high_52_week: Decimal,

    /// Current price relative to the 52-week high
    pub ratio: Decimal,
}

impl InstrumentSummary {
    /// Special-purpose acquisition companies are excluded from recommendations.
    pub fn is_spac(&self) -> bool {
        self.name.contains(SPAC_MARKER)
    }
}

/// A watchlist row. The name comes from the name cache and may lag behind
/// the code set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchlistEntry {
    pub code: String,
    pub name: Option<String>,
}

impl WatchlistEntry {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(PENDING_NAME)
    }

    pub fn is_resolved(&self) -> bool {
        self.name.is_some()
    }
}
