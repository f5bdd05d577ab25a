//! Live quote for a single instrument.

use rust_decimal::Decimal;
use serde::Serialize;

/// Snapshot from `GET /price`. Every price is optional because the broker
/// API returns empty strings outside trading hours.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub code: String,
    pub name: String,
    pub current_price: Option<Decimal>,
    pub open: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub change: Option<Decimal>,
    pub change_rate: Option<Decimal>,
    pub volume: Option<Decimal>,
    pub high_52_week: Option<Decimal>,
    pub low_52_week: Option<Decimal>,
}
