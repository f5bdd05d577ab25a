//! Position sizing configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

/// ATR substituted when the price history yields no true-range sample.
pub const FALLBACK_ATR: Decimal = dec!(1000);

/// Parameters of the ATR position sizer that are not user settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizingConfig {
    /// Stop distance in ATRs below the current price
    pub stop_multiplier: Decimal,

    /// ATR used when there are fewer than two candles
    pub fallback_atr: Decimal,

    /// Upper bound on invested amount / total asset; `None` leaves it uncapped
    pub max_investment_ratio: Option<Decimal>,
}

impl SizingConfig {
    /// Cap the position at `ratio` of total assets, e.g. `dec!(0.8)`.
    pub fn with_investment_cap(mut self, ratio: Decimal) -> Self {
        self.max_investment_ratio = Some(ratio);
        self
    }
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            stop_multiplier: dec!(2),
            fallback_atr: FALLBACK_ATR,
            max_investment_ratio: None,
        }
    }
}
