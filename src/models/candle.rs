//! Daily candles used for ATR computation.

use rust_decimal::Decimal;
use serde::Serialize;

/// One daily OHLCV bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candle {
    /// Trading date, `YYYY-MM-DD`
    pub date: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    /// Largest of the intraday range and the gaps against the previous close.
    pub fn true_range(&self, prev_close: Decimal) -> Decimal {
        (self.high - self.low)
            .max((self.high - prev_close).abs())
            .max((self.low - prev_close).abs())
    }
}

/// Result of decoding a candle history response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandleBatch {
    /// Valid candles in chronological order
    pub candles: Vec<Candle>,

    /// Rows dropped for a missing field, a non-positive price, or a bad date
    pub discarded: usize,
}

impl CandleBatch {
    pub fn last_close(&self) -> Option<Decimal> {
        self.candles.last().map(|c| c.close)
    }
}
