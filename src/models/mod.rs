//! Data models for settings, instruments, account totals, candles, and orders.

mod account;
mod candle;
mod holding;
mod instrument;
mod order;
mod quote;
mod settings;

pub use account::{parse_amount, total_from_summary, AccountSummary, AccountTotal, TOTAL_EVALUATION_KEY};
pub use candle::{Candle, CandleBatch};
pub use holding::Holding;
pub use instrument::{InstrumentSummary, WatchlistEntry, PENDING_NAME};
pub use order::{OrderReceipt, OrderRequest, OrderType};
pub use quote::Quote;
pub use settings::{Settings, SettingsPatch, TradingMode};
