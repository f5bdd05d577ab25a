//! Risk-bounded order sizing from price-history volatility.

mod config;
mod position_sizer;
mod tick;

pub use config::{SizingConfig, FALLBACK_ATR};
pub use position_sizer::{
    AtrEstimate, PositionSizer, PositionSize, Precondition, SizingInput, SizingOutcome,
};
pub use tick::{snap_to_tick, tick_size, TickRounding};
