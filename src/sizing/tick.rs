//! KRX price tick ("hoga") units.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Direction used when snapping a price onto the tick grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickRounding {
    Floor,
    Round,
    Ceil,
}

/// Minimum price increment for a stock quoted at `price`.
pub fn tick_size(price: Decimal) -> Decimal {
    match price {
        p if p < dec!(2000) => dec!(1),
        p if p < dec!(5000) => dec!(5),
        p if p < dec!(20000) => dec!(10),
        p if p < dec!(50000) => dec!(50),
        p if p < dec!(200000) => dec!(100),
        p if p < dec!(500000) => dec!(500),
        _ => dec!(1000),
    }
}

/// Snap `price` onto the tick grid. Negative prices clamp to zero.
pub fn snap_to_tick(price: Decimal, rounding: TickRounding) -> Decimal {
    if price <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let unit = tick_size(price);
    let steps = price / unit;
    let steps = match rounding {
        TickRounding::Floor => steps.floor(),
        TickRounding::Round => steps.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero),
        TickRounding::Ceil => steps.ceil(),
    };
    steps * unit
}
