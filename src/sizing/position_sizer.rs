//! ATR position sizing: how many shares to buy so that a stop at
//! `stop_multiplier * ATR` below the entry loses at most the configured
//! fraction of total assets.

use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::Candle;

use super::tick::{snap_to_tick, TickRounding};
use super::SizingConfig;

/// Everything the sizer reads. Borrowed so callers can size straight from a
/// store snapshot without copying the candle history.
#[derive(Debug, Clone, Copy)]
pub struct SizingInput<'a> {
    /// Total asset value in whole currency units
    pub total_asset: i64,

    /// Configured maximum loss ratio; only its magnitude is used
    pub max_loss_ratio: Decimal,

    /// Number of true-range samples to average
    pub atr_period: u32,

    /// Chronological daily candles
    pub candles: &'a [Candle],

    /// Entry price, normally from a live quote
    pub current_price: Option<Decimal>,
}

/// Why no size could be computed. These are expected states, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Precondition {
    /// Account total not loaded yet, or zero
    NonPositiveAsset,
    /// No usable current price
    MissingPrice,
    NonPositivePrice,
    /// Every true range in the window was zero
    ZeroVolatility,
    /// Inputs too large for the share count or investment to be represented
    Overflow,
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositiveAsset => write!(f, "total asset is not available"),
            Self::MissingPrice => write!(f, "current price is not available"),
            Self::NonPositivePrice => write!(f, "current price is not positive"),
            Self::ZeroVolatility => write!(f, "price history shows no volatility"),
            Self::Overflow => write!(f, "position size is out of range"),
        }
    }
}

/// Average true range over the trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AtrEstimate {
    pub value: Decimal,

    /// True-range samples averaged (at most `atr_period`)
    pub samples: usize,

    /// Set when there were no samples and the configured fallback was used
    pub fallback: bool,
}

/// A computed recommendation with the inputs that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionSize {
    pub atr: AtrEstimate,

    /// Shares to buy
    pub quantity: u64,

    /// `current_price - stop_multiplier * atr`, unrounded
    pub stop_loss: Decimal,

    /// `stop_loss` floored onto the exchange tick grid
    pub stop_loss_tick: Decimal,

    pub total_investment: Decimal,

    /// `total_investment / total_asset`
    pub investment_ratio: Decimal,

    /// Quantity was reduced to respect `max_investment_ratio`
    pub capped: bool,

    // Echoed inputs
    pub total_asset: i64,
    pub risk_ratio: Decimal,
    pub risk_amount: Decimal,
    pub atr_period: u32,
    pub current_price: Decimal,
}

/// Outcome of a sizing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SizingOutcome {
    Sized(PositionSize),
    NoResult(Precondition),
}

impl SizingOutcome {
    pub fn size(&self) -> Option<&PositionSize> {
        match self {
            Self::Sized(size) => Some(size),
            Self::NoResult(_) => None,
        }
    }

    pub fn is_sized(&self) -> bool {
        matches!(self, Self::Sized(_))
    }
}

/// Stateless calculator; the same input always yields the same outcome.
#[derive(Debug, Clone, Default)]
pub struct PositionSizer {
    config: SizingConfig,
}

impl PositionSizer {
    pub fn new(config: SizingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SizingConfig {
        &self.config
    }

    /// Average of the true ranges of the last `atr_period + 1` candles.
    ///
    /// The oldest candle of the window only provides the previous close for
    /// the next one. With fewer than two candles there is no sample and the
    /// configured fallback ATR is returned with `fallback` set.
    pub fn average_true_range(&self, candles: &[Candle], atr_period: u32) -> AtrEstimate {
        let window_len = (atr_period as usize).saturating_add(1);
        let window = &candles[candles.len().saturating_sub(window_len)..];

        let ranges: Vec<Decimal> = window
            .windows(2)
            .map(|pair| pair[1].true_range(pair[0].close))
            .collect();

        if ranges.is_empty() {
            return AtrEstimate {
                value: self.config.fallback_atr,
                samples: 0,
                fallback: true,
            };
        }

        let sum: Decimal = ranges.iter().copied().sum();
        AtrEstimate {
            value: sum / Decimal::from(ranges.len()),
            samples: ranges.len(),
            fallback: false,
        }
    }

    /// Recommend an order size.
    pub fn calculate(&self, input: &SizingInput<'_>) -> SizingOutcome {
        if input.total_asset <= 0 {
            return SizingOutcome::NoResult(Precondition::NonPositiveAsset);
        }
        let Some(current_price) = input.current_price else {
            return SizingOutcome::NoResult(Precondition::MissingPrice);
        };
        if current_price <= Decimal::ZERO {
            return SizingOutcome::NoResult(Precondition::NonPositivePrice);
        }

        let atr = self.average_true_range(input.candles, input.atr_period);
        match self.size(input, current_price, atr) {
            Ok(size) => SizingOutcome::Sized(size),
            Err(precondition) => SizingOutcome::NoResult(precondition),
        }
    }

    /// Sizing arithmetic once the inputs are known to be present and positive.
    fn size(
        &self,
        input: &SizingInput<'_>,
        current_price: Decimal,
        atr: AtrEstimate,
    ) -> Result<PositionSize, Precondition> {
        let total_asset = Decimal::from(input.total_asset);
        let risk_ratio = input.max_loss_ratio.abs();
        let risk_amount = checked(total_asset.checked_mul(risk_ratio))?;
        let stop_distance = checked(self.config.stop_multiplier.checked_mul(atr.value))?;

        if stop_distance <= Decimal::ZERO {
            return Err(Precondition::ZeroVolatility);
        }
        let mut quantity = floor_quantity(checked(risk_amount.checked_div(stop_distance))?)?;
        let mut capped = false;

        if let Some(cap) = self.config.max_investment_ratio {
            let ratio = checked(Decimal::from(quantity).checked_mul(current_price))? / total_asset;
            if ratio > cap {
                let affordable = checked(
                    total_asset
                        .checked_mul(cap)
                        .and_then(|budget| budget.checked_div(current_price)),
                )?;
                quantity = floor_quantity(affordable)?;
                capped = true;
            }
        }

        let stop_loss = current_price - stop_distance;
        let total_investment = checked(Decimal::from(quantity).checked_mul(current_price))?;
        let investment_ratio = total_investment / total_asset;

        Ok(PositionSize {
            atr,
            quantity,
            stop_loss,
            stop_loss_tick: snap_to_tick(stop_loss, TickRounding::Floor),
            total_investment,
            investment_ratio,
            capped,
            total_asset: input.total_asset,
            risk_ratio,
            risk_amount,
            atr_period: input.atr_period,
            current_price,
        })
    }
}

fn checked(value: Option<Decimal>) -> Result<Decimal, Precondition> {
    value.ok_or(Precondition::Overflow)
}

/// Floor a share count. Negative values clamp to zero; counts past `u64`
/// are out of range.
fn floor_quantity(value: Decimal) -> Result<u64, Precondition> {
    if value <= Decimal::ZERO {
        return Ok(0);
    }
    value.floor().to_u64().ok_or(Precondition::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle(high: Decimal, low: Decimal, close: Decimal) -> Candle {
        Candle {
            date: "2025-05-23".to_string(),
            open: close,
            high,
            low,
            close,
            volume: dec!(1000),
        }
    }

    fn three_day_series() -> Vec<Candle> {
        vec![
            candle(dec!(10), dec!(8), dec!(9)),
            candle(dec!(11), dec!(9), dec!(10)),
            candle(dec!(12), dec!(10), dec!(11)),
        ]
    }

    fn input(total_asset: i64, candles: &[Candle], price: Option<Decimal>) -> SizingInput<'_> {
        SizingInput {
            total_asset,
            max_loss_ratio: dec!(-0.01),
            atr_period: 2,
            candles,
            current_price: price,
        }
    }

    #[test]
    fn test_atr_over_window() {
        let sizer = PositionSizer::default();
        let atr = sizer.average_true_range(&three_day_series(), 2);

        assert_eq!(atr.value, dec!(2));
        assert_eq!(atr.samples, 2);
        assert!(!atr.fallback);
    }

    #[test]
    fn test_atr_uses_only_trailing_window() {
        let mut series = vec![candle(dec!(1000), dec!(1), dec!(500))];
        series.extend(three_day_series());

        let atr = PositionSizer::default().average_true_range(&series, 2);

        // The wide first bar falls outside period + 1 candles.
        assert_eq!(atr.value, dec!(2));
    }

    #[test]
    fn test_short_history_degrades() {
        let sizer = PositionSizer::default();
        let series = three_day_series();

        let atr = sizer.average_true_range(&series, 20);
        assert_eq!(atr.samples, 2);
        assert_eq!(atr.value, dec!(2));

        let atr = sizer.average_true_range(&series[..1], 20);
        assert!(atr.fallback);
        assert_eq!(atr.value, dec!(1000));

        let atr = sizer.average_true_range(&[], 20);
        assert!(atr.fallback);
    }

    #[test]
    fn test_quantity_floor() {
        let sizer = PositionSizer::default();
        let series = three_day_series();

        let outcome = sizer.calculate(&input(1_000_000, &series, Some(dec!(11))));
        let size = outcome.size().unwrap();

        assert_eq!(size.risk_amount, dec!(10000));
        assert_eq!(size.quantity, 2500);
        assert_eq!(size.stop_loss, dec!(7));
        assert_eq!(size.total_investment, dec!(27500));
        assert_eq!(size.investment_ratio, dec!(0.0275));
        assert_eq!(size.risk_ratio, dec!(0.01));
        assert!(!size.capped);
    }

    #[test]
    fn test_quantity_rounds_down() {
        let sizer = PositionSizer::default();
        let series = three_day_series();

        // 10_003 / 4 = 2500.75
        let outcome = sizer.calculate(&input(1_000_300, &series, Some(dec!(11))));
        assert_eq!(outcome.size().unwrap().quantity, 2500);
    }

    #[test]
    fn test_zero_asset_is_no_result() {
        let sizer = PositionSizer::default();
        let series = three_day_series();

        assert_eq!(
            sizer.calculate(&input(0, &series, Some(dec!(11)))),
            SizingOutcome::NoResult(Precondition::NonPositiveAsset)
        );
        assert_eq!(
            sizer.calculate(&input(-5, &series, Some(dec!(11)))),
            SizingOutcome::NoResult(Precondition::NonPositiveAsset)
        );
    }

    #[test]
    fn test_missing_price_is_no_result() {
        let sizer = PositionSizer::default();
        let series = three_day_series();

        assert_eq!(
            sizer.calculate(&input(1_000_000, &series, None)),
            SizingOutcome::NoResult(Precondition::MissingPrice)
        );
        assert_eq!(
            sizer.calculate(&input(1_000_000, &series, Some(dec!(0)))),
            SizingOutcome::NoResult(Precondition::NonPositivePrice)
        );
    }

    #[test]
    fn test_fallback_atr_drives_quantity() {
        let sizer = PositionSizer::default();
        let series = vec![candle(dec!(70500), dec!(69500), dec!(70000))];

        let outcome = sizer.calculate(&input(10_000_000, &series, Some(dec!(70000))));
        let size = outcome.size().unwrap();

        assert!(size.atr.fallback);
        assert_eq!(size.atr.value, dec!(1000));
        // 100_000 / 2_000
        assert_eq!(size.quantity, 50);
        assert_eq!(size.stop_loss, dec!(68000));
    }

    #[test]
    fn test_flat_history_is_no_result() {
        let sizer = PositionSizer::default();
        let flat = vec![candle(dec!(5), dec!(5), dec!(5)); 4];

        assert_eq!(
            sizer.calculate(&input(1_000_000, &flat, Some(dec!(5)))),
            SizingOutcome::NoResult(Precondition::ZeroVolatility)
        );
    }

    #[test]
    fn test_share_count_past_u64_is_no_result() {
        let sizer = PositionSizer::default();
        let tight = vec![
            candle(dec!(1), dec!(1), dec!(1)),
            candle(dec!(1.0000001), dec!(1), dec!(1)),
        ];

        // 9.2e16 at risk over a 2e-7 stop
        assert_eq!(
            sizer.calculate(&input(i64::MAX, &tight, Some(dec!(1)))),
            SizingOutcome::NoResult(Precondition::Overflow)
        );
    }

    #[test]
    fn test_investment_past_decimal_range_is_no_result() {
        let sizer = PositionSizer::default();
        let series = vec![
            candle(dec!(1), dec!(1), dec!(1)),
            candle(dec!(1.005), dec!(1), dec!(1)),
        ];

        // About 9.2e18 shares fit in u64, but not at 1e11 each.
        let outcome = sizer.calculate(&input(i64::MAX, &series, Some(dec!(100000000000))));
        assert_eq!(outcome, SizingOutcome::NoResult(Precondition::Overflow));

        let capped = PositionSizer::new(SizingConfig::default().with_investment_cap(dec!(0.8)));
        assert_eq!(
            capped.calculate(&input(i64::MAX, &series, Some(dec!(100000000000)))),
            SizingOutcome::NoResult(Precondition::Overflow)
        );
    }

    #[test]
    fn test_stop_multiplier_is_configurable() {
        let sizer = PositionSizer::new(SizingConfig {
            stop_multiplier: dec!(1),
            ..Default::default()
        });
        let series = three_day_series();

        let size = sizer.calculate(&input(1_000_000, &series, Some(dec!(11))));
        assert_eq!(size.size().unwrap().quantity, 5000);
        assert_eq!(size.size().unwrap().stop_loss, dec!(9));
    }

    #[test]
    fn test_investment_cap() {
        let sizer = PositionSizer::new(SizingConfig::default().with_investment_cap(dec!(0.8)));
        let series = three_day_series();

        // Uncapped: 2500 shares * 1000 = 2.5M, 250% of assets.
        let outcome = sizer.calculate(&input(1_000_000, &series, Some(dec!(1000))));
        let size = outcome.size().unwrap();

        assert!(size.capped);
        assert_eq!(size.quantity, 800);
        assert_eq!(size.investment_ratio, dec!(0.8));
    }

    #[test]
    fn test_stop_loss_snaps_to_tick() {
        let sizer = PositionSizer::default();
        let series = vec![
            candle(dec!(70400), dec!(69600), dec!(70000)),
            candle(dec!(70530), dec!(69800), dec!(70100)),
        ];

        let outcome = sizer.calculate(&input(50_000_000, &series, Some(dec!(70100))));
        let size = outcome.size().unwrap();

        // ATR 730, stop 70100 - 1460 = 68640
        assert_eq!(size.stop_loss, dec!(68640));
        assert_eq!(size.stop_loss_tick, dec!(68600));
    }

    #[test]
    fn test_same_input_same_output() {
        let sizer = PositionSizer::default();
        let series = three_day_series();
        let input = input(1_000_000, &series, Some(dec!(11)));

        assert_eq!(sizer.calculate(&input), sizer.calculate(&input));
    }
}
