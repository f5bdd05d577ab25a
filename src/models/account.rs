//! Account totals derived from the backend's asset summary.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::DecodeError;
use crate::models::TradingMode;

/// Summary label carrying the total evaluation amount.
pub const TOTAL_EVALUATION_KEY: &str = "총평가금액";

/// Labeled totals as delivered by `GET /total_asset/summary`.
pub type AccountSummary = HashMap<String, String>;

/// Total asset value of the account in the mode it was loaded under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccountTotal {
    /// Total evaluation amount in whole currency units
    pub total_asset_value: i64,

    /// Trading mode the store was in when the request was issued
    pub mode: TradingMode,

    /// When the value was applied to the store
    pub loaded_at: DateTime<Utc>,
}

/// Parse a thousands-separated integer amount such as `"12,345,678"`.
///
/// A fractional part is accepted only when it is zero (`"1000.00"`).
pub fn parse_amount(raw: &str) -> Option<i64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '_' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(v) = cleaned.parse::<i64>() {
        return Some(v);
    }
    let d: Decimal = cleaned.parse().ok()?;
    if !d.fract().is_zero() {
        return None;
    }
    i64::try_from(d.trunc()).ok()
}

/// Extract the total evaluation amount from a summary payload.
///
/// An unparseable value is reported with the literal string preserved.
pub fn total_from_summary(summary: &AccountSummary) -> Result<i64, DecodeError> {
    let raw = summary
        .get(TOTAL_EVALUATION_KEY)
        .ok_or_else(|| DecodeError::missing(TOTAL_EVALUATION_KEY))?;
    parse_amount(raw).ok_or_else(|| DecodeError::invalid(TOTAL_EVALUATION_KEY, raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("12,345,678"), Some(12_345_678));
        assert_eq!(parse_amount(" 1000 "), Some(1000));
        assert_eq!(parse_amount("-5,000"), Some(-5000));
        assert_eq!(parse_amount("1,000.00"), Some(1000));
        assert_eq!(parse_amount("1,000.50"), None);
        assert_eq!(parse_amount("None"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn test_total_from_summary_preserves_literal() {
        let mut summary = AccountSummary::new();
        assert_eq!(
            total_from_summary(&summary),
            Err(DecodeError::missing(TOTAL_EVALUATION_KEY))
        );

        summary.insert(TOTAL_EVALUATION_KEY.to_string(), "None".to_string());
        assert_eq!(
            total_from_summary(&summary),
            Err(DecodeError::invalid(TOTAL_EVALUATION_KEY, "None"))
        );

        summary.insert(TOTAL_EVALUATION_KEY.to_string(), "9,876,543".to_string());
        assert_eq!(total_from_summary(&summary), Ok(9_876_543));
    }
}
