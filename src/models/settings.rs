//! Betting settings mirrored from the backend.

use std::fmt;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::error::StoreError;

/// Which account the backend is currently trading against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Paper,
    Live,
}

impl TradingMode {
    pub fn from_flag(is_paper_trading: bool) -> Self {
        if is_paper_trading {
            Self::Paper
        } else {
            Self::Live
        }
    }

    pub fn is_paper(&self) -> bool {
        matches!(self, Self::Paper)
    }
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Paper => write!(f, "paper"),
            Self::Live => write!(f, "live"),
        }
    }
}

/// Process-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    /// Number of true-range samples averaged into the ATR (>= 1)
    pub atr_period: u32,

    /// Maximum loss per position as a fraction of total assets (e.g. -0.01)
    #[serde(with = "rust_decimal::serde::float")]
    pub max_loss_ratio: Decimal,

    /// Paper (simulated) account when true, live account otherwise
    pub is_paper_trading: bool,
}

impl Settings {
    pub fn mode(&self) -> TradingMode {
        TradingMode::from_flag(self.is_paper_trading)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            atr_period: 20,
            max_loss_ratio: dec!(-0.01),
            is_paper_trading: true,
        }
    }
}

/// A partial settings update, also the decoded form of `GET /settings`
/// since the backend may omit keys it has never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atr_period: Option<u32>,

    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub max_loss_ratio: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_paper_trading: Option<bool>,
}

impl SettingsPatch {
    /// Patch that only switches the trading mode.
    pub fn trading_mode(is_paper_trading: bool) -> Self {
        Self {
            is_paper_trading: Some(is_paper_trading),
            ..Default::default()
        }
    }

    /// Patch that only changes the betting parameters.
    pub fn betting(atr_period: u32, max_loss_ratio: Decimal) -> Self {
        Self {
            atr_period: Some(atr_period),
            max_loss_ratio: Some(max_loss_ratio),
            is_paper_trading: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.atr_period.is_none() && self.max_loss_ratio.is_none() && self.is_paper_trading.is_none()
    }

    /// Whether every field is present, i.e. the patch describes a whole
    /// settings object.
    pub fn is_full(&self) -> bool {
        self.atr_period.is_some() && self.max_loss_ratio.is_some() && self.is_paper_trading.is_some()
    }

    /// Apply onto `base`, keeping every field the patch does not carry.
    pub fn merge_into(&self, base: &Settings) -> Settings {
        Settings {
            atr_period: self.atr_period.unwrap_or(base.atr_period),
            max_loss_ratio: self.max_loss_ratio.unwrap_or(base.max_loss_ratio),
            is_paper_trading: self.is_paper_trading.unwrap_or(base.is_paper_trading),
        }
    }

    /// The mode this patch switches to, if it differs from `current`.
    pub fn mode_change(&self, current: &Settings) -> Option<TradingMode> {
        self.is_paper_trading
            .filter(|&paper| paper != current.is_paper_trading)
            .map(TradingMode::from_flag)
    }

    /// Reject values the backend would store but the calculator cannot use.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.is_empty() {
            return Err(StoreError::InvalidRequest("empty settings patch".to_string()));
        }
        if let Some(period) = self.atr_period {
            if period < 1 {
                return Err(StoreError::InvalidRequest(format!(
                    "atr_period must be >= 1, got {}",
                    period
                )));
            }
        }
        if let Some(ratio) = self.max_loss_ratio {
            if ratio.is_zero() || ratio.abs() >= Decimal::ONE {
                return Err(StoreError::InvalidRequest(format!(
                    "max_loss_ratio must be a non-zero fraction, got {}",
                    ratio
                )));
            }
        }
        Ok(())
    }
}

impl From<Settings> for SettingsPatch {
    fn from(s: Settings) -> Self {
        Self {
            atr_period: Some(s.atr_period),
            max_loss_ratio: Some(s.max_loss_ratio),
            is_paper_trading: Some(s.is_paper_trading),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_patch_keeps_betting_parameters() {
        let base = Settings {
            atr_period: 14,
            max_loss_ratio: dec!(-0.02),
            is_paper_trading: false,
        };

        let merged = SettingsPatch::trading_mode(true).merge_into(&base);

        assert_eq!(merged.atr_period, 14);
        assert_eq!(merged.max_loss_ratio, dec!(-0.02));
        assert!(merged.is_paper_trading);
    }

    #[test]
    fn test_mode_change_only_when_flag_differs() {
        let base = Settings::default();
        assert_eq!(SettingsPatch::trading_mode(true).mode_change(&base), None);
        assert_eq!(
            SettingsPatch::trading_mode(false).mode_change(&base),
            Some(TradingMode::Live)
        );
        assert_eq!(SettingsPatch::betting(5, dec!(-0.01)).mode_change(&base), None);
    }

    #[test]
    fn test_validate() {
        assert!(SettingsPatch::default().validate().is_err());
        assert!(SettingsPatch::betting(0, dec!(-0.01)).validate().is_err());
        assert!(SettingsPatch::betting(20, dec!(0)).validate().is_err());
        assert!(SettingsPatch::betting(20, dec!(-1.5)).validate().is_err());
        assert!(SettingsPatch::betting(20, dec!(-0.015)).validate().is_ok());
    }

    #[test]
    fn test_patch_serializes_only_present_fields() {
        let json = serde_json::to_value(SettingsPatch::trading_mode(false)).unwrap();
        assert_eq!(json, serde_json::json!({ "is_paper_trading": false }));
    }
}
