//! Positions currently held in the account.

use rust_decimal::Decimal;
use serde::Serialize;

/// One held instrument from `GET /holdings`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Holding {
    pub code: String,
    pub name: String,
    pub quantity: i64,
    pub available_quantity: Option<i64>,
    pub avg_price: Option<Decimal>,
    pub current_price: Option<Decimal>,
    pub evaluation_amount: Option<i64>,
    pub profit_loss: Option<i64>,
    pub profit_loss_rate: Option<Decimal>,
}

impl Holding {
    pub fn is_profitable(&self) -> bool {
        self.profit_loss.unwrap_or(0) >= 0
    }
}
