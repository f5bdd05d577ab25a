//! Buy order submission types.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::StoreError;

/// Order pricing type, serialized with the labels the backend matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrderType {
    #[serde(rename = "시장가")]
    Market,
    #[serde(rename = "지정가")]
    Limit,
}

/// Body of `POST /buy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderRequest {
    #[serde(rename = "stock_code")]
    pub code: String,

    /// Limit price; ignored by the backend for market orders
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,

    pub quantity: u64,

    pub order_type: OrderType,

    /// ATR the backend uses to place its protective stop
    #[serde(with = "rust_decimal::serde::float")]
    pub atr: Decimal,
}

impl OrderRequest {
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.code.trim().is_empty() {
            return Err(StoreError::InvalidRequest("order without stock code".to_string()));
        }
        if self.quantity == 0 {
            return Err(StoreError::InvalidRequest("quantity must be greater than 0".to_string()));
        }
        if self.order_type == OrderType::Limit && self.price <= Decimal::ZERO {
            return Err(StoreError::InvalidRequest(format!(
                "limit price must be positive, got {}",
                self.price
            )));
        }
        Ok(())
    }
}

/// Backend reply to an order. The message is for display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderReceipt {
    pub accepted: bool,
    pub message: String,
}
