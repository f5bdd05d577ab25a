//! Strict decoding of backend JSON bodies into domain types.
//!
//! The backend mixes JSON numbers and numeric strings (the broker API passes
//! strings through), so numeric fields accept both. A key that is absent or
//! `null` is reported as [`DecodeError::MissingField`]; a key present with an
//! unusable value is reported as [`DecodeError::InvalidField`] carrying the
//! literal value.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::DecodeError;
use crate::models::{AccountSummary, Candle, CandleBatch, Holding, InstrumentSummary, Quote, SettingsPatch};

type Object = Map<String, Value>;

fn object<'a>(value: &'a Value, expected: &'static str) -> Result<&'a Object, DecodeError> {
    value.as_object().ok_or(DecodeError::Shape { expected })
}

fn array<'a>(value: &'a Value, expected: &'static str) -> Result<&'a Vec<Value>, DecodeError> {
    value.as_array().ok_or(DecodeError::Shape { expected })
}

/// Literal form of a value for error reports; strings without quotes.
fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn present<'a>(obj: &'a Object, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

/// Numeric JSON value or numeric string, thousands separators allowed.
fn as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            Decimal::from_str(&cleaned).ok()
        }
        _ => None,
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    let d = as_decimal(value)?;
    if !d.fract().is_zero() {
        return None;
    }
    i64::try_from(d).ok()
}

fn required_decimal(obj: &Object, key: &str, path: &str) -> Result<Decimal, DecodeError> {
    let value = present(obj, key).ok_or_else(|| DecodeError::missing(path))?;
    as_decimal(value).ok_or_else(|| DecodeError::invalid(path, literal(value)))
}

fn optional_decimal(obj: &Object, key: &str, path: &str) -> Result<Option<Decimal>, DecodeError> {
    match present(obj, key) {
        None => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(value) => as_decimal(value)
            .map(Some)
            .ok_or_else(|| DecodeError::invalid(path, literal(value))),
    }
}

fn optional_integer(obj: &Object, key: &str, path: &str) -> Result<Option<i64>, DecodeError> {
    match present(obj, key) {
        None => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(value) => as_integer(value)
            .map(Some)
            .ok_or_else(|| DecodeError::invalid(path, literal(value))),
    }
}

fn required_string(obj: &Object, key: &str, path: &str) -> Result<String, DecodeError> {
    let value = present(obj, key).ok_or_else(|| DecodeError::missing(path))?;
    match value {
        Value::String(s) if !s.trim().is_empty() => Ok(s.clone()),
        other => Err(DecodeError::invalid(path, literal(other))),
    }
}

/// `GET /settings`. Every key is optional; present keys must be valid.
pub fn settings(body: &Value) -> Result<SettingsPatch, DecodeError> {
    let obj = object(body, "settings object")?;

    let atr_period = match present(obj, "atr_period") {
        None => None,
        Some(value) => {
            let period = as_integer(value)
                .filter(|p| *p >= 1)
                .and_then(|p| u32::try_from(p).ok())
                .ok_or_else(|| DecodeError::invalid("atr_period", literal(value)))?;
            Some(period)
        }
    };

    let max_loss_ratio = match present(obj, "max_loss_ratio") {
        None => None,
        Some(value) => {
            let ratio = as_decimal(value)
                .filter(|r| !r.is_zero() && r.abs() < Decimal::ONE)
                .ok_or_else(|| DecodeError::invalid("max_loss_ratio", literal(value)))?;
            Some(ratio)
        }
    };

    let is_paper_trading = match present(obj, "is_paper_trading") {
        None => None,
        Some(Value::Bool(b)) => Some(*b),
        Some(other) => return Err(DecodeError::invalid("is_paper_trading", literal(other))),
    };

    Ok(SettingsPatch {
        atr_period,
        max_loss_ratio,
        is_paper_trading,
    })
}

/// `GET /watchlist`: `{"watchlist": [code, ...]}`.
pub fn watchlist(body: &Value) -> Result<Vec<String>, DecodeError> {
    let obj = object(body, "watchlist object")?;
    let list = present(obj, "watchlist").ok_or_else(|| DecodeError::missing("watchlist"))?;
    let items = list
        .as_array()
        .ok_or_else(|| DecodeError::invalid("watchlist", literal(list)))?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::String(code) if !code.trim().is_empty() => Ok(code.trim().to_string()),
            other => Err(DecodeError::invalid(format!("watchlist[{}]", i), literal(other))),
        })
        .collect()
}

/// `GET /high52`: array of `{Code, Name, CurrentPrice, High52Week, Ratio}`.
pub fn directory(body: &Value) -> Result<Vec<InstrumentSummary>, DecodeError> {
    let rows = array(body, "instrument list")?;

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let obj = object(row, "instrument object")?;
            let path = |key: &str| format!("[{}].{}", i, key);
            Ok(InstrumentSummary {
                code: required_string(obj, "Code", &path("Code"))?,
                name: required_string(obj, "Name", &path("Name"))?,
                current_price: required_decimal(obj, "CurrentPrice", &path("CurrentPrice"))?,
                high_52_week: required_decimal(obj, "High52Week", &path("High52Week"))?,
                ratio: required_decimal(obj, "Ratio", &path("Ratio"))?,
            })
        })
        .collect()
}

/// `GET /stockname`: `{code, name}`.
pub fn name(body: &Value) -> Result<String, DecodeError> {
    let obj = object(body, "name object")?;
    required_string(obj, "name", "name")
}

/// `GET /total_asset/summary`: labels mapped to stringified amounts.
pub fn account_summary(body: &Value) -> Result<AccountSummary, DecodeError> {
    let obj = object(body, "summary object")?;
    obj.iter()
        .map(|(label, value)| match value {
            Value::String(s) => Ok((label.clone(), s.clone())),
            Value::Number(n) => Ok((label.clone(), n.to_string())),
            other => Err(DecodeError::invalid(label.clone(), literal(other))),
        })
        .collect()
}

/// One candle row, or `None` when it must be discarded.
fn candle_row(row: &Value) -> Option<Candle> {
    let obj = row.as_object()?;

    let date = present(obj, "date")?.as_str()?.trim().to_string();
    if !date.contains('-') {
        return None;
    }

    let price = |key: &str| present(obj, key).and_then(as_decimal).filter(|p| *p > Decimal::ZERO);
    let candle = Candle {
        date,
        open: price("open")?,
        high: price("high")?,
        low: price("low")?,
        close: price("close")?,
        volume: present(obj, "volume")
            .and_then(as_decimal)
            .filter(|v| *v >= Decimal::ZERO)?,
    };

    (candle.high >= candle.low).then_some(candle)
}

/// `GET /candle`: `{"candles": [...]}`.
///
/// Malformed rows are dropped and counted instead of failing the batch. The
/// result is sorted by date since the broker returns newest-first.
pub fn candles(body: &Value) -> Result<CandleBatch, DecodeError> {
    let obj = object(body, "candle object")?;
    let list = present(obj, "candles").ok_or_else(|| DecodeError::missing("candles"))?;
    let rows = list
        .as_array()
        .ok_or_else(|| DecodeError::invalid("candles", literal(list)))?;

    let mut batch = CandleBatch::default();
    for row in rows {
        match candle_row(row) {
            Some(candle) => batch.candles.push(candle),
            None => {
                debug!(row = %row, "Discarding malformed candle row");
                batch.discarded += 1;
            }
        }
    }
    batch.candles.sort_by(|a, b| a.date.cmp(&b.date));

    Ok(batch)
}

/// `GET /price`. Unusable prices decode to `None`; whether that matters is
/// decided by whoever needs the price.
pub fn quote(code: &str, body: &Value) -> Result<Quote, DecodeError> {
    let obj = object(body, "quote object")?;
    let price = |key: &str| present(obj, key).and_then(as_decimal);

    Ok(Quote {
        code: code.to_string(),
        name: present(obj, "name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        current_price: price("stck_prpr"),
        open: price("stck_oprc"),
        high: price("stck_hgpr"),
        low: price("stck_lwpr"),
        change: price("prdy_vrss"),
        change_rate: price("prdy_ctrt"),
        volume: price("acml_vol"),
        high_52_week: price("w52_hgpr"),
        low_52_week: price("w52_lwpr"),
    })
}

/// `GET /holdings`: array of held positions.
pub fn holdings(body: &Value) -> Result<Vec<Holding>, DecodeError> {
    let rows = array(body, "holdings list")?;

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let obj = object(row, "holding object")?;
            let path = |key: &str| format!("[{}].{}", i, key);
            let quantity = optional_integer(obj, "quantity", &path("quantity"))?
                .ok_or_else(|| DecodeError::missing(path("quantity")))?;
            Ok(Holding {
                code: required_string(obj, "code", &path("code"))?,
                name: required_string(obj, "name", &path("name"))?,
                quantity,
                available_quantity: optional_integer(obj, "available_quantity", &path("available_quantity"))?,
                avg_price: optional_decimal(obj, "avg_price", &path("avg_price"))?,
                current_price: optional_decimal(obj, "current_price", &path("current_price"))?,
                evaluation_amount: optional_integer(obj, "evaluation_amount", &path("evaluation_amount"))?,
                profit_loss: optional_integer(obj, "profit_loss", &path("profit_loss"))?,
                profit_loss_rate: optional_decimal(obj, "profit_loss_rate", &path("profit_loss_rate"))?,
            })
        })
        .collect()
}

/// Human-readable text of a mutation reply, preferring `error` over `message`.
pub fn reply_message(body: &Value) -> Option<String> {
    let obj = body.as_object()?;
    ["error", "message"]
        .iter()
        .find_map(|key| present(obj, key).map(literal))
}

/// Whether a 2xx reply body explicitly confirms the mutation.
pub fn is_confirmation(body: &Value) -> bool {
    let Some(obj) = body.as_object() else {
        return false;
    };
    if present(obj, "error").is_some() {
        return false;
    }
    match present(obj, "success") {
        Some(Value::Bool(ok)) => *ok,
        Some(_) => false,
        None => present(obj, "message").is_some(),
    }
}
