//! Raw upstream payloads mapped onto the canonical [`TimeSeries`].
//!
//! Three shapes come in:
//! - equity-like batches with `open/high/low/close/vol/amount` columns, plus
//!   the extra columns futures, options, convertible bonds and repo report
//! - FX batches with separate `bid_*` and `ask_*` columns
//! - crypto klines, fixed-position arrays keyed by open time in milliseconds
//!
//! Every mapping returns a `NewestFirst` series.

use crate::domain::market::{MarketType, Schema};
use crate::domain::ohlcv::{
    Direction, MarketExtras, Ohlc, PricePoint, SeriesError, TimeSeries, TwoSidedQuote,
    parse_trade_date,
};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// One kline as delivered upstream:
/// `[openTime, open, high, low, close, volume, closeTime, ...]`.
pub type KlineRow = Vec<Value>;

/// Columnar batch: a header of field names and rows of values in that order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawBatch {
    pub fields: Vec<String>,
    #[serde(default)]
    pub items: Vec<Vec<Value>>,
}

impl RawBatch {
    pub fn new(fields: Vec<String>, items: Vec<Vec<Value>>) -> Self {
        Self { fields, items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }

    fn require_column(&self, name: &str) -> Result<usize, NormalizeError> {
        self.column(name)
            .ok_or_else(|| NormalizeError::MissingColumn(name.to_string()))
    }
}

/// Raw payload for one market request.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    Batch(RawBatch),
    Klines(Vec<KlineRow>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error("missing column '{0}'")]
    MissingColumn(String),

    #[error("row {row}: invalid trade date '{value}'")]
    InvalidDate { row: usize, value: String },

    #[error("kline {row}: {reason}")]
    MalformedKline { row: usize, reason: String },

    #[error("payload shape does not match the {0:?} schema")]
    SchemaMismatch(Schema),

    #[error(transparent)]
    Series(#[from] SeriesError),
}

/// Read a cell as a number. Upstreams send numbers as JSON numbers or as
/// numeric strings; blanks, nulls and non-finite values are absent.
pub fn lenient_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn cell(row: &[Value], idx: Option<usize>) -> Option<f64> {
    idx.and_then(|i| row.get(i)).and_then(lenient_number)
}

fn text_cell(row: &[Value], idx: Option<usize>) -> Option<String> {
    match idx.and_then(|i| row.get(i))? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Market-specific columns of one row. `None` for markets without extras.
fn market_extras(market: MarketType, batch: &RawBatch, row: &[Value]) -> Option<MarketExtras> {
    let num = |name: &str| cell(row, batch.column(name));
    let text = |name: &str| text_cell(row, batch.column(name));
    let extras = match market {
        MarketType::Futures => MarketExtras::Futures {
            settle: num("settle"),
            change1: num("change1"),
            change2: num("change2"),
            oi: num("oi"),
        },
        MarketType::Options => MarketExtras::Options {
            exchange: text("exchange"),
            pre_settle: num("pre_settle"),
            pre_close: num("pre_close"),
            settle: num("settle"),
            oi: num("oi"),
        },
        MarketType::ConvertibleBond => MarketExtras::ConvertibleBond {
            change: num("change"),
            pct_chg: num("pct_chg"),
            bond_value: num("bond_value"),
            bond_over_rate: num("bond_over_rate"),
            cb_value: num("cb_value"),
            cb_over_rate: num("cb_over_rate"),
        },
        MarketType::Repo => MarketExtras::Repo {
            name: text("name"),
            rate: num("rate"),
        },
        _ => return None,
    };
    Some(extras)
}

fn trade_date(row: &[Value], idx: usize, row_no: usize) -> Result<NaiveDate, NormalizeError> {
    let raw = match row.get(idx) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    parse_trade_date(&raw).ok_or(NormalizeError::InvalidDate {
        row: row_no,
        value: raw,
    })
}

/// Map an equity-like batch (`trade_date, open, high, low, close, vol, amount`)
/// and the extra columns `market` reports.
pub fn normalize_equity(batch: &RawBatch, market: MarketType) -> Result<TimeSeries, NormalizeError> {
    let date_idx = batch.require_column("trade_date")?;
    let open = batch.column("open");
    let high = batch.column("high");
    let low = batch.column("low");
    let close = batch.column("close");
    let vol = batch.column("vol");
    let amount = batch.column("amount");

    let mut points = Vec::with_capacity(batch.items.len());
    for (row_no, row) in batch.items.iter().enumerate() {
        let mut point = PricePoint::new(trade_date(row, date_idx, row_no)?);
        point.open = cell(row, open);
        point.high = cell(row, high);
        point.low = cell(row, low);
        point.close = cell(row, close);
        point.volume = cell(row, vol);
        point.amount = cell(row, amount);
        point.extras = market_extras(market, batch, row);
        points.push(point);
    }
    Ok(TimeSeries::from_unordered(points, Direction::NewestFirst)?)
}

fn mid(bid: Option<f64>, ask: Option<f64>) -> Option<f64> {
    match (bid, ask) {
        (Some(b), Some(a)) => Some((b + a) / 2.0),
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    }
}

/// Map an FX batch. Prices are the bid/ask mid, falling back to whichever
/// side is present; the raw quote stays on the point.
pub fn normalize_fx(batch: &RawBatch) -> Result<TimeSeries, NormalizeError> {
    let date_idx = batch.require_column("trade_date")?;
    let side = |prefix: &str| {
        [
            batch.column(&format!("{prefix}_open")),
            batch.column(&format!("{prefix}_high")),
            batch.column(&format!("{prefix}_low")),
            batch.column(&format!("{prefix}_close")),
        ]
    };
    let bid_cols = side("bid");
    let ask_cols = side("ask");
    let tick_qty = batch.column("tick_qty");

    let read_side = |row: &[Value], cols: &[Option<usize>; 4]| Ohlc {
        open: cell(row, cols[0]),
        high: cell(row, cols[1]),
        low: cell(row, cols[2]),
        close: cell(row, cols[3]),
    };

    let mut points = Vec::with_capacity(batch.items.len());
    for (row_no, row) in batch.items.iter().enumerate() {
        let bid = read_side(row, &bid_cols);
        let ask = read_side(row, &ask_cols);

        let mut point = PricePoint::new(trade_date(row, date_idx, row_no)?);
        point.open = mid(bid.open, ask.open);
        point.high = mid(bid.high, ask.high);
        point.low = mid(bid.low, ask.low);
        point.close = mid(bid.close, ask.close);
        point.volume = cell(row, tick_qty);
        point.quote = Some(TwoSidedQuote { bid, ask });
        points.push(point);
    }
    Ok(TimeSeries::from_unordered(points, Direction::NewestFirst)?)
}

/// Open time of a kline in milliseconds since the epoch.
pub fn kline_open_time(row: &[Value]) -> Option<i64> {
    match row.first()? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Map klines to daily points on the UTC calendar day of their open time.
/// When two klines land on the same day, the first one wins.
pub fn normalize_klines(rows: &[KlineRow]) -> Result<TimeSeries, NormalizeError> {
    let mut seen = HashSet::new();
    let mut points = Vec::with_capacity(rows.len());

    for (row_no, row) in rows.iter().enumerate() {
        if row.len() < 6 {
            return Err(NormalizeError::MalformedKline {
                row: row_no,
                reason: format!("expected at least 6 fields, found {}", row.len()),
            });
        }
        let open_ms = kline_open_time(row).ok_or_else(|| NormalizeError::MalformedKline {
            row: row_no,
            reason: format!("invalid open time {}", row[0]),
        })?;
        let date = DateTime::from_timestamp_millis(open_ms)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| NormalizeError::MalformedKline {
                row: row_no,
                reason: format!("open time {} out of range", open_ms),
            })?;
        if !seen.insert(date) {
            continue;
        }

        let mut point = PricePoint::new(date);
        point.open = lenient_number(&row[1]);
        point.high = lenient_number(&row[2]);
        point.low = lenient_number(&row[3]);
        point.close = lenient_number(&row[4]);
        point.volume = lenient_number(&row[5]);
        points.push(point);
    }
    Ok(TimeSeries::from_unordered(points, Direction::NewestFirst)?)
}

/// Dispatch a payload to the mapping for the schema `market` speaks.
pub fn normalize(market: MarketType, payload: &RawPayload) -> Result<TimeSeries, NormalizeError> {
    match (market.schema(), payload) {
        (Schema::Equity, RawPayload::Batch(batch)) => normalize_equity(batch, market),
        (Schema::TwoSided, RawPayload::Batch(batch)) => normalize_fx(batch),
        (Schema::Kline, RawPayload::Klines(rows)) => normalize_klines(rows),
        (schema, _) => Err(NormalizeError::SchemaMismatch(schema)),
    }
}
