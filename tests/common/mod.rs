#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use quantseries::domain::error::MarketDataError;
use quantseries::domain::normalize::{KlineRow, RawBatch};
use quantseries::domain::ohlcv::{format_trade_date, parse_trade_date};
use quantseries::domain::request::RequestContext;
use quantseries::domain::trim::DateWindow;
use quantseries::ports::data_port::{DailyQuery, KlinePort, MarketDataPort, QueryRange};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Mutex;

const DAY_MS: i64 = 86_400_000;

/// Serves stored batches filtered to the queried dates and records every
/// daily query it receives.
pub struct MockMarketDataPort {
    pub daily: HashMap<String, RawBatch>,
    pub factors: HashMap<String, RawBatch>,
    pub factor_errors: HashMap<String, String>,
    pub queries: Mutex<Vec<DailyQuery>>,
}

impl MockMarketDataPort {
    pub fn new() -> Self {
        Self {
            daily: HashMap::new(),
            factors: HashMap::new(),
            factor_errors: HashMap::new(),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn with_daily(mut self, code: &str, batch: RawBatch) -> Self {
        self.daily.insert(code.to_string(), batch);
        self
    }

    pub fn with_factors(mut self, code: &str, batch: RawBatch) -> Self {
        self.factors.insert(code.to_string(), batch);
        self
    }

    pub fn with_factor_error(mut self, code: &str, reason: &str) -> Self {
        self.factor_errors
            .insert(code.to_string(), reason.to_string());
        self
    }

    pub fn recorded(&self) -> Vec<DailyQuery> {
        self.queries.lock().unwrap().clone()
    }
}

fn filter_batch(batch: &RawBatch, keep: impl Fn(NaiveDate) -> bool) -> RawBatch {
    let Some(idx) = batch.column("trade_date") else {
        return batch.clone();
    };
    let items = batch
        .items
        .iter()
        .filter(|row| {
            row.get(idx)
                .and_then(Value::as_str)
                .and_then(parse_trade_date)
                .is_some_and(&keep)
        })
        .cloned()
        .collect();
    RawBatch::new(batch.fields.clone(), items)
}

#[async_trait]
impl MarketDataPort for MockMarketDataPort {
    async fn fetch_daily(
        &self,
        _ctx: &RequestContext,
        query: &DailyQuery,
    ) -> Result<RawBatch, MarketDataError> {
        self.queries.lock().unwrap().push(query.clone());
        let Some(batch) = self.daily.get(&query.code) else {
            return Ok(RawBatch::default());
        };
        Ok(match query.range {
            QueryRange::Between(window) => filter_batch(batch, |d| window.contains(d)),
            QueryRange::OnDate(date) => filter_batch(batch, |d| d == date),
        })
    }

    async fn fetch_adj_factors(
        &self,
        _ctx: &RequestContext,
        code: &str,
        window: DateWindow,
    ) -> Result<RawBatch, MarketDataError> {
        if let Some(reason) = self.factor_errors.get(code) {
            return Err(MarketDataError::api("adj_factor", code, reason.clone()));
        }
        Ok(self
            .factors
            .get(code)
            .map(|b| filter_batch(b, |d| window.contains(d)))
            .unwrap_or_default())
    }
}

/// Serves bounded pages from a fixed kline list and counts calls.
pub struct MockKlinePort {
    pub rows: Vec<KlineRow>,
    pub calls: Mutex<Vec<(i64, i64, usize)>>,
}

impl MockKlinePort {
    pub fn new(rows: Vec<KlineRow>) -> Self {
        Self {
            rows,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl KlinePort for MockKlinePort {
    async fn fetch_klines(
        &self,
        _symbol: &str,
        start_ms: i64,
        end_ms: i64,
        limit: usize,
    ) -> Result<Vec<KlineRow>, MarketDataError> {
        self.calls.lock().unwrap().push((start_ms, end_ms, limit));
        Ok(self
            .rows
            .iter()
            .filter(|row| {
                row[0]
                    .as_i64()
                    .is_some_and(|t| t >= start_ms && t <= end_ms)
            })
            .take(limit)
            .cloned()
            .collect())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn equity_fields() -> Vec<String> {
    ["ts_code", "trade_date", "open", "high", "low", "close", "vol", "amount"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Equity batch with one row per `(date, close)`, newest first as the
/// upstream returns it.
pub fn equity_batch(code: &str, rows: &[(NaiveDate, f64)]) -> RawBatch {
    let mut items: Vec<Vec<Value>> = rows
        .iter()
        .map(|(d, close)| {
            vec![
                json!(code),
                json!(format_trade_date(*d)),
                json!(close - 0.5),
                json!(close + 1.0),
                json!(close - 1.0),
                json!(close),
                json!(1000.0),
                json!(close * 1000.0),
            ]
        })
        .collect();
    items.reverse();
    RawBatch::new(equity_fields(), items)
}

/// `count` consecutive daily bars from `start` with closes
/// `start_price, start_price + 1, ...`.
pub fn generate_batch(code: &str, start: NaiveDate, count: usize, start_price: f64) -> RawBatch {
    let rows: Vec<(NaiveDate, f64)> = (0..count)
        .map(|i| {
            (
                start + chrono::Duration::days(i as i64),
                start_price + i as f64,
            )
        })
        .collect();
    equity_batch(code, &rows)
}

pub fn factor_batch(rows: &[(NaiveDate, f64)]) -> RawBatch {
    RawBatch::new(
        vec!["trade_date".to_string(), "adj_factor".to_string()],
        rows.iter()
            .map(|(d, f)| vec![json!(format_trade_date(*d)), json!(f)])
            .collect(),
    )
}

/// One kline per UTC day from `start`, in Binance's positional layout.
pub fn generate_klines(start: NaiveDate, count: usize, start_price: f64) -> Vec<KlineRow> {
    let base = start.and_time(NaiveTime::MIN).and_utc().timestamp_millis();
    (0..count)
        .map(|i| {
            let open_ms = base + i as i64 * DAY_MS;
            let close = start_price + i as f64;
            vec![
                json!(open_ms),
                json!(format!("{:.2}", close - 0.5)),
                json!(format!("{:.2}", close + 1.0)),
                json!(format!("{:.2}", close - 1.0)),
                json!(format!("{:.2}", close)),
                json!("12.5"),
                json!(open_ms + DAY_MS - 1),
                json!("1000.0"),
                json!(42),
                json!("6.0"),
                json!("500.0"),
                json!("0"),
            ]
        })
        .collect()
}
