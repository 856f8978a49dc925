//! Offline CSV data adapter.
//!
//! Reads the same columnar batches the HTTP upstreams return, one file per
//! code and market under a base directory:
//! - `{code}_{market}.csv` daily bars, header row = field names
//! - `{code}_adj_factor.csv` adjustment factors (`trade_date,adj_factor`)
//! - `{symbol}_crypto.csv` klines, first column the open time in ms

use crate::domain::error::MarketDataError;
use crate::domain::normalize::{KlineRow, RawBatch, kline_open_time};
use crate::domain::ohlcv::parse_trade_date;
use crate::domain::request::RequestContext;
use crate::domain::trim::DateWindow;
use crate::ports::data_port::{DailyQuery, KlinePort, MarketDataPort, QueryRange};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, code: &str, suffix: &str) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", code, suffix))
    }
}

fn csv_error(path: &Path, reason: impl std::fmt::Display) -> MarketDataError {
    MarketDataError::api("csv", &path.display().to_string(), reason.to_string())
}

/// Read a whole file as a batch. A missing file reads as an empty batch.
fn read_batch(path: &Path) -> Result<RawBatch, MarketDataError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no csv file");
            return Ok(RawBatch::default());
        }
        Err(e) => return Err(MarketDataError::Io(e)),
    };

    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let fields: Vec<String> = rdr
        .headers()
        .map_err(|e| csv_error(path, format!("CSV header error: {}", e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut items = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| csv_error(path, format!("CSV parse error: {}", e)))?;
        items.push(
            record
                .iter()
                .map(|cell| Value::String(cell.trim().to_string()))
                .collect(),
        );
    }
    Ok(RawBatch::new(fields, items))
}

/// Keep rows whose `trade_date` satisfies `keep`. Rows with an unreadable date
/// are kept so the normalizer reports them.
fn filter_by_date(mut batch: RawBatch, keep: impl Fn(NaiveDate) -> bool) -> RawBatch {
    let Some(idx) = batch.column("trade_date") else {
        return batch;
    };
    batch.items.retain(|row| {
        row.get(idx)
            .and_then(Value::as_str)
            .and_then(parse_trade_date)
            .is_none_or(&keep)
    });
    batch
}

#[async_trait]
impl MarketDataPort for CsvAdapter {
    async fn fetch_daily(
        &self,
        _ctx: &RequestContext,
        query: &DailyQuery,
    ) -> Result<RawBatch, MarketDataError> {
        let path = self.csv_path(&query.code, query.market.as_str());
        let batch = read_batch(&path)?;
        let batch = match query.range {
            QueryRange::Between(window) => filter_by_date(batch, |d| window.contains(d)),
            QueryRange::OnDate(date) => filter_by_date(batch, |d| d == date),
        };
        tracing::debug!(path = %path.display(), rows = batch.items.len(), "read csv bars");
        Ok(batch)
    }

    async fn fetch_adj_factors(
        &self,
        _ctx: &RequestContext,
        code: &str,
        window: DateWindow,
    ) -> Result<RawBatch, MarketDataError> {
        let batch = read_batch(&self.csv_path(code, "adj_factor"))?;
        Ok(filter_by_date(batch, |d| window.contains(d)))
    }
}

#[async_trait]
impl KlinePort for CsvAdapter {
    async fn fetch_klines(
        &self,
        symbol: &str,
        start_ms: i64,
        end_ms: i64,
        limit: usize,
    ) -> Result<Vec<KlineRow>, MarketDataError> {
        let path = self.csv_path(symbol, "crypto");
        let batch = read_batch(&path)?;

        let mut rows = Vec::new();
        for (row_no, mut row) in batch.items.into_iter().enumerate() {
            let open_ms = kline_open_time(&row).ok_or_else(|| {
                csv_error(&path, format!("row {}: invalid open time", row_no + 1))
            })?;
            if open_ms < start_ms || open_ms > end_ms {
                continue;
            }
            row[0] = Value::from(open_ms);
            rows.push(row);
        }
        rows.sort_by_key(|r| kline_open_time(r).unwrap_or(i64::MAX));
        rows.truncate(limit);
        Ok(rows)
    }
}
