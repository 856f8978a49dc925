//! Binance spot kline adapter (`GET /api/v3/klines`, daily interval).

use crate::adapters::network_error;
use crate::domain::config::UpstreamConfig;
use crate::domain::error::MarketDataError;
use crate::domain::normalize::KlineRow;
use crate::ports::data_port::KlinePort;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;

const KLINES_API: &str = "klines";
const INVALID_SYMBOL_CODE: i64 = -1121;

#[derive(Debug, Deserialize)]
struct BinanceError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    msg: Option<String>,
}

pub struct BinanceAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl BinanceAdapter {
    pub fn new(config: &UpstreamConfig) -> Result<Self, MarketDataError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MarketDataError::Network {
                api: KLINES_API.to_string(),
                symbol: String::new(),
                timed_out: false,
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }
}

fn ms_to_date(ms: i64) -> NaiveDate {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.date_naive())
        .unwrap_or(NaiveDate::MIN)
}

fn error_from_body(
    symbol: &str,
    status: reqwest::StatusCode,
    body: &str,
    start_ms: i64,
    end_ms: i64,
) -> MarketDataError {
    let parsed = serde_json::from_str::<BinanceError>(body).ok();
    let msg = parsed
        .as_ref()
        .and_then(|e| e.msg.clone())
        .unwrap_or_else(|| body.trim().to_string());
    let invalid_symbol = parsed.and_then(|e| e.code) == Some(INVALID_SYMBOL_CODE)
        || msg.to_lowercase().contains("invalid symbol");

    if invalid_symbol {
        return MarketDataError::NotFound {
            market: "crypto".to_string(),
            symbol: symbol.to_string(),
            start: ms_to_date(start_ms),
            end: ms_to_date(end_ms),
        };
    }
    let reason = if msg.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {} - {}", status, msg)
    };
    MarketDataError::api(KLINES_API, symbol, reason)
}

#[async_trait]
impl KlinePort for BinanceAdapter {
    async fn fetch_klines(
        &self,
        symbol: &str,
        start_ms: i64,
        end_ms: i64,
        limit: usize,
    ) -> Result<Vec<KlineRow>, MarketDataError> {
        let url = format!("{}/api/v3/klines", self.base_url);
        tracing::debug!(%url, symbol, start_ms, end_ms, limit, "binance klines request");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol.to_string()),
                ("interval", "1d".to_string()),
                ("startTime", start_ms.to_string()),
                ("endTime", end_ms.to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await
            .map_err(|e| network_error(KLINES_API, symbol, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| network_error(KLINES_API, symbol, e))?;
        if !status.is_success() {
            return Err(error_from_body(symbol, status, &body, start_ms, end_ms));
        }

        serde_json::from_str::<Vec<KlineRow>>(&body).map_err(|e| {
            MarketDataError::api(KLINES_API, symbol, format!("unexpected kline payload: {e}"))
        })
    }
}
