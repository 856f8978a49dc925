//! Validated market data requests and per-request context.

use crate::domain::error::MarketDataError;
use crate::domain::indicator::IndicatorRequest;
use crate::domain::market::MarketType;
use crate::domain::ohlcv::parse_trade_date;
use crate::domain::spec_parser::{parse_indicator_list, split_tokens};
use crate::domain::trim::DateWindow;
use chrono::{Months, NaiveDate};
use std::fmt;

/// Credentials for one request. Passed explicitly to the fetch ports; the
/// computation stages never see it.
#[derive(Clone, Default)]
pub struct RequestContext {
    token: Option<String>,
}

impl RequestContext {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketDataRequest {
    pub market: MarketType,
    pub code: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub indicators: Vec<IndicatorRequest>,
    /// Tokens as the caller wrote them, echoed back in the result.
    pub indicator_specs: Vec<String>,
}

fn parse_date_arg(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, MarketDataError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => parse_trade_date(v)
            .map(Some)
            .ok_or_else(|| MarketDataError::validation(field, v, "expected YYYYMMDD")),
    }
}

impl MarketDataRequest {
    /// Validate raw caller arguments.
    pub fn parse(
        market: &str,
        code: &str,
        start: Option<&str>,
        end: Option<&str>,
        indicators: Option<&str>,
    ) -> Result<Self, MarketDataError> {
        let market: MarketType = market.parse()?;
        let code = code.trim();
        if code.is_empty() {
            return Err(MarketDataError::validation("code", code, "must not be empty"));
        }
        let text = indicators.unwrap_or_default();
        Ok(Self {
            market,
            code: code.to_string(),
            start: parse_date_arg("start_date", start)?,
            end: parse_date_arg("end_date", end)?,
            indicators: parse_indicator_list(text)?,
            indicator_specs: split_tokens(text).into_iter().map(String::from).collect(),
        })
    }

    pub fn has_indicators(&self) -> bool {
        !self.indicators.is_empty()
    }

    /// The caller's window. A missing end is `today`; a missing start is one
    /// calendar month before the end.
    pub fn resolve_window(&self, today: NaiveDate) -> Result<DateWindow, MarketDataError> {
        let end = self.end.unwrap_or(today);
        let start = match self.start {
            Some(start) => start,
            None => end.checked_sub_months(Months::new(1)).unwrap_or(end),
        };
        DateWindow::new(start, end)
    }
}
