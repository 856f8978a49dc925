//! Market data access port traits.

use crate::domain::error::MarketDataError;
use crate::domain::market::MarketType;
use crate::domain::normalize::{KlineRow, RawBatch};
use crate::domain::request::RequestContext;
use crate::domain::trim::DateWindow;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Date selector of a daily query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryRange {
    Between(DateWindow),
    /// A single session, used by markets that are queried per trade date.
    OnDate(NaiveDate),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyQuery {
    pub market: MarketType,
    pub code: String,
    pub range: QueryRange,
}

/// Columnar daily bars and adjustment factors.
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    async fn fetch_daily(
        &self,
        ctx: &RequestContext,
        query: &DailyQuery,
    ) -> Result<RawBatch, MarketDataError>;

    /// `trade_date, adj_factor` rows for `code` over `window`.
    async fn fetch_adj_factors(
        &self,
        ctx: &RequestContext,
        code: &str,
        window: DateWindow,
    ) -> Result<RawBatch, MarketDataError>;
}

/// One bounded page of daily klines with open times in `[start_ms, end_ms]`.
#[async_trait]
pub trait KlinePort: Send + Sync {
    async fn fetch_klines(
        &self,
        symbol: &str,
        start_ms: i64,
        end_ms: i64,
        limit: usize,
    ) -> Result<Vec<KlineRow>, MarketDataError>;
}
