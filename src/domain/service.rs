//! Request orchestration: window resolution, fetch, pipeline.

use crate::domain::adjust::{AdjustmentFactorMap, AdjustmentStatus};
use crate::domain::error::MarketDataError;
use crate::domain::indicator::IndicatorSet;
use crate::domain::lookback::{extended_start, required_days};
use crate::domain::market::MarketType;
use crate::domain::normalize::RawPayload;
use crate::domain::ohlcv::TimeSeries;
use crate::domain::paginate::{PaginatedFetcher, window_bounds_ms};
use crate::domain::pipeline::{Factors, PipelineInput, run_pipeline};
use crate::domain::request::{MarketDataRequest, RequestContext};
use crate::domain::symbol::normalize_crypto_symbol;
use crate::domain::trim::DateWindow;
use crate::ports::data_port::{DailyQuery, KlinePort, MarketDataPort, QueryRange};
use chrono::{NaiveDate, Utc};
use serde::Serialize;

/// Normalized output handed back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct MarketDataResult {
    pub code: String,
    pub market: MarketType,
    pub window: DateWindow,
    /// Newest first.
    pub series: TimeSeries,
    pub indicators: IndicatorSet,
    pub requested_indicator_specs: Vec<String>,
    /// Requests overridden by a later one with the same result key.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub superseded_indicator_specs: Vec<String>,
    pub adjustment: AdjustmentStatus,
}

pub struct MarketDataService<'a> {
    daily: &'a dyn MarketDataPort,
    klines: &'a dyn KlinePort,
    page_size: usize,
}

impl<'a> MarketDataService<'a> {
    pub fn new(daily: &'a dyn MarketDataPort, klines: &'a dyn KlinePort, page_size: usize) -> Self {
        Self {
            daily,
            klines,
            page_size,
        }
    }

    pub async fn fetch(
        &self,
        ctx: &RequestContext,
        request: &MarketDataRequest,
    ) -> Result<MarketDataResult, MarketDataError> {
        self.fetch_as_of(ctx, request, Utc::now().date_naive()).await
    }

    /// Like [`fetch`](Self::fetch) with an explicit "today" for default windows.
    pub async fn fetch_as_of(
        &self,
        ctx: &RequestContext,
        request: &MarketDataRequest,
        today: NaiveDate,
    ) -> Result<MarketDataResult, MarketDataError> {
        let window = request.resolve_window(today)?;
        let fetch_window = window.with_start(extended_start(window.start, &request.indicators));
        if fetch_window.start < window.start {
            tracing::info!(
                days = required_days(&request.indicators),
                user_start = %window.start,
                fetch_start = %fetch_window.start,
                "extended fetch window for indicator warm-up"
            );
        }

        let (code, payload, factors) = match request.market {
            MarketType::Crypto => {
                let symbol = normalize_crypto_symbol(&request.code)?;
                let payload = self.fetch_crypto(&symbol, fetch_window, window).await?;
                (symbol, payload, Factors::NotRequired)
            }
            market => {
                let payload = self.fetch_batch(ctx, request, window, fetch_window).await?;
                let factors = if market.requires_adjustment() {
                    self.fetch_factors(ctx, &request.code, fetch_window).await
                } else {
                    Factors::NotRequired
                };
                (request.code.clone(), payload, factors)
            }
        };

        let output = run_pipeline(PipelineInput {
            market: request.market,
            symbol: &code,
            payload: &payload,
            factors,
            requests: &request.indicators,
            window,
        })?;
        tracing::info!(
            market = %request.market,
            code = %code,
            rows = output.series.len(),
            indicators = output.indicators.len(),
            "market data ready"
        );

        let superseded_indicator_specs = output
            .indicators
            .superseded()
            .iter()
            .map(ToString::to_string)
            .collect();
        Ok(MarketDataResult {
            code,
            market: request.market,
            window,
            series: output.series,
            indicators: output.indicators,
            requested_indicator_specs: request.indicator_specs.clone(),
            superseded_indicator_specs,
            adjustment: output.adjustment,
        })
    }

    async fn fetch_batch(
        &self,
        ctx: &RequestContext,
        request: &MarketDataRequest,
        window: DateWindow,
        fetch_window: DateWindow,
    ) -> Result<RawPayload, MarketDataError> {
        // options without explicit dates ask for a single session
        let single_session = request.market == MarketType::Options
            && !request.has_indicators()
            && request.start.is_none()
            && request.end.is_none();
        let range = if single_session {
            QueryRange::OnDate(window.end)
        } else {
            QueryRange::Between(fetch_window)
        };

        let query = DailyQuery {
            market: request.market,
            code: request.code.clone(),
            range,
        };
        tracing::debug!(?query, "fetching daily bars");
        let batch = self.daily.fetch_daily(ctx, &query).await?;
        if batch.is_empty() {
            return Err(not_found(request.market, &request.code, window));
        }
        tracing::info!(code = %request.code, rows = batch.items.len(), "fetched daily bars");
        Ok(RawPayload::Batch(batch))
    }

    async fn fetch_factors(
        &self,
        ctx: &RequestContext,
        code: &str,
        fetch_window: DateWindow,
    ) -> Factors {
        match self.daily.fetch_adj_factors(ctx, code, fetch_window).await {
            Ok(batch) => Factors::Loaded(AdjustmentFactorMap::from_batch(&batch)),
            Err(e) => Factors::Unavailable(e.to_string()),
        }
    }

    async fn fetch_crypto(
        &self,
        symbol: &str,
        fetch_window: DateWindow,
        window: DateWindow,
    ) -> Result<RawPayload, MarketDataError> {
        let (start_ms, end_ms) = window_bounds_ms(fetch_window);
        let rows = PaginatedFetcher::new(self.klines, self.page_size)
            .fetch_range(symbol, start_ms, end_ms)
            .await?;
        if rows.is_empty() {
            return Err(not_found(MarketType::Crypto, symbol, window));
        }
        Ok(RawPayload::Klines(rows))
    }
}

fn not_found(market: MarketType, symbol: &str, window: DateWindow) -> MarketDataError {
    MarketDataError::NotFound {
        market: market.to_string(),
        symbol: symbol.to_string(),
        start: window.start,
        end: window.end,
    }
}
