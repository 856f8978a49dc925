//! Synchronous computation stages between fetch and hand-back.
//!
//! normalize -> adjust (cn only) -> chronological -> indicators ->
//! back to newest-first -> trim to the user window.

use crate::domain::adjust::{AdjustmentFactorMap, AdjustmentStatus, apply_forward_adjustment};
use crate::domain::error::MarketDataError;
use crate::domain::indicator::{IndicatorRequest, IndicatorSet, compute_indicators};
use crate::domain::market::MarketType;
use crate::domain::normalize::{RawPayload, normalize};
use crate::domain::ohlcv::{Direction, TimeSeries};
use crate::domain::trim::{DateWindow, trim_to_window};

/// Adjustment factors as far as the fetch stage got them.
#[derive(Debug, Clone, PartialEq)]
pub enum Factors {
    NotRequired,
    Loaded(AdjustmentFactorMap),
    /// Lookup failed; the data goes out unadjusted.
    Unavailable(String),
}

pub struct PipelineInput<'a> {
    pub market: MarketType,
    pub symbol: &'a str,
    pub payload: &'a RawPayload,
    pub factors: Factors,
    pub requests: &'a [IndicatorRequest],
    pub window: DateWindow,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Newest first.
    pub series: TimeSeries,
    /// Aligned with `series`.
    pub indicators: IndicatorSet,
    pub adjustment: AdjustmentStatus,
}

pub fn run_pipeline(input: PipelineInput<'_>) -> Result<PipelineOutput, MarketDataError> {
    let upstream = input.market.daily_api().unwrap_or("klines");
    let mut series = normalize(input.market, input.payload)
        .map_err(|e| MarketDataError::api(upstream, input.symbol, e.to_string()))?;

    let adjustment = match input.factors {
        Factors::NotRequired => AdjustmentStatus::NotRequired,
        Factors::Loaded(factors) => apply_forward_adjustment(&mut series, &factors),
        Factors::Unavailable(reason) => {
            tracing::warn!(symbol = input.symbol, %reason, "adjustment factors unavailable; returning raw prices");
            AdjustmentStatus::skipped(reason)
        }
    };

    let chronological = series.into_direction(Direction::Chronological);
    let mut indicators = compute_indicators(&chronological, input.requests)?;
    let mut series = chronological.into_direction(Direction::NewestFirst);
    indicators.reverse();

    trim_to_window(&mut series, &mut indicators, input.window);

    Ok(PipelineOutput {
        series,
        indicators,
        adjustment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::IndicatorResult;
    use crate::domain::normalize::RawBatch;
    use chrono::NaiveDate;
    use serde_json::json;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    /// Newest-first equity batch for days `1..=n` with close `10 + day - 1`.
    fn batch(n: u32) -> RawPayload {
        let items = (1..=n)
            .rev()
            .map(|d| {
                let c = 9.0 + d as f64;
                vec![json!(format!("202401{:02}", d)), json!(c), json!(c), json!(c), json!(c), json!(1)]
            })
            .collect();
        RawPayload::Batch(RawBatch::new(
            ["trade_date", "open", "high", "low", "close", "vol"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            items,
        ))
    }

    #[test]
    fn indicators_come_back_newest_first() {
        let payload = batch(6);
        let requests = [IndicatorRequest::Ma { period: 3 }];
        let out = run_pipeline(PipelineInput {
            market: MarketType::Us,
            symbol: "AAPL",
            payload: &payload,
            factors: Factors::NotRequired,
            requests: &requests,
            window: DateWindow::new(date(1), date(6)).unwrap(),
        })
        .unwrap();

        assert_eq!(out.series.direction(), Direction::NewestFirst);
        assert_eq!(out.series.points()[0].date, date(6));
        match out.indicators.get("ma3").unwrap() {
            IndicatorResult::Ma { values, .. } => {
                // newest: mean(13, 14, 15); oldest two are warm-up
                assert_eq!(values[0], 14.0);
                assert!(values[4].is_nan());
                assert!(values[5].is_nan());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(out.adjustment, AdjustmentStatus::NotRequired);
    }

    #[test]
    fn unavailable_factors_skip_adjustment() {
        let payload = batch(3);
        let out = run_pipeline(PipelineInput {
            market: MarketType::Cn,
            symbol: "600000.SH",
            payload: &payload,
            factors: Factors::Unavailable("timeout".into()),
            requests: &[],
            window: DateWindow::new(date(1), date(3)).unwrap(),
        })
        .unwrap();
        assert_eq!(out.adjustment, AdjustmentStatus::skipped("timeout"));
        assert_eq!(out.series.closes(), vec![12.0, 11.0, 10.0]);
    }

    #[test]
    fn malformed_payload_is_api_error() {
        let payload = RawPayload::Batch(RawBatch::new(vec!["close".into()], vec![vec![json!(1)]]));
        let err = run_pipeline(PipelineInput {
            market: MarketType::Hk,
            symbol: "00700.HK",
            payload: &payload,
            factors: Factors::NotRequired,
            requests: &[],
            window: DateWindow::new(date(1), date(3)).unwrap(),
        })
        .unwrap_err();
        match err {
            MarketDataError::Api { api, symbol, reason } => {
                assert_eq!(api, "hk_daily");
                assert_eq!(symbol, "00700.HK");
                assert!(reason.contains("trade_date"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn warmup_rows_are_trimmed_after_compute() {
        let payload = batch(10);
        let requests = [IndicatorRequest::Ma { period: 5 }];
        let out = run_pipeline(PipelineInput {
            market: MarketType::Us,
            symbol: "AAPL",
            payload: &payload,
            factors: Factors::NotRequired,
            requests: &requests,
            window: DateWindow::new(date(5), date(10)).unwrap(),
        })
        .unwrap();
        assert_eq!(out.series.len(), 6);
        match out.indicators.get("ma5").unwrap() {
            IndicatorResult::Ma { values, .. } => {
                assert_eq!(values.len(), 6);
                assert!(values.iter().all(|v| v.is_finite()));
                // oldest kept row is day 5: mean(10..=14)
                assert_eq!(values[5], 12.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
