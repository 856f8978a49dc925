//! Forward price adjustment (qfq).
//!
//! Prices on date `d` are rescaled by `factor(d) / factor(latest)`, so the
//! most recent bar keeps its traded price and history is expressed in the same
//! terms. Dates without a factor keep their raw prices.

use crate::domain::normalize::{RawBatch, lenient_number};
use crate::domain::ohlcv::{TimeSeries, format_trade_date, parse_trade_date};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

/// Per-date cumulative adjustment factors. Only positive factors are kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdjustmentFactorMap {
    factors: HashMap<NaiveDate, f64>,
}

impl AdjustmentFactorMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a `trade_date, adj_factor` batch. Rows with an unreadable
    /// date or a non-positive factor are dropped.
    pub fn from_batch(batch: &RawBatch) -> Self {
        let (Some(date_idx), Some(factor_idx)) =
            (batch.column("trade_date"), batch.column("adj_factor"))
        else {
            return Self::new();
        };

        let factors = batch
            .items
            .iter()
            .filter_map(|row| {
                let date = match row.get(date_idx)? {
                    serde_json::Value::String(s) => parse_trade_date(s),
                    serde_json::Value::Number(n) => parse_trade_date(&n.to_string()),
                    _ => None,
                }?;
                let factor = row.get(factor_idx).and_then(lenient_number)?;
                (factor > 0.0).then_some((date, factor))
            })
            .collect();
        Self { factors }
    }

    pub fn insert(&mut self, date: NaiveDate, factor: f64) -> bool {
        if factor.is_finite() && factor > 0.0 {
            self.factors.insert(date, factor);
            true
        } else {
            false
        }
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.factors.get(&date).copied()
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }
}

impl FromIterator<(NaiveDate, f64)> for AdjustmentFactorMap {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, f64)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (date, factor) in iter {
            map.insert(date, factor);
        }
        map
    }
}

/// Outcome of the adjustment stage, reported alongside the data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdjustmentStatus {
    /// The market trades unadjusted prices.
    NotRequired,
    Applied {
        #[serde(serialize_with = "serialize_trade_date")]
        latest_date: NaiveDate,
        latest_factor: f64,
    },
    /// Adjustment was wanted but could not be done; prices are raw.
    Skipped { reason: String },
}

fn serialize_trade_date<S: serde::Serializer>(
    date: &NaiveDate,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_trade_date(*date))
}

impl AdjustmentStatus {
    pub fn skipped(reason: impl Into<String>) -> Self {
        AdjustmentStatus::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, AdjustmentStatus::Applied { .. })
    }
}

/// Rescale `series` in place against the factor of its latest date.
///
/// Without a factor for the latest date nothing is touched and the status is
/// `Skipped`. An empty series adjusts trivially.
pub fn apply_forward_adjustment(
    series: &mut TimeSeries,
    factors: &AdjustmentFactorMap,
) -> AdjustmentStatus {
    let Some(latest_date) = series.latest().map(|p| p.date) else {
        return AdjustmentStatus::skipped("series is empty");
    };
    let Some(latest_factor) = factors.get(latest_date) else {
        let reason = format!(
            "no adjustment factor for latest date {}",
            format_trade_date(latest_date)
        );
        tracing::warn!(%latest_date, factors = factors.len(), "{reason}; returning raw prices");
        return AdjustmentStatus::skipped(reason);
    };

    let mut adjusted = 0usize;
    for point in series.points_mut() {
        if let Some(factor) = factors.get(point.date) {
            point.scale_prices(factor / latest_factor);
            adjusted += 1;
        }
    }
    tracing::debug!(
        %latest_date,
        latest_factor,
        adjusted,
        total = series.len(),
        "applied forward adjustment"
    );

    AdjustmentStatus::Applied {
        latest_date,
        latest_factor,
    }
}
