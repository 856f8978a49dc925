//! Technical indicator implementations.
//!
//! This module provides the types shared by every indicator:
//! - `IndicatorKind`: the closed set of supported indicator names and their arity
//! - `IndicatorRequest`: an indicator identity plus its parameters
//! - `IndicatorResult`: one or more output arrays aligned with the input series
//! - `IndicatorSet`: results keyed by display name, in request order
//!
//! All calculators work on chronologically ordered `f64` slices. Positions without
//! enough history hold `NaN`.

pub mod bollinger;
pub mod ema;
pub mod kdj;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stddev;

pub use bollinger::calculate_bollinger;
pub use ema::calculate_ema;
pub use kdj::calculate_kdj;
pub use macd::calculate_macd;
pub use rsi::calculate_rsi;
pub use sma::calculate_sma;

use crate::domain::error::MarketDataError;
use crate::domain::ohlcv::{Direction, TimeSeries};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorKind {
    Macd,
    Rsi,
    Kdj,
    Boll,
    Ma,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 5] = [
        IndicatorKind::Macd,
        IndicatorKind::Rsi,
        IndicatorKind::Kdj,
        IndicatorKind::Boll,
        IndicatorKind::Ma,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        IndicatorKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(name))
    }

    pub fn name(self) -> &'static str {
        match self {
            IndicatorKind::Macd => "macd",
            IndicatorKind::Rsi => "rsi",
            IndicatorKind::Kdj => "kdj",
            IndicatorKind::Boll => "boll",
            IndicatorKind::Ma => "ma",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            IndicatorKind::Macd | IndicatorKind::Kdj => 3,
            IndicatorKind::Boll => 2,
            IndicatorKind::Rsi | IndicatorKind::Ma => 1,
        }
    }

    /// Usage hint shown when a token has the wrong shape.
    pub fn usage(self) -> &'static str {
        match self {
            IndicatorKind::Macd => "macd(fast,slow,signal), e.g. macd(12,26,9)",
            IndicatorKind::Rsi => "rsi(period), e.g. rsi(14)",
            IndicatorKind::Kdj => "kdj(k_period,k_smooth,d_smooth), e.g. kdj(9,3,3)",
            IndicatorKind::Boll => "boll(period,width), e.g. boll(20,2)",
            IndicatorKind::Ma => "ma(period), e.g. ma(20)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum IndicatorRequest {
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Rsi {
        period: usize,
    },
    Kdj {
        k_period: usize,
        k_smooth: usize,
        d_smooth: usize,
    },
    Boll {
        period: usize,
        width: usize,
    },
    Ma {
        period: usize,
    },
}

impl IndicatorRequest {
    /// Build a request from a kind and its parameters; `None` when the
    /// parameter count does not match the kind's arity.
    pub fn from_params(kind: IndicatorKind, params: &[usize]) -> Option<Self> {
        let request = match kind {
            IndicatorKind::Macd => {
                let [fast, slow, signal] = <[usize; 3]>::try_from(params).ok()?;
                IndicatorRequest::Macd { fast, slow, signal }
            }
            IndicatorKind::Rsi => {
                let [period] = <[usize; 1]>::try_from(params).ok()?;
                IndicatorRequest::Rsi { period }
            }
            IndicatorKind::Kdj => {
                let [k_period, k_smooth, d_smooth] = <[usize; 3]>::try_from(params).ok()?;
                IndicatorRequest::Kdj {
                    k_period,
                    k_smooth,
                    d_smooth,
                }
            }
            IndicatorKind::Boll => {
                let [period, width] = <[usize; 2]>::try_from(params).ok()?;
                IndicatorRequest::Boll { period, width }
            }
            IndicatorKind::Ma => {
                let [period] = <[usize; 1]>::try_from(params).ok()?;
                IndicatorRequest::Ma { period }
            }
        };
        Some(request)
    }

    pub fn kind(&self) -> IndicatorKind {
        match self {
            IndicatorRequest::Macd { .. } => IndicatorKind::Macd,
            IndicatorRequest::Rsi { .. } => IndicatorKind::Rsi,
            IndicatorRequest::Kdj { .. } => IndicatorKind::Kdj,
            IndicatorRequest::Boll { .. } => IndicatorKind::Boll,
            IndicatorRequest::Ma { .. } => IndicatorKind::Ma,
        }
    }

    pub fn params(&self) -> Vec<usize> {
        match *self {
            IndicatorRequest::Macd { fast, slow, signal } => vec![fast, slow, signal],
            IndicatorRequest::Rsi { period } | IndicatorRequest::Ma { period } => vec![period],
            IndicatorRequest::Kdj {
                k_period,
                k_smooth,
                d_smooth,
            } => vec![k_period, k_smooth, d_smooth],
            IndicatorRequest::Boll { period, width } => vec![period, width],
        }
    }

    /// Key under which the result is reported. Moving averages are keyed by
    /// period so several can coexist.
    pub fn result_key(&self) -> String {
        match self {
            IndicatorRequest::Ma { period } => format!("ma{}", period),
            other => other.kind().name().to_string(),
        }
    }

    /// Run the calculator over chronological close/high/low arrays.
    pub fn compute(&self, closes: &[f64], highs: &[f64], lows: &[f64]) -> IndicatorResult {
        match *self {
            IndicatorRequest::Macd { fast, slow, signal } => {
                let out = calculate_macd(closes, fast, slow, signal);
                IndicatorResult::Macd {
                    dif: out.dif,
                    dea: out.dea,
                    macd: out.macd,
                }
            }
            IndicatorRequest::Rsi { period } => IndicatorResult::Rsi {
                values: calculate_rsi(closes, period),
            },
            IndicatorRequest::Kdj {
                k_period,
                k_smooth,
                d_smooth,
            } => {
                let out = calculate_kdj(highs, lows, closes, k_period, k_smooth, d_smooth);
                IndicatorResult::Kdj {
                    k: out.k,
                    d: out.d,
                    j: out.j,
                }
            }
            IndicatorRequest::Boll { period, width } => {
                let out = calculate_bollinger(closes, period, width as f64);
                IndicatorResult::Boll {
                    upper: out.upper,
                    middle: out.middle,
                    lower: out.lower,
                }
            }
            IndicatorRequest::Ma { period } => IndicatorResult::Ma {
                period,
                values: calculate_sma(closes, period),
            },
        }
    }
}

impl fmt::Display for IndicatorRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.params().iter().map(|p| p.to_string()).collect();
        write!(f, "{}({})", self.kind().name(), params.join(","))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndicatorResult {
    Macd {
        dif: Vec<f64>,
        dea: Vec<f64>,
        macd: Vec<f64>,
    },
    Rsi {
        values: Vec<f64>,
    },
    Kdj {
        k: Vec<f64>,
        d: Vec<f64>,
        j: Vec<f64>,
    },
    Boll {
        upper: Vec<f64>,
        middle: Vec<f64>,
        lower: Vec<f64>,
    },
    Ma {
        period: usize,
        values: Vec<f64>,
    },
}

impl IndicatorResult {
    pub fn columns(&self) -> Vec<&Vec<f64>> {
        match self {
            IndicatorResult::Macd { dif, dea, macd } => vec![dif, dea, macd],
            IndicatorResult::Rsi { values } | IndicatorResult::Ma { values, .. } => vec![values],
            IndicatorResult::Kdj { k, d, j } => vec![k, d, j],
            IndicatorResult::Boll {
                upper,
                middle,
                lower,
            } => vec![upper, middle, lower],
        }
    }

    pub fn columns_mut(&mut self) -> Vec<&mut Vec<f64>> {
        match self {
            IndicatorResult::Macd { dif, dea, macd } => vec![dif, dea, macd],
            IndicatorResult::Rsi { values } | IndicatorResult::Ma { values, .. } => vec![values],
            IndicatorResult::Kdj { k, d, j } => vec![k, d, j],
            IndicatorResult::Boll {
                upper,
                middle,
                lower,
            } => vec![upper, middle, lower],
        }
    }

    /// Row count; all columns of one result share it.
    pub fn len(&self) -> usize {
        self.columns().first().map_or(0, |c| c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn reverse(&mut self) {
        for column in self.columns_mut() {
            column.reverse();
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorEntry {
    pub key: String,
    pub request: IndicatorRequest,
    pub result: IndicatorResult,
}

/// Indicator results keyed by `IndicatorRequest::result_key`, in request order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorSet {
    entries: Vec<IndicatorEntry>,
    superseded: Vec<IndicatorRequest>,
}

impl IndicatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a result. A result already stored under the same key is replaced
    /// in place, keeping its original position; the replaced request is kept
    /// in [`superseded`](Self::superseded).
    pub fn insert(&mut self, request: IndicatorRequest, result: IndicatorResult) {
        let key = request.result_key();
        let entry = IndicatorEntry {
            key,
            request,
            result,
        };
        match self.entries.iter_mut().find(|e| e.key == entry.key) {
            Some(existing) => {
                tracing::warn!(
                    key = %entry.key,
                    replaced = %existing.request,
                    by = %entry.request,
                    "indicator key requested twice; keeping the later parameters"
                );
                let old = std::mem::replace(existing, entry);
                self.superseded.push(old.request);
            }
            None => self.entries.push(entry),
        }
    }

    /// Requests whose results were replaced by a later request for the same key.
    pub fn superseded(&self) -> &[IndicatorRequest] {
        &self.superseded
    }

    pub fn get(&self, key: &str) -> Option<&IndicatorResult> {
        self.entries.iter().find(|e| e.key == key).map(|e| &e.result)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.key.as_str()).collect()
    }

    pub fn entries(&self) -> &[IndicatorEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn reverse(&mut self) {
        for entry in &mut self.entries {
            entry.result.reverse();
        }
    }

    pub(crate) fn columns_mut(&mut self) -> impl Iterator<Item = &mut Vec<f64>> {
        self.entries
            .iter_mut()
            .flat_map(|e| e.result.columns_mut().into_iter())
    }
}

impl Serialize for IndicatorSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.key, &entry.result)?;
        }
        map.end()
    }
}

/// Compute every requested indicator over a chronological series.
///
/// Results are aligned with `series` position by position.
pub fn compute_indicators(
    series: &TimeSeries,
    requests: &[IndicatorRequest],
) -> Result<IndicatorSet, MarketDataError> {
    if series.direction() != Direction::Chronological {
        return Err(MarketDataError::validation(
            "series",
            format!("{:?}", series.direction()),
            "indicators are computed over chronological series only",
        ));
    }

    let closes = series.closes();
    let highs = series.highs();
    let lows = series.lows();

    let mut set = IndicatorSet::new();
    for request in requests {
        set.insert(*request, request.compute(&closes, &highs, &lows));
    }
    Ok(set)
}
