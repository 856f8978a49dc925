//! Cutting a computed series back to the caller's window.

use crate::domain::error::MarketDataError;
use crate::domain::indicator::IndicatorSet;
use crate::domain::ohlcv::{TimeSeries, format_trade_date};
use chrono::NaiveDate;
use serde::{Serialize, Serializer};

/// Inclusive date window `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, MarketDataError> {
        if start > end {
            return Err(MarketDataError::validation(
                "start_date",
                format_trade_date(start),
                format!("must not be after end_date {}", format_trade_date(end)),
            ));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn with_start(self, start: NaiveDate) -> Self {
        Self { start, ..self }
    }
}

impl Serialize for DateWindow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("DateWindow", 2)?;
        s.serialize_field("start", &format_trade_date(self.start))?;
        s.serialize_field("end", &format_trade_date(self.end))?;
        s.end()
    }
}

/// Drop every point outside `window` together with the same positions of
/// every indicator column. Does nothing when no indicators were computed,
/// since the fetch was not widened in that case.
pub fn trim_to_window(series: &mut TimeSeries, indicators: &mut IndicatorSet, window: DateWindow) {
    if indicators.is_empty() {
        return;
    }

    let keep: Vec<bool> = series
        .points()
        .iter()
        .map(|p| window.contains(p.date))
        .collect();
    let before = keep.len();

    series.retain_mask(&keep);
    for column in indicators.columns_mut() {
        let mut idx = 0;
        column.retain(|_| {
            let k = keep.get(idx).copied().unwrap_or(false);
            idx += 1;
            k
        });
    }

    tracing::debug!(
        before,
        after = series.len(),
        start = %window.start,
        end = %window.end,
        "trimmed to user window"
    );
}
