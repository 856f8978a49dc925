//! Canonical price points and time series.

use chrono::NaiveDate;
use serde::Serialize;

/// Upstream trade date format (`20240115`).
pub const TRADE_DATE_FORMAT: &str = "%Y%m%d";

pub fn parse_trade_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), TRADE_DATE_FORMAT).ok()
}

pub fn format_trade_date(date: NaiveDate) -> String {
    date.format(TRADE_DATE_FORMAT).to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Ohlc {
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
}

/// Raw bid and ask bars of a two-sided (FX) quote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TwoSidedQuote {
    pub bid: Ohlc,
    pub ask: Ohlc,
}

/// Columns only some markets report, tagged by the market that sends them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "market", rename_all = "snake_case")]
pub enum MarketExtras {
    Futures {
        settle: Option<f64>,
        /// Close minus previous settle.
        change1: Option<f64>,
        /// Settle minus previous settle.
        change2: Option<f64>,
        oi: Option<f64>,
    },
    Options {
        exchange: Option<String>,
        pre_settle: Option<f64>,
        pre_close: Option<f64>,
        settle: Option<f64>,
        oi: Option<f64>,
    },
    ConvertibleBond {
        change: Option<f64>,
        pct_chg: Option<f64>,
        bond_value: Option<f64>,
        bond_over_rate: Option<f64>,
        cb_value: Option<f64>,
        cb_over_rate: Option<f64>,
    },
    Repo {
        name: Option<String>,
        rate: Option<f64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<TwoSidedQuote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<MarketExtras>,
}

impl PricePoint {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            open: None,
            high: None,
            low: None,
            close: None,
            volume: None,
            amount: None,
            quote: None,
            extras: None,
        }
    }

    pub fn with_ohlcv(
        date: NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
            volume: Some(volume),
            ..Self::new(date)
        }
    }

    /// Multiply open/high/low/close by `ratio`, leaving absent fields absent.
    pub fn scale_prices(&mut self, ratio: f64) {
        for field in [
            &mut self.open,
            &mut self.high,
            &mut self.low,
            &mut self.close,
        ] {
            if let Some(v) = field.as_mut() {
                *v *= ratio;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    NewestFirst,
    Chronological,
}

impl Direction {
    pub fn reversed(self) -> Self {
        match self {
            Direction::NewestFirst => Direction::Chronological,
            Direction::Chronological => Direction::NewestFirst,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SeriesError {
    #[error("duplicate date {0}")]
    DuplicateDate(NaiveDate),

    #[error("date {next} follows {prev} in a {direction:?} series")]
    OutOfOrder {
        prev: NaiveDate,
        next: NaiveDate,
        direction: Direction,
    },
}

/// An ordered run of price points with unique dates.
///
/// The declared direction is checked on construction; every later operation
/// either preserves it or flips it together with the point order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    points: Vec<PricePoint>,
    direction: Direction,
}

impl TimeSeries {
    pub fn new(points: Vec<PricePoint>, direction: Direction) -> Result<Self, SeriesError> {
        for pair in points.windows(2) {
            let (prev, next) = (pair[0].date, pair[1].date);
            if prev == next {
                return Err(SeriesError::DuplicateDate(prev));
            }
            let ordered = match direction {
                Direction::Chronological => prev < next,
                Direction::NewestFirst => prev > next,
            };
            if !ordered {
                return Err(SeriesError::OutOfOrder {
                    prev,
                    next,
                    direction,
                });
            }
        }
        Ok(Self { points, direction })
    }

    /// Sort by date into `direction`, rejecting duplicate dates.
    pub fn from_unordered(
        mut points: Vec<PricePoint>,
        direction: Direction,
    ) -> Result<Self, SeriesError> {
        match direction {
            Direction::Chronological => points.sort_by_key(|p| p.date),
            Direction::NewestFirst => points.sort_by(|a, b| b.date.cmp(&a.date)),
        }
        Self::new(points, direction)
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub(crate) fn points_mut(&mut self) -> &mut [PricePoint] {
        &mut self.points
    }

    pub fn into_points(self) -> Vec<PricePoint> {
        self.points
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn reversed(mut self) -> Self {
        self.points.reverse();
        self.direction = self.direction.reversed();
        self
    }

    pub fn into_direction(self, direction: Direction) -> Self {
        if self.direction == direction {
            self
        } else {
            self.reversed()
        }
    }

    pub fn latest(&self) -> Option<&PricePoint> {
        match self.direction {
            Direction::NewestFirst => self.points.first(),
            Direction::Chronological => self.points.last(),
        }
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    /// Closing prices in series order, `NaN` where the upstream omitted one.
    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close.unwrap_or(f64::NAN)).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.high.unwrap_or(f64::NAN)).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.low.unwrap_or(f64::NAN)).collect()
    }

    /// Keep only the points whose position is marked in `keep`.
    pub(crate) fn retain_mask(&mut self, keep: &[bool]) {
        let mut idx = 0;
        self.points.retain(|_| {
            let k = keep[idx];
            idx += 1;
            k
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn point(d: u32, close: f64) -> PricePoint {
        PricePoint::with_ohlcv(day(d), close, close + 1.0, close - 1.0, close, 1000.0)
    }

    #[test]
    fn trade_date_round_trip() {
        let date = parse_trade_date("20240115").unwrap();
        assert_eq!(date, day(15));
        assert_eq!(format_trade_date(date), "20240115");
        assert!(parse_trade_date("2024-01-15").is_none());
    }

    #[test]
    fn new_rejects_duplicate_dates() {
        let result = TimeSeries::new(vec![point(2, 1.0), point(2, 2.0)], Direction::NewestFirst);
        assert_eq!(result.unwrap_err(), SeriesError::DuplicateDate(day(2)));
    }

    #[test]
    fn new_rejects_wrong_direction() {
        let result = TimeSeries::new(vec![point(1, 1.0), point(2, 2.0)], Direction::NewestFirst);
        assert!(matches!(result, Err(SeriesError::OutOfOrder { .. })));
    }

    #[test]
    fn from_unordered_sorts_into_direction() {
        let series = TimeSeries::from_unordered(
            vec![point(2, 2.0), point(3, 3.0), point(1, 1.0)],
            Direction::NewestFirst,
        )
        .unwrap();
        assert_eq!(series.dates(), vec![day(3), day(2), day(1)]);
        assert_eq!(series.latest().unwrap().date, day(3));
    }

    #[test]
    fn reversed_flips_direction_and_latest_stays() {
        let series = TimeSeries::new(
            vec![point(3, 3.0), point(2, 2.0), point(1, 1.0)],
            Direction::NewestFirst,
        )
        .unwrap();
        let chrono = series.reversed();
        assert_eq!(chrono.direction(), Direction::Chronological);
        assert_eq!(chrono.dates(), vec![day(1), day(2), day(3)]);
        assert_eq!(chrono.latest().unwrap().date, day(3));
    }

    #[test]
    fn closes_use_nan_for_missing() {
        let mut missing = PricePoint::new(day(2));
        missing.high = Some(5.0);
        let series =
            TimeSeries::new(vec![point(1, 1.0), missing], Direction::Chronological).unwrap();
        let closes = series.closes();
        assert_eq!(closes[0], 1.0);
        assert!(closes[1].is_nan());
    }

    #[test]
    fn scale_prices_skips_volume_and_absent_fields() {
        let mut p = point(1, 100.0);
        p.open = None;
        p.scale_prices(0.5);
        assert_eq!(p.open, None);
        assert_eq!(p.close, Some(50.0));
        assert_eq!(p.high, Some(50.5));
        assert_eq!(p.volume, Some(1000.0));
    }

    proptest! {
        #[test]
        fn reversing_twice_is_identity(closes in proptest::collection::vec(1.0f64..1000.0, 0..60)) {
            let points: Vec<PricePoint> = closes
                .iter()
                .enumerate()
                .map(|(i, &c)| {
                    let date = day(1) + chrono::Duration::days(i as i64);
                    PricePoint::with_ohlcv(date, c, c, c, c, 1.0)
                })
                .collect();
            let series = TimeSeries::new(points, Direction::Chronological).unwrap();
            let twice = series.clone().reversed().reversed();
            prop_assert_eq!(twice, series);
        }
    }
}
