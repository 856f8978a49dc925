//! Warm-up history needed before the first requested date.

use crate::domain::indicator::IndicatorRequest;
use chrono::{Duration, NaiveDate};

/// Calendar days of padding on top of the bar count. Covers weekends plus a
/// buffer for exchange holidays.
const HOLIDAY_BUFFER_DAYS: u32 = 15;

/// Bars of history a request consumes before its first defined value.
pub fn warmup_bars(request: &IndicatorRequest) -> u32 {
    let bars = match *request {
        IndicatorRequest::Macd { slow, signal, .. } => slow + signal,
        IndicatorRequest::Rsi { period } => period + 1,
        IndicatorRequest::Kdj {
            k_period,
            k_smooth,
            d_smooth,
        } => k_period + k_smooth + d_smooth,
        IndicatorRequest::Boll { period, .. } => period,
        IndicatorRequest::Ma { period } => period,
    };
    u32::try_from(bars).unwrap_or(u32::MAX)
}

/// Calendar days to fetch ahead of the user window. Zero when nothing is
/// requested.
pub fn required_days(requests: &[IndicatorRequest]) -> u32 {
    let Some(bars) = requests.iter().map(warmup_bars).max() else {
        return 0;
    };
    // trading bars to calendar days
    bars.saturating_mul(3).div_ceil(2).saturating_add(HOLIDAY_BUFFER_DAYS)
}

/// Start of the fetch window. Never later than `user_start`.
pub fn extended_start(user_start: NaiveDate, requests: &[IndicatorRequest]) -> NaiveDate {
    let days = required_days(requests);
    if days == 0 {
        return user_start;
    }
    user_start
        .checked_sub_signed(Duration::days(i64::from(days)))
        .unwrap_or(NaiveDate::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn warmup_per_kind() {
        assert_eq!(
            warmup_bars(&IndicatorRequest::Macd {
                fast: 12,
                slow: 26,
                signal: 9
            }),
            35
        );
        assert_eq!(warmup_bars(&IndicatorRequest::Rsi { period: 14 }), 15);
        assert_eq!(
            warmup_bars(&IndicatorRequest::Kdj {
                k_period: 9,
                k_smooth: 3,
                d_smooth: 3
            }),
            15
        );
        assert_eq!(
            warmup_bars(&IndicatorRequest::Boll {
                period: 20,
                width: 2
            }),
            20
        );
        assert_eq!(warmup_bars(&IndicatorRequest::Ma { period: 60 }), 60);
    }

    #[test]
    fn no_requests_needs_no_days() {
        assert_eq!(required_days(&[]), 0);
        assert_eq!(extended_start(date(2024, 3, 1), &[]), date(2024, 3, 1));
    }

    #[test]
    fn required_days_uses_maximum() {
        let requests = [
            IndicatorRequest::Ma { period: 5 },
            IndicatorRequest::Macd {
                fast: 12,
                slow: 26,
                signal: 9,
            },
        ];
        // 35 bars -> ceil(52.5) = 53 + 15
        assert_eq!(required_days(&requests), 68);
    }

    #[test]
    fn extended_start_subtracts_calendar_days() {
        // ma(20): 30 + 15 = 45 days
        let start = extended_start(date(2024, 3, 1), &[IndicatorRequest::Ma { period: 20 }]);
        assert_eq!(start, date(2024, 1, 16));
    }

    proptest! {
        #[test]
        fn extended_start_never_after_user_start(
            period in 1usize..400,
            offset in 0i64..20_000,
        ) {
            let user_start = date(1990, 1, 1) + Duration::days(offset);
            let start = extended_start(user_start, &[IndicatorRequest::Ma { period }]);
            prop_assert!(start <= user_start);
            let expected = (period as i64 * 3 + 1) / 2 + 15;
            prop_assert_eq!((user_start - start).num_days(), expected);
        }
    }
}
