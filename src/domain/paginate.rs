//! Stitching bounded kline pages into one contiguous range.

use crate::domain::error::MarketDataError;
use crate::domain::normalize::{KlineRow, kline_open_time};
use crate::domain::trim::DateWindow;
use crate::ports::data_port::KlinePort;
use chrono::NaiveTime;

/// Hard ceiling on pages per request.
pub const MAX_PAGES: usize = 100;

const LAST_MS_OF_DAY: u32 = 86_399_999;

/// Millisecond bounds covering `window` on the UTC calendar:
/// `start 00:00:00.000` through `end 23:59:59.999`.
pub fn window_bounds_ms(window: DateWindow) -> (i64, i64) {
    let start = window.start.and_time(NaiveTime::MIN).and_utc();
    let end = window.end.and_time(NaiveTime::MIN).and_utc();
    (
        start.timestamp_millis(),
        end.timestamp_millis() + i64::from(LAST_MS_OF_DAY),
    )
}

pub struct PaginatedFetcher<'a, P: KlinePort + ?Sized> {
    port: &'a P,
    page_size: usize,
}

impl<'a, P: KlinePort + ?Sized> PaginatedFetcher<'a, P> {
    pub fn new(port: &'a P, page_size: usize) -> Self {
        Self {
            port,
            page_size: page_size.max(1),
        }
    }

    /// Fetch every kline with an open time in `[start_ms, end_ms]`.
    ///
    /// Pages are requested from a cursor that moves to one millisecond past
    /// the last open time seen. Paging stops on an empty or short page, when
    /// the cursor moves past `end_ms`, or after [`MAX_PAGES`] pages.
    pub async fn fetch_range(
        &self,
        symbol: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<KlineRow>, MarketDataError> {
        let mut rows = Vec::new();
        let mut cursor = start_ms;
        let mut pages = 0usize;

        while cursor <= end_ms && pages < MAX_PAGES {
            let page = self
                .port
                .fetch_klines(symbol, cursor, end_ms, self.page_size)
                .await?;
            pages += 1;
            let Some(last) = page.last() else {
                break;
            };
            let last_open_ms = kline_open_time(last).ok_or_else(|| {
                MarketDataError::api("klines", symbol, "kline without a numeric open time")
            })?;
            let next = last_open_ms.saturating_add(1);
            if next <= cursor {
                return Err(MarketDataError::PaginationStalled {
                    symbol: symbol.to_string(),
                    cursor_ms: cursor,
                    last_open_ms,
                });
            }

            let short = page.len() < self.page_size;
            tracing::debug!(symbol, page = pages, rows = page.len(), cursor, "kline page");
            rows.extend(page);
            cursor = next;
            if short {
                break;
            }
        }

        if pages >= MAX_PAGES && cursor <= end_ms {
            tracing::warn!(symbol, pages, cursor, end_ms, "kline page ceiling reached");
        }
        tracing::info!(symbol, pages, rows = rows.len(), "fetched klines");
        Ok(rows)
    }
}
