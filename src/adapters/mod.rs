//! Concrete adapter implementations for ports.

pub mod binance_adapter;
pub mod csv_adapter;
pub mod file_config_adapter;
pub mod tushare_adapter;

use crate::domain::error::MarketDataError;

/// Transport failure of an upstream call. Timeouts are flagged; nothing is
/// retried here.
pub(crate) fn network_error(api: &str, symbol: &str, err: reqwest::Error) -> MarketDataError {
    let timed_out = err.is_timeout();
    if timed_out {
        tracing::warn!(api, symbol, "upstream request timed out");
    }
    MarketDataError::Network {
        api: api.to_string(),
        symbol: symbol.to_string(),
        timed_out,
        reason: err.to_string(),
    }
}
