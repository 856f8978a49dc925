//! Application configuration read through [`ConfigPort`].
//!
//! ```ini
//! [tushare]
//! api_url = https://api.tushare.pro
//! timeout_ms = 30000
//!
//! [binance]
//! base_url = https://api.binance.com
//! timeout_ms = 10000
//!
//! [pagination]
//! page_size = 1000
//! max_page_size = 5000
//! ```
//!
//! Every key is optional; missing keys take the defaults above.

use crate::domain::error::MarketDataError;
use crate::ports::config_port::ConfigPort;
use std::time::Duration;

pub const DEFAULT_TUSHARE_URL: &str = "https://api.tushare.pro";
pub const DEFAULT_TUSHARE_TIMEOUT_MS: i64 = 30_000;
pub const DEFAULT_BINANCE_URL: &str = "https://api.binance.com";
pub const DEFAULT_BINANCE_TIMEOUT_MS: i64 = 10_000;
pub const DEFAULT_PAGE_SIZE: i64 = 1000;
pub const DEFAULT_MAX_PAGE_SIZE: i64 = 5000;

const MIN_TIMEOUT_MS: i64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub tushare: UpstreamConfig,
    pub binance: UpstreamConfig,
    pub page_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tushare: UpstreamConfig {
                base_url: DEFAULT_TUSHARE_URL.to_string(),
                timeout: Duration::from_millis(DEFAULT_TUSHARE_TIMEOUT_MS as u64),
            },
            binance: UpstreamConfig {
                base_url: DEFAULT_BINANCE_URL.to_string(),
                timeout: Duration::from_millis(DEFAULT_BINANCE_TIMEOUT_MS as u64),
            },
            page_size: DEFAULT_PAGE_SIZE as usize,
        }
    }
}

impl AppConfig {
    /// Read and validate every section.
    pub fn from_port(config: &dyn ConfigPort) -> Result<Self, MarketDataError> {
        validate_config(config)?;
        Ok(Self {
            tushare: UpstreamConfig {
                base_url: url(config, "tushare", "api_url", DEFAULT_TUSHARE_URL),
                timeout: timeout(config, "tushare", DEFAULT_TUSHARE_TIMEOUT_MS),
            },
            binance: UpstreamConfig {
                base_url: url(config, "binance", "base_url", DEFAULT_BINANCE_URL),
                timeout: timeout(config, "binance", DEFAULT_BINANCE_TIMEOUT_MS),
            },
            page_size: config.get_int("pagination", "page_size", DEFAULT_PAGE_SIZE) as usize,
        })
    }
}

fn url(config: &dyn ConfigPort, section: &str, key: &str, default: &str) -> String {
    config
        .get_trimmed(section, key)
        .map(|s| s.trim_end_matches('/').to_string())
        .unwrap_or_else(|| default.to_string())
}

fn timeout(config: &dyn ConfigPort, section: &str, default: i64) -> Duration {
    let ms = config.get_int(section, "timeout_ms", default);
    Duration::from_millis(ms.max(MIN_TIMEOUT_MS) as u64)
}

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), MarketDataError> {
    validate_url(config, "tushare", "api_url")?;
    validate_url(config, "binance", "base_url")?;
    validate_timeout(config, "tushare", DEFAULT_TUSHARE_TIMEOUT_MS)?;
    validate_timeout(config, "binance", DEFAULT_BINANCE_TIMEOUT_MS)?;
    validate_page_size(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: String) -> MarketDataError {
    MarketDataError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    }
}

fn validate_url(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), MarketDataError> {
    match config.get_string(section, key) {
        Some(value) if !value.trim().starts_with("http") => Err(invalid(
            section,
            key,
            format!("{} must be an http(s) URL, got '{}'", key, value),
        )),
        _ => Ok(()),
    }
}

fn validate_timeout(
    config: &dyn ConfigPort,
    section: &str,
    default: i64,
) -> Result<(), MarketDataError> {
    if config.get_string(section, "timeout_ms").is_some()
        && config.get_int(section, "timeout_ms", i64::MIN) == i64::MIN
    {
        return Err(invalid(
            section,
            "timeout_ms",
            "timeout_ms must be an integer".to_string(),
        ));
    }
    let value = config.get_int(section, "timeout_ms", default);
    if value < MIN_TIMEOUT_MS {
        return Err(invalid(
            section,
            "timeout_ms",
            format!("timeout_ms must be at least {}", MIN_TIMEOUT_MS),
        ));
    }
    Ok(())
}

fn validate_page_size(config: &dyn ConfigPort) -> Result<(), MarketDataError> {
    let max = config.get_int("pagination", "max_page_size", DEFAULT_MAX_PAGE_SIZE);
    if max < 1 {
        return Err(invalid(
            "pagination",
            "max_page_size",
            "max_page_size must be positive".to_string(),
        ));
    }
    let value = config.get_int("pagination", "page_size", DEFAULT_PAGE_SIZE);
    if value < 1 || value > max {
        return Err(invalid(
            "pagination",
            "page_size",
            format!("page_size must be between 1 and {}", max),
        ));
    }
    Ok(())
}
