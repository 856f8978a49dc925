//! Market taxonomy and the upstream schema each market speaks.

use crate::domain::error::MarketDataError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    Cn,
    Us,
    Hk,
    Fx,
    Futures,
    Fund,
    Repo,
    ConvertibleBond,
    Options,
    Crypto,
}

/// Shape of the raw records an upstream returns for a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// Single-sided OHLC columns (`open`, `high`, `low`, `close`, `vol`).
    Equity,
    /// Bid/ask column pairs (`bid_close`, `ask_close`, ...).
    TwoSided,
    /// Fixed-position kline arrays.
    Kline,
}

impl MarketType {
    pub const ALL: [MarketType; 10] = [
        MarketType::Cn,
        MarketType::Us,
        MarketType::Hk,
        MarketType::Fx,
        MarketType::Futures,
        MarketType::Fund,
        MarketType::Repo,
        MarketType::ConvertibleBond,
        MarketType::Options,
        MarketType::Crypto,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MarketType::Cn => "cn",
            MarketType::Us => "us",
            MarketType::Hk => "hk",
            MarketType::Fx => "fx",
            MarketType::Futures => "futures",
            MarketType::Fund => "fund",
            MarketType::Repo => "repo",
            MarketType::ConvertibleBond => "convertible_bond",
            MarketType::Options => "options",
            MarketType::Crypto => "crypto",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            MarketType::Cn => "China A-shares",
            MarketType::Us => "US equities",
            MarketType::Hk => "Hong Kong equities",
            MarketType::Fx => "Foreign exchange",
            MarketType::Futures => "Futures",
            MarketType::Fund => "Funds",
            MarketType::Repo => "Bond repo",
            MarketType::ConvertibleBond => "Convertible bonds",
            MarketType::Options => "Options",
            MarketType::Crypto => "Crypto",
        }
    }

    pub fn schema(self) -> Schema {
        match self {
            MarketType::Fx => Schema::TwoSided,
            MarketType::Crypto => Schema::Kline,
            _ => Schema::Equity,
        }
    }

    /// Daily-bar endpoint name on the batch upstream. Crypto has none.
    pub fn daily_api(self) -> Option<&'static str> {
        match self {
            MarketType::Cn => Some("daily"),
            MarketType::Us => Some("us_daily"),
            MarketType::Hk => Some("hk_daily"),
            MarketType::Fx => Some("fx_daily"),
            MarketType::Futures => Some("fut_daily"),
            MarketType::Fund => Some("fund_daily"),
            MarketType::Repo => Some("repo_daily"),
            MarketType::ConvertibleBond => Some("cb_daily"),
            MarketType::Options => Some("opt_daily"),
            MarketType::Crypto => None,
        }
    }

    /// Only mainland equities are forward-adjusted.
    pub fn requires_adjustment(self) -> bool {
        self == MarketType::Cn
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketType {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        MarketType::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| {
                let supported: Vec<&str> = MarketType::ALL.iter().map(|m| m.as_str()).collect();
                MarketDataError::validation(
                    "market_type",
                    s,
                    format!("supported markets are {}", supported.join(", ")),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(" CN ".parse::<MarketType>().unwrap(), MarketType::Cn);
        assert_eq!(
            "convertible_bond".parse::<MarketType>().unwrap(),
            MarketType::ConvertibleBond
        );
    }

    #[test]
    fn unknown_market_lists_supported() {
        let err = "bonds".parse::<MarketType>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("bonds"));
        assert!(msg.contains("convertible_bond"));
    }

    #[test]
    fn display_round_trips() {
        for market in MarketType::ALL {
            assert_eq!(market.to_string().parse::<MarketType>().unwrap(), market);
        }
    }

    #[test]
    fn schemas() {
        assert_eq!(MarketType::Fx.schema(), Schema::TwoSided);
        assert_eq!(MarketType::Crypto.schema(), Schema::Kline);
        assert_eq!(MarketType::Futures.schema(), Schema::Equity);
        assert!(MarketType::Crypto.daily_api().is_none());
        assert_eq!(MarketType::Options.daily_api(), Some("opt_daily"));
    }

    #[test]
    fn only_cn_is_adjusted() {
        let adjusted: Vec<MarketType> = MarketType::ALL
            .into_iter()
            .filter(|m| m.requires_adjustment())
            .collect();
        assert_eq!(adjusted, vec![MarketType::Cn]);
    }
}
