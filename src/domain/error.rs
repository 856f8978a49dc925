//! Domain error types.

use chrono::NaiveDate;

/// A parse error with position information for indicator spec parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct SpecParseError {
    pub message: String,
    pub position: usize,
}

impl SpecParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Coarse error category exposed to callers deciding whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Api,
    Network,
    NotFound,
    Config,
    Io,
}

/// Top-level error type for quantseries.
#[derive(Debug, thiserror::Error)]
pub enum MarketDataError {
    #[error("invalid indicator '{token}': {source}")]
    IndicatorSpec {
        token: String,
        #[source]
        source: SpecParseError,
    },

    #[error("invalid {field} '{value}': {reason}")]
    Validation {
        field: String,
        value: String,
        reason: String,
    },

    #[error("{api} request for {symbol} failed: {reason}")]
    Api {
        api: String,
        symbol: String,
        reason: String,
    },

    #[error("{api} request for {symbol} did not complete: {reason}")]
    Network {
        api: String,
        symbol: String,
        timed_out: bool,
        reason: String,
    },

    #[error("no {market} data for {symbol} between {start} and {end}")]
    NotFound {
        market: String,
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("kline pagination for {symbol} stalled at cursor {cursor_ms} (last open time {last_open_ms})")]
    PaginationStalled {
        symbol: String,
        cursor_ms: i64,
        last_open_ms: i64,
    },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MarketDataError {
    pub fn validation(field: &str, value: impl ToString, reason: impl Into<String>) -> Self {
        MarketDataError::Validation {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn api(api: &str, symbol: &str, reason: impl Into<String>) -> Self {
        MarketDataError::Api {
            api: api.to_string(),
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MarketDataError::IndicatorSpec { .. } | MarketDataError::Validation { .. } => {
                ErrorKind::Validation
            }
            MarketDataError::Api { .. } | MarketDataError::PaginationStalled { .. } => {
                ErrorKind::Api
            }
            MarketDataError::Network { .. } => ErrorKind::Network,
            MarketDataError::NotFound { .. } => ErrorKind::NotFound,
            MarketDataError::ConfigParse { .. } | MarketDataError::ConfigInvalid { .. } => {
                ErrorKind::Config
            }
            MarketDataError::Io(_) => ErrorKind::Io,
        }
    }

    /// Network failures are the only ones a caller may reasonably retry.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Network
    }
}

impl From<&MarketDataError> for std::process::ExitCode {
    fn from(err: &MarketDataError) -> Self {
        let code: u8 = match err.kind() {
            ErrorKind::Io => 1,
            ErrorKind::Config => 2,
            ErrorKind::Api | ErrorKind::Network => 3,
            ErrorKind::Validation => 4,
            ErrorKind::NotFound => 5,
        };
        std::process::ExitCode::from(code)
    }
}
