//! Crypto pair symbol normalization.
//!
//! Accepted spellings: `BTCUSDT`, `BTC-USDT`, `BTC/USDT` and `bitcoin.usdt`
//! (a coin id plus quote asset). All map to the exchange form `BTCUSDT`.

use crate::domain::error::MarketDataError;

pub const VALID_QUOTES: [&str; 7] = ["USDT", "USDC", "FDUSD", "TUSD", "BUSD", "BTC", "ETH"];

const COIN_IDS: [(&str, &str); 16] = [
    ("bitcoin", "BTC"),
    ("ethereum", "ETH"),
    ("tether", "USDT"),
    ("usd-coin", "USDC"),
    ("solana", "SOL"),
    ("binancecoin", "BNB"),
    ("ripple", "XRP"),
    ("cardano", "ADA"),
    ("polkadot", "DOT"),
    ("chainlink", "LINK"),
    ("litecoin", "LTC"),
    ("shiba-inu", "SHIB"),
    ("tron", "TRX"),
    ("toncoin", "TON"),
    ("bitcoin-cash", "BCH"),
    ("ethereum-classic", "ETC"),
];

fn ticker_for_id(id: &str) -> String {
    let lower = id.to_lowercase();
    COIN_IDS
        .iter()
        .find(|(coin_id, _)| *coin_id == lower)
        .map(|(_, ticker)| ticker.to_string())
        .unwrap_or_else(|| id.to_uppercase())
}

/// Normalize `raw` to an exchange pair symbol.
pub fn normalize_crypto_symbol(raw: &str) -> Result<String, MarketDataError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(MarketDataError::validation("code", raw, "must not be empty"));
    }

    let (base, quote) = if let Some((id, vs)) = trimmed.split_once('.') {
        (ticker_for_id(id), vs.to_uppercase())
    } else if let Some((b, q)) = trimmed.split_once(['-', '/']) {
        (b.to_uppercase(), q.to_uppercase())
    } else {
        return Ok(trimmed.to_uppercase());
    };

    let quote = if quote == "USD" { "USDT".to_string() } else { quote };
    if base.is_empty() {
        return Err(MarketDataError::validation("code", raw, "missing base asset"));
    }
    if !VALID_QUOTES.contains(&quote.as_str()) {
        return Err(MarketDataError::validation(
            "code",
            raw,
            format!(
                "unsupported quote asset '{}', expected one of {}",
                quote,
                VALID_QUOTES.join(", ")
            ),
        ));
    }
    Ok(format!("{base}{quote}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_symbol_passes_through_uppercased() {
        assert_eq!(normalize_crypto_symbol(" btcusdt ").unwrap(), "BTCUSDT");
    }

    #[test]
    fn separators() {
        assert_eq!(normalize_crypto_symbol("BTC-USDT").unwrap(), "BTCUSDT");
        assert_eq!(normalize_crypto_symbol("eth/btc").unwrap(), "ETHBTC");
    }

    #[test]
    fn coin_id_form() {
        assert_eq!(normalize_crypto_symbol("bitcoin.usdt").unwrap(), "BTCUSDT");
        assert_eq!(normalize_crypto_symbol("shiba-inu.USDC").unwrap(), "SHIBUSDC");
        // unknown ids are used verbatim as the ticker
        assert_eq!(normalize_crypto_symbol("pepe.usdt").unwrap(), "PEPEUSDT");
    }

    #[test]
    fn usd_maps_to_usdt() {
        assert_eq!(normalize_crypto_symbol("SOL-USD").unwrap(), "SOLUSDT");
        assert_eq!(normalize_crypto_symbol("ethereum.usd").unwrap(), "ETHUSDT");
    }

    #[test]
    fn unsupported_quote_is_rejected() {
        let err = normalize_crypto_symbol("BTC-EUR").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("EUR"));
        assert!(msg.contains("FDUSD"));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(normalize_crypto_symbol("  ").is_err());
        assert!(normalize_crypto_symbol("-USDT").is_err());
    }
}
