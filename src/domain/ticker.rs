//! Ticker symbols and the fixed selection menu.
//!
//! Symbols are trimmed and upper-cased on construction so that `aapl`,
//! ` AAPL ` and `AAPL` identify the same security within a request.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Tickers offered for selection.
pub const TICKER_MENU: &[&str] = &[
    "F", "AMZN", "TSLA", "INTC", "BAC", "VALE", "AMD", "AAPL", "SOFI", "KVUE", "GOOG", "NVDA",
    "PLTR", "AAL", "CMCSA", "NIO", "T", "PFE", "META", "MSFT", "GM", "AVTR", "CCL", "GOLD", "NU",
    "RIVN", "SNAP", "CVX", "BBD", "VZ", "GRAB", "NOK", "XOM", "PLUG", "NYCB", "UAA", "SQ", "ENPH",
    "AES", "RTX", "NEM", "AGNC", "PYPL", "PBR", "LU", "UBER", "BMY", "PCG", "BCS",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TickerError {
    #[error("no tickers selected")]
    Empty,

    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),

    #[error("invalid character {ch:?} in ticker {ticker}")]
    InvalidCharacter { ticker: String, ch: char },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TickerSymbol(String);

impl TickerSymbol {
    pub fn parse(raw: &str) -> Result<Self, TickerError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TickerError::EmptyToken);
        }
        // Exchange suffixes and index/futures markers: BRK.B, BF-B, ^GSPC, ES=F
        if let Some(ch) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '=')))
        {
            return Err(TickerError::InvalidCharacter {
                ticker: trimmed.to_string(),
                ch,
            });
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Symbol as sent to the data source.
    pub fn query_symbol(&self, lowercase: bool) -> String {
        if lowercase {
            self.0.to_ascii_lowercase()
        } else {
            self.0.clone()
        }
    }

    pub fn in_menu(&self) -> bool {
        TICKER_MENU.contains(&self.0.as_str())
    }
}

impl fmt::Display for TickerSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TickerSymbol {
    type Err = TickerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for TickerSymbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Parse a comma-separated ticker list, preserving order.
pub fn parse_tickers(input: &str) -> Result<Vec<TickerSymbol>, TickerError> {
    if input.trim().is_empty() {
        return Err(TickerError::Empty);
    }

    let mut tickers = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let ticker = TickerSymbol::parse(token)?;
        if !seen.insert(ticker.clone()) {
            return Err(TickerError::DuplicateTicker(ticker.0));
        }
        tickers.push(ticker);
    }

    Ok(tickers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_trims_and_uppercases() {
        let t = TickerSymbol::parse("  aapl ").unwrap();
        assert_eq!(t.as_str(), "AAPL");
        assert_eq!(t.to_string(), "AAPL");
    }

    #[test]
    fn parse_rejects_blank() {
        assert_eq!(TickerSymbol::parse("   "), Err(TickerError::EmptyToken));
    }

    #[test]
    fn parse_accepts_exchange_punctuation() {
        assert_eq!(TickerSymbol::parse("brk.b").unwrap().as_str(), "BRK.B");
        assert_eq!(TickerSymbol::parse("^gspc").unwrap().as_str(), "^GSPC");
        assert_eq!(TickerSymbol::parse("es=f").unwrap().as_str(), "ES=F");
    }

    #[test]
    fn parse_rejects_inner_whitespace() {
        let err = TickerSymbol::parse("AA PL").unwrap_err();
        assert!(matches!(err, TickerError::InvalidCharacter { ch: ' ', .. }));
    }

    #[test]
    fn query_symbol_respects_case_policy() {
        let t = TickerSymbol::parse("GOOG").unwrap();
        assert_eq!(t.query_symbol(true), "goog");
        assert_eq!(t.query_symbol(false), "GOOG");
    }

    #[test]
    fn parse_tickers_preserves_order() {
        let tickers = parse_tickers("tsla, AAPL ,goog").unwrap();
        let names: Vec<_> = tickers.iter().map(|t| t.as_str()).collect();
        assert_eq!(names, vec!["TSLA", "AAPL", "GOOG"]);
    }

    #[test]
    fn parse_tickers_rejects_empty_token() {
        assert_eq!(parse_tickers("AAPL,,GOOG"), Err(TickerError::EmptyToken));
    }

    #[test]
    fn parse_tickers_rejects_case_insensitive_duplicates() {
        assert_eq!(
            parse_tickers("AAPL,goog,aapl"),
            Err(TickerError::DuplicateTicker("AAPL".into()))
        );
    }

    #[test]
    fn parse_tickers_rejects_empty_input() {
        assert_eq!(parse_tickers(""), Err(TickerError::Empty));
    }

    #[test]
    fn menu_has_no_duplicates() {
        let unique: HashSet<_> = TICKER_MENU.iter().collect();
        assert_eq!(unique.len(), TICKER_MENU.len());
        assert!(TickerSymbol::parse("nvda").unwrap().in_menu());
        assert!(!TickerSymbol::parse("ZZZZ").unwrap().in_menu());
    }
}
