// src/symbol.rs

use std::fmt;

use crate::error::ConfigError;

/// A canonical `BASE-QUOTE` symbol, e.g. `BTC-USDT`.
///
/// Adapters translate this into venue-native form on the wire; the
/// foundation, registry, price store, and OHLC engine only ever see the
/// canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(String);

impl Symbol {
    /// Parses and validates a canonical symbol: uppercase ASCII, exactly one
    /// hyphen, non-empty base and quote.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        if raw.is_empty() {
            return Err(ConfigError::EmptySymbol);
        }

        let mut parts = raw.split('-');
        let (base, quote, rest) = match (parts.next(), parts.next(), parts.next()) {
            (Some(base), Some(quote), None) => (base, quote, ()),
            _ => return Err(ConfigError::InvalidSymbol(raw.to_string())),
        };
        let _ = rest;

        if base.is_empty() || quote.is_empty() {
            return Err(ConfigError::InvalidSymbol(raw.to_string()));
        }

        if !raw.bytes().all(|b| b.is_ascii_uppercase() || b == b'-') {
            return Err(ConfigError::InvalidSymbol(raw.to_string()));
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_canonical_form() {
        let s = Symbol::parse("BTC-USDT").unwrap();
        assert_eq!(s.as_str(), "BTC-USDT");
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(Symbol::parse("").unwrap_err(), ConfigError::EmptySymbol);
    }

    #[test]
    fn rejects_lowercase() {
        assert!(matches!(
            Symbol::parse("btc-usdt").unwrap_err(),
            ConfigError::InvalidSymbol(_)
        ));
    }

    #[test]
    fn rejects_missing_hyphen() {
        assert!(matches!(
            Symbol::parse("BTCUSDT").unwrap_err(),
            ConfigError::InvalidSymbol(_)
        ));
    }

    #[test]
    fn rejects_multiple_hyphens() {
        assert!(matches!(
            Symbol::parse("BTC-USD-T").unwrap_err(),
            ConfigError::InvalidSymbol(_)
        ));
    }
}
