//! Rate table abstractions.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::FetchError;

/// Price of one unit of the base currency expressed in each target currency.
/// Keys are lowercase currency codes.
pub type RateTable = HashMap<String, f64>;

/// Normalizes a currency code for lookups and network calls.
///
/// Codes are ISO-like 3-letter tickers plus symbolic ones (crypto, metals),
/// always lowercase. Returns an empty string for an all-whitespace input;
/// callers treat that as invalid.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_lowercase()
}

#[async_trait]
pub trait RateTableProvider: Send + Sync {
    /// Short name used in logs to tell sources apart.
    fn name(&self) -> &str;

    /// Fetch the full rate table for `base` (lowercase).
    async fn fetch_rates(&self, base: &str) -> Result<RateTable, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("USD"), "usd");
        assert_eq!(normalize_code("  Inr "), "inr");
        assert_eq!(normalize_code("btc"), "btc");
        assert_eq!(normalize_code("   "), "");
    }
}
