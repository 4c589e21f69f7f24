//! Known exchange identifiers, used to populate filter choices.
//!
//! The registry is seeded with the exchanges the backend supports and only ever
//! grows: identifiers observed in feed responses are merged in, and nothing is
//! removed when a later response omits them.

use smol_str::SmolStr;
use std::collections::BTreeSet;

/// Exchanges the spread engine supports out of the box
pub const CANONICAL_EXCHANGES: [&str; 14] = [
    "Binance", "MEXC", "OKX", "Bybit", "Gate.io", "KuCoin", "BitGet", "BingX", "CoinEx", "XT",
    "BitMart", "LBank", "OurBit", "BloFin",
];

/// De-duplicated, sorted set of exchange identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRegistry {
    exchanges: BTreeSet<SmolStr>,
}

impl ExchangeRegistry {
    /// Registry seeded with [`CANONICAL_EXCHANGES`]
    pub fn new() -> Self {
        Self {
            exchanges: CANONICAL_EXCHANGES.iter().map(|name| SmolStr::new(name)).collect(),
        }
    }

    /// Registry with no known exchanges
    pub fn empty() -> Self {
        Self {
            exchanges: BTreeSet::new(),
        }
    }

    /// Union `observed` into the registry, returning how many identifiers were new
    ///
    /// Blank identifiers are ignored.
    pub fn merge<I, S>(&mut self, observed: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        observed
            .into_iter()
            .filter(|name| !name.as_ref().trim().is_empty())
            .filter(|name| self.exchanges.insert(SmolStr::new(name.as_ref())))
            .count()
    }

    pub fn contains(&self, exchange: &str) -> bool {
        self.exchanges.contains(exchange)
    }

    /// Identifiers in stable display order
    pub fn iter(&self) -> impl Iterator<Item = &SmolStr> {
        self.exchanges.iter()
    }

    pub fn to_vec(&self) -> Vec<SmolStr> {
        self.exchanges.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }
}

impl Default for ExchangeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
