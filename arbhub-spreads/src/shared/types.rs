/// Core data types for the spread feed
///
/// These types match the JSON payload served by the spread backend at
/// `GET /api/spreads?mode=<mode>`.
use derive_more::Display;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::str::FromStr;

/// Lifecycle status of a spread as reported by the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum SpreadStatus {
    #[default]
    #[display("active")]
    Active,
    #[display("pending")]
    Pending,
    #[display("expired")]
    Expired,
}

/// One cross-exchange arbitrage opportunity
///
/// Records are snapshots: a refresh replaces the whole collection and only `id`
/// equality is meaningful across refreshes.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Spread {
    /// Opaque identifier, unique within one response
    pub id: String,
    /// Pair identifier in `BASE/QUOTE` form (e.g., "BTC/USDT")
    pub token: String,
    /// Exchange to buy on (lowest ask)
    pub buy_exchange: SmolStr,
    /// Exchange to sell on (highest bid)
    pub sell_exchange: SmolStr,
    pub buy_price: f64,
    pub sell_price: f64,
    /// Percentage advantage of selling over buying
    pub spread: f64,
    /// Quote-currency notional, 0 when unknown
    #[serde(default)]
    pub buy_volume: f64,
    /// Quote-currency notional, 0 when unknown
    #[serde(default)]
    pub sell_volume: f64,
    /// Funding rate as a signed fraction (0.0001 = 0.01%)
    #[serde(default)]
    pub funding: f64,
    #[serde(default)]
    pub status: SpreadStatus,
    /// Pre-formatted elapsed time label, displayed verbatim
    #[serde(default)]
    pub time_active: String,
}

impl Spread {
    /// Base symbol of the pair (segment before the first `/`)
    pub fn base_token(&self) -> &str {
        base_token(&self.token)
    }

    /// Larger of the two leg volumes
    pub fn max_volume(&self) -> f64 {
        self.buy_volume.max(self.sell_volume)
    }
}

/// Extract the base symbol from a `BASE/QUOTE` pair identifier
///
/// Identifiers without a slash are their own base.
pub fn base_token(pair: &str) -> &str {
    pair.split_once('/').map_or(pair, |(base, _)| base)
}

/// Success payload of the spread feed
///
/// Every field is optional on the wire; absent and `null` are treated alike.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadsResponse {
    pub spreads: Option<Vec<Spread>>,
    /// Server-side fetch time in Unix seconds
    pub fetched_at: Option<f64>,
    /// Exchanges observed in this response
    pub exchanges: Option<Vec<SmolStr>>,
    pub count: Option<usize>,
}

/// Market pairing the backend computes spreads for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "kebab-case")]
pub enum ArbitrageMode {
    #[default]
    #[display("futures-futures")]
    FuturesFutures,
    #[display("spot-futures")]
    SpotFutures,
    #[display("futures-margin")]
    FuturesMargin,
}

impl ArbitrageMode {
    pub const ALL: [ArbitrageMode; 3] = [
        ArbitrageMode::FuturesFutures,
        ArbitrageMode::SpotFutures,
        ArbitrageMode::FuturesMargin,
    ];

    /// Query-string value understood by the backend
    pub fn as_str(&self) -> &'static str {
        match self {
            ArbitrageMode::FuturesFutures => "futures-futures",
            ArbitrageMode::SpotFutures => "spot-futures",
            ArbitrageMode::FuturesMargin => "futures-margin",
        }
    }
}

impl FromStr for ArbitrageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == needle)
            .ok_or_else(|| format!("unknown arbitrage mode: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_token() {
        assert_eq!(base_token("BTC/USDT"), "BTC");
        assert_eq!(base_token("1000PEPE/USDT"), "1000PEPE");
        assert_eq!(base_token("BTCUSDT"), "BTCUSDT");
        assert_eq!(base_token("A/B/C"), "A");
    }

    #[test]
    fn test_spread_deserialize_camel_case() {
        let json = r#"{
            "id": "7",
            "token": "ETH/USDT",
            "buyExchange": "OKX",
            "sellExchange": "Bybit",
            "buyPrice": 3120.5,
            "sellPrice": 3150.25,
            "spread": 0.9534,
            "buyVolume": 1250000.0,
            "sellVolume": 0.0,
            "status": "pending",
            "funding": -0.0002,
            "timeActive": "—"
        }"#;

        let spread: Spread = serde_json::from_str(json).unwrap();
        assert_eq!(spread.base_token(), "ETH");
        assert_eq!(spread.buy_exchange, "OKX");
        assert_eq!(spread.status, SpreadStatus::Pending);
        assert_eq!(spread.max_volume(), 1_250_000.0);
        assert_eq!(spread.time_active, "—");
    }

    #[test]
    fn test_response_tolerates_missing_and_null_fields() {
        let response: SpreadsResponse = serde_json::from_str("{}").unwrap();
        assert!(response.spreads.is_none());
        assert!(response.fetched_at.is_none());
        assert!(response.exchanges.is_none());

        let response: SpreadsResponse =
            serde_json::from_str(r#"{"spreads": null, "exchanges": ["OKX"], "fetchedAt": 1700000000.5}"#)
                .unwrap();
        assert!(response.spreads.is_none());
        assert_eq!(response.exchanges.unwrap(), vec![SmolStr::new("OKX")]);
        assert_eq!(response.fetched_at, Some(1_700_000_000.5));
    }

    #[test]
    fn test_arbitrage_mode_round_trip_strings() {
        for mode in ArbitrageMode::ALL {
            assert_eq!(mode.as_str().parse::<ArbitrageMode>().unwrap(), mode);
            assert_eq!(mode.to_string(), mode.as_str());
        }
        assert_eq!(" Spot-Futures ".parse::<ArbitrageMode>().unwrap(), ArbitrageMode::SpotFutures);
        assert!("spot-spot".parse::<ArbitrageMode>().is_err());
        assert_eq!(ArbitrageMode::default(), ArbitrageMode::FuturesFutures);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(SpreadStatus::Active.to_string(), "active");
        assert_eq!(SpreadStatus::Expired.to_string(), "expired");
    }
}
