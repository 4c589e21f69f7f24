//! Client-side spread filtering.
//!
//! [`matches`] is a pure predicate over a [`Spread`] and a [`FilterConfig`]. The
//! config also carries the editing operations the filter panel needs (exchange
//! toggles, blocked-token list maintenance, threshold parsing).

use crate::shared::{
    registry::{ExchangeRegistry, CANONICAL_EXCHANGES},
    types::Spread,
};
use derive_more::Display;
use indexmap::IndexSet;
use smol_str::SmolStr;
use std::collections::BTreeSet;

/// Quote/stable symbols suggested when the blocked list is empty
pub const POPULAR_BLOCKED_TOKENS: [&str; 6] = ["USDT", "USDC", "BUSD", "DAI", "TUSD", "USDP"];

/// Filter setting edited through free-text input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum FilterField {
    #[display("min spread %")]
    MinSpread,
    #[display("min volume $")]
    MinVolume,
    #[display("block/unblock token")]
    BlockedToken,
    #[display("toggle exchange")]
    Exchange,
}

/// User-controlled filter state
#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    /// Allowed exchanges; both legs of a spread must be members
    pub exchanges: BTreeSet<SmolStr>,
    /// Inclusive lower bound on `spread`, 0 disables
    pub min_spread: f64,
    /// Inclusive lower bound on the larger leg volume, 0 disables
    pub min_volume: f64,
    /// Uppercase substrings; a base token containing any of them is hidden
    pub blocked_tokens: IndexSet<SmolStr>,
}

impl Default for FilterConfig {
    /// Every canonical exchange selected, all thresholds disabled
    fn default() -> Self {
        Self {
            exchanges: CANONICAL_EXCHANGES.iter().map(|name| SmolStr::new(name)).collect(),
            min_spread: 0.0,
            min_volume: 0.0,
            blocked_tokens: IndexSet::new(),
        }
    }
}

impl FilterConfig {
    /// Filter allowing exactly `exchanges` with thresholds disabled
    pub fn with_exchanges<I, S>(exchanges: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            exchanges: exchanges.into_iter().map(|name| SmolStr::new(name.as_ref())).collect(),
            ..Self::default()
        }
    }

    /// Set minimum spread, coercing invalid values to 0
    pub fn with_min_spread(mut self, min_spread: f64) -> Self {
        self.min_spread = sanitize_threshold(min_spread);
        self
    }

    /// Set minimum volume, coercing invalid values to 0
    pub fn with_min_volume(mut self, min_volume: f64) -> Self {
        self.min_volume = sanitize_threshold(min_volume);
        self
    }

    /// Set the blocked list, normalising each entry
    pub fn with_blocked_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.blocked_tokens.clear();
        for token in tokens {
            self.add_blocked_token(token.as_ref());
        }
        self
    }

    /// Apply raw text from the minimum spread input
    pub fn set_min_spread_input(&mut self, input: &str) {
        self.min_spread = parse_threshold(input);
    }

    /// Apply raw text from the minimum volume input
    pub fn set_min_volume_input(&mut self, input: &str) {
        self.min_volume = parse_threshold(input);
    }

    /// Flip whether `exchange` is allowed
    pub fn toggle_exchange(&mut self, exchange: &str) -> bool {
        if self.exchanges.remove(exchange) {
            false
        } else {
            self.exchanges.insert(SmolStr::new(exchange));
            true
        }
    }

    /// Allow every exchange in `available`
    pub fn select_all_exchanges<'a, I>(&mut self, available: I)
    where
        I: IntoIterator<Item = &'a SmolStr>,
    {
        self.exchanges = available.into_iter().cloned().collect();
    }

    /// Allow no exchanges (hides every spread)
    pub fn clear_exchanges(&mut self) {
        self.exchanges.clear();
    }

    /// Add a token typed by the user; returns `false` for blank or duplicate input
    pub fn add_blocked_token(&mut self, input: &str) -> bool {
        let token = input.trim().to_uppercase();
        if token.is_empty() {
            return false;
        }
        self.blocked_tokens.insert(SmolStr::new(token))
    }

    pub fn remove_blocked_token(&mut self, token: &str) -> bool {
        self.blocked_tokens.shift_remove(token)
    }

    /// Flip a suggested token in or out of the blocked list
    pub fn toggle_blocked_token(&mut self, token: &str) -> bool {
        if self.remove_blocked_token(token) {
            false
        } else {
            self.add_blocked_token(token)
        }
    }

    /// Suggestions to show, empty once the user has blocked anything
    pub fn blocked_token_suggestions(&self) -> &'static [&'static str] {
        if self.blocked_tokens.is_empty() {
            &POPULAR_BLOCKED_TOKENS
        } else {
            &[]
        }
    }

    /// Apply text entered for `field`, returning whether the config changed
    ///
    /// Exchange names are matched case-insensitively against `available`; unknown
    /// names are ignored. Token input toggles the token in or out of the blocked list.
    pub fn apply_input(
        &mut self,
        field: FilterField,
        input: &str,
        available: &ExchangeRegistry,
    ) -> bool {
        match field {
            FilterField::MinSpread => {
                let previous = self.min_spread;
                self.set_min_spread_input(input);
                previous != self.min_spread
            }
            FilterField::MinVolume => {
                let previous = self.min_volume;
                self.set_min_volume_input(input);
                previous != self.min_volume
            }
            FilterField::BlockedToken => {
                let token = input.trim().to_uppercase();
                if token.is_empty() {
                    return false;
                }
                self.toggle_blocked_token(&token);
                true
            }
            FilterField::Exchange => {
                let needle = input.trim();
                match available.iter().find(|name| name.eq_ignore_ascii_case(needle)) {
                    Some(name) => {
                        let name = name.clone();
                        self.toggle_exchange(&name);
                        true
                    }
                    None => false,
                }
            }
        }
    }
}

/// Whether `spread` passes every rule of `config`
///
/// Rules short-circuit cheapest first: exchange membership, minimum spread,
/// minimum volume, blocked tokens.
pub fn matches(spread: &Spread, config: &FilterConfig) -> bool {
    passes_exchanges(spread, config)
        && passes_min_spread(spread, config)
        && passes_min_volume(spread, config)
        && passes_blocked_tokens(spread, config)
}

/// Spreads from `spreads` that pass `config`, in input order
pub fn filter_spreads<'a>(
    spreads: &'a [Spread],
    config: &'a FilterConfig,
) -> impl Iterator<Item = &'a Spread> + 'a {
    spreads.iter().filter(move |spread| matches(spread, config))
}

fn passes_exchanges(spread: &Spread, config: &FilterConfig) -> bool {
    config.exchanges.contains(&spread.buy_exchange)
        && config.exchanges.contains(&spread.sell_exchange)
}

fn passes_min_spread(spread: &Spread, config: &FilterConfig) -> bool {
    config.min_spread <= 0.0 || spread.spread >= config.min_spread
}

fn passes_min_volume(spread: &Spread, config: &FilterConfig) -> bool {
    if config.min_volume <= 0.0 {
        return true;
    }
    // Volume 0 means the backend has no figure yet
    let volume = spread.max_volume();
    volume <= 0.0 || volume >= config.min_volume
}

fn passes_blocked_tokens(spread: &Spread, config: &FilterConfig) -> bool {
    if config.blocked_tokens.is_empty() {
        return true;
    }
    let base = spread.base_token().to_uppercase();
    !config
        .blocked_tokens
        .iter()
        .filter(|blocked| !blocked.is_empty())
        .any(|blocked| base.contains(blocked.to_uppercase().as_str()))
}

/// Parse a user-entered threshold; anything non-numeric, negative or non-finite becomes 0
pub fn parse_threshold(input: &str) -> f64 {
    input
        .trim()
        .parse::<f64>()
        .map(sanitize_threshold)
        .unwrap_or(0.0)
}

fn sanitize_threshold(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
