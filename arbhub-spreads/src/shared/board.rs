//! View model behind the spread table.
//!
//! [`SpreadBoard`] combines the acquired snapshot with the user's filter,
//! expansion and selection state. Grouped output is memoized per
//! (snapshot, filter) pair, so redraws without new data or filter edits reuse it.

use crate::shared::{
    error::FeedError,
    expansion::ExpansionState,
    filter::{filter_spreads, FilterConfig, FilterField},
    grouping::{group_spreads, visible_rows, DisplayRow, GroupedToken},
    registry::ExchangeRegistry,
    state::SpreadAcquirer,
    types::Spread,
};
use derive_more::Display;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// What the table body should show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BoardPhase {
    /// No rows yet and a request is outstanding
    #[display("fetching")]
    Fetching,
    /// No rows and nothing in flight
    #[display("waiting")]
    Waiting,
    #[display("ready")]
    Ready,
}

impl BoardPhase {
    /// Message shown in place of an empty table
    pub fn placeholder(&self) -> Option<&'static str> {
        match self {
            BoardPhase::Fetching => Some("Fetching spreads..."),
            BoardPhase::Waiting => Some("Waiting for data..."),
            BoardPhase::Ready => None,
        }
    }
}

/// Toolbar summary of the board
#[derive(Debug, Clone)]
pub struct BoardStatus {
    pub loading: bool,
    /// Server fetch time of the held snapshot, 0 if never fetched
    pub last_fetched: f64,
    pub available_exchanges: Arc<ExchangeRegistry>,
    /// Groups after filtering
    pub token_count: usize,
    /// Spreads after filtering
    pub spread_count: usize,
    pub phase: BoardPhase,
}

#[derive(Debug)]
struct GroupCache {
    spreads: Arc<Vec<Spread>>,
    filter: FilterConfig,
    groups: Arc<Vec<GroupedToken>>,
}

#[derive(Debug)]
pub struct SpreadBoard {
    acquirer: SpreadAcquirer,
    filter: FilterConfig,
    expansion: ExpansionState,
    selected: Option<String>,
    cache: Mutex<Option<GroupCache>>,
}

impl SpreadBoard {
    pub fn new(acquirer: SpreadAcquirer) -> Self {
        Self {
            acquirer,
            filter: FilterConfig::default(),
            expansion: ExpansionState::new(),
            selected: None,
            cache: Mutex::new(None),
        }
    }

    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filter = filter;
        self
    }

    pub fn acquirer(&self) -> &SpreadAcquirer {
        &self.acquirer
    }

    /// Manual fetch; never re-arms the automatic loop
    pub async fn refresh(&self) -> Result<usize, FeedError> {
        self.acquirer.fetch_spreads().await
    }

    pub fn filter(&self) -> &FilterConfig {
        &self.filter
    }

    /// Edits are picked up by the next [`SpreadBoard::groups`] call
    pub fn filter_mut(&mut self) -> &mut FilterConfig {
        &mut self.filter
    }

    /// Allow every exchange known so far, including ones discovered at runtime
    pub fn select_all_exchanges(&mut self) {
        let exchanges = Arc::clone(&self.acquirer.store().snapshot().exchanges);
        self.filter.select_all_exchanges(exchanges.iter());
    }

    /// Apply text entered for `field` against the known exchanges
    pub fn apply_filter_input(&mut self, field: FilterField, input: &str) -> bool {
        let exchanges = Arc::clone(&self.acquirer.store().snapshot().exchanges);
        self.filter.apply_input(field, input, &exchanges)
    }

    pub fn expansion(&self) -> &ExpansionState {
        &self.expansion
    }

    pub fn toggle_expanded(&mut self, token: &str) -> bool {
        self.expansion.toggle(token)
    }

    /// Filtered spreads grouped by token, best group first
    pub fn groups(&self) -> Arc<Vec<GroupedToken>> {
        let spreads = Arc::clone(&self.acquirer.store().snapshot().spreads);
        let mut cache = self.cache.lock();

        if let Some(cached) = cache.as_ref() {
            if Arc::ptr_eq(&cached.spreads, &spreads) && cached.filter == self.filter {
                return Arc::clone(&cached.groups);
            }
        }

        let groups = Arc::new(group_spreads(filter_spreads(&spreads, &self.filter)));
        debug!(
            spreads = spreads.len(),
            groups = groups.len(),
            "regrouped spreads"
        );
        *cache = Some(GroupCache {
            spreads,
            filter: self.filter.clone(),
            groups: Arc::clone(&groups),
        });
        groups
    }

    /// Toggle the group owning the row at `index` of the current rows
    ///
    /// A sub row collapses its group. Returns the index of the group's headline
    /// row, or `None` when there is no such row or the group cannot expand.
    pub fn toggle_row(&mut self, index: usize) -> Option<usize> {
        let groups = self.groups();
        let (token, headline) = {
            let rows = self.rows(&groups);
            let row = rows.get(index)?;
            if let DisplayRow::Best {
                expandable: false, ..
            } = row
            {
                return None;
            }
            let token = row.token();
            let headline = rows.iter().position(
                |candidate| matches!(candidate, DisplayRow::Best { group, .. } if group.token == token),
            )?;
            (token.to_string(), headline)
        };

        self.expansion.toggle(&token);
        Some(headline)
    }

    /// Table rows for `groups` under the current expansion state
    pub fn rows<'a>(&self, groups: &'a [GroupedToken]) -> Vec<DisplayRow<'a>> {
        visible_rows(groups, &self.expansion)
    }

    /// Select the spread with `id` if the current snapshot holds it
    pub fn select(&mut self, id: &str) -> Option<Spread> {
        let spread = self.acquirer.store().snapshot().find(id).cloned()?;
        self.selected = Some(spread.id.clone());
        Some(spread)
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Selected spread as held now; `None` once a refresh drops it
    pub fn selected(&self) -> Option<Spread> {
        let id = self.selected.as_deref()?;
        self.acquirer.store().snapshot().find(id).cloned()
    }

    pub fn status(&self) -> BoardStatus {
        let store = self.acquirer.store();
        let snapshot = store.snapshot();
        let groups = self.groups();
        let loading = store.is_loading();

        let phase = match (groups.is_empty(), loading) {
            (false, _) => BoardPhase::Ready,
            (true, true) => BoardPhase::Fetching,
            (true, false) => BoardPhase::Waiting,
        };

        BoardStatus {
            loading,
            last_fetched: snapshot.fetched_at,
            available_exchanges: Arc::clone(&snapshot.exchanges),
            token_count: groups.len(),
            spread_count: groups.iter().map(GroupedToken::len).sum(),
            phase,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{
        feed::SpreadFeed,
        state::SpreadStore,
        types::{ArbitrageMode, SpreadStatus, SpreadsResponse},
    };
    use async_trait::async_trait;
    use smol_str::SmolStr;

    fn spread(id: &str, token: &str, pct: f64, buy: &str, sell: &str) -> Spread {
        Spread {
            id: id.to_string(),
            token: token.to_string(),
            buy_exchange: SmolStr::new(buy),
            sell_exchange: SmolStr::new(sell),
            buy_price: 1.0,
            sell_price: 1.0 + pct / 100.0,
            spread: pct,
            buy_volume: 0.0,
            sell_volume: 0.0,
            funding: 0.0,
            status: SpreadStatus::Active,
            time_active: String::new(),
        }
    }

    struct EmptyFeed;

    #[async_trait]
    impl SpreadFeed for EmptyFeed {
        async fn fetch(&self, _: ArbitrageMode) -> Result<SpreadsResponse, FeedError> {
            Ok(SpreadsResponse::default())
        }
    }

    fn board() -> (SpreadBoard, Arc<SpreadStore>) {
        let store = Arc::new(SpreadStore::new());
        let acquirer = SpreadAcquirer::new(
            Arc::new(EmptyFeed),
            Arc::clone(&store),
            ArbitrageMode::FuturesFutures,
        );
        (SpreadBoard::new(acquirer), store)
    }

    fn load(store: &SpreadStore, spreads: Vec<Spread>) {
        store.apply(
            SpreadsResponse {
                spreads: Some(spreads),
                fetched_at: Some(1_700_000_000.0),
                exchanges: None,
                count: None,
            },
            0.0,
        );
    }

    fn sample() -> Vec<Spread> {
        vec![
            spread("1", "BTC/USDT", 1.2, "Binance", "OKX"),
            spread("2", "BTC/USDT", 1.5, "Bybit", "OKX"),
            spread("3", "ETH/USDT", 2.0, "Binance", "MEXC"),
            spread("4", "USDC/USDT", 0.2, "Binance", "OKX"),
        ]
    }

    #[test]
    fn test_status_phases() {
        let (board, store) = board();
        assert_eq!(board.status().phase, BoardPhase::Waiting);

        let loading = store.begin_request();
        assert_eq!(board.status().phase, BoardPhase::Fetching);
        drop(loading);

        load(&store, sample());
        let status = board.status();
        assert_eq!(status.phase, BoardPhase::Ready);
        assert_eq!(status.token_count, 3);
        assert_eq!(status.spread_count, 4);
        assert_eq!(status.last_fetched, 1_700_000_000.0);
        assert_eq!(status.phase.placeholder(), None);
    }

    #[test]
    fn test_groups_apply_filter() {
        let (mut board, store) = board();
        load(&store, sample());

        board.filter_mut().add_blocked_token("usdc");
        board.filter_mut().toggle_exchange("Bybit");

        let groups = board.groups();
        let tokens: Vec<&str> = groups.iter().map(|g| g.token.as_str()).collect();
        assert_eq!(tokens, vec!["ETH", "BTC"]);
        assert_eq!(groups[1].best.id, "1");
        assert!(groups[1].others.is_empty());
    }

    #[test]
    fn test_filtered_out_board_reports_waiting() {
        let (mut board, store) = board();
        load(&store, sample());
        board.filter_mut().set_min_spread_input("50");

        let status = board.status();
        assert_eq!(status.phase, BoardPhase::Waiting);
        assert_eq!(status.phase.placeholder(), Some("Waiting for data..."));
    }

    #[test]
    fn test_groups_memoized_per_snapshot_and_filter() {
        let (mut board, store) = board();
        load(&store, sample());

        let first = board.groups();
        assert!(Arc::ptr_eq(&first, &board.groups()));

        board.filter_mut().set_min_spread_input("1.4");
        let filtered = board.groups();
        assert!(!Arc::ptr_eq(&first, &filtered));
        assert_eq!(filtered.len(), 2);

        load(&store, sample());
        assert!(!Arc::ptr_eq(&filtered, &board.groups()));
    }

    #[test]
    fn test_rows_follow_expansion_across_refresh() {
        let (mut board, store) = board();
        load(&store, sample());
        assert!(board.toggle_expanded("BTC"));

        load(&store, sample());
        let groups = board.groups();
        let rows = board.rows(&groups);
        assert_eq!(rows.len(), 4);
        assert!(matches!(rows[2], DisplayRow::Sub { token: "BTC", .. }));
    }

    #[test]
    fn test_toggle_row_from_headline_and_sub_row() {
        let (mut board, store) = board();
        load(&store, sample());

        // Rows: ETH, BTC (+1), USDC
        assert_eq!(board.toggle_row(0), None);
        assert_eq!(board.toggle_row(1), Some(1));
        assert!(board.expansion().is_expanded("BTC"));

        // Rows: ETH, BTC, BTC sub, USDC
        assert_eq!(board.toggle_row(2), Some(1));
        assert!(!board.expansion().is_expanded("BTC"));
        assert_eq!(board.toggle_row(9), None);
    }

    #[test]
    fn test_discovered_exchange_can_be_selected() {
        let (mut board, store) = board();
        store.apply(
            SpreadsResponse {
                spreads: Some(vec![spread("h", "SOL/USDT", 0.9, "Hyperliquid", "OKX")]),
                fetched_at: Some(1_700_000_000.0),
                exchanges: Some(vec![SmolStr::new("Hyperliquid")]),
                count: Some(1),
            },
            0.0,
        );
        assert!(board.groups().is_empty());

        board.select_all_exchanges();
        assert_eq!(board.groups().len(), 1);
        assert_eq!(board.filter().exchanges.len(), board.status().available_exchanges.len());

        assert!(board.apply_filter_input(FilterField::Exchange, "hyperliquid"));
        assert!(board.groups().is_empty());
        assert!(!board.apply_filter_input(FilterField::Exchange, "Nowhere"));
    }

    #[test]
    fn test_selection() {
        let (mut board, store) = board();
        load(&store, sample());

        assert!(board.select("missing").is_none());
        assert_eq!(board.selected_id(), None);

        let selected = board.select("3").unwrap();
        assert_eq!(selected.token, "ETH/USDT");
        assert_eq!(board.selected_id(), Some("3"));

        load(&store, vec![]);
        assert_eq!(board.selected_id(), Some("3"));
        assert!(board.selected().is_none());

        board.clear_selection();
        assert_eq!(board.selected_id(), None);
    }

    #[tokio::test]
    async fn test_refresh_replaces_snapshot() {
        let (board, store) = board();
        load(&store, sample());

        assert_eq!(board.refresh().await.unwrap(), 0);
        assert!(board.groups().is_empty());
        assert_eq!(board.status().phase, BoardPhase::Waiting);
    }
}
