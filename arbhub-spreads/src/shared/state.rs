//! Shared acquisition state.
//!
//! [`SpreadStore`] holds the latest feed snapshot behind a lock and swaps it
//! wholesale on every successful fetch, so readers always see a complete
//! snapshot. [`SpreadAcquirer`] performs one fetch against a [`SpreadFeed`] and
//! publishes the result into the store.

use crate::shared::{
    error::FeedError,
    feed::SpreadFeed,
    format::unix_now,
    registry::ExchangeRegistry,
    types::{ArbitrageMode, Spread, SpreadsResponse},
};
use parking_lot::RwLock;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tracing::{debug, error, info};

/// Immutable view of everything acquired so far
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    /// Raw spreads from the latest successful fetch, in feed order
    pub spreads: Arc<Vec<Spread>>,
    /// Server-reported fetch time in Unix seconds, 0 before the first success
    pub fetched_at: f64,
    /// Every exchange seen since startup
    pub exchanges: Arc<ExchangeRegistry>,
}

impl Default for FeedSnapshot {
    fn default() -> Self {
        Self {
            spreads: Arc::new(Vec::new()),
            fetched_at: 0.0,
            exchanges: Arc::new(ExchangeRegistry::new()),
        }
    }
}

impl FeedSnapshot {
    /// Look up a spread by id
    pub fn find(&self, id: &str) -> Option<&Spread> {
        self.spreads.iter().find(|spread| spread.id == id)
    }
}

/// Owner of the acquired spread state
#[derive(Debug, Default)]
pub struct SpreadStore {
    snapshot: RwLock<Arc<FeedSnapshot>>,
    in_flight: AtomicUsize,
}

impl SpreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with a custom exchange registry
    pub fn with_registry(exchanges: ExchangeRegistry) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(FeedSnapshot {
                exchanges: Arc::new(exchanges),
                ..FeedSnapshot::default()
            })),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Current snapshot; cheap to clone and never partially updated
    pub fn snapshot(&self) -> Arc<FeedSnapshot> {
        Arc::clone(&self.snapshot.read())
    }

    /// True while at least one request is outstanding
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) > 0
    }

    /// Mark a request as outstanding until the returned guard drops
    pub fn begin_request(&self) -> LoadingGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        LoadingGuard { store: self }
    }

    /// Publish a successful response, returning the number of spreads received
    ///
    /// Spreads are replaced wholesale; the exchange registry is unioned with any
    /// exchanges in the response and never shrinks. `now` is used when the
    /// response carries no timestamp.
    pub fn apply(&self, response: SpreadsResponse, now: f64) -> usize {
        let spreads = response.spreads.unwrap_or_default();
        let count = spreads.len();
        let fetched_at = response.fetched_at.unwrap_or(now);

        let mut guard = self.snapshot.write();
        let exchanges = match response.exchanges {
            Some(observed) if !observed.is_empty() => {
                let mut merged = ExchangeRegistry::clone(&guard.exchanges);
                let added = merged.merge(&observed);
                if added > 0 {
                    debug!(added, total = merged.len(), "discovered new exchanges");
                }
                Arc::new(merged)
            }
            _ => Arc::clone(&guard.exchanges),
        };

        *guard = Arc::new(FeedSnapshot {
            spreads: Arc::new(spreads),
            fetched_at,
            exchanges,
        });
        count
    }
}

/// Keeps [`SpreadStore::is_loading`] true while alive
#[derive(Debug)]
pub struct LoadingGuard<'a> {
    store: &'a SpreadStore,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.store.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Performs single fetches against a feed and publishes them to a store
#[derive(Clone)]
pub struct SpreadAcquirer {
    feed: Arc<dyn SpreadFeed>,
    store: Arc<SpreadStore>,
    mode: ArbitrageMode,
}

impl std::fmt::Debug for SpreadAcquirer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpreadAcquirer")
            .field("mode", &self.mode)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl SpreadAcquirer {
    pub fn new(feed: Arc<dyn SpreadFeed>, store: Arc<SpreadStore>, mode: ArbitrageMode) -> Self {
        Self { feed, store, mode }
    }

    pub fn store(&self) -> &Arc<SpreadStore> {
        &self.store
    }

    pub fn mode(&self) -> ArbitrageMode {
        self.mode
    }

    /// Fetch once and publish the result
    ///
    /// Returns the number of spreads received. On failure the error is logged and
    /// returned, and the held snapshot is left untouched.
    pub async fn fetch_spreads(&self) -> Result<usize, FeedError> {
        let _loading = self.store.begin_request();

        match self.feed.fetch(self.mode).await {
            Ok(response) => {
                let count = self.store.apply(response, unix_now());
                info!(count, mode = %self.mode, "fetched spreads");
                Ok(count)
            }
            Err(error) => {
                error!(%error, transient = error.is_transient(), mode = %self.mode, "failed to fetch spreads");
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::types::SpreadStatus;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use smol_str::SmolStr;
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    fn spread(id: &str, token: &str) -> Spread {
        Spread {
            id: id.to_string(),
            token: token.to_string(),
            buy_exchange: SmolStr::new("Binance"),
            sell_exchange: SmolStr::new("OKX"),
            buy_price: 10.0,
            sell_price: 10.1,
            spread: 1.0,
            buy_volume: 0.0,
            sell_volume: 0.0,
            funding: 0.0,
            status: SpreadStatus::Active,
            time_active: String::new(),
        }
    }

    fn response(spreads: Vec<Spread>, exchanges: Option<Vec<&str>>) -> SpreadsResponse {
        SpreadsResponse {
            count: Some(spreads.len()),
            spreads: Some(spreads),
            fetched_at: Some(1_700_000_000.0),
            exchanges: exchanges.map(|names| names.into_iter().map(SmolStr::new).collect()),
        }
    }

    struct OneShotFeed(Mutex<Option<Result<SpreadsResponse, FeedError>>>);

    #[async_trait]
    impl SpreadFeed for OneShotFeed {
        async fn fetch(&self, _: ArbitrageMode) -> Result<SpreadsResponse, FeedError> {
            self.0
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Ok(SpreadsResponse::default()))
        }
    }

    fn acquirer(
        result: Result<SpreadsResponse, FeedError>,
        store: Arc<SpreadStore>,
    ) -> SpreadAcquirer {
        let feed = Arc::new(OneShotFeed(Mutex::new(Some(result))));
        SpreadAcquirer::new(feed, store, ArbitrageMode::FuturesFutures)
    }

    #[test]
    fn test_apply_replaces_spreads_wholesale() {
        let store = SpreadStore::new();
        store.apply(response(vec![spread("1", "BTC/USDT"), spread("2", "ETH/USDT")], None), 5.0);
        assert_eq!(store.snapshot().spreads.len(), 2);

        let count = store.apply(response(vec![spread("9", "SOL/USDT")], None), 5.0);
        let snapshot = store.snapshot();
        assert_eq!(count, 1);
        assert_eq!(snapshot.spreads.len(), 1);
        assert_eq!(snapshot.spreads[0].id, "9");
        assert_eq!(snapshot.fetched_at, 1_700_000_000.0);
    }

    #[test]
    fn test_apply_defaults_missing_fields() {
        let store = SpreadStore::new();
        store.apply(response(vec![spread("1", "BTC/USDT")], None), 5.0);

        let count = store.apply(SpreadsResponse::default(), 42.5);
        let snapshot = store.snapshot();
        assert_eq!(count, 0);
        assert!(snapshot.spreads.is_empty());
        assert_eq!(snapshot.fetched_at, 42.5);
    }

    #[test]
    fn test_apply_merges_exchanges_without_shrinking() {
        let store = SpreadStore::with_registry(ExchangeRegistry::empty());

        store.apply(response(vec![], Some(vec!["OKX", "Binance"])), 0.0);
        store.apply(response(vec![], Some(vec!["Bybit"])), 0.0);
        store.apply(response(vec![], None), 0.0);
        store.apply(response(vec![], Some(vec![])), 0.0);

        let names: Vec<SmolStr> = store.snapshot().exchanges.to_vec();
        assert_eq!(names, vec!["Binance", "Bybit", "OKX"]);
    }

    #[test]
    fn test_snapshots_are_immutable_for_readers() {
        let store = SpreadStore::new();
        store.apply(response(vec![spread("1", "BTC/USDT")], None), 0.0);
        let held = store.snapshot();

        store.apply(response(vec![], None), 0.0);
        assert_eq!(held.spreads.len(), 1);
        assert!(held.find("1").is_some());
        assert!(store.snapshot().find("1").is_none());
    }

    #[test]
    fn test_loading_guard_tracks_outstanding_requests() {
        let store = SpreadStore::new();
        assert!(!store.is_loading());

        let first = store.begin_request();
        let second = store.begin_request();
        assert!(store.is_loading());
        drop(first);
        assert!(store.is_loading());
        drop(second);
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_fetch_spreads_success_returns_count() {
        let store = Arc::new(SpreadStore::new());
        let acquirer = acquirer(
            Ok(response(vec![spread("1", "BTC/USDT")], Some(vec!["Hyperliquid"]))),
            Arc::clone(&store),
        );

        let count = tokio_test::assert_ok!(acquirer.fetch_spreads().await);
        assert_eq!(count, 1);
        assert!(!store.is_loading());
        assert!(store.snapshot().exchanges.contains("Hyperliquid"));
        assert!(store.snapshot().exchanges.contains("Binance"));
    }

    #[tokio::test]
    async fn test_fetch_spreads_failure_keeps_previous_state() {
        let store = Arc::new(SpreadStore::new());
        store.apply(response(vec![spread("1", "BTC/USDT")], None), 0.0);
        let before = store.snapshot();

        let acquirer = acquirer(Err(FeedError::Status(StatusCode::BAD_GATEWAY)), Arc::clone(&store));
        let error = tokio_test::assert_err!(acquirer.fetch_spreads().await);

        assert!(matches!(error, FeedError::Status(StatusCode::BAD_GATEWAY)));
        assert!(Arc::ptr_eq(&before, &store.snapshot()));
        assert!(!store.is_loading());
    }

    struct GatedFeed {
        gate: tokio::sync::Mutex<Option<oneshot::Receiver<()>>>,
    }

    #[async_trait]
    impl SpreadFeed for GatedFeed {
        async fn fetch(&self, _: ArbitrageMode) -> Result<SpreadsResponse, FeedError> {
            if let Some(gate) = self.gate.lock().await.take() {
                let _ = gate.await;
            }
            Ok(SpreadsResponse::default())
        }
    }

    #[tokio::test]
    async fn test_loading_true_strictly_while_request_outstanding() {
        let (release, gate) = oneshot::channel();
        let store = Arc::new(SpreadStore::new());
        let feed = Arc::new(GatedFeed {
            gate: tokio::sync::Mutex::new(Some(gate)),
        });
        let acquirer = SpreadAcquirer::new(feed, Arc::clone(&store), ArbitrageMode::FuturesFutures);

        let task = tokio::spawn(async move { acquirer.fetch_spreads().await });
        while !store.is_loading() {
            tokio::task::yield_now().await;
        }

        release.send(()).unwrap();
        assert_eq!(task.await.unwrap().unwrap(), 0);
        assert!(!store.is_loading());
    }
}
