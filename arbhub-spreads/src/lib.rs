/// ArbHub Spreads - Shared Library
///
/// Client side of the cross-exchange spread feed:
/// - HTTP feed client and the automatic poll loop (retry on empty feed)
/// - Filtering, per-token grouping and ranking of spreads
/// - Display formatting and the board view model used by `spread-board`
pub mod shared;

// Re-export commonly used types for convenience
pub use shared::types::{ArbitrageMode, Spread, SpreadStatus, SpreadsResponse};

pub use shared::error::FeedError;
pub use shared::feed::{FeedConfig, HttpSpreadFeed, SpreadFeed, DEFAULT_RETRY_DELAY};
pub use shared::poller::{PollHandle, PollState, Poller, StopReason};
pub use shared::state::{FeedSnapshot, SpreadAcquirer, SpreadStore};

// Pure pipeline stages
pub use shared::expansion::ExpansionState;
pub use shared::filter::{
    filter_spreads, matches, parse_threshold, FilterConfig, FilterField, POPULAR_BLOCKED_TOKENS,
};
pub use shared::grouping::{group_spreads, visible_rows, DisplayRow, GroupedToken};
pub use shared::registry::{ExchangeRegistry, CANONICAL_EXCHANGES};

pub use shared::board::{BoardPhase, BoardStatus, SpreadBoard};
pub use shared::logging::{init_file_logging, init_logging};
