/// Shared modules for the spread board
pub mod board;
pub mod error;
pub mod expansion;
pub mod feed;
pub mod filter;
pub mod format;
pub mod grouping;
pub mod logging;
pub mod poller;
pub mod registry;
pub mod state;
pub mod types;
