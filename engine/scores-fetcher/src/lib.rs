//! Scoreboard Feed Client
//!
//! Fetches the current week's scoreboard over HTTP and hands the raw payload to
//! the rules engine. Any transport or decoding failure surfaces as
//! `PoolError::FeedUnavailable`; no winners are ever computed from partial data.

pub mod config;
pub mod fetcher;

pub use config::FeedConfig;
pub use fetcher::EspnScoreFeed;
