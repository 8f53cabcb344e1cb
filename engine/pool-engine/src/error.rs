//! Error types for the rules engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for rules engine operations
pub type Result<T> = std::result::Result<T, PoolError>;

/// Errors that abort a weekly computation
#[derive(Error, Debug)]
pub enum PoolError {
    /// The score feed returned nothing usable; no winners are computed from partial data
    #[error("Score feed unavailable: {reason}")]
    FeedUnavailable { reason: String },

    /// Seed-time or structural checks failed before any write
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// A finished championship game could not be decided
    #[error("Championship game could not be settled: {0}")]
    UnsettledChampionship(#[source] GameDecisionError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PoolError {
    pub fn feed_unavailable(reason: impl Into<String>) -> Self {
        Self::FeedUnavailable { reason: reason.into() }
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }
}

/// Per-game decision failures, absorbed while scanning postseason games
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameDecisionError {
    #[error("Cannot compute a winner for {matchup}: the game hasn't completed")]
    NotFinished { matchup: String },

    #[error("Cannot compute a winner for {matchup}: the game ended in a tie")]
    Tied { matchup: String },
}
