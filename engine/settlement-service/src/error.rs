//! Error types for the settlement service

use pool_engine::PoolError;
use pool_store::StoreError;
use thiserror::Error;

/// Result type alias for settlement operations
pub type Result<T> = std::result::Result<T, SettlementError>;

/// Anything that aborts a settlement, reconciliation or seed run
#[derive(Error, Debug)]
pub enum SettlementError {
    /// Rules engine failure (feed, invariants, undecidable championship)
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Persistence failure; the transaction was rolled back
    #[error(transparent)]
    Store(#[from] StoreError),
}
