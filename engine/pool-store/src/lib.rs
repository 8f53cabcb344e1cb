//! # Pool Store
//!
//! Persistence boundary for the football pool: teams, owners, the payout log
//! and the pot. Every settlement run works through one [`PoolTransaction`],
//! so a run either commits all of its writes or none of them.
//!
//! - **PoolStore**: opens transactions
//! - **PgStore**: Postgres implementation over `sqlx`
//! - **InMemoryStore**: in-process implementation for tests and dry runs

pub mod backend;
pub mod config;
pub mod error;
pub mod memory;
pub mod postgres;

pub use backend::{PoolStore, PoolTransaction};
pub use config::DatabaseConfig;
pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, StoreContents};
pub use postgres::PgStore;
