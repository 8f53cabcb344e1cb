//! Store and transaction traits

use crate::error::Result;
use pool_engine::roster::RosterOwner;
use pool_engine::{NewPayoutEvent, Owner, PayoutEvent, Pot, Team, WeekKey};

/// Something that can open a transaction over the pool's persisted state
#[async_trait::async_trait]
pub trait PoolStore: Send + Sync {
    /// Start a transaction; dropping it without commit rolls it back
    async fn begin(&self) -> Result<Box<dyn PoolTransaction>>;

    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;
}

/// One all-or-nothing unit of work
#[async_trait::async_trait]
pub trait PoolTransaction: Send {
    /// Read the pot, locking it for the rest of the transaction
    async fn load_pot(&mut self) -> Result<Pot>;

    async fn save_pot(&mut self, pot: &Pot) -> Result<()>;

    async fn owners_for_season(&mut self, season_start_year: i32) -> Result<Vec<Owner>>;

    async fn payout_events_for_week(&mut self, week: &WeekKey) -> Result<Vec<PayoutEvent>>;

    /// The whole payout log, oldest first
    async fn all_payout_events(&mut self) -> Result<Vec<PayoutEvent>>;

    /// Append to the payout log and return the new row id
    async fn insert_payout_event(&mut self, event: &NewPayoutEvent) -> Result<i64>;

    /// Add to an owner's cumulative winnings
    async fn credit_owner(&mut self, owner_id: i64, amount: i64) -> Result<()>;

    /// Delete payout log rows by id, returning how many went away
    async fn delete_payout_events(&mut self, ids: &[i64]) -> Result<u64>;

    async fn upsert_team(&mut self, team: &Team) -> Result<()>;

    async fn insert_owner(&mut self, season_start_year: i32, owner: &RosterOwner) -> Result<i64>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
