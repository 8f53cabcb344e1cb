//! In-memory store (for testing and dry runs)

use crate::backend::{PoolStore, PoolTransaction};
use crate::error::{Result, StoreError};
use pool_engine::roster::RosterOwner;
use pool_engine::{NewPayoutEvent, Owner, PayoutEvent, Pot, Team, TeamAbbr, WeekKey};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Everything the in-memory store holds
#[derive(Debug, Clone, PartialEq)]
pub struct StoreContents {
    pub pot: Pot,
    pub teams: BTreeMap<TeamAbbr, Team>,
    pub owners: Vec<Owner>,
    pub events: Vec<PayoutEvent>,
    next_owner_id: i64,
    next_event_id: i64,
}

impl StoreContents {
    fn new(initial_pot: i64) -> Self {
        Self {
            pot: Pot::new(initial_pot),
            teams: BTreeMap::new(),
            owners: Vec::new(),
            events: Vec::new(),
            next_owner_id: 1,
            next_event_id: 1,
        }
    }

    pub fn owner(&self, owner_id: i64) -> Option<&Owner> {
        self.owners.iter().find(|o| o.id == owner_id)
    }
}

/// Store kept in process memory. Transactions hold the lock until they finish,
/// so runs against one store are serialized like row locks would serialize them.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    contents: Arc<Mutex<StoreContents>>,
    fail_credits: bool,
}

impl InMemoryStore {
    /// Create an empty store with the given starting pot
    pub fn new(initial_pot: i64) -> Self {
        Self { contents: Arc::new(Mutex::new(StoreContents::new(initial_pot))), fail_credits: false }
    }

    /// Make every owner credit fail, to exercise rollback
    pub fn with_credit_failure(mut self) -> Self {
        self.fail_credits = true;
        self
    }

    /// Copy of the committed state
    pub async fn snapshot(&self) -> StoreContents {
        self.contents.lock().await.clone()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(10)
    }
}

#[async_trait::async_trait]
impl PoolStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn PoolTransaction>> {
        let guard = self.contents.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTransaction { guard, working, fail_credits: self.fail_credits }))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Works on a copy of the contents and swaps it in on commit
struct InMemoryTransaction {
    guard: OwnedMutexGuard<StoreContents>,
    working: StoreContents,
    fail_credits: bool,
}

#[async_trait::async_trait]
impl PoolTransaction for InMemoryTransaction {
    async fn load_pot(&mut self) -> Result<Pot> {
        Ok(self.working.pot)
    }

    async fn save_pot(&mut self, pot: &Pot) -> Result<()> {
        self.working.pot = *pot;
        Ok(())
    }

    async fn owners_for_season(&mut self, season_start_year: i32) -> Result<Vec<Owner>> {
        Ok(self
            .working
            .owners
            .iter()
            .filter(|o| o.season_start_year == season_start_year)
            .cloned()
            .collect())
    }

    async fn payout_events_for_week(&mut self, week: &WeekKey) -> Result<Vec<PayoutEvent>> {
        Ok(self.working.events.iter().filter(|e| e.week == *week).cloned().collect())
    }

    async fn all_payout_events(&mut self) -> Result<Vec<PayoutEvent>> {
        Ok(self.working.events.clone())
    }

    async fn insert_payout_event(&mut self, event: &NewPayoutEvent) -> Result<i64> {
        if !self.working.teams.contains_key(&event.team) {
            return Err(StoreError::not_found(format!("team {}", event.team)));
        }
        let id = self.working.next_event_id;
        self.working.next_event_id += 1;
        self.working.events.push(PayoutEvent {
            id,
            week: event.week,
            team: event.team.clone(),
            category: event.category,
            amount: event.amount,
        });
        Ok(id)
    }

    async fn credit_owner(&mut self, owner_id: i64, amount: i64) -> Result<()> {
        if self.fail_credits {
            return Err(StoreError::Injected(format!("credit of ${} to owner {}", amount, owner_id)));
        }
        let owner = self
            .working
            .owners
            .iter_mut()
            .find(|o| o.id == owner_id)
            .ok_or_else(|| StoreError::not_found(format!("owner {}", owner_id)))?;
        owner.winnings += amount;
        Ok(())
    }

    async fn delete_payout_events(&mut self, ids: &[i64]) -> Result<u64> {
        let before = self.working.events.len();
        self.working.events.retain(|e| !ids.contains(&e.id));
        Ok((before - self.working.events.len()) as u64)
    }

    async fn upsert_team(&mut self, team: &Team) -> Result<()> {
        self.working.teams.insert(team.abbreviation.clone(), team.clone());
        Ok(())
    }

    async fn insert_owner(&mut self, season_start_year: i32, owner: &RosterOwner) -> Result<i64> {
        if !self.working.teams.contains_key(&owner.team) {
            return Err(StoreError::not_found(format!("team {}", owner.team)));
        }
        if self
            .working
            .owners
            .iter()
            .any(|o| o.season_start_year == season_start_year && o.team == owner.team)
        {
            return Err(StoreError::conflict(format!(
                "team {} already has an owner in season {}",
                owner.team, season_start_year
            )));
        }
        let id = self.working.next_owner_id;
        self.working.next_owner_id += 1;
        self.working.owners.push(Owner {
            id,
            first_name: owner.first_name.clone(),
            last_name: owner.last_name.clone(),
            season_start_year,
            team: owner.team.clone(),
            winnings: 0,
        });
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryTransaction { mut guard, working, .. } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
