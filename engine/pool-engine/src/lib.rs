//! Football Pool Rules Engine
//!
//! Pure, stateless evaluation of a week of NFL games into pool payouts:
//!
//! - **feed**: parses the scoreboard payload into a [`WeekSnapshot`]
//! - **classifier**: decides what kind of week it is (most/least points, playoff, ...)
//! - **resolver**: finds the winning teams for every payout category
//! - **ledger**: turns winners into payout events, pot movement and owner credits
//!
//! Nothing in this crate touches the database or the network; the settlement
//! service feeds it data and persists what it plans.

pub mod classifier;
pub mod config;
pub mod error;
pub mod feed;
pub mod ledger;
pub mod models;
pub mod resolver;
pub mod roster;
pub mod season;

pub use classifier::{classify, PointsMode, WeekKind};
pub use config::PayoutRules;
pub use error::{GameDecisionError, PoolError, Result};
pub use feed::{parse_scoreboard, ScoreFeed, StaticFeed};
pub use ledger::{plan_reconciliation, plan_settlement, LedgerState, OwnerCredit, SettlementPlan};
pub use models::*;
pub use resolver::{resolve_week, WeekResolution};
pub use roster::Roster;

#[cfg(test)]
mod test_support;
