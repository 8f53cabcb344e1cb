//! Football Pool Settlement Service
//!
//! Wires the rules engine to the score feed and the database: weekly
//! settlement, duplicate reconciliation, live previews and roster seeding,
//! plus the configuration, logging and scheduling around them.

pub mod config;
pub mod error;
pub mod logging;
pub mod scheduler;
pub mod settlement;

pub use config::ServiceConfig;
pub use error::{Result, SettlementError};
pub use logging::initialize_logging_with_config;
pub use scheduler::SettlementScheduler;
pub use settlement::{
    preview_week, reconcile_duplicates, run_weekly_settlement, seed_roster, SeedReport,
    SettlementReport, WeekPreview,
};
