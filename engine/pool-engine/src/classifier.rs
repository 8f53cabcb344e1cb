//! Week classification
//!
//! A week is classified once per run into a closed set of kinds; each kind
//! carries its own winner-resolution behaviour (see `resolver`).

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PoolError, Result};
use crate::models::{PayoutCategory, SeasonPhase, WeekSnapshot};

/// Primary payout mode of a regular season week
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointsMode {
    Most,
    Least,
}

impl PointsMode {
    /// Odd weeks pay the most points, even weeks the least
    pub fn for_week(week: u32) -> Self {
        if week % 2 == 1 {
            PointsMode::Most
        } else {
            PointsMode::Least
        }
    }

    pub fn category(&self) -> PayoutCategory {
        match self {
            PointsMode::Most => PayoutCategory::Most,
            PointsMode::Least => PayoutCategory::Least,
        }
    }
}

/// Kind of week being settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeekKind {
    Preseason,
    Regular(PointsMode),
    /// Wildcard, divisional or conference round (postseason weeks 1-3)
    Playoff { round: u32 },
    /// All-star exhibition (postseason week 4); pays nothing
    Exhibition,
    /// Postseason week 5
    Championship,
}

impl WeekKind {
    pub fn is_preseason(&self) -> bool {
        matches!(self, WeekKind::Preseason)
    }

    pub fn is_regular_season(&self) -> bool {
        matches!(self, WeekKind::Regular(_))
    }

    pub fn is_postseason(&self) -> bool {
        matches!(
            self,
            WeekKind::Playoff { .. } | WeekKind::Exhibition | WeekKind::Championship
        )
    }

    /// Category of the week's primary payout, if it has one
    pub fn primary_category(&self) -> Option<PayoutCategory> {
        match self {
            WeekKind::Regular(mode) => Some(mode.category()),
            WeekKind::Playoff { .. } => Some(PayoutCategory::Playoff),
            WeekKind::Championship => Some(PayoutCategory::SuperBowl),
            WeekKind::Preseason | WeekKind::Exhibition => None,
        }
    }
}

/// Classify a week from its phase and number
pub fn classify(snapshot: &WeekSnapshot) -> Result<WeekKind> {
    let kind = match snapshot.phase {
        SeasonPhase::Preseason => WeekKind::Preseason,
        SeasonPhase::RegularSeason => WeekKind::Regular(PointsMode::for_week(snapshot.week)),
        SeasonPhase::Postseason => match snapshot.week {
            1..=3 => WeekKind::Playoff { round: snapshot.week },
            4 => WeekKind::Exhibition,
            5 => WeekKind::Championship,
            other => {
                return Err(PoolError::invariant(format!(
                    "postseason week {} is outside 1..=5",
                    other
                )))
            }
        },
    };

    debug!("Week {} ({}) classified as {:?}", snapshot.week, snapshot.phase.as_str(), kind);
    Ok(kind)
}
