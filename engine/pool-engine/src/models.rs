use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::GameDecisionError;

/// Team abbreviation; the stable identity of a team (e.g. "PIT")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct TeamAbbr(pub String);

impl From<String> for TeamAbbr {
    fn from(abbr: String) -> Self {
        TeamAbbr::new(abbr)
    }
}

impl TeamAbbr {
    pub fn new(abbr: impl Into<String>) -> Self {
        Self(abbr.into().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TeamAbbr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A competing side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub abbreviation: TeamAbbr,
    pub name: String,
}

/// A pool participant sponsoring one team for one season
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub season_start_year: i32,
    pub team: TeamAbbr,
    /// Cumulative winnings in whole dollars
    pub winnings: i64,
}

impl Owner {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Lifecycle of a game as reported by the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    Queued,
    InProgress,
    Halftime,
    Final,
}

impl GameStatus {
    /// Map a feed status name (e.g. `STATUS_FINAL`) to a status.
    ///
    /// Anything outside the four known names is only ever seen mid-game, so it
    /// maps to `InProgress`.
    pub fn from_feed_name(name: &str) -> Self {
        match name.trim().to_uppercase().as_str() {
            "STATUS_SCHEDULED" => GameStatus::Queued,
            "STATUS_IN_PROGRESS" => GameStatus::InProgress,
            "STATUS_HALFTIME" => GameStatus::Halftime,
            "STATUS_FINAL" => GameStatus::Final,
            _ => GameStatus::InProgress,
        }
    }
}

/// One game of the current week, rebuilt from the feed on every query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub home_team: Team,
    pub home_score: u32,
    pub away_team: Team,
    pub away_score: u32,
    pub status: GameStatus,
    pub start_time: DateTime<Utc>,
    /// Present only once play has started
    pub display_clock: Option<String>,
    pub period: Option<u32>,
    pub link: Option<String>,
}

impl GameRecord {
    pub fn is_queued(&self) -> bool {
        self.status == GameStatus::Queued
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == GameStatus::InProgress
    }

    pub fn is_halftime(&self) -> bool {
        self.status == GameStatus::Halftime
    }

    pub fn is_final(&self) -> bool {
        self.status == GameStatus::Final
    }

    pub fn max_score(&self) -> u32 {
        self.home_score.max(self.away_score)
    }

    /// The lower (or equal) of the two scores
    pub fn min_score(&self) -> u32 {
        self.home_score.min(self.away_score)
    }

    pub fn matchup(&self) -> String {
        format!("{}@{}", self.away_team.abbreviation, self.home_team.abbreviation)
    }

    /// Both sides with their scores, home first
    pub fn sides(&self) -> [(&TeamAbbr, u32); 2] {
        [
            (&self.home_team.abbreviation, self.home_score),
            (&self.away_team.abbreviation, self.away_score),
        ]
    }

    /// The higher-scoring side of a finished game
    pub fn winner(&self) -> std::result::Result<TeamAbbr, GameDecisionError> {
        if !self.is_final() {
            return Err(GameDecisionError::NotFinished { matchup: self.matchup() });
        }
        if self.home_score == self.away_score {
            return Err(GameDecisionError::Tied { matchup: self.matchup() });
        }
        if self.home_score > self.away_score {
            Ok(self.home_team.abbreviation.clone())
        } else {
            Ok(self.away_team.abbreviation.clone())
        }
    }
}

/// Season phase as tagged by the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeasonPhase {
    Preseason,
    RegularSeason,
    Postseason,
}

impl SeasonPhase {
    /// Feed season type code: 1 = pre, 2 = regular, 3 = post
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(SeasonPhase::Preseason),
            2 => Some(SeasonPhase::RegularSeason),
            3 => Some(SeasonPhase::Postseason),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SeasonPhase::Preseason => "PRESEASON",
            SeasonPhase::RegularSeason => "REGULAR_SEASON",
            SeasonPhase::Postseason => "POSTSEASON",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PRESEASON" => Some(SeasonPhase::Preseason),
            "REGULAR_SEASON" => Some(SeasonPhase::RegularSeason),
            "POSTSEASON" => Some(SeasonPhase::Postseason),
            _ => None,
        }
    }
}

/// All games of the current week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekSnapshot {
    /// 1..=18 in the regular season, 1..=5 in the postseason
    pub week: u32,
    pub phase: SeasonPhase,
    pub games: Vec<GameRecord>,
}

/// Identifies one week of one season
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WeekKey {
    pub season_start_year: i32,
    pub phase: SeasonPhase,
    pub week: u32,
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} week {}", self.season_start_year, self.phase.as_str(), self.week)
    }
}

/// What a payout was awarded for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutCategory {
    Most,
    Least,
    Fifty,
    Playoff,
    SuperBowl,
}

impl PayoutCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutCategory::Most => "MOST",
            PayoutCategory::Least => "LEAST",
            PayoutCategory::Fifty => "FIFTY",
            PayoutCategory::Playoff => "PLAYOFF",
            PayoutCategory::SuperBowl => "SUPER_BOWL",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "MOST" => Some(PayoutCategory::Most),
            "LEAST" => Some(PayoutCategory::Least),
            "FIFTY" => Some(PayoutCategory::Fifty),
            "PLAYOFF" => Some(PayoutCategory::Playoff),
            "SUPER_BOWL" => Some(PayoutCategory::SuperBowl),
            _ => None,
        }
    }
}

impl fmt::Display for PayoutCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payout not yet written to the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayoutEvent {
    pub week: WeekKey,
    pub team: TeamAbbr,
    pub category: PayoutCategory,
    /// Whole dollars
    pub amount: i64,
}

/// A persisted payout log row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutEvent {
    pub id: i64,
    pub week: WeekKey,
    pub team: TeamAbbr,
    pub category: PayoutCategory,
    pub amount: i64,
}

impl PayoutEvent {
    /// Dedup key within a week
    pub fn dedup_key(&self) -> (TeamAbbr, PayoutCategory) {
        (self.team.clone(), self.category)
    }
}

/// The rolling primary payout for regular season weeks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pot {
    pub amount: i64,
    /// Last week whose pot rule has been applied
    pub settled_week: Option<WeekKey>,
    /// Pot value going into `settled_week`, before its rule was applied
    pub opening_amount: i64,
}

impl Pot {
    /// A pot no week has been settled against yet
    pub fn new(amount: i64) -> Self {
        Self { amount, settled_week: None, opening_amount: amount }
    }

    /// What the pot held at the start of `week`
    ///
    /// Once `week` has been settled the current amount already reflects its
    /// rule, so a re-run works from the saved opening value instead.
    pub fn opening_for(&self, week: WeekKey) -> i64 {
        if self.settled_week == Some(week) {
            self.opening_amount
        } else {
            self.amount
        }
    }
}
