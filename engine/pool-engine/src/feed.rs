//! Scoreboard feed parsing
//!
//! The score feed is an opaque JSON service; this module owns the shape of its
//! payload and turns it into a [`WeekSnapshot`]. Any structural problem fails
//! the whole parse so no winners are ever computed from partial data.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{PoolError, Result};
use crate::models::{GameRecord, GameStatus, SeasonPhase, Team, TeamAbbr, WeekSnapshot};

/// Source of the current week's scoreboard
#[async_trait::async_trait]
pub trait ScoreFeed: Send + Sync {
    /// Fetch the raw scoreboard payload
    async fn fetch_payload(&self) -> Result<serde_json::Value>;

    /// Fetch and parse the current week
    async fn get_current_week(&self) -> Result<WeekSnapshot> {
        let payload = self.fetch_payload().await?;
        parse_scoreboard(payload)
    }
}

/// Feed serving a fixed payload (for testing and replays)
#[derive(Debug, Clone, Default)]
pub struct StaticFeed {
    payload: Option<serde_json::Value>,
}

impl StaticFeed {
    pub fn new(payload: serde_json::Value) -> Self {
        Self { payload: Some(payload) }
    }

    /// A feed that never answers
    pub fn unavailable() -> Self {
        Self { payload: None }
    }
}

#[async_trait::async_trait]
impl ScoreFeed for StaticFeed {
    async fn fetch_payload(&self) -> Result<serde_json::Value> {
        self.payload
            .clone()
            .ok_or_else(|| PoolError::feed_unavailable("static feed has no payload"))
    }
}

/// Top-level scoreboard document
#[derive(Debug, Deserialize)]
pub struct ScoreboardPayload {
    pub week: Option<FeedWeek>,

    #[serde(default)]
    pub leagues: Vec<FeedLeague>,

    pub events: Option<Vec<FeedEvent>>,
}

#[derive(Debug, Deserialize)]
pub struct FeedWeek {
    pub number: u32,
}

#[derive(Debug, Deserialize)]
pub struct FeedLeague {
    pub season: FeedSeason,
}

#[derive(Debug, Deserialize)]
pub struct FeedSeason {
    #[serde(rename = "type")]
    pub season_type: SeasonTypeField,
}

/// The season type arrives either as `{"type": 2, ...}` or as a bare code
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SeasonTypeField {
    Nested {
        #[serde(rename = "type")]
        code: i64,
    },
    Code(i64),
}

impl SeasonTypeField {
    fn code(&self) -> i64 {
        match self {
            SeasonTypeField::Nested { code } => *code,
            SeasonTypeField::Code(code) => *code,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FeedEvent {
    pub date: String,
    pub status: FeedStatus,
    pub competitions: Vec<FeedCompetition>,

    #[serde(default)]
    pub links: Vec<FeedLink>,
}

#[derive(Debug, Deserialize)]
pub struct FeedStatus {
    #[serde(rename = "displayClock")]
    pub display_clock: Option<String>,

    pub period: Option<u32>,

    #[serde(rename = "type")]
    pub status_type: FeedStatusType,
}

#[derive(Debug, Deserialize)]
pub struct FeedStatusType {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedCompetition {
    pub competitors: Vec<FeedCompetitor>,
}

#[derive(Debug, Deserialize)]
pub struct FeedCompetitor {
    #[serde(rename = "homeAway")]
    pub home_away: String,

    pub score: Option<ScoreField>,

    pub team: FeedTeam,
}

#[derive(Debug, Deserialize)]
pub struct FeedTeam {
    pub abbreviation: String,

    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeedLink {
    pub href: String,
}

/// Scores arrive as strings ("24") or numbers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ScoreField {
    Number(u32),
    Text(String),
}

impl ScoreField {
    fn value(&self) -> Option<u32> {
        match self {
            ScoreField::Number(n) => Some(*n),
            ScoreField::Text(s) if s.trim().is_empty() => Some(0),
            ScoreField::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Parse a raw scoreboard payload into a week snapshot
pub fn parse_scoreboard(payload: serde_json::Value) -> Result<WeekSnapshot> {
    let is_empty = match &payload {
        serde_json::Value::Null => true,
        serde_json::Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if is_empty {
        return Err(PoolError::feed_unavailable("feed returned an empty payload"));
    }

    let scoreboard: ScoreboardPayload = serde_json::from_value(payload)
        .map_err(|e| PoolError::feed_unavailable(format!("malformed scoreboard: {}", e)))?;

    let events = scoreboard
        .events
        .ok_or_else(|| PoolError::feed_unavailable("scoreboard has no event list"))?;

    let week = scoreboard
        .week
        .ok_or_else(|| PoolError::feed_unavailable("scoreboard has no week number"))?
        .number;

    let code = scoreboard
        .leagues
        .first()
        .map(|league| league.season.season_type.code())
        .ok_or_else(|| PoolError::feed_unavailable("scoreboard has no league season"))?;
    let phase = SeasonPhase::from_code(code)
        .ok_or_else(|| PoolError::feed_unavailable(format!("unknown season type code {}", code)))?;

    let games = events
        .iter()
        .map(parse_event)
        .collect::<Result<Vec<_>>>()?;

    info!("Parsed {} games for {} week {}", games.len(), phase.as_str(), week);
    Ok(WeekSnapshot { week, phase, games })
}

fn parse_event(event: &FeedEvent) -> Result<GameRecord> {
    let status = GameStatus::from_feed_name(&event.status.status_type.name);

    let competition = event
        .competitions
        .first()
        .ok_or_else(|| PoolError::feed_unavailable(format!("event on {} has no competition", event.date)))?;

    let (home, away) = split_home_away(&competition.competitors)?;

    // Clock and period only mean something once the game has started
    let (display_clock, period) = if status == GameStatus::Queued {
        (None, None)
    } else {
        (event.status.display_clock.clone(), event.status.period)
    };

    let game = GameRecord {
        home_team: feed_team(home),
        home_score: feed_score(home)?,
        away_team: feed_team(away),
        away_score: feed_score(away)?,
        status,
        start_time: parse_game_time(&event.date)?,
        display_clock,
        period,
        link: event.links.first().map(|l| l.href.clone()),
    };

    debug!(
        "{}: {}-{} ({:?})",
        game.matchup(),
        game.away_score,
        game.home_score,
        game.status
    );
    Ok(game)
}

/// Pick the home and away sides regardless of their order in the payload
fn split_home_away(competitors: &[FeedCompetitor]) -> Result<(&FeedCompetitor, &FeedCompetitor)> {
    let is_home = |c: &&FeedCompetitor| c.home_away.eq_ignore_ascii_case("home");

    let homes: Vec<&FeedCompetitor> = competitors.iter().filter(is_home).collect();
    let aways: Vec<&FeedCompetitor> = competitors.iter().filter(|c| !is_home(c)).collect();

    match (homes.as_slice(), aways.as_slice()) {
        ([home], [away]) => Ok((*home, *away)),
        _ => Err(PoolError::feed_unavailable(format!(
            "expected exactly one home and one away competitor, got {} home of {}",
            homes.len(),
            competitors.len()
        ))),
    }
}

fn feed_team(competitor: &FeedCompetitor) -> Team {
    let abbreviation = TeamAbbr::new(competitor.team.abbreviation.trim());
    let name = competitor
        .team
        .display_name
        .clone()
        .unwrap_or_else(|| abbreviation.to_string());
    Team { abbreviation, name }
}

fn feed_score(competitor: &FeedCompetitor) -> Result<u32> {
    match &competitor.score {
        None => Ok(0),
        Some(score) => score.value().ok_or_else(|| {
            PoolError::feed_unavailable(format!(
                "unparsable score for {}: {:?}",
                competitor.team.abbreviation, score
            ))
        }),
    }
}

fn parse_game_time(date: &str) -> Result<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(date, "%Y-%m-%dT%H:%MZ") {
        return Ok(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(date)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PoolError::feed_unavailable(format!("bad game date {:?}: {}", date, e)))
}
