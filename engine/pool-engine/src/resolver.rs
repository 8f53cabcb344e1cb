//! Winner resolution for every payout category of a week

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::classifier::{classify, PointsMode, WeekKind};
use crate::config::PayoutRules;
use crate::error::{GameDecisionError, PoolError, Result};
use crate::models::{GameRecord, PayoutCategory, TeamAbbr, WeekSnapshot};

/// Winners of one week, per category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekResolution {
    pub kind: WeekKind,

    /// Winners of the week's primary category (most/least, playoff or championship)
    pub primary: Vec<TeamAbbr>,

    /// Teams that hit the bonus score exactly
    pub bonus: Vec<TeamAbbr>,

    /// Postseason games that could not be decided yet
    pub undecided: Vec<GameDecisionError>,
}

impl WeekResolution {
    fn empty(kind: WeekKind) -> Self {
        Self { kind, primary: Vec::new(), bonus: Vec::new(), undecided: Vec::new() }
    }

    /// Every team currently winning something in the pool, each listed once
    pub fn leaders(&self) -> BTreeSet<TeamAbbr> {
        self.primary.iter().chain(self.bonus.iter()).cloned().collect()
    }

    /// Winners grouped by payout category, skipping empty categories
    pub fn by_category(&self) -> Vec<(PayoutCategory, &[TeamAbbr])> {
        let mut groups = Vec::new();
        if let Some(category) = self.kind.primary_category() {
            if !self.primary.is_empty() {
                groups.push((category, self.primary.as_slice()));
            }
        }
        if !self.bonus.is_empty() {
            groups.push((PayoutCategory::Fifty, self.bonus.as_slice()));
        }
        groups
    }
}

/// Resolve all winners of a week
pub fn resolve_week(snapshot: &WeekSnapshot, rules: &PayoutRules) -> Result<WeekResolution> {
    let kind = classify(snapshot)?;

    if kind == WeekKind::Exhibition {
        info!("Week {} is the exhibition week; nothing to resolve", snapshot.week);
        return Ok(WeekResolution::empty(kind));
    }

    let mut resolution = WeekResolution::empty(kind);
    match kind {
        WeekKind::Preseason | WeekKind::Exhibition => {}
        WeekKind::Regular(PointsMode::Most) => resolution.primary = most_points_winners(snapshot),
        WeekKind::Regular(PointsMode::Least) => resolution.primary = least_points_winners(snapshot),
        WeekKind::Playoff { .. } => {
            let (winners, undecided) = postseason_winners(snapshot);
            resolution.primary = winners;
            resolution.undecided = undecided;
        }
        WeekKind::Championship => {
            let (winners, undecided) = championship_winners(snapshot)?;
            resolution.primary = winners;
            resolution.undecided = undecided;
        }
    }
    resolution.bonus = bonus_winners(snapshot, rules.bonus_score);

    info!(
        "Resolved week {} ({:?}): primary={:?} bonus={:?} undecided={}",
        snapshot.week,
        kind,
        resolution.primary,
        resolution.bonus,
        resolution.undecided.len()
    );
    Ok(resolution)
}

fn started_games(snapshot: &WeekSnapshot) -> impl Iterator<Item = &GameRecord> {
    snapshot.games.iter().filter(|g| !g.is_queued())
}

/// Teams from started games whose score equals `target`, each once
fn teams_scoring<'a>(games: impl Iterator<Item = &'a GameRecord>, target: u32) -> Vec<TeamAbbr> {
    let mut teams: Vec<TeamAbbr> = Vec::new();
    for game in games {
        for (team, score) in game.sides() {
            if score == target && !teams.contains(team) {
                teams.push(team.clone());
            }
        }
    }
    teams
}

/// Every team tied for the highest score among started games
pub fn most_points_winners(snapshot: &WeekSnapshot) -> Vec<TeamAbbr> {
    let Some(most) = started_games(snapshot).map(GameRecord::max_score).max() else {
        debug!("No games have started; no most-points winners");
        return Vec::new();
    };
    debug!("The most points scored in week {} is {}", snapshot.week, most);
    teams_scoring(started_games(snapshot), most)
}

/// Every team tied for the lowest score among started games
pub fn least_points_winners(snapshot: &WeekSnapshot) -> Vec<TeamAbbr> {
    let Some(least) = started_games(snapshot).map(GameRecord::min_score).min() else {
        debug!("No games have started; no least-points winners");
        return Vec::new();
    };
    debug!("The least points scored in week {} is {}", snapshot.week, least);
    teams_scoring(started_games(snapshot), least)
}

/// Every team scoring exactly `bonus_score`, in any game
pub fn bonus_winners(snapshot: &WeekSnapshot, bonus_score: u32) -> Vec<TeamAbbr> {
    let winners = teams_scoring(snapshot.games.iter(), bonus_score);
    debug!("{} team(s) scored {} points this week", winners.len(), bonus_score);
    winners
}

/// Winners of finished postseason games; undecided games are skipped
pub fn postseason_winners(snapshot: &WeekSnapshot) -> (Vec<TeamAbbr>, Vec<GameDecisionError>) {
    let mut winners = Vec::new();
    let mut undecided = Vec::new();
    for game in &snapshot.games {
        match game.winner() {
            Ok(team) => {
                debug!("{} won {}", team, game.matchup());
                winners.push(team);
            }
            Err(e) => {
                debug!("Skipping {}: {}", game.matchup(), e);
                undecided.push(e);
            }
        }
    }
    (winners, undecided)
}

/// Winners of the championship; a finished game must have a winner
pub fn championship_winners(snapshot: &WeekSnapshot) -> Result<(Vec<TeamAbbr>, Vec<GameDecisionError>)> {
    let mut winners = Vec::new();
    let mut undecided = Vec::new();
    for game in &snapshot.games {
        match game.winner() {
            Ok(team) => {
                info!("{} won the championship ({})", team, game.matchup());
                winners.push(team);
            }
            Err(e @ GameDecisionError::NotFinished { .. }) => {
                debug!("Championship game not over: {}", e);
                undecided.push(e);
            }
            Err(e @ GameDecisionError::Tied { .. }) => {
                return Err(PoolError::UnsettledChampionship(e));
            }
        }
    }
    Ok((winners, undecided))
}
