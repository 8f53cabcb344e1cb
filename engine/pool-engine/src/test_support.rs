use chrono::Utc;

use crate::models::{GameRecord, GameStatus, SeasonPhase, Team, TeamAbbr, WeekSnapshot};

pub(crate) fn game(home: &str, home_score: u32, away: &str, away_score: u32, status: GameStatus) -> GameRecord {
    let started = status != GameStatus::Queued;
    GameRecord {
        home_team: Team { abbreviation: TeamAbbr::new(home), name: home.to_string() },
        home_score,
        away_team: Team { abbreviation: TeamAbbr::new(away), name: away.to_string() },
        away_score,
        status,
        start_time: Utc::now(),
        display_clock: started.then(|| if status == GameStatus::Final { "0:00" } else { "7:45" }.to_string()),
        period: started.then_some(4),
        link: None,
    }
}

pub(crate) fn week(phase: SeasonPhase, number: u32, games: Vec<GameRecord>) -> WeekSnapshot {
    WeekSnapshot { week: number, phase, games }
}

pub(crate) fn abbrs(values: &[&str]) -> Vec<TeamAbbr> {
    values.iter().map(|v| TeamAbbr::new(*v)).collect()
}
