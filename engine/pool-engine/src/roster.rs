//! Season roster: the league's teams and who sponsors each one

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::{PoolError, Result};
use crate::models::{Team, TeamAbbr};

/// Number of teams in the league
pub const LEAGUE_SIZE: usize = 32;

/// An owner entry before it has been persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterOwner {
    pub first_name: String,
    pub last_name: String,
    pub team: TeamAbbr,
}

/// Teams and owners for one season, usually loaded from a JSON file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    pub season_start_year: i32,
    pub teams: Vec<Team>,
    pub owners: Vec<RosterOwner>,
}

impl Roster {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Check the roster before anything is written
    pub fn validate(&self, expected_owner_count: Option<usize>) -> Result<()> {
        if self.teams.len() != LEAGUE_SIZE {
            return Err(PoolError::invariant(format!(
                "must be {} teams, roster has {}",
                LEAGUE_SIZE,
                self.teams.len()
            )));
        }

        let mut abbreviations = HashSet::with_capacity(self.teams.len());
        for team in &self.teams {
            if !abbreviations.insert(&team.abbreviation) {
                return Err(PoolError::invariant(format!(
                    "team {} is listed twice",
                    team.abbreviation
                )));
            }
        }

        if let Some(expected) = expected_owner_count {
            if self.owners.len() != expected {
                return Err(PoolError::invariant(format!(
                    "must be {} owners, roster has {}",
                    expected,
                    self.owners.len()
                )));
            }
        }

        let mut sponsored: HashMap<&TeamAbbr, &RosterOwner> = HashMap::new();
        for owner in &self.owners {
            if !abbreviations.contains(&owner.team) {
                return Err(PoolError::invariant(format!(
                    "{} {} sponsors unknown team {}",
                    owner.first_name, owner.last_name, owner.team
                )));
            }
            if let Some(other) = sponsored.insert(&owner.team, owner) {
                return Err(PoolError::invariant(format!(
                    "team {} is assigned to both {} {} and {} {}",
                    owner.team, other.first_name, other.last_name, owner.first_name, owner.last_name
                )));
            }
        }

        Ok(())
    }

    /// Teams nobody sponsors this season
    pub fn unsponsored(&self) -> Vec<&TeamAbbr> {
        let sponsored: HashSet<&TeamAbbr> = self.owners.iter().map(|o| &o.team).collect();
        self.teams
            .iter()
            .map(|t| &t.abbreviation)
            .filter(|abbr| !sponsored.contains(abbr))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ABBREVIATIONS: [&str; LEAGUE_SIZE] = [
        "ARI", "ATL", "BAL", "BUF", "CAR", "CHI", "CIN", "CLE", "DAL", "DEN", "DET", "GB", "HOU",
        "IND", "JAX", "KC", "LAC", "LAR", "LV", "MIA", "MIN", "NE", "NO", "NYG", "NYJ", "PHI",
        "PIT", "SEA", "SF", "TB", "TEN", "WSH",
    ];

    fn roster(owner_teams: &[&str]) -> Roster {
        Roster {
            season_start_year: 2025,
            teams: ABBREVIATIONS
                .iter()
                .map(|abbr| Team { abbreviation: TeamAbbr::new(*abbr), name: format!("{} Team", abbr) })
                .collect(),
            owners: owner_teams
                .iter()
                .enumerate()
                .map(|(i, team)| RosterOwner {
                    first_name: format!("Owner{}", i),
                    last_name: "Test".to_string(),
                    team: TeamAbbr::new(*team),
                })
                .collect(),
        }
    }

    #[test]
    fn test_valid_roster() {
        let r = roster(&["PIT", "KC", "NYG"]);
        assert!(r.validate(Some(3)).is_ok());
        assert!(r.validate(None).is_ok());
        assert_eq!(r.unsponsored().len(), LEAGUE_SIZE - 3);
    }

    #[test]
    fn test_wrong_team_count() {
        let mut r = roster(&[]);
        r.teams.pop();
        assert!(matches!(r.validate(None), Err(PoolError::InvariantViolation(_))));
    }

    #[test]
    fn test_wrong_owner_count() {
        let r = roster(&["PIT", "KC"]);
        let err = r.validate(Some(29)).unwrap_err();
        assert!(err.to_string().contains("must be 29 owners"));
    }

    #[test]
    fn test_double_assignment_and_unknown_team() {
        let r = roster(&["PIT", "PIT"]);
        assert!(matches!(r.validate(None), Err(PoolError::InvariantViolation(_))));

        let r = roster(&["OAK"]);
        assert!(matches!(r.validate(None), Err(PoolError::InvariantViolation(_))));
    }

    #[test]
    fn test_from_json() {
        let raw = json!({
            "season_start_year": 2025,
            "teams": [{ "abbreviation": "PIT", "name": "Pittsburgh Steelers" }],
            "owners": [{ "first_name": "Pat", "last_name": "Doe", "team": "pit" }]
        })
        .to_string();

        let r = Roster::from_json(&raw).unwrap();
        assert_eq!(r.season_start_year, 2025);
        assert_eq!(r.owners[0].team, TeamAbbr::new("PIT"));
        assert!(Roster::from_json("{").is_err());
    }
}
