//! Payout ledger planning
//!
//! Turns a [`WeekResolution`] into the writes one settlement run must make:
//! new payout events, owner credits and the next pot value. Planning is pure;
//! the caller applies the plan inside a single transaction.
//!
//! A week may be settled more than once, for example mid-game and again after
//! the final whistle. Each run plans against the week's opening pot, and logged
//! events the latest results no longer support are superseded.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::classifier::WeekKind;
use crate::config::PayoutRules;
use crate::error::{PoolError, Result};
use crate::models::{NewPayoutEvent, Owner, PayoutCategory, PayoutEvent, Pot, TeamAbbr, WeekKey};
use crate::resolver::WeekResolution;

/// Persisted state read at the start of a settlement run
#[derive(Debug, Clone)]
pub struct LedgerState {
    pub week: WeekKey,
    pub pot: Pot,
    /// Owners of the week's season
    pub owners: Vec<Owner>,
    /// Payout events already logged for the week
    pub existing: Vec<PayoutEvent>,
}

/// Winnings credited to one owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerCredit {
    pub owner_id: i64,
    pub team: TeamAbbr,
    pub category: PayoutCategory,
    pub amount: i64,
}

/// Everything one settlement run writes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementPlan {
    pub week: WeekKey,
    pub kind: WeekKind,
    /// Events to append to the log
    pub events: Vec<NewPayoutEvent>,
    /// Events left out because the log already has them
    pub skipped: Vec<NewPayoutEvent>,
    pub credits: Vec<OwnerCredit>,
    /// Logged events for the week that the current results no longer support
    pub superseded: Vec<PayoutEvent>,
    /// Winnings taken back from the owners of superseded events
    pub reversals: Vec<OwnerCredit>,
    pub pot_before: Pot,
    pub pot_after: Pot,
}

impl SettlementPlan {
    pub fn pot_changed(&self) -> bool {
        self.pot_before != self.pot_after
    }

    pub fn total_credited(&self) -> i64 {
        self.credits.iter().map(|c| c.amount).sum()
    }

    pub fn total_reversed(&self) -> i64 {
        self.reversals.iter().map(|c| c.amount).sum()
    }
}

/// Plan the payouts of a resolved week against the current persisted state
pub fn plan_settlement(
    resolution: &WeekResolution,
    state: &LedgerState,
    rules: &PayoutRules,
) -> Result<SettlementPlan> {
    let sponsors = sponsor_index(&state.owners)?;
    let week = state.week;
    let kind = resolution.kind;

    let primary_amount = match kind {
        WeekKind::Regular(_) => Some(state.pot.opening_for(week)),
        WeekKind::Playoff { .. } => Some(rules.playoff_payout),
        WeekKind::Championship => Some(rules.championship_payout),
        WeekKind::Preseason | WeekKind::Exhibition => None,
    };

    let mut candidates: Vec<NewPayoutEvent> = Vec::new();
    if kind != WeekKind::Exhibition {
        if let (Some(category), Some(amount)) = (kind.primary_category(), primary_amount) {
            for team in &resolution.primary {
                candidates.push(NewPayoutEvent { week, team: team.clone(), category, amount });
            }
        }
        for team in &resolution.bonus {
            candidates.push(NewPayoutEvent {
                week,
                team: team.clone(),
                category: PayoutCategory::Fifty,
                amount: rules.bonus_payout,
            });
        }
    }

    let current: HashSet<(TeamAbbr, PayoutCategory)> =
        candidates.iter().map(|e| (e.team.clone(), e.category)).collect();
    let (superseded, still_won): (Vec<PayoutEvent>, Vec<PayoutEvent>) = state
        .existing
        .iter()
        .filter(|e| e.week == week)
        .cloned()
        .partition(|e| !current.contains(&e.dedup_key()));

    // Only one row per key was ever credited; duplicates are left to reconciliation
    let mut reversed_keys = HashSet::new();
    let reversals: Vec<OwnerCredit> = superseded
        .iter()
        .filter(|e| reversed_keys.insert(e.dedup_key()))
        .filter_map(|e| {
            sponsors.get(&e.team).map(|owner| OwnerCredit {
                owner_id: owner.id,
                team: e.team.clone(),
                category: e.category,
                amount: e.amount,
            })
        })
        .collect();
    for event in &superseded {
        warn!(
            "{}: {} {} (${}, row {}) no longer holds; removing it",
            week, event.team, event.category, event.amount, event.id
        );
    }

    // Deduplicate before any credit is computed: against the log and within this run
    let mut seen: HashSet<(TeamAbbr, PayoutCategory)> = still_won.iter().map(PayoutEvent::dedup_key).collect();
    let mut events = Vec::new();
    let mut skipped = Vec::new();
    for event in candidates {
        if seen.insert((event.team.clone(), event.category)) {
            events.push(event);
        } else {
            debug!("{} {} already logged for {}; skipping", event.team, event.category, week);
            skipped.push(event);
        }
    }

    let credits: Vec<OwnerCredit> = events
        .iter()
        .filter_map(|event| {
            sponsors.get(&event.team).map(|owner| OwnerCredit {
                owner_id: owner.id,
                team: event.team.clone(),
                category: event.category,
                amount: event.amount,
            })
        })
        .collect();

    let pot_after = next_pot(resolution, state, rules, &sponsors);

    for event in &events {
        match sponsors.get(&event.team) {
            Some(owner) => info!(
                "{}: {} wins ${} ({}) for {}",
                week,
                event.team,
                event.amount,
                event.category,
                owner.display_name()
            ),
            None => info!(
                "{}: {} wins ${} ({}) but has no owner",
                week, event.team, event.amount, event.category
            ),
        }
    }

    Ok(SettlementPlan {
        week,
        kind,
        events,
        skipped,
        credits,
        superseded,
        reversals,
        pot_before: state.pot,
        pot_after,
    })
}

/// Apply the pot rule of a regular season week, starting from the pot the
/// week opened with
fn next_pot(
    resolution: &WeekResolution,
    state: &LedgerState,
    rules: &PayoutRules,
    sponsors: &HashMap<TeamAbbr, &Owner>,
) -> Pot {
    let pot = state.pot;
    if !resolution.kind.is_regular_season() {
        return pot;
    }
    let opening = pot.opening_for(state.week);
    if pot.settled_week == Some(state.week) {
        debug!("{} settled before; recomputing the pot from its opening ${}", state.week, opening);
    }

    let collected = resolution.primary.iter().any(|team| sponsors.contains_key(team));
    let amount = if collected {
        info!("Pot of ${} collected in {}; resetting to ${}", opening, state.week, rules.pot_reset);
        rules.pot_reset
    } else {
        let rolled = opening + rules.pot_increment;
        info!("No owner collected the pot in {}; rolling to ${}", state.week, rolled);
        rolled
    };

    Pot { amount, settled_week: Some(state.week), opening_amount: opening }
}

/// Map each sponsored team to its owner, rejecting double assignments
fn sponsor_index(owners: &[Owner]) -> Result<HashMap<TeamAbbr, &Owner>> {
    let mut index = HashMap::with_capacity(owners.len());
    for owner in owners {
        if let Some(other) = index.insert(owner.team.clone(), owner) {
            return Err(PoolError::invariant(format!(
                "team {} is assigned to both {} and {} in season {}",
                owner.team,
                other.display_name(),
                owner.display_name(),
                owner.season_start_year
            )));
        }
    }
    Ok(index)
}

/// Ids of duplicate payout events to delete, keeping the oldest row of each
/// (week, team, category) group
pub fn plan_reconciliation(events: &[PayoutEvent]) -> Vec<i64> {
    let mut groups: BTreeMap<(WeekKey, TeamAbbr, PayoutCategory), Vec<i64>> = BTreeMap::new();
    for event in events {
        groups
            .entry((event.week, event.team.clone(), event.category))
            .or_default()
            .push(event.id);
    }

    let mut doomed = Vec::new();
    for ((week, team, category), mut ids) in groups {
        if ids.len() < 2 {
            continue;
        }
        ids.sort_unstable();
        info!("{} has {} {} rows for {}; keeping id {}", team, ids.len(), category, week, ids[0]);
        doomed.extend_from_slice(&ids[1..]);
    }
    doomed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::PointsMode;
    use crate::models::SeasonPhase;
    use crate::test_support::abbrs;

    fn key(phase: SeasonPhase, week: u32) -> WeekKey {
        WeekKey { season_start_year: 2025, phase, week }
    }

    fn owner(id: i64, team: &str) -> Owner {
        Owner {
            id,
            first_name: format!("Owner{}", id),
            last_name: "Test".to_string(),
            season_start_year: 2025,
            team: TeamAbbr::new(team),
            winnings: 0,
        }
    }

    fn state(week: WeekKey, pot: i64, owners: Vec<Owner>) -> LedgerState {
        LedgerState { week, pot: Pot::new(pot), owners, existing: Vec::new() }
    }

    fn resolution(kind: WeekKind, primary: &[&str], bonus: &[&str]) -> WeekResolution {
        WeekResolution { kind, primary: abbrs(primary), bonus: abbrs(bonus), undecided: Vec::new() }
    }

    #[test]
    fn test_most_points_with_bonus() {
        let week = key(SeasonPhase::RegularSeason, 3);
        let plan = plan_settlement(
            &resolution(WeekKind::Regular(PointsMode::Most), &["C"], &["C"]),
            &state(week, 30, vec![owner(1, "C")]),
            &PayoutRules::default(),
        )
        .unwrap();

        assert_eq!(
            plan.events,
            vec![
                NewPayoutEvent { week, team: TeamAbbr::new("C"), category: PayoutCategory::Most, amount: 30 },
                NewPayoutEvent { week, team: TeamAbbr::new("C"), category: PayoutCategory::Fifty, amount: 50 },
            ]
        );
        assert_eq!(plan.total_credited(), 80);
        assert_eq!(plan.pot_after, Pot { amount: 10, settled_week: Some(week), opening_amount: 30 });
    }

    #[test]
    fn test_unsponsored_winner_rolls_pot() {
        let week = key(SeasonPhase::RegularSeason, 4);
        let plan = plan_settlement(
            &resolution(WeekKind::Regular(PointsMode::Least), &["NYG"], &[]),
            &state(week, 20, vec![owner(1, "DAL")]),
            &PayoutRules::default(),
        )
        .unwrap();

        // The event is still logged for the record
        assert_eq!(plan.events.len(), 1);
        assert_eq!(plan.events[0].amount, 20);
        assert!(plan.credits.is_empty());
        assert_eq!(plan.pot_after.amount, 30);
    }

    #[test]
    fn test_one_sponsored_winner_resets_pot() {
        let week = key(SeasonPhase::RegularSeason, 7);
        let plan = plan_settlement(
            &resolution(WeekKind::Regular(PointsMode::Most), &["NYG", "DAL"], &[]),
            &state(week, 40, vec![owner(1, "DAL")]),
            &PayoutRules::default(),
        )
        .unwrap();

        assert_eq!(plan.events.len(), 2);
        assert_eq!(plan.credits, vec![OwnerCredit {
            owner_id: 1,
            team: TeamAbbr::new("DAL"),
            category: PayoutCategory::Most,
            amount: 40,
        }]);
        assert_eq!(plan.pot_after.amount, 10);
    }

    #[test]
    fn test_preseason_never_grows_pot() {
        let week = key(SeasonPhase::Preseason, 2);
        let plan = plan_settlement(
            &resolution(WeekKind::Preseason, &[], &["KC"]),
            &state(week, 20, vec![]),
            &PayoutRules::default(),
        )
        .unwrap();

        assert_eq!(plan.events.len(), 1);
        assert_eq!(plan.events[0].category, PayoutCategory::Fifty);
        assert!(!plan.pot_changed());
    }

    #[test]
    fn test_postseason_fixed_payouts() {
        let rules = PayoutRules::default();
        let playoff = plan_settlement(
            &resolution(WeekKind::Playoff { round: 1 }, &["BUF", "PHI"], &[]),
            &state(key(SeasonPhase::Postseason, 1), 70, vec![owner(1, "BUF")]),
            &rules,
        )
        .unwrap();
        assert!(playoff.events.iter().all(|e| e.amount == 10 && e.category == PayoutCategory::Playoff));
        assert_eq!(playoff.total_credited(), 10);
        assert!(!playoff.pot_changed());

        let championship = plan_settlement(
            &resolution(WeekKind::Championship, &["KC"], &[]),
            &state(key(SeasonPhase::Postseason, 5), 70, vec![owner(1, "KC")]),
            &rules,
        )
        .unwrap();
        assert_eq!(championship.events.len(), 1);
        assert_eq!(championship.events[0].category, PayoutCategory::SuperBowl);
        assert_eq!(championship.events[0].amount, 25);
    }

    #[test]
    fn test_exhibition_plans_nothing() {
        let plan = plan_settlement(
            &resolution(WeekKind::Exhibition, &[], &[]),
            &state(key(SeasonPhase::Postseason, 4), 10, vec![]),
            &PayoutRules::default(),
        )
        .unwrap();
        assert!(plan.events.is_empty());
        assert!(plan.credits.is_empty());
    }

    #[test]
    fn test_rerun_skips_logged_events_and_keeps_pot() {
        let week = key(SeasonPhase::RegularSeason, 9);
        let mut ledger = state(week, 10, vec![owner(1, "PIT")]);
        ledger.pot = Pot { amount: 10, settled_week: Some(week), opening_amount: 30 };
        ledger.existing = vec![PayoutEvent {
            id: 7,
            week,
            team: TeamAbbr::new("PIT"),
            category: PayoutCategory::Most,
            amount: 30,
        }];

        let plan = plan_settlement(
            &resolution(WeekKind::Regular(PointsMode::Most), &["PIT"], &["PIT"]),
            &ledger,
            &PayoutRules::default(),
        )
        .unwrap();

        assert_eq!(plan.events.len(), 1);
        assert_eq!(plan.events[0].category, PayoutCategory::Fifty);
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.total_credited(), 50);
        assert!(plan.superseded.is_empty());
        assert!(!plan.pot_changed());
    }

    #[test]
    fn test_rerun_with_new_winner_starts_from_opening_pot() {
        let week = key(SeasonPhase::RegularSeason, 2);
        // An earlier run saw the unsponsored NYG winning and rolled 10 -> 20
        let mut ledger = state(week, 20, vec![owner(1, "DAL")]);
        ledger.pot = Pot { amount: 20, settled_week: Some(week), opening_amount: 10 };
        ledger.existing = vec![PayoutEvent {
            id: 3,
            week,
            team: TeamAbbr::new("NYG"),
            category: PayoutCategory::Least,
            amount: 10,
        }];

        let plan = plan_settlement(
            &resolution(WeekKind::Regular(PointsMode::Least), &["DAL"], &[]),
            &ledger,
            &PayoutRules::default(),
        )
        .unwrap();

        assert_eq!(plan.events, vec![NewPayoutEvent {
            week,
            team: TeamAbbr::new("DAL"),
            category: PayoutCategory::Least,
            amount: 10,
        }]);
        assert_eq!(plan.total_credited(), 10);
        assert_eq!(plan.superseded.iter().map(|e| e.id).collect::<Vec<_>>(), vec![3]);
        // NYG has no owner, so nothing was credited and nothing is taken back
        assert!(plan.reversals.is_empty());
        assert_eq!(plan.pot_after, Pot { amount: 10, settled_week: Some(week), opening_amount: 10 });
    }

    #[test]
    fn test_superseded_sponsored_win_is_reversed_once() {
        let week = key(SeasonPhase::RegularSeason, 5);
        let mut ledger = state(week, 10, vec![owner(1, "KC"), owner(2, "SF")]);
        ledger.pot = Pot { amount: 10, settled_week: Some(week), opening_amount: 40 };
        let logged = |id, team: &str, category, amount| PayoutEvent {
            id,
            week,
            team: TeamAbbr::new(team),
            category,
            amount,
        };
        ledger.existing = vec![
            logged(1, "KC", PayoutCategory::Most, 40),
            logged(2, "KC", PayoutCategory::Fifty, 50),
            logged(4, "KC", PayoutCategory::Most, 40),
        ];

        // KC finished on 49; SF took the most points
        let plan = plan_settlement(
            &resolution(WeekKind::Regular(PointsMode::Most), &["SF"], &[]),
            &ledger,
            &PayoutRules::default(),
        )
        .unwrap();

        assert_eq!(plan.superseded.len(), 3);
        assert_eq!(plan.total_reversed(), 90);
        assert!(plan.reversals.iter().all(|r| r.owner_id == 1));
        assert_eq!(plan.credits.len(), 1);
        assert_eq!(plan.credits[0].owner_id, 2);
        assert_eq!(plan.credits[0].amount, 40);
        assert_eq!(plan.pot_after.amount, 10);
        assert_eq!(plan.pot_after.opening_amount, 40);
    }

    #[test]
    fn test_double_assignment_is_rejected() {
        let err = plan_settlement(
            &resolution(WeekKind::Preseason, &[], &[]),
            &state(key(SeasonPhase::Preseason, 1), 10, vec![owner(1, "PIT"), owner(2, "PIT")]),
            &PayoutRules::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PoolError::InvariantViolation(_)));
    }

    #[test]
    fn test_reconciliation_keeps_oldest_of_each_group() {
        let week = key(SeasonPhase::RegularSeason, 3);
        let other_week = key(SeasonPhase::Postseason, 3);
        let event = |id, team: &str, category, week| PayoutEvent {
            id,
            week,
            team: TeamAbbr::new(team),
            category,
            amount: 10,
        };
        let events = vec![
            event(5, "C", PayoutCategory::Most, week),
            event(2, "C", PayoutCategory::Most, week),
            event(9, "C", PayoutCategory::Most, week),
            event(3, "C", PayoutCategory::Fifty, week),
            event(4, "C", PayoutCategory::Fifty, other_week),
            event(6, "D", PayoutCategory::Fifty, week),
            event(8, "D", PayoutCategory::Fifty, week),
        ];

        let mut doomed = plan_reconciliation(&events);
        doomed.sort_unstable();
        assert_eq!(doomed, vec![5, 8, 9]);

        let survivors: Vec<PayoutEvent> = events.into_iter().filter(|e| !doomed.contains(&e.id)).collect();
        assert!(plan_reconciliation(&survivors).is_empty());
    }
}
