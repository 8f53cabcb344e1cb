//! Weekly settlement orchestration
//!
//! Sequences feed -> parse -> classify -> resolve -> ledger and persists the
//! result inside one transaction. The feed and store are passed in by the
//! caller; nothing here reaches for global state.

use pool_engine::{
    classify, plan_reconciliation, plan_settlement, resolve_week, LedgerState, PayoutCategory,
    PayoutRules, Roster, ScoreFeed, TeamAbbr, WeekKey, WeekKind, WeekResolution,
};
use pool_store::{PoolStore, PoolTransaction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{error, info, warn};

use crate::error::Result;

/// Outcome of one settlement run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementReport {
    pub week: WeekKey,
    pub kind: WeekKind,
    /// Payout events written by this run
    pub inserted: usize,
    /// Payouts already in the log from an earlier run
    pub skipped_duplicates: usize,
    /// Total credited to owners by this run
    pub credited: i64,
    /// Logged payouts removed because the week's results changed
    pub superseded: usize,
    /// Winnings taken back with the superseded payouts
    pub reversed: i64,
    pub pot_before: i64,
    pub pot_after: i64,
}

/// Current standings of the week, computed without touching the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekPreview {
    pub week: u32,
    pub kind: WeekKind,
    pub resolution: WeekResolution,
    /// Every team currently winning something, each listed once
    pub leaders: BTreeSet<TeamAbbr>,
}

impl WeekPreview {
    pub fn categories(&self) -> Vec<(PayoutCategory, &[TeamAbbr])> {
        self.resolution.by_category()
    }
}

/// Counts written by a roster seed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedReport {
    pub season_start_year: i32,
    pub teams: usize,
    pub owners: usize,
}

/// Compute and persist this week's results
///
/// Safe to retrigger: payouts already in the log are not written or credited
/// again, and the pot rule is recomputed from the pot the week opened with.
/// When a re-run sees different winners, the payouts it no longer supports
/// are removed and their winnings taken back.
pub async fn run_weekly_settlement(
    feed: &dyn ScoreFeed,
    store: &dyn PoolStore,
    rules: &PayoutRules,
    season_start_year: i32,
) -> Result<SettlementReport> {
    settle(feed, store, rules, season_start_year).await.map_err(|e| {
        error!("Weekly settlement aborted: {}", e);
        e
    })
}

async fn settle(
    feed: &dyn ScoreFeed,
    store: &dyn PoolStore,
    rules: &PayoutRules,
    season_start_year: i32,
) -> Result<SettlementReport> {
    let snapshot = feed.get_current_week().await?;
    let kind = classify(&snapshot)?;
    let week = WeekKey { season_start_year, phase: snapshot.phase, week: snapshot.week };
    info!(
        "Settling {} ({:?}, {} games) against the {} store",
        week,
        kind,
        snapshot.games.len(),
        store.backend_name()
    );

    let resolution = resolve_week(&snapshot, rules)?;

    let mut tx = store.begin().await?;
    match apply_settlement(tx.as_mut(), week, &resolution, rules).await {
        Ok(report) => {
            info!(
                "Committing {}: {} new payouts, {} already logged, {} superseded, ${} credited, ${} reversed, pot ${} -> ${}",
                week,
                report.inserted,
                report.skipped_duplicates,
                report.superseded,
                report.credited,
                report.reversed,
                report.pot_before,
                report.pot_after
            );
            tx.commit().await?;
            Ok(report)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                warn!("Rollback after failed settlement also failed: {}", rollback);
            }
            Err(e)
        }
    }
}

async fn apply_settlement(
    tx: &mut dyn PoolTransaction,
    week: WeekKey,
    resolution: &WeekResolution,
    rules: &PayoutRules,
) -> Result<SettlementReport> {
    let pot = tx.load_pot().await?;
    let owners = tx.owners_for_season(week.season_start_year).await?;
    let existing = tx.payout_events_for_week(&week).await?;

    let state = LedgerState { week, pot, owners, existing };
    let plan = plan_settlement(resolution, &state, rules)?;

    if !plan.superseded.is_empty() {
        let ids: Vec<i64> = plan.superseded.iter().map(|e| e.id).collect();
        tx.delete_payout_events(&ids).await?;
    }
    for reversal in &plan.reversals {
        tx.credit_owner(reversal.owner_id, -reversal.amount).await?;
    }
    for event in &plan.events {
        tx.insert_payout_event(event).await?;
    }
    for credit in &plan.credits {
        tx.credit_owner(credit.owner_id, credit.amount).await?;
    }
    if plan.pot_changed() {
        tx.save_pot(&plan.pot_after).await?;
    }

    Ok(SettlementReport {
        week,
        kind: plan.kind,
        inserted: plan.events.len(),
        skipped_duplicates: plan.skipped.len(),
        credited: plan.total_credited(),
        superseded: plan.superseded.len(),
        reversed: plan.total_reversed(),
        pot_before: plan.pot_before.amount,
        pot_after: plan.pot_after.amount,
    })
}

/// Delete duplicate payout rows, keeping one per (week, team, category)
///
/// Returns the number of rows deleted. Winnings credited by the deleted rows
/// stay credited.
pub async fn reconcile_duplicates(store: &dyn PoolStore) -> Result<u64> {
    info!("Reconciling the payout log in the {} store", store.backend_name());
    let mut tx = store.begin().await?;

    let events = tx.all_payout_events().await?;
    let doomed = plan_reconciliation(&events);
    if doomed.is_empty() {
        info!("Payout log has no duplicates ({} rows checked)", events.len());
        tx.rollback().await?;
        return Ok(0);
    }

    let deleted = match tx.delete_payout_events(&doomed).await {
        Ok(deleted) => deleted,
        Err(e) => {
            error!("Reconciliation aborted: {}", e);
            if let Err(rollback) = tx.rollback().await {
                warn!("Rollback after failed reconciliation also failed: {}", rollback);
            }
            return Err(e.into());
        }
    };
    tx.commit().await?;

    // TODO: reverse the winnings that the deleted rows credited once it is
    // settled whether double credits should be clawed back
    warn!("Deleted {} duplicate payout rows; owner winnings were not adjusted", deleted);
    Ok(deleted)
}

/// Who is currently ahead this week
pub async fn preview_week(feed: &dyn ScoreFeed, rules: &PayoutRules) -> Result<WeekPreview> {
    let snapshot = feed.get_current_week().await?;
    let kind = classify(&snapshot)?;
    let resolution = resolve_week(&snapshot, rules)?;
    let leaders = resolution.leaders();

    info!("Week {} ({:?}) leaders: {:?}", snapshot.week, kind, leaders);
    Ok(WeekPreview { week: snapshot.week, kind, resolution, leaders })
}

/// Validate a roster and write its teams and owners in one transaction
pub async fn seed_roster(
    store: &dyn PoolStore,
    roster: &Roster,
    expected_owner_count: Option<usize>,
) -> Result<SeedReport> {
    roster.validate(expected_owner_count).map_err(|e| {
        error!("Roster rejected: {}", e);
        e
    })?;

    let mut tx = store.begin().await?;
    let written = write_roster(tx.as_mut(), roster).await;
    match written {
        Ok(()) => tx.commit().await?,
        Err(e) => {
            error!("Roster seed aborted: {}", e);
            if let Err(rollback) = tx.rollback().await {
                warn!("Rollback after failed seed also failed: {}", rollback);
            }
            return Err(e);
        }
    }

    let unsponsored = roster.unsponsored();
    if !unsponsored.is_empty() {
        info!("Teams without an owner this season: {:?}", unsponsored);
    }
    info!(
        "Seeded season {}: {} teams, {} owners",
        roster.season_start_year,
        roster.teams.len(),
        roster.owners.len()
    );

    Ok(SeedReport {
        season_start_year: roster.season_start_year,
        teams: roster.teams.len(),
        owners: roster.owners.len(),
    })
}

async fn write_roster(tx: &mut dyn PoolTransaction, roster: &Roster) -> Result<()> {
    for team in &roster.teams {
        tx.upsert_team(team).await?;
    }
    for owner in &roster.owners {
        tx.insert_owner(roster.season_start_year, owner).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SettlementError;
    use pool_engine::roster::RosterOwner;
    use pool_engine::{PoolError, SeasonPhase, StaticFeed, Team};
    use pool_store::{InMemoryStore, StoreError};
    use serde_json::{json, Value};

    const SEASON: i32 = 2025;

    const ABBREVIATIONS: [&str; 32] = [
        "ARI", "ATL", "BAL", "BUF", "CAR", "CHI", "CIN", "CLE", "DAL", "DEN", "DET", "GB", "HOU",
        "IND", "JAX", "KC", "LAC", "LAR", "LV", "MIA", "MIN", "NE", "NO", "NYG", "NYJ", "PHI",
        "PIT", "SEA", "SF", "TB", "TEN", "WSH",
    ];

    fn roster(owner_teams: &[&str]) -> Roster {
        Roster {
            season_start_year: SEASON,
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

    async fn seeded_store(owner_teams: &[&str]) -> InMemoryStore {
        let store = InMemoryStore::new(10);
        seed_roster(&store, &roster(owner_teams), None).await.unwrap();
        store
    }

    fn game(home: (&str, u32), away: (&str, u32), status: &str) -> Value {
        json!({
            "date": "2025-09-21T17:00Z",
            "status": {"displayClock": "0:00", "period": 4, "type": {"name": status}},
            "competitions": [{"competitors": [
                {"homeAway": "home", "score": home.1.to_string(), "team": {"abbreviation": home.0, "displayName": home.0}},
                {"homeAway": "away", "score": away.1.to_string(), "team": {"abbreviation": away.0, "displayName": away.0}}
            ]}]
        })
    }

    fn scoreboard(week: u32, season_type: i64, games: Vec<Value>) -> StaticFeed {
        StaticFeed::new(json!({
            "week": {"number": week},
            "leagues": [{"season": {"type": {"type": season_type}}}],
            "events": games
        }))
    }

    fn winnings(contents: &pool_store::StoreContents, team: &str) -> i64 {
        contents
            .owners
            .iter()
            .find(|o| o.team == TeamAbbr::new(team))
            .map(|o| o.winnings)
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_regular_week_with_bonus() {
        let store = seeded_store(&["PIT", "KC"]).await;
        let feed = scoreboard(
            3,
            2,
            vec![game(("PIT", 24), ("BAL", 10), "STATUS_FINAL"), game(("KC", 50), ("DEN", 3), "STATUS_FINAL")],
        );

        let report = run_weekly_settlement(&feed, &store, &PayoutRules::default(), SEASON).await.unwrap();

        assert_eq!(report.inserted, 2);
        assert_eq!(report.credited, 60);
        assert_eq!(report.pot_before, 10);
        assert_eq!(report.pot_after, 10);

        let contents = store.snapshot().await;
        let mut logged: Vec<(String, PayoutCategory, i64)> = contents
            .events
            .iter()
            .map(|e| (e.team.to_string(), e.category, e.amount))
            .collect();
        logged.sort();
        assert_eq!(
            logged,
            vec![
                ("KC".to_string(), PayoutCategory::Most, 10),
                ("KC".to_string(), PayoutCategory::Fifty, 50),
            ]
        );
        assert_eq!(winnings(&contents, "KC"), 60);
        assert_eq!(winnings(&contents, "PIT"), 0);
    }

    #[tokio::test]
    async fn test_unsponsored_winner_rolls_pot() {
        let store = seeded_store(&["PIT"]).await;
        let feed = scoreboard(
            4,
            2,
            vec![game(("NYG", 3), ("DAL", 17), "STATUS_FINAL"), game(("PIT", 20), ("CLE", 13), "STATUS_FINAL")],
        );

        let report = run_weekly_settlement(&feed, &store, &PayoutRules::default(), SEASON).await.unwrap();
        assert!(matches!(report.kind, WeekKind::Regular(_)));
        assert_eq!(report.inserted, 1);
        assert_eq!(report.credited, 0);
        assert_eq!(report.pot_after, 20);
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let store = seeded_store(&["KC"]).await;
        let feed = scoreboard(1, 2, vec![game(("KC", 50), ("DEN", 3), "STATUS_FINAL")]);
        let rules = PayoutRules::default();

        run_weekly_settlement(&feed, &store, &rules, SEASON).await.unwrap();
        let first = store.snapshot().await;

        let again = run_weekly_settlement(&feed, &store, &rules, SEASON).await.unwrap();
        assert_eq!(again.inserted, 0);
        assert_eq!(again.skipped_duplicates, 2);
        assert_eq!(again.credited, 0);

        let second = store.snapshot().await;
        assert_eq!(first, second);
        assert_eq!(reconcile_duplicates(&store).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_pot_rule_applies_once_per_week() {
        let store = seeded_store(&[]).await;
        let rules = PayoutRules::default();

        // Week 2 in progress, then final: the pot only rolls once
        let live = scoreboard(2, 2, vec![game(("NYG", 3), ("DAL", 7), "STATUS_IN_PROGRESS")]);
        let done = scoreboard(2, 2, vec![game(("NYG", 3), ("DAL", 17), "STATUS_FINAL")]);
        run_weekly_settlement(&live, &store, &rules, SEASON).await.unwrap();
        let report = run_weekly_settlement(&done, &store, &rules, SEASON).await.unwrap();

        assert_eq!(report.pot_before, 20);
        assert_eq!(report.pot_after, 20);
        assert_eq!(report.superseded, 0);
        assert_eq!(store.snapshot().await.pot.amount, 20);
    }

    #[tokio::test]
    async fn test_rerun_with_changed_winner_recomputes_pot() {
        let store = seeded_store(&["DAL"]).await;
        let rules = PayoutRules::default();

        // Mid-game the unsponsored NYG has the least points and the pot rolls
        let live = scoreboard(2, 2, vec![game(("NYG", 3), ("DAL", 7), "STATUS_IN_PROGRESS")]);
        let first = run_weekly_settlement(&live, &store, &rules, SEASON).await.unwrap();
        assert_eq!((first.pot_before, first.pot_after), (10, 20));
        assert_eq!(first.credited, 0);

        // At the final whistle DAL has the least, and DAL has an owner
        let done = scoreboard(2, 2, vec![game(("NYG", 20), ("DAL", 17), "STATUS_FINAL")]);
        let second = run_weekly_settlement(&done, &store, &rules, SEASON).await.unwrap();
        assert_eq!(second.credited, 10);
        assert_eq!(second.superseded, 1);
        assert_eq!(second.reversed, 0);
        assert_eq!(second.pot_after, 10);

        let contents = store.snapshot().await;
        assert_eq!(contents.pot.amount, 10);
        assert_eq!(winnings(&contents, "DAL"), 10);
        let logged: Vec<(String, PayoutCategory, i64)> = contents
            .events
            .iter()
            .map(|e| (e.team.to_string(), e.category, e.amount))
            .collect();
        assert_eq!(logged, vec![("DAL".to_string(), PayoutCategory::Least, 10)]);

        // Settling the final result again changes nothing
        let third = run_weekly_settlement(&done, &store, &rules, SEASON).await.unwrap();
        assert_eq!((third.inserted, third.superseded, third.credited), (0, 0, 0));
        assert_eq!(store.snapshot().await, contents);
    }

    #[tokio::test]
    async fn test_rerun_takes_back_a_lost_win() {
        let store = seeded_store(&["KC", "SF"]).await;
        let rules = PayoutRules::default();

        // Week 1 is most points: KC leads mid-game, SF overtakes by the final
        let live = scoreboard(1, 2, vec![game(("KC", 21), ("SF", 14), "STATUS_IN_PROGRESS")]);
        run_weekly_settlement(&live, &store, &rules, SEASON).await.unwrap();
        assert_eq!(winnings(&store.snapshot().await, "KC"), 10);

        let done = scoreboard(1, 2, vec![game(("KC", 24), ("SF", 27), "STATUS_FINAL")]);
        let report = run_weekly_settlement(&done, &store, &rules, SEASON).await.unwrap();
        assert_eq!(report.reversed, 10);
        assert_eq!(report.credited, 10);
        assert_eq!(report.pot_after, 10);

        let contents = store.snapshot().await;
        assert_eq!(winnings(&contents, "KC"), 0);
        assert_eq!(winnings(&contents, "SF"), 10);
        assert_eq!(contents.events.len(), 1);
        assert_eq!(contents.events[0].team, TeamAbbr::new("SF"));
    }

    #[tokio::test]
    async fn test_postseason_skips_unfinished_games() {
        let store = seeded_store(&["BUF", "PHI"]).await;
        let feed = scoreboard(
            2,
            3,
            vec![
                game(("BUF", 27), ("BAL", 25), "STATUS_FINAL"),
                game(("PHI", 14), ("LAR", 14), "STATUS_IN_PROGRESS"),
            ],
        );

        let report = run_weekly_settlement(&feed, &store, &PayoutRules::default(), SEASON).await.unwrap();
        assert_eq!(report.kind, WeekKind::Playoff { round: 2 });
        assert_eq!(report.inserted, 1);
        assert_eq!(report.credited, 10);
        assert_eq!(report.pot_after, report.pot_before);

        let contents = store.snapshot().await;
        assert_eq!(contents.events[0].category, PayoutCategory::Playoff);
        assert_eq!(contents.events[0].week.phase, SeasonPhase::Postseason);
    }

    #[tokio::test]
    async fn test_championship_and_exhibition() {
        let store = seeded_store(&["KC"]).await;
        let rules = PayoutRules::default();

        let exhibition = scoreboard(4, 3, vec![game(("AFC", 50), ("NFC", 45), "STATUS_FINAL")]);
        let report = run_weekly_settlement(&exhibition, &store, &rules, SEASON).await.unwrap();
        assert_eq!(report.kind, WeekKind::Exhibition);
        assert_eq!(report.inserted, 0);

        let championship = scoreboard(5, 3, vec![game(("KC", 24), ("PHI", 21), "STATUS_FINAL")]);
        let report = run_weekly_settlement(&championship, &store, &rules, SEASON).await.unwrap();
        assert_eq!(report.kind, WeekKind::Championship);
        assert_eq!(report.credited, 25);
        assert_eq!(store.snapshot().await.events[0].category, PayoutCategory::SuperBowl);
    }

    #[tokio::test]
    async fn test_feed_unavailable_writes_nothing() {
        let store = seeded_store(&["KC"]).await;
        let before = store.snapshot().await;

        let err = run_weekly_settlement(&StaticFeed::unavailable(), &store, &PayoutRules::default(), SEASON)
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::Pool(PoolError::FeedUnavailable { .. })));

        let err = run_weekly_settlement(&StaticFeed::new(json!({})), &store, &PayoutRules::default(), SEASON)
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::Pool(PoolError::FeedUnavailable { .. })));

        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_failed_credit_rolls_back_everything() {
        let seeded = seeded_store(&["KC"]).await;
        let before = seeded.snapshot().await;
        let failing = seeded.clone().with_credit_failure();
        let feed = scoreboard(1, 2, vec![game(("KC", 31), ("DEN", 3), "STATUS_FINAL")]);

        let err = run_weekly_settlement(&feed, &failing, &PayoutRules::default(), SEASON).await.unwrap_err();
        assert!(matches!(err, SettlementError::Store(StoreError::Injected(_))));
        assert_eq!(seeded.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_reconcile_removes_duplicates_once() {
        let store = seeded_store(&["KC"]).await;
        let week = WeekKey { season_start_year: SEASON, phase: SeasonPhase::RegularSeason, week: 3 };
        let event = pool_engine::NewPayoutEvent {
            week,
            team: TeamAbbr::new("KC"),
            category: PayoutCategory::Most,
            amount: 10,
        };

        let mut tx = store.begin().await.unwrap();
        for _ in 0..3 {
            tx.insert_payout_event(&event).await.unwrap();
        }
        tx.commit().await.unwrap();

        assert_eq!(reconcile_duplicates(&store).await.unwrap(), 2);
        assert_eq!(reconcile_duplicates(&store).await.unwrap(), 0);

        let contents = store.snapshot().await;
        assert_eq!(contents.events.len(), 1);
        assert_eq!(contents.events[0].id, 1);
    }

    #[tokio::test]
    async fn test_preview_lists_each_leader_once() {
        let feed = scoreboard(
            1,
            2,
            vec![game(("KC", 50), ("DEN", 3), "STATUS_IN_PROGRESS"), game(("SF", 0), ("SEA", 0), "STATUS_SCHEDULED")],
        );

        let preview = preview_week(&feed, &PayoutRules::default()).await.unwrap();
        assert_eq!(preview.leaders.len(), 1);
        assert!(preview.leaders.contains(&TeamAbbr::new("KC")));
        assert!(!preview.categories().is_empty());
    }

    #[tokio::test]
    async fn test_seed_rejects_bad_roster_before_writing() {
        let store = InMemoryStore::new(10);

        let err = seed_roster(&store, &roster(&["PIT", "PIT"]), None).await.unwrap_err();
        assert!(matches!(err, SettlementError::Pool(PoolError::InvariantViolation(_))));

        let err = seed_roster(&store, &roster(&["PIT"]), Some(29)).await.unwrap_err();
        assert!(matches!(err, SettlementError::Pool(PoolError::InvariantViolation(_))));

        assert!(store.snapshot().await.teams.is_empty());

        let report = seed_roster(&store, &roster(&["PIT"]), Some(1)).await.unwrap();
        assert_eq!(report, SeedReport { season_start_year: SEASON, teams: 32, owners: 1 });
    }
}
