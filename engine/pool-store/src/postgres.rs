//! Postgres store

use crate::backend::{PoolStore, PoolTransaction};
use crate::config::DatabaseConfig;
use crate::error::{Result, StoreError};
use pool_engine::roster::RosterOwner;
use pool_engine::{
    NewPayoutEvent, Owner, PayoutCategory, PayoutEvent, Pot, SeasonPhase, Team, TeamAbbr, WeekKey,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::info;

const SCHEMA: [&str; 6] = [
    r#"
    CREATE TABLE IF NOT EXISTS teams (
        abbreviation TEXT PRIMARY KEY,
        name TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS owners (
        id BIGSERIAL PRIMARY KEY,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        season_start_year INTEGER NOT NULL,
        team TEXT NOT NULL REFERENCES teams(abbreviation),
        winnings BIGINT NOT NULL DEFAULT 0,
        UNIQUE (season_start_year, team)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS payout_events (
        id BIGSERIAL PRIMARY KEY,
        season_start_year INTEGER NOT NULL,
        phase TEXT NOT NULL,
        week INTEGER NOT NULL,
        team TEXT NOT NULL REFERENCES teams(abbreviation),
        category TEXT NOT NULL,
        amount BIGINT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_payout_events_week ON payout_events(season_start_year, phase, week)",
    r#"
    CREATE TABLE IF NOT EXISTS pot (
        id SMALLINT PRIMARY KEY CHECK (id = 1),
        amount BIGINT NOT NULL,
        settled_season INTEGER,
        settled_phase TEXT,
        settled_week INTEGER,
        opening_amount BIGINT
    )
    "#,
    "ALTER TABLE pot ADD COLUMN IF NOT EXISTS opening_amount BIGINT",
];

/// Store backed by a Postgres pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect using the database configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;
        info!("Connected to Postgres (max {} connections)", config.max_connections);
        Ok(Self { pool })
    }

    /// Create the tables if missing and make sure the pot row exists
    pub async fn ensure_schema(&self, initial_pot: i64) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        sqlx::query("INSERT INTO pot (id, amount) VALUES (1, $1) ON CONFLICT (id) DO NOTHING")
            .bind(initial_pot)
            .execute(&self.pool)
            .await?;

        info!("Database schema ready");
        Ok(())
    }
}

#[async_trait::async_trait]
impl PoolStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn PoolTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

fn decode_phase(raw: &str) -> Result<SeasonPhase> {
    SeasonPhase::parse(raw).ok_or_else(|| StoreError::not_found(format!("season phase '{}'", raw)))
}

fn decode_week(row: &PgRow) -> Result<WeekKey> {
    let phase: String = row.try_get("phase")?;
    let week: i32 = row.try_get("week")?;
    Ok(WeekKey {
        season_start_year: row.try_get("season_start_year")?,
        phase: decode_phase(&phase)?,
        week: week as u32,
    })
}

fn decode_event(row: &PgRow) -> Result<PayoutEvent> {
    let category: String = row.try_get("category")?;
    let team: String = row.try_get("team")?;
    Ok(PayoutEvent {
        id: row.try_get("id")?,
        week: decode_week(row)?,
        team: TeamAbbr::new(team),
        category: PayoutCategory::parse(&category)
            .ok_or_else(|| StoreError::not_found(format!("payout category '{}'", category)))?,
        amount: row.try_get("amount")?,
    })
}

fn decode_owner(row: &PgRow) -> Result<Owner> {
    let team: String = row.try_get("team")?;
    Ok(Owner {
        id: row.try_get("id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        season_start_year: row.try_get("season_start_year")?,
        team: TeamAbbr::new(team),
        winnings: row.try_get("winnings")?,
    })
}

const EVENT_COLUMNS: &str = "id, season_start_year, phase, week, team, category, amount";

#[async_trait::async_trait]
impl PoolTransaction for PgTransaction {
    async fn load_pot(&mut self) -> Result<Pot> {
        let row = sqlx::query(
            "SELECT amount, settled_season, settled_phase, settled_week, opening_amount FROM pot WHERE id = 1 FOR UPDATE",
        )
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| StoreError::not_found("pot row"))?;

        let settled_season: Option<i32> = row.try_get("settled_season")?;
        let settled_phase: Option<String> = row.try_get("settled_phase")?;
        let settled_week: Option<i32> = row.try_get("settled_week")?;
        let settled_week = match (settled_season, settled_phase, settled_week) {
            (Some(season_start_year), Some(phase), Some(week)) => Some(WeekKey {
                season_start_year,
                phase: decode_phase(&phase)?,
                week: week as u32,
            }),
            _ => None,
        };

        let amount: i64 = row.try_get("amount")?;
        let opening_amount: Option<i64> = row.try_get("opening_amount")?;
        Ok(Pot { amount, settled_week, opening_amount: opening_amount.unwrap_or(amount) })
    }

    async fn save_pot(&mut self, pot: &Pot) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE pot
            SET amount = $1, settled_season = $2, settled_phase = $3, settled_week = $4,
                opening_amount = $5
            WHERE id = 1
            "#,
        )
        .bind(pot.amount)
        .bind(pot.settled_week.map(|w| w.season_start_year))
        .bind(pot.settled_week.map(|w| w.phase.as_str()))
        .bind(pot.settled_week.map(|w| w.week as i32))
        .bind(pot.opening_amount)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn owners_for_season(&mut self, season_start_year: i32) -> Result<Vec<Owner>> {
        let rows = sqlx::query(
            r#"
            SELECT id, first_name, last_name, season_start_year, team, winnings
            FROM owners
            WHERE season_start_year = $1
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(season_start_year)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(decode_owner).collect()
    }

    async fn payout_events_for_week(&mut self, week: &WeekKey) -> Result<Vec<PayoutEvent>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM payout_events WHERE season_start_year = $1 AND phase = $2 AND week = $3 ORDER BY id",
            EVENT_COLUMNS
        ))
        .bind(week.season_start_year)
        .bind(week.phase.as_str())
        .bind(week.week as i32)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(decode_event).collect()
    }

    async fn all_payout_events(&mut self) -> Result<Vec<PayoutEvent>> {
        let rows = sqlx::query(&format!("SELECT {} FROM payout_events ORDER BY id FOR UPDATE", EVENT_COLUMNS))
            .fetch_all(&mut *self.tx)
            .await?;

        rows.iter().map(decode_event).collect()
    }

    async fn insert_payout_event(&mut self, event: &NewPayoutEvent) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO payout_events (season_start_year, phase, week, team, category, amount)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(event.week.season_start_year)
        .bind(event.week.phase.as_str())
        .bind(event.week.week as i32)
        .bind(event.team.as_str())
        .bind(event.category.as_str())
        .bind(event.amount)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn credit_owner(&mut self, owner_id: i64, amount: i64) -> Result<()> {
        let result = sqlx::query("UPDATE owners SET winnings = winnings + $1 WHERE id = $2")
            .bind(amount)
            .bind(owner_id)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("owner {}", owner_id)));
        }
        Ok(())
    }

    async fn delete_payout_events(&mut self, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM payout_events WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn upsert_team(&mut self, team: &Team) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO teams (abbreviation, name) VALUES ($1, $2)
            ON CONFLICT (abbreviation) DO UPDATE SET name = EXCLUDED.name
            "#,
        )
        .bind(team.abbreviation.as_str())
        .bind(&team.name)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_owner(&mut self, season_start_year: i32, owner: &RosterOwner) -> Result<i64> {
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO owners (first_name, last_name, season_start_year, team)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (season_start_year, team) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&owner.first_name)
        .bind(&owner.last_name)
        .bind(season_start_year)
        .bind(owner.team.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        id.ok_or_else(|| {
            StoreError::conflict(format!(
                "team {} already has an owner in season {}",
                owner.team, season_start_year
            ))
        })
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
