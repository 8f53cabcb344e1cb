use crate::config::{RetryConfig, ServiceConfig};
use crate::settlement::{reconcile_duplicates, run_weekly_settlement};
use anyhow::Result;
use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveTime, Utc, Weekday};
use pool_engine::ScoreFeed;
use pool_store::PoolStore;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Weekly trigger for settlement followed by reconciliation
///
/// Both jobs run one after the other in a single task, so two runs never
/// overlap. Missed ticks are not replayed: after each cycle the next run is
/// computed from the current time.
pub struct SettlementScheduler {
    config: ServiceConfig,
    feed: Arc<dyn ScoreFeed>,
    store: Arc<dyn PoolStore>,
}

impl SettlementScheduler {
    pub fn new(config: ServiceConfig, feed: Arc<dyn ScoreFeed>, store: Arc<dyn PoolStore>) -> Self {
        Self { config, feed, store }
    }

    /// Run the weekly cycle (runs indefinitely)
    pub async fn start(&self) -> Result<()> {
        let weekday = self.config.schedule.weekday()?;
        let time = self.config.schedule.time()?;
        let reconcile_delay = Duration::from_secs(self.config.schedule.reconcile_delay_minutes * 60);
        info!(
            "Starting settlement scheduler: every {} at {} UTC, reconciliation {} minutes later",
            weekday, time, self.config.schedule.reconcile_delay_minutes
        );

        loop {
            let now = Utc::now();
            let next_run = calculate_next_run_time(now, weekday, time);
            let sleep_duration = (next_run - now).to_std().unwrap_or(Duration::from_secs(60));

            info!("Next settlement scheduled for: {}", next_run);
            sleep(sleep_duration).await;

            self.run_cycle(reconcile_delay).await;
        }
    }

    async fn run_cycle(&self, reconcile_delay: Duration) {
        let season = self.config.season.resolve_start_year(Utc::now().date_naive());
        let rules = &self.config.rules;
        let feed = self.feed.as_ref();
        let store = self.store.as_ref();

        match run_with_retry(
            move || run_weekly_settlement(feed, store, rules, season),
            &self.config.schedule.retry,
        )
        .await
        {
            Ok(report) => info!("Settlement completed: {:?}", report),
            Err(e) => error!("Settlement failed after retries: {}", e),
        }

        sleep(reconcile_delay).await;

        match run_with_retry(move || reconcile_duplicates(store), &self.config.schedule.retry).await {
            Ok(deleted) => info!("Reconciliation completed: {} duplicate rows removed", deleted),
            Err(e) => error!("Reconciliation failed after retries: {}", e),
        }
    }
}

/// Next occurrence of `weekday` at `time` strictly after `now`
pub fn calculate_next_run_time(now: DateTime<Utc>, weekday: Weekday, time: NaiveTime) -> DateTime<Utc> {
    let days_ahead = (weekday.num_days_from_monday() + 7 - now.weekday().num_days_from_monday()) % 7;
    let candidate = (now.date_naive() + ChronoDuration::days(days_ahead as i64)).and_time(time).and_utc();

    if candidate > now {
        candidate
    } else {
        candidate + ChronoDuration::days(7)
    }
}

/// Run a function with retry logic and exponential backoff
pub async fn run_with_retry<F, Fut, T, E>(mut f: F, retry_config: &RetryConfig) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Display,
{
    let mut delay = Duration::from_secs(retry_config.initial_delay_secs);
    let mut attempt = 1;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt >= retry_config.max_retries => return Err(e),
            Err(e) => {
                warn!("Attempt {} failed: {}, retrying in {:?}", attempt, e, delay);
                sleep(delay).await;
                attempt += 1;

                delay = Duration::from_secs(
                    (delay.as_secs() as f64 * retry_config.backoff_multiplier)
                        .min(retry_config.max_delay_secs as f64) as u64,
                );
            }
        }
    }
}
