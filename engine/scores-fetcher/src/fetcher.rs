use crate::config::FeedConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use pool_engine::{PoolError, ScoreFeed};
use reqwest::Client;
use std::time::Duration as StdDuration;
use tracing::{error, info};

/// Scoreboard client for the public ESPN NFL endpoint
pub struct EspnScoreFeed {
    config: FeedConfig,
    client: Client,
}

impl EspnScoreFeed {
    /// Create a new feed client
    pub fn new(config: FeedConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(StdDuration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { config, client })
    }

    /// Fetch the raw scoreboard document
    pub async fn fetch_scoreboard(&self) -> Result<serde_json::Value> {
        info!("Fetching scoreboard from: {}", self.config.url);

        let response = self
            .client
            .get(&self.config.url)
            .send()
            .await
            .context("Failed to fetch scoreboard")?;

        if !response.status().is_success() {
            anyhow::bail!("Scoreboard request failed with status: {}", response.status());
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse scoreboard JSON")?;

        let empty = match &payload {
            serde_json::Value::Null => true,
            serde_json::Value::Object(map) => map.is_empty(),
            _ => false,
        };
        if empty {
            anyhow::bail!("Scoreboard response was empty");
        }

        let events = payload
            .get("events")
            .and_then(|e| e.as_array())
            .map(|e| e.len())
            .unwrap_or(0);
        info!("Successfully fetched scoreboard with {} events", events);
        Ok(payload)
    }
}

#[async_trait]
impl ScoreFeed for EspnScoreFeed {
    async fn fetch_payload(&self) -> pool_engine::Result<serde_json::Value> {
        self.fetch_scoreboard().await.map_err(|e| {
            error!("Scoreboard fetch failed: {:#}", e);
            PoolError::feed_unavailable(format!("{:#}", e))
        })
    }
}
