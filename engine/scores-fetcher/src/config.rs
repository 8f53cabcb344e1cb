use serde::{Deserialize, Serialize};

/// Public scoreboard endpoint for the current NFL week
pub const DEFAULT_SCOREBOARD_URL: &str =
    "http://site.api.espn.com/apis/site/v2/sports/football/nfl/scoreboard";

/// Configuration for the scoreboard feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Scoreboard URL
    pub url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SCOREBOARD_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

impl FeedConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(format!("feed url must be http(s), got '{}'", self.url));
        }
        if self.timeout_secs == 0 {
            return Err("feed timeout_secs must be > 0".to_string());
        }
        Ok(())
    }
}
