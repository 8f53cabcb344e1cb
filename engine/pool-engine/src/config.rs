use serde::{Deserialize, Serialize};

/// Monetary rules of the pool, in whole dollars
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayoutRules {
    /// Pot value after a sponsored team collects it
    pub pot_reset: i64,

    /// Added to the pot when nobody collects it in a regular season week
    pub pot_increment: i64,

    /// Paid per postseason game won (wildcard, divisional, conference)
    pub playoff_payout: i64,

    /// Paid to the championship winner
    pub championship_payout: i64,

    /// Paid to any team hitting the bonus score exactly
    pub bonus_payout: i64,

    /// Score that triggers the bonus
    pub bonus_score: u32,
}

impl Default for PayoutRules {
    fn default() -> Self {
        Self {
            pot_reset: 10,
            pot_increment: 10,
            playoff_payout: 10,
            championship_payout: 25,
            bonus_payout: 50,
            bonus_score: 50,
        }
    }
}

impl PayoutRules {
    /// Validate the rules
    pub fn validate(&self) -> Result<(), String> {
        if self.pot_reset <= 0 {
            return Err("pot_reset must be greater than 0".to_string());
        }
        if self.pot_increment < 0 {
            return Err("pot_increment must not be negative".to_string());
        }
        if self.playoff_payout <= 0 || self.championship_payout <= 0 || self.bonus_payout <= 0 {
            return Err("fixed payouts must be greater than 0".to_string());
        }
        Ok(())
    }
}
