//! Daily reward configuration

use serde::Deserialize;

use crate::domain::foundation::DistanceKm;
use crate::domain::reward::DailyGoal;

use super::error::ValidationError;

/// Daily distance goal and the points it awards
#[derive(Debug, Clone, Deserialize)]
pub struct RewardConfig {
    /// Goal distance in kilometres, at most two decimals are kept
    #[serde(default = "default_daily_goal_km")]
    pub daily_goal_km: f64,

    #[serde(default = "default_goal_points")]
    pub goal_points: u32,
}

impl RewardConfig {
    /// Build the domain goal.
    pub fn daily_goal(&self) -> Result<DailyGoal, ValidationError> {
        let distance = DistanceKm::try_from_km(self.daily_goal_km)
            .map_err(|e| ValidationError::InvalidGoalDistance(e.to_string()))?;
        DailyGoal::new(distance, self.goal_points)
            .map_err(|e| ValidationError::InvalidGoalDistance(e.message))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.daily_goal().map(|_| ())
    }
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            daily_goal_km: default_daily_goal_km(),
            goal_points: default_goal_points(),
        }
    }
}

fn default_daily_goal_km() -> f64 {
    20.0
}

fn default_goal_points() -> u32 {
    100
}
