//! Reward module - daily distance goals.
//!
//! - `progress` - Per-day accumulation and the crossing rule
//! - `events` - `DailyGoalAchieved`, the derived event

mod events;
mod progress;

pub use events::DailyGoalAchieved;
pub use progress::{DailyGoal, DailyRewardProgress, DEFAULT_GOAL_HUNDREDTHS, DEFAULT_GOAL_POINTS};
