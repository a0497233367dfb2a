//! Reward handlers.

mod daily_goal_watcher;

pub use daily_goal_watcher::DailyGoalWatcher;
