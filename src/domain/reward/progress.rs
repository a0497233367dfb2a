//! Daily reward progress and goal-crossing detection.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::DailyGoalAchieved;
use crate::domain::foundation::{DistanceKm, DomainError, EventId, Timestamp, UserId};

/// Default daily distance goal in hundredths of a kilometre (20.00 km).
pub const DEFAULT_GOAL_HUNDREDTHS: i64 = 2_000;

/// Default points credited when the goal is reached.
pub const DEFAULT_GOAL_POINTS: u32 = 100;

/// The fixed daily target and its reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyGoal {
    distance: DistanceKm,
    reward_points: u32,
}

impl DailyGoal {
    /// Creates a goal.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if the distance is zero
    pub fn new(distance: DistanceKm, reward_points: u32) -> Result<Self, DomainError> {
        if distance.is_zero() {
            return Err(DomainError::validation(
                "daily_goal_km",
                "Daily goal must be greater than zero",
            ));
        }
        Ok(Self {
            distance,
            reward_points,
        })
    }

    pub fn distance(&self) -> DistanceKm {
        self.distance
    }

    pub fn reward_points(&self) -> u32 {
        self.reward_points
    }

    /// True when going from `before` to `after` crosses the goal upwards.
    pub fn is_crossed(&self, before: DistanceKm, after: DistanceKm) -> bool {
        before < self.distance && after >= self.distance
    }
}

impl Default for DailyGoal {
    fn default() -> Self {
        Self {
            distance: DistanceKm::from_hundredths(DEFAULT_GOAL_HUNDREDTHS)
                .unwrap_or(DistanceKm::ZERO),
            reward_points: DEFAULT_GOAL_POINTS,
        }
    }
}

/// Per-user, per-UTC-day accumulation of distance and points.
///
/// # Invariants
///
/// - `total_distance` only grows
/// - `goal_achieved_at` is set at most once, on the contribution that
///   crossed the goal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRewardProgress {
    user_id: UserId,
    date: NaiveDate,
    total_distance: DistanceKm,
    points: u32,
    goal_achieved_at: Option<Timestamp>,
    updated_at: Timestamp,
}

impl DailyRewardProgress {
    /// Empty progress for a day nobody has contributed to yet.
    pub fn start(user_id: UserId, date: NaiveDate, now: Timestamp) -> Self {
        Self {
            user_id,
            date,
            total_distance: DistanceKm::ZERO,
            points: 0,
            goal_achieved_at: None,
            updated_at: now,
        }
    }

    /// Reconstitute progress from persistence.
    pub fn reconstitute(
        user_id: UserId,
        date: NaiveDate,
        total_distance: DistanceKm,
        points: u32,
        goal_achieved_at: Option<Timestamp>,
        updated_at: Timestamp,
    ) -> Self {
        Self {
            user_id,
            date,
            total_distance,
            points,
            goal_achieved_at,
            updated_at,
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn total_distance(&self) -> DistanceKm {
        self.total_distance
    }

    pub fn points(&self) -> u32 {
        self.points
    }

    pub fn goal_achieved_at(&self) -> Option<Timestamp> {
        self.goal_achieved_at
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Adds a contribution and reports whether it crossed the goal.
    ///
    /// The comparison uses the totals immediately before and after this
    /// addition, so a given day fires at most once no matter how many
    /// contributions follow.
    pub fn add_contribution(
        &self,
        distance: DistanceKm,
        goal: &DailyGoal,
        source_event_id: EventId,
        now: Timestamp,
    ) -> (Self, Option<DailyGoalAchieved>) {
        let before = self.total_distance;
        let after = before + distance;

        let mut next = Self {
            total_distance: after,
            updated_at: now,
            ..self.clone()
        };

        if !goal.is_crossed(before, after) {
            return (next, None);
        }

        next.points = next.points.saturating_add(goal.reward_points());
        next.goal_achieved_at = Some(now);

        let event = DailyGoalAchieved {
            event_id: EventId::new(),
            user_id: self.user_id.clone(),
            date: self.date,
            total_distance_km: after,
            goal_distance_km: goal.distance(),
            points: goal.reward_points(),
            source_event_id,
            occurred_at: now,
        };
        (next, Some(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn km(value: f64) -> DistanceKm {
        DistanceKm::try_from_km(value).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn progress() -> DailyRewardProgress {
        DailyRewardProgress::start(UserId::new("rider").unwrap(), day(1), Timestamp::now())
    }

    #[test]
    fn default_goal_is_twenty_km_for_one_hundred_points() {
        let goal = DailyGoal::default();
        assert_eq!(goal.distance(), km(20.0));
        assert_eq!(goal.reward_points(), 100);
    }

    #[test]
    fn zero_goal_is_rejected() {
        assert!(DailyGoal::new(DistanceKm::ZERO, 10).is_err());
    }

    #[test]
    fn crossing_fires_once_on_the_second_contribution() {
        let goal = DailyGoal::default();
        let (p, first) = progress().add_contribution(km(19.99), &goal, EventId::new(), Timestamp::now());
        assert!(first.is_none());

        let (p, second) = p.add_contribution(km(0.02), &goal, EventId::new(), Timestamp::now());
        let event = second.expect("goal should be crossed");
        assert_eq!(event.total_distance_km, km(20.01));
        assert_eq!(p.points(), 100);
        assert!(p.goal_achieved_at().is_some());

        let (p, third) = p.add_contribution(km(5.0), &goal, EventId::new(), Timestamp::now());
        assert!(third.is_none());
        assert_eq!(p.points(), 100);
    }

    #[test]
    fn exactly_twenty_fires() {
        let goal = DailyGoal::default();
        let (_, event) = progress().add_contribution(km(20.0), &goal, EventId::new(), Timestamp::now());
        assert!(event.is_some());
    }

    #[test]
    fn just_below_does_not_fire() {
        let goal = DailyGoal::default();
        let (p, event) = progress().add_contribution(km(19.99), &goal, EventId::new(), Timestamp::now());
        assert!(event.is_none());
        assert_eq!(p.points(), 0);
    }

    #[test]
    fn goal_event_above_single_journey_cap_stays_decodable() {
        use crate::domain::outbox::OutboxEvent;
        use crate::ports::OutboxRecord;

        let goal = DailyGoal::new(km(1_000_000.0), 100).unwrap();
        let (p, first) = progress().add_contribution(km(600_000.0), &goal, EventId::new(), Timestamp::now());
        assert!(first.is_none());
        let (_, crossed) = p.add_contribution(km(600_000.0), &goal, EventId::new(), Timestamp::now());
        let event = crossed.unwrap();
        assert_eq!(event.total_distance_km, km(1_200_000.0));

        let record = OutboxRecord::from_event(&OutboxEvent::from(event.clone())).unwrap();
        match record.decode().unwrap() {
            OutboxEvent::DailyGoalAchieved(decoded) => {
                assert_eq!(decoded.total_distance_km, event.total_distance_km)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn derived_event_records_its_cause() {
        let goal = DailyGoal::default();
        let source = EventId::new();
        let (_, event) = progress().add_contribution(km(25.0), &goal, source, Timestamp::now());
        let event = event.unwrap();
        assert_eq!(event.source_event_id, source);
        assert_eq!(event.date, day(1));
    }
}
