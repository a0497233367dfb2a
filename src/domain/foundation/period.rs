//! Calendar month key used by the monthly read model.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// A UTC calendar month, e.g. `2024-01`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthPeriod {
    year: i32,
    month: u32,
}

impl MonthPeriod {
    /// Creates a period, validating the month number.
    pub fn new(year: i32, month: u32) -> Result<Self, ValidationError> {
        if !(1..=12).contains(&month) {
            return Err(ValidationError::out_of_range("month", 1, 12, i64::from(month)));
        }
        Ok(Self { year, month })
    }

    /// Builds a period from parts already known to be valid (e.g. from chrono).
    pub(crate) fn from_parts(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// Calendar year.
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Calendar month, 1-12.
    pub fn month(&self) -> u32 {
        self.month
    }
}

impl fmt::Display for MonthPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_month() {
        assert!(MonthPeriod::new(2024, 0).is_err());
        assert!(MonthPeriod::new(2024, 13).is_err());
    }

    #[test]
    fn orders_chronologically() {
        let dec = MonthPeriod::new(2023, 12).unwrap();
        let jan = MonthPeriod::new(2024, 1).unwrap();
        assert!(dec < jan);
    }

    #[test]
    fn displays_as_year_month() {
        assert_eq!(MonthPeriod::new(2024, 2).unwrap().to_string(), "2024-02");
    }
}
