//! Journey value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{DistanceKm, DomainError, Timestamp, ValidationError};

/// Maximum length for a location label.
pub const MAX_LOCATION_LENGTH: usize = 200;

/// Longest single journey accepted, in hundredths of a kilometre (1,000,000 km).
pub const MAX_JOURNEY_HUNDREDTHS: i64 = 100_000_000;

/// How a journey was travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportType {
    Walking,
    Cycling,
    Car,
    Bus,
    Train,
    Tram,
    Other,
}

impl TransportType {
    /// Wire and storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportType::Walking => "walking",
            TransportType::Cycling => "cycling",
            TransportType::Car => "car",
            TransportType::Bus => "bus",
            TransportType::Train => "train",
            TransportType::Tram => "tram",
            TransportType::Other => "other",
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "walking" => Ok(TransportType::Walking),
            "cycling" => Ok(TransportType::Cycling),
            "car" => Ok(TransportType::Car),
            "bus" => Ok(TransportType::Bus),
            "train" => Ok(TransportType::Train),
            "tram" => Ok(TransportType::Tram),
            "other" => Ok(TransportType::Other),
            other => Err(ValidationError::invalid_format(
                "transport_type",
                format!("unknown transport type '{}'", other),
            )),
        }
    }
}

/// Free-text place label, 1-200 characters after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Location(String);

impl Location {
    /// Creates a location label.
    pub fn new(label: impl Into<String>) -> Result<Self, ValidationError> {
        let label = label.into();
        let trimmed = label.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::empty_field("location"));
        }
        if trimmed.chars().count() > MAX_LOCATION_LENGTH {
            return Err(ValidationError::out_of_range(
                "location",
                1,
                MAX_LOCATION_LENGTH as i64,
                trimmed.chars().count() as i64,
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the label.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Location {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Location> for String {
    fn from(location: Location) -> Self {
        location.0
    }
}

/// The user-editable part of a journey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JourneyDetails {
    pub start_location: Location,
    pub start_time: Timestamp,
    pub arrival_location: Location,
    pub arrival_time: Timestamp,
    pub transport_type: TransportType,
    pub distance_km: DistanceKm,
}

impl JourneyDetails {
    /// Checks cross-field invariants.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if arrival is not after start
    /// - `ValidationFailed` if the distance is zero or above one million km
    pub fn validate(&self) -> Result<(), DomainError> {
        if !self.arrival_time.is_after(&self.start_time) {
            return Err(DomainError::validation(
                "arrival_time",
                "Arrival time must be after start time",
            ));
        }
        if self.distance_km.is_zero() {
            return Err(DomainError::validation(
                "distance_km",
                "Distance must be greater than zero",
            ));
        }
        if self.distance_km.hundredths() > MAX_JOURNEY_HUNDREDTHS {
            return Err(DomainError::validation(
                "distance_km",
                "Distance must not exceed 1000000 km",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_type_round_trips_through_str() {
        for t in [
            TransportType::Walking,
            TransportType::Cycling,
            TransportType::Car,
            TransportType::Bus,
            TransportType::Train,
            TransportType::Tram,
            TransportType::Other,
        ] {
            assert_eq!(t.as_str().parse::<TransportType>().unwrap(), t);
        }
        assert!("rocket".parse::<TransportType>().is_err());
    }

    #[test]
    fn transport_type_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&TransportType::Cycling).unwrap(), r#""cycling""#);
    }

    #[test]
    fn location_trims_and_rejects_blank() {
        assert_eq!(Location::new("  Ghent  ").unwrap().as_str(), "Ghent");
        assert!(Location::new("   ").is_err());
        assert!(Location::new("x".repeat(MAX_LOCATION_LENGTH + 1)).is_err());
    }

    fn details_with_distance(hundredths: i64) -> JourneyDetails {
        JourneyDetails {
            start_location: Location::new("A").unwrap(),
            start_time: Timestamp::parse_rfc3339("2024-01-10T09:00:00Z").unwrap(),
            arrival_location: Location::new("B").unwrap(),
            arrival_time: Timestamp::parse_rfc3339("2024-01-10T10:00:00Z").unwrap(),
            transport_type: TransportType::Car,
            distance_km: DistanceKm::from_hundredths(hundredths).unwrap(),
        }
    }

    #[test]
    fn details_cap_single_journey_distance() {
        assert!(details_with_distance(MAX_JOURNEY_HUNDREDTHS).validate().is_ok());
        assert!(details_with_distance(MAX_JOURNEY_HUNDREDTHS + 1).validate().is_err());
        assert!(details_with_distance(0).validate().is_err());
    }

    #[test]
    fn details_reject_arrival_before_start() {
        let details = JourneyDetails {
            start_location: Location::new("A").unwrap(),
            start_time: Timestamp::parse_rfc3339("2024-01-10T10:00:00Z").unwrap(),
            arrival_location: Location::new("B").unwrap(),
            arrival_time: Timestamp::parse_rfc3339("2024-01-10T09:00:00Z").unwrap(),
            transport_type: TransportType::Car,
            distance_km: DistanceKm::try_from_km(4.0).unwrap(),
        };
        assert!(details.validate().is_err());
    }
}
