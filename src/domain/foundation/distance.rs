//! Fixed-point distance value objects.
//!
//! Distances are kept as whole hundredths of a kilometre so that totals and
//! threshold comparisons are exact (`19.99 + 0.02 == 20.01`). On the wire they
//! are plain JSON numbers with at most two decimals.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Add;

use super::ValidationError;

const HUNDREDTHS_PER_KM: i64 = 100;

/// Upper bound for any distance, single journey or running total.
///
/// Well inside the range where `hundredths / 100` survives an f64 round trip,
/// so every value `Add` can produce also decodes again.
const MAX_HUNDREDTHS: i64 = 900_000_000_000 * HUNDREDTHS_PER_KM;

/// A non-negative distance in kilometres with two decimal places.
///
/// Used both for one journey and for accumulated totals. Per-journey limits
/// are checked by `JourneyDetails::validate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DistanceKm(i64);

impl DistanceKm {
    /// Zero kilometres.
    pub const ZERO: Self = Self(0);

    /// Largest representable distance. Additions saturate here.
    pub const MAX: Self = Self(MAX_HUNDREDTHS);

    /// Creates a distance from whole hundredths of a kilometre.
    pub fn from_hundredths(hundredths: i64) -> Result<Self, ValidationError> {
        if !(0..=MAX_HUNDREDTHS).contains(&hundredths) {
            return Err(ValidationError::out_of_range(
                "distance_km",
                0,
                MAX_HUNDREDTHS,
                hundredths,
            ));
        }
        Ok(Self(hundredths))
    }

    /// Creates a distance from a kilometre value, rounding to two decimals.
    pub fn try_from_km(km: f64) -> Result<Self, ValidationError> {
        if !km.is_finite() {
            return Err(ValidationError::invalid_format(
                "distance_km",
                "must be a finite number",
            ));
        }
        let hundredths = (km * HUNDREDTHS_PER_KM as f64).round();
        if hundredths < 0.0 || hundredths > MAX_HUNDREDTHS as f64 {
            return Err(ValidationError::out_of_range(
                "distance_km",
                0,
                MAX_HUNDREDTHS,
                hundredths as i64,
            ));
        }
        Ok(Self(hundredths as i64))
    }

    /// Returns the distance in hundredths of a kilometre.
    pub fn hundredths(&self) -> i64 {
        self.0
    }

    /// Returns the distance as floating-point kilometres (for display and wire).
    pub fn as_km(&self) -> f64 {
        self.0 as f64 / HUNDREDTHS_PER_KM as f64
    }

    /// True when the distance is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Applies a signed delta, clamping at zero.
    ///
    /// Returns the new distance and whether clamping was necessary.
    pub fn apply(self, delta: DistanceDelta) -> (Self, bool) {
        let raw = self.0.saturating_add(delta.0);
        if raw < 0 {
            (Self::ZERO, true)
        } else {
            (Self(raw.min(MAX_HUNDREDTHS)), false)
        }
    }
}

impl Add for DistanceKm {
    type Output = DistanceKm;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0).min(MAX_HUNDREDTHS))
    }
}

impl fmt::Display for DistanceKm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:02}",
            self.0 / HUNDREDTHS_PER_KM,
            self.0 % HUNDREDTHS_PER_KM
        )
    }
}

impl Serialize for DistanceKm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_km())
    }
}

impl<'de> Deserialize<'de> for DistanceKm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let km = f64::deserialize(deserializer)?;
        Self::try_from_km(km).map_err(serde::de::Error::custom)
    }
}

/// A signed change to a distance total, in hundredths of a kilometre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DistanceDelta(i64);

impl DistanceDelta {
    /// Delta that adds `distance`.
    pub fn add(distance: DistanceKm) -> Self {
        Self(distance.0)
    }

    /// Delta that removes `distance`.
    pub fn remove(distance: DistanceKm) -> Self {
        Self(-distance.0)
    }

    /// Delta that turns `old` into `new`.
    pub fn between(old: DistanceKm, new: DistanceKm) -> Self {
        Self(new.0 - old.0)
    }

    /// Creates a delta from raw signed hundredths.
    pub fn from_hundredths(hundredths: i64) -> Self {
        Self(hundredths)
    }

    /// Returns the delta in hundredths of a kilometre.
    pub fn hundredths(&self) -> i64 {
        self.0
    }

    /// True when applying this delta changes nothing.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for DistanceDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "+" };
        let abs = self.0.abs();
        write!(
            f,
            "{}{}.{:02}",
            sign,
            abs / HUNDREDTHS_PER_KM,
            abs % HUNDREDTHS_PER_KM
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn km(value: f64) -> DistanceKm {
        DistanceKm::try_from_km(value).unwrap()
    }

    #[test]
    fn try_from_km_rounds_to_hundredths() {
        assert_eq!(km(19.99).hundredths(), 1999);
        assert_eq!(km(0.02).hundredths(), 2);
        assert_eq!(km(15.004).hundredths(), 1500);
    }

    #[test]
    fn addition_is_exact() {
        assert_eq!(km(19.99) + km(0.02), km(20.01));
    }

    #[test]
    fn negative_and_non_finite_values_are_rejected() {
        assert!(DistanceKm::try_from_km(-0.5).is_err());
        assert!(DistanceKm::try_from_km(f64::NAN).is_err());
        assert!(DistanceKm::from_hundredths(-1).is_err());
    }

    #[test]
    fn apply_clamps_at_zero() {
        let (total, clamped) = km(5.0).apply(DistanceDelta::remove(km(7.5)));
        assert_eq!(total, DistanceKm::ZERO);
        assert!(clamped);

        let (total, clamped) = km(5.0).apply(DistanceDelta::between(km(2.0), km(3.5)));
        assert_eq!(total, km(6.5));
        assert!(!clamped);
    }

    #[test]
    fn large_totals_round_trip_through_json() {
        let total = km(600_000.0) + km(600_000.0);
        assert_eq!(total.hundredths(), 120_000_000);
        let parsed: DistanceKm = serde_json::from_str(&serde_json::to_string(&total).unwrap()).unwrap();
        assert_eq!(parsed, total);
        assert_eq!(DistanceKm::from_hundredths(total.hundredths()).unwrap(), total);
    }

    #[test]
    fn saturated_sum_still_decodes() {
        let total = DistanceKm::MAX + km(1.0);
        assert_eq!(total, DistanceKm::MAX);
        let parsed: DistanceKm = serde_json::from_str(&serde_json::to_string(&total).unwrap()).unwrap();
        assert_eq!(parsed, DistanceKm::MAX);

        let (applied, _) = DistanceKm::MAX.apply(DistanceDelta::add(km(5.0)));
        assert_eq!(applied, DistanceKm::MAX);
    }

    #[test]
    fn display_uses_two_decimals() {
        assert_eq!(km(20.0).to_string(), "20.00");
        assert_eq!(km(0.05).to_string(), "0.05");
        assert_eq!(DistanceDelta::between(km(3.0), km(1.25)).to_string(), "-1.75");
    }

    #[test]
    fn serializes_as_json_number() {
        let json = serde_json::to_string(&km(15.5)).unwrap();
        assert_eq!(json, "15.5");

        let parsed: DistanceKm = serde_json::from_str("19.99").unwrap();
        assert_eq!(parsed.hundredths(), 1999);
        assert!(serde_json::from_str::<DistanceKm>("-3").is_err());
    }
}
