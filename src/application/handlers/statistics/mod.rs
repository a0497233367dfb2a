//! Statistics projections.

mod monthly_distance_projector;

pub use monthly_distance_projector::MonthlyDistanceProjector;
