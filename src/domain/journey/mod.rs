//! Journey module - the source-of-truth aggregate for recorded trips.
//!
//! # Module Structure
//!
//! - `aggregate` - Journey entity and its pure mutations
//! - `events` - Domain events emitted by those mutations
//! - `values` - Location, transport type and editable details
//! - `relationships` - Favorites and shares

mod aggregate;
mod events;
mod relationships;
mod values;

pub use aggregate::Journey;
pub use events::{JourneyCreated, JourneyDeleted, JourneyEvent, JourneyUpdated};
pub use relationships::{Favorite, Share};
pub use values::{
    JourneyDetails, Location, TransportType, MAX_JOURNEY_HUNDREDTHS, MAX_LOCATION_LENGTH,
};
