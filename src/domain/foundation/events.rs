//! Event infrastructure shared by domain and integration events.
//!
//! - `EventId` - Unique identifier for events (deduplication)
//! - `EventMetadata` - Tracing and correlation context
//! - `EventEnvelope` - Transport wrapper used on the broker
//! - `DomainEvent` - Trait that all domain events implement
//! - `domain_event!` - Macro to simplify DomainEvent implementations

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::Timestamp;

// ============================================
// DomainEvent Trait
// ============================================

/// Identity and routing facts every domain event exposes.
///
/// Implemented through `domain_event!`.
pub trait DomainEvent: Send + Sync {
    /// Returns the event type string (e.g., "journey.created").
    fn event_type(&self) -> &'static str;

    /// Returns the ID of the aggregate that emitted this event.
    fn aggregate_id(&self) -> String;

    /// Returns the type of aggregate (e.g., "Journey").
    fn aggregate_type(&self) -> &'static str;

    /// Returns when the event occurred.
    fn occurred_at(&self) -> Timestamp;

    /// Returns the unique ID for this event instance.
    fn event_id(&self) -> EventId;
}

/// Macro to implement DomainEvent trait with minimal boilerplate.
///
/// # Example
///
/// ```ignore
/// domain_event!(
///     JourneyCreated,
///     event_type = "journey.created",
///     aggregate_id = journey_id,
///     aggregate_type = "Journey",
///     occurred_at = occurred_at,
///     event_id = event_id
/// );
/// ```
#[macro_export]
macro_rules! domain_event {
    (
        $event_name:ident,
        event_type = $event_type:expr,
        aggregate_id = $agg_id_field:ident,
        aggregate_type = $agg_type:expr,
        occurred_at = $occurred_field:ident,
        event_id = $event_id_field:ident
    ) => {
        impl $event_name {
            /// Stable type tag stored in the outbox.
            pub const EVENT_TYPE: &'static str = $event_type;
        }

        impl $crate::domain::foundation::DomainEvent for $event_name {
            fn event_type(&self) -> &'static str {
                $event_type
            }

            fn aggregate_id(&self) -> String {
                self.$agg_id_field.to_string()
            }

            fn aggregate_type(&self) -> &'static str {
                $agg_type
            }

            fn occurred_at(&self) -> $crate::domain::foundation::Timestamp {
                self.$occurred_field
            }

            fn event_id(&self) -> $crate::domain::foundation::EventId {
                self.$event_id_field
            }
        }
    };
}

// Re-export the macro
pub use crate::domain_event;

/// Unique identifier for events (used for deduplication).
///
/// The outbox row id and the broker message id are both this value, so a
/// consumer sees the same id no matter how many times a row is relayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random EventId using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an EventId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Metadata for tracing and correlation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// ID linking related events across a single user request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// ID of the event that directly caused this event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<String>,

    /// Relay attempt that produced this delivery (1-based).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_attempt: Option<u32>,
}

/// What travels on the broker: a camelCase payload plus routing fields.
///
/// `event_id` is the source domain event's id. Consumers key their
/// dedup ledgers on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique ID for this event instance.
    pub event_id: EventId,

    /// Event type for routing (e.g., "journey.created.v1").
    pub event_type: String,

    /// Schema version number (extracted from event_type).
    pub schema_version: u32,

    /// ID of the aggregate that emitted this event.
    pub aggregate_id: String,

    /// Type of aggregate (e.g., "Journey").
    pub aggregate_type: String,

    /// When the event occurred.
    pub occurred_at: Timestamp,

    /// Event-specific payload as JSON.
    pub payload: JsonValue,

    /// Tracing and correlation metadata.
    #[serde(default)]
    pub metadata: EventMetadata,
}

impl EventEnvelope {
    /// Creates a new EventEnvelope with required fields.
    ///
    /// Extracts the schema version from the event_type suffix ("journey.created.v2" → 2),
    /// defaulting to v1.
    pub fn new(
        event_id: EventId,
        event_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        aggregate_type: impl Into<String>,
        occurred_at: Timestamp,
        payload: JsonValue,
    ) -> Self {
        let event_type = event_type.into();
        let schema_version = Self::extract_version(&event_type);

        Self {
            event_id,
            event_type,
            schema_version,
            aggregate_id: aggregate_id.into(),
            aggregate_type: aggregate_type.into(),
            occurred_at,
            payload,
            metadata: EventMetadata::default(),
        }
    }

    /// Extracts version number from event_type string.
    pub(crate) fn extract_version(event_type: &str) -> u32 {
        event_type
            .rsplit_once(".v")
            .and_then(|(_, version_str)| version_str.parse::<u32>().ok())
            .unwrap_or(1)
    }

    /// Add correlation ID for request tracing.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.metadata.correlation_id = Some(id.into());
        self
    }

    /// Add causation ID (ID of event that caused this one).
    pub fn with_causation_id(mut self, id: impl Into<String>) -> Self {
        self.metadata.causation_id = Some(id.into());
        self
    }

    /// Record which relay attempt produced this delivery.
    pub fn with_delivery_attempt(mut self, attempt: u32) -> Self {
        self.metadata.delivery_attempt = Some(attempt);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(event_type: &str) -> EventEnvelope {
        EventEnvelope::new(
            EventId::new(),
            event_type,
            "agg-1",
            "Journey",
            Timestamp::now(),
            json!({"value": 42}),
        )
    }

    #[test]
    fn event_id_generates_unique_values() {
        assert_ne!(EventId::new(), EventId::new());
    }

    #[test]
    fn event_id_round_trips_through_string() {
        let id = EventId::new();
        let parsed: EventId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn event_metadata_serializes_without_none_fields() {
        let meta = EventMetadata {
            correlation_id: Some("req-123".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains("correlation_id"));
        assert!(!json.contains("causation_id"));
        assert!(!json.contains("delivery_attempt"));
    }

    #[test]
    fn envelope_extracts_version_from_event_type() {
        assert_eq!(envelope("journey.created.v2").schema_version, 2);
        assert_eq!(envelope("journey.created.v10").schema_version, 10);
        assert_eq!(envelope("legacy.event").schema_version, 1);
    }

    #[test]
    fn envelope_builder_chain() {
        let env = envelope("journey.created.v1")
            .with_correlation_id("req-1")
            .with_causation_id("evt-0")
            .with_delivery_attempt(3);

        assert_eq!(env.metadata.correlation_id.as_deref(), Some("req-1"));
        assert_eq!(env.metadata.causation_id.as_deref(), Some("evt-0"));
        assert_eq!(env.metadata.delivery_attempt, Some(3));
    }

    #[test]
    fn envelope_deserializes_without_metadata() {
        let env = envelope("journey.created.v1");
        let mut value = serde_json::to_value(&env).unwrap();
        value.as_object_mut().unwrap().remove("metadata");

        let restored: EventEnvelope = serde_json::from_value(value).unwrap();
        assert_eq!(restored.event_id, env.event_id);
        assert_eq!(restored.metadata, EventMetadata::default());
    }
}
