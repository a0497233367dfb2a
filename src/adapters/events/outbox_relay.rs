//! OutboxRelay - Background service that drains an outbox table to the broker.
//!
//! Second half of the transactional outbox:
//! 1. Repositories append domain events to the outbox in the mutation's transaction
//! 2. **OutboxRelay claims pending rows, maps them and publishes them** ← This module
//!
//! ## Per-row flow
//!
//! decode payload → map to integration event (may read current state) →
//! publish → mark processed. Any failure records an error on the row and
//! releases its lease; the row is retried on a later poll. A row is never
//! marked processed without a confirmed publish.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `poll_interval` | 1s | How often to claim pending rows |
//! | `batch_size` | 100 | Max rows per claim |
//! | `claim_lease` | 30s | How long a claim keeps other relays away |
//! | `schema_max_attempts` | 10 | Schema checks before giving up |
//! | `schema_retry_delay` | 2s | Wait between schema checks |
//! | `retention` | 72h | Age after which processed rows are deleted |
//! | `cleanup_interval` | 1h | How often retention runs |
//!
//! ## Graceful Shutdown
//!
//! The shutdown signal is checked between rows. Rows claimed but not yet
//! handled when it fires keep `processed_at = NULL` and become claimable
//! again once their lease expires.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::domain::foundation::{DomainError, DomainEvent, ErrorCode, Timestamp};
use crate::ports::{EventPublisher, IntegrationEventMapper, OutboxRecord, OutboxStore};

/// Configuration for one relay instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxRelayConfig {
    pub poll_interval: Duration,
    pub batch_size: u32,
    pub claim_lease: Duration,
    pub schema_max_attempts: u32,
    pub schema_retry_delay: Duration,
    pub retention: Duration,
    pub cleanup_interval: Duration,
}

impl Default for OutboxRelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            batch_size: 100,
            claim_lease: Duration::from_secs(30),
            schema_max_attempts: 10,
            schema_retry_delay: Duration::from_secs(2),
            retention: Duration::from_secs(72 * 3600),
            cleanup_interval: Duration::from_secs(3600),
        }
    }
}

impl OutboxRelayConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_batch_size(mut self, size: u32) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_claim_lease(mut self, lease: Duration) -> Self {
        self.claim_lease = lease;
        self
    }

    /// Bounded schema readiness retries.
    pub fn with_schema_retries(mut self, max_attempts: u32, delay: Duration) -> Self {
        self.schema_max_attempts = max_attempts;
        self.schema_retry_delay = delay;
        self
    }

    pub fn with_retention(mut self, retention: Duration, cleanup_interval: Duration) -> Self {
        self.retention = retention;
        self.cleanup_interval = cleanup_interval;
        self
    }
}

/// Errors that stop a relay.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Outbox schema unavailable after {attempts} attempts: {last_error}")]
    SchemaUnavailable {
        attempts: u32,
        last_error: DomainError,
    },

    #[error(transparent)]
    Store(#[from] DomainError),
}

/// What one poll cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    /// Rows claimed for this cycle.
    pub claimed: usize,
    /// Rows published and marked processed.
    pub published: usize,
    /// Rows whose mapping or publish failed; retried later.
    pub failed: usize,
    /// Rows whose payload could not be decoded; retried later.
    pub undecodable: usize,
    /// True if shutdown stopped the batch early.
    pub interrupted: bool,
}

impl RelayReport {
    pub fn is_empty(&self) -> bool {
        self.claimed == 0
    }
}

/// Relays one outbox table to an `EventPublisher`.
///
/// Several relays may run against the same table; claims keep them from
/// working the same row at once.
pub struct OutboxRelay {
    name: String,
    store: Arc<dyn OutboxStore>,
    mapper: Arc<dyn IntegrationEventMapper>,
    publisher: Arc<dyn EventPublisher>,
    config: OutboxRelayConfig,
}

impl OutboxRelay {
    /// Create a relay with default configuration.
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn OutboxStore>,
        mapper: Arc<dyn IntegrationEventMapper>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self::with_config(name, store, mapper, publisher, OutboxRelayConfig::default())
    }

    pub fn with_config(
        name: impl Into<String>,
        store: Arc<dyn OutboxStore>,
        mapper: Arc<dyn IntegrationEventMapper>,
        publisher: Arc<dyn EventPublisher>,
        config: OutboxRelayConfig,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            mapper,
            publisher,
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run until the shutdown signal is set or its sender is dropped.
    ///
    /// # Errors
    ///
    /// Returns `SchemaUnavailable` if the outbox never became reachable.
    /// Poll and cleanup failures are logged and the loop keeps going.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), RelayError> {
        self.wait_for_schema().await?;
        info!(relay = %self.name, "Outbox relay started");

        let signal = shutdown.clone();
        let mut poll = time::interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cleanup = time::interval(self.config.cleanup_interval);
        cleanup.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(relay = %self.name, "Outbox relay stopped");
                        return Ok(());
                    }
                }

                _ = poll.tick() => {
                    match self.process_batch(Some(&signal)).await {
                        Ok(report) if !report.is_empty() => {
                            info!(
                                relay = %self.name,
                                claimed = report.claimed,
                                published = report.published,
                                failed = report.failed,
                                undecodable = report.undecodable,
                                "Outbox batch relayed"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => warn!(relay = %self.name, error = %e, "Outbox poll failed"),
                    }
                }

                _ = cleanup.tick() => {
                    if let Err(e) = self.cleanup().await {
                        warn!(relay = %self.name, error = %e, "Outbox cleanup failed");
                    }
                }
            }
        }
    }

    /// Run exactly one poll cycle without a shutdown signal.
    pub async fn poll_once(&self) -> Result<RelayReport, DomainError> {
        self.process_batch(None).await
    }

    /// Claim and relay one batch, stopping early if `shutdown` is set.
    pub async fn process_batch(
        &self,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> Result<RelayReport, DomainError> {
        let records = self
            .store
            .claim_unprocessed(self.config.batch_size, self.config.claim_lease)
            .await?;

        let mut report = RelayReport {
            claimed: records.len(),
            ..RelayReport::default()
        };

        for record in records {
            if shutdown.is_some_and(|s| *s.borrow()) {
                report.interrupted = true;
                break;
            }
            self.relay_row(record, &mut report).await?;
        }

        Ok(report)
    }

    /// Delete processed rows older than the retention window.
    pub async fn cleanup(&self) -> Result<u64, DomainError> {
        let retention = i64::try_from(self.config.retention.as_secs()).unwrap_or(i64::MAX);
        let cutoff = Timestamp::now().plus_secs(retention.saturating_neg());
        let removed = self.store.cleanup_processed(cutoff).await?;
        if removed > 0 {
            info!(relay = %self.name, removed, "Outbox retention cleanup");
        }
        Ok(removed)
    }

    async fn wait_for_schema(&self) -> Result<(), RelayError> {
        let max_attempts = self.config.schema_max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.store.schema_ready().await {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= max_attempts => {
                    error!(
                        relay = %self.name,
                        attempts = attempt,
                        error = %e,
                        "Outbox schema unavailable, relay giving up"
                    );
                    return Err(RelayError::SchemaUnavailable {
                        attempts: attempt,
                        last_error: e,
                    });
                }
                Err(e) => {
                    warn!(
                        relay = %self.name,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Outbox schema not ready, retrying"
                    );
                    time::sleep(self.config.schema_retry_delay).await;
                }
            }
        }
    }

    async fn relay_row(
        &self,
        record: OutboxRecord,
        report: &mut RelayReport,
    ) -> Result<(), DomainError> {
        let event = match record.decode() {
            Ok(event) => event,
            Err(e) => {
                error!(
                    relay = %self.name,
                    event_id = %record.id,
                    event_type = %record.event_type,
                    error = %e,
                    "Undecodable outbox row"
                );
                self.store.record_error(&record.id, &e.to_string()).await?;
                report.undecodable += 1;
                return Ok(());
            }
        };

        let envelope = match self.mapper.map(&event).await.and_then(|integration| {
            integration.to_envelope(record.id).map_err(|e| {
                DomainError::new(
                    ErrorCode::InternalError,
                    format!("Failed to serialize {}: {}", integration.event_type(), e),
                )
            })
        }) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(
                    relay = %self.name,
                    event_id = %record.id,
                    event_type = %event.event_type(),
                    error = %e,
                    "Failed to map outbox event"
                );
                self.store.record_error(&record.id, &e.to_string()).await?;
                report.failed += 1;
                return Ok(());
            }
        };

        let mut envelope = envelope
            .with_correlation_id(event.aggregate_id())
            .with_delivery_attempt(record.attempts);
        if let Some(cause) = event.causation_id() {
            envelope = envelope.with_causation_id(cause.to_string());
        }

        match self.publisher.publish(envelope).await {
            Ok(()) => {
                self.store.mark_processed(&record.id, Timestamp::now()).await?;
                debug!(
                    relay = %self.name,
                    event_id = %record.id,
                    attempt = record.attempts,
                    "Outbox row published"
                );
                report.published += 1;
            }
            Err(e) => {
                warn!(
                    relay = %self.name,
                    event_id = %record.id,
                    attempt = record.attempts,
                    error = %e,
                    "Failed to publish outbox row"
                );
                self.store.record_error(&record.id, &e.to_string()).await?;
                report.failed += 1;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryOutbox;
    use crate::adapters::InMemoryEventBus;
    use crate::domain::foundation::{DistanceKm, EventId, JourneyId, UserId};
    use crate::domain::integration::{event_types, IntegrationEvent};
    use crate::domain::journey::{Journey, JourneyDetails, Location, TransportType};
    use crate::domain::outbox::OutboxEvent;
    use crate::domain::reward::{DailyGoal, DailyRewardProgress};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Maps without reading relationships; can be told to fail.
    #[derive(Default)]
    struct DirectMapper {
        failures_remaining: AtomicU32,
    }

    #[async_trait::async_trait]
    impl IntegrationEventMapper for DirectMapper {
        async fn map(&self, event: &OutboxEvent) -> Result<IntegrationEvent, DomainError> {
            let failing = self
                .failures_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(DomainError::database("favorites lookup", "connection reset"));
            }
            match event {
                OutboxEvent::JourneyCreated(e) => Ok(IntegrationEvent::JourneyCreated(e.into())),
                OutboxEvent::DailyGoalAchieved(e) => {
                    Ok(IntegrationEvent::DailyGoalAchieved(e.into()))
                }
                other => Err(DomainError::new(
                    ErrorCode::InternalError,
                    format!("unexpected {}", other.event_type()),
                )),
            }
        }
    }

    fn created_record(minute: u32) -> OutboxRecord {
        let start = Timestamp::parse_rfc3339(&format!("2024-01-10T07:{:02}:00Z", minute)).unwrap();
        let (_, events) = Journey::create(
            JourneyId::new(),
            UserId::new("owner").unwrap(),
            JourneyDetails {
                start_location: Location::new("Depot").unwrap(),
                start_time: start,
                arrival_location: Location::new("Harbour").unwrap(),
                arrival_time: start.plus_secs(1800),
                transport_type: TransportType::Bus,
                distance_km: DistanceKm::try_from_km(15.0).unwrap(),
            },
            start,
        )
        .unwrap();
        let events: Vec<OutboxEvent> = events.into_iter().map(OutboxEvent::from).collect();
        OutboxRecord::from_event(&events[0]).unwrap()
    }

    fn fast_config() -> OutboxRelayConfig {
        OutboxRelayConfig::default()
            .with_poll_interval(Duration::from_millis(10))
            .with_schema_retries(3, Duration::from_millis(1))
    }

    struct Fixture {
        outbox: Arc<InMemoryOutbox>,
        bus: Arc<InMemoryEventBus>,
        mapper: Arc<DirectMapper>,
        relay: OutboxRelay,
    }

    fn fixture(config: OutboxRelayConfig) -> Fixture {
        let outbox = Arc::new(InMemoryOutbox::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let mapper = Arc::new(DirectMapper::default());
        let relay = OutboxRelay::with_config(
            "journey",
            outbox.clone(),
            mapper.clone(),
            bus.clone(),
            config,
        );
        Fixture {
            outbox,
            bus,
            mapper,
            relay,
        }
    }

    #[tokio::test]
    async fn poll_once_publishes_and_marks_processed() {
        let f = fixture(fast_config());
        let row = created_record(0);
        f.outbox.append(vec![row.clone()]).await;

        let report = f.relay.poll_once().await.unwrap();

        assert_eq!(report.published, 1);
        assert_eq!(f.bus.events_of_type(event_types::JOURNEY_CREATED).len(), 1);
        let published = &f.bus.published_events()[0];
        assert_eq!(published.event_id, row.id);
        assert_eq!(published.metadata.delivery_attempt, Some(1));
        assert!(f.outbox.pending().await.is_empty());
    }

    #[tokio::test]
    async fn failed_publish_is_retried_until_confirmed() {
        let f = fixture(fast_config());
        let row = created_record(0);
        f.outbox.append(vec![row.clone()]).await;
        f.bus.fail_next_publishes(1);

        let first = f.relay.poll_once().await.unwrap();
        assert_eq!(first.failed, 1);
        let stored = f.outbox.get(&row.id).await.unwrap();
        assert!(stored.is_pending());
        assert!(stored.error.is_some());
        assert_eq!(f.bus.event_count(), 0);

        let second = f.relay.poll_once().await.unwrap();
        assert_eq!(second.published, 1);
        assert!(!f.outbox.get(&row.id).await.unwrap().is_pending());
        assert_eq!(f.bus.published_events()[0].metadata.delivery_attempt, Some(2));
    }

    #[tokio::test]
    async fn undecodable_row_stays_pending_with_error() {
        let f = fixture(fast_config());
        let mut row = created_record(0);
        row.event_type = "journey.teleported".to_string();
        row.payload = json!({"nonsense": true});
        f.outbox.append(vec![row.clone()]).await;

        let report = f.relay.poll_once().await.unwrap();

        assert_eq!(report.undecodable, 1);
        assert_eq!(f.bus.event_count(), 0);
        let stored = f.outbox.get(&row.id).await.unwrap();
        assert!(stored.is_pending());
        assert!(stored.error.unwrap().contains("journey.teleported"));
    }

    #[tokio::test]
    async fn mapping_failure_is_retried() {
        let f = fixture(fast_config());
        f.outbox.append(vec![created_record(0)]).await;
        f.mapper.failures_remaining.store(1, Ordering::SeqCst);

        assert_eq!(f.relay.poll_once().await.unwrap().failed, 1);
        assert_eq!(f.relay.poll_once().await.unwrap().published, 1);
    }

    #[tokio::test]
    async fn respects_batch_size_in_occurred_order() {
        let f = fixture(fast_config().with_batch_size(2));
        let rows: Vec<_> = (0..5).rev().map(created_record).collect();
        f.outbox.append(rows).await;

        assert_eq!(f.relay.poll_once().await.unwrap().published, 2);
        assert_eq!(f.relay.poll_once().await.unwrap().published, 2);
        assert_eq!(f.relay.poll_once().await.unwrap().published, 1);

        let published = f.bus.published_events();
        let times: Vec<_> = published.iter().map(|e| e.occurred_at).collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
    }

    #[tokio::test]
    async fn claimed_rows_are_skipped_by_a_second_relay() {
        let f = fixture(fast_config());
        f.outbox.append(vec![created_record(0)]).await;

        let held = f
            .outbox
            .claim_unprocessed(10, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(held.len(), 1);

        let report = f.relay.poll_once().await.unwrap();
        assert!(report.is_empty());
        assert_eq!(f.bus.event_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_stops_between_rows_without_marking() {
        let f = fixture(fast_config());
        f.outbox.append(vec![created_record(0), created_record(1)]).await;
        let (_tx, rx) = watch::channel(true);

        let report = f.relay.process_batch(Some(&rx)).await.unwrap();

        assert!(report.interrupted);
        assert_eq!(report.claimed, 2);
        assert_eq!(report.published, 0);
        assert_eq!(f.outbox.pending().await.len(), 2);
    }

    #[tokio::test]
    async fn gives_up_after_bounded_schema_checks() {
        let f = fixture(fast_config());
        f.outbox.fail_schema_checks(10);
        let (_tx, rx) = watch::channel(false);

        let err = f.relay.run(rx).await.unwrap_err();

        assert!(matches!(err, RelayError::SchemaUnavailable { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn run_relays_after_schema_recovers_and_stops_on_signal() {
        let f = fixture(fast_config());
        f.outbox.fail_schema_checks(2);
        f.outbox.append(vec![created_record(0)]).await;
        let Fixture {
            outbox, bus, relay, ..
        } = f;
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move { relay.run(rx).await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();

        assert!(handle.await.unwrap().is_ok());
        assert_eq!(bus.event_count(), 1);
        assert!(outbox.pending().await.is_empty());
    }

    #[tokio::test]
    async fn derived_event_carries_its_cause() {
        let f = fixture(fast_config());
        let source = EventId::new();
        let (_, achieved) = DailyRewardProgress::start(
            UserId::new("rider").unwrap(),
            chrono::NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            Timestamp::now(),
        )
        .add_contribution(
            DistanceKm::try_from_km(25.0).unwrap(),
            &DailyGoal::default(),
            source,
            Timestamp::now(),
        );
        let achieved = achieved.unwrap();
        let record = OutboxRecord::from_event(&OutboxEvent::from(achieved)).unwrap();
        f.outbox.append(vec![record]).await;

        f.relay.poll_once().await.unwrap();

        let published = f.bus.events_of_type(event_types::DAILY_GOAL_ACHIEVED);
        assert_eq!(published.len(), 1);
        assert_eq!(
            published[0].metadata.causation_id,
            Some(source.to_string())
        );
    }

    #[tokio::test]
    async fn cleanup_keeps_recent_rows() {
        let f = fixture(fast_config());
        f.outbox.append(vec![created_record(0)]).await;
        f.relay.poll_once().await.unwrap();

        assert_eq!(f.relay.cleanup().await.unwrap(), 0);
        assert_eq!(f.outbox.rows().await.len(), 1);
    }

    #[tokio::test]
    async fn cleanup_with_unbounded_retention_keeps_everything() {
        let f = fixture(fast_config().with_retention(Duration::MAX, Duration::from_secs(60)));
        f.outbox.append(vec![created_record(0)]).await;
        f.relay.poll_once().await.unwrap();

        assert_eq!(f.relay.cleanup().await.unwrap(), 0);
        assert_eq!(f.outbox.rows().await.len(), 1);
    }

    #[test]
    fn config_defaults_are_reasonable() {
        let config = OutboxRelayConfig::default();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.retention, Duration::from_secs(72 * 3600));
    }
}
