//! Redis Streams event bus.
//!
//! Each event type gets its own stream, `{prefix}{event_type}`. Publishing is
//! `XADD` with the serialized envelope in a single `envelope` field.
//! Consuming uses a consumer group: `XREADGROUP`, dispatch to every handler
//! registered for the type, then `XACK` once all of them succeeded. A failed
//! handler leaves the entry in the group's pending list, and the consumer
//! replays its pending entries periodically until they are acknowledged.
//! Entries left pending by a consumer that went away are taken over with
//! `XAUTOCLAIM` once they have been idle for `claim_min_idle`.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamId, StreamMaxlen, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, FromRedisValue, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::{EventHandler, EventPublisher, EventSubscriber};

const ENVELOPE_FIELD: &str = "envelope";

/// `XAUTOCLAIM` cursor for a full sweep of a pending list.
const CLAIM_SWEEP_START: &str = "0-0";

/// Stream and consumer-group settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisStreamConfig {
    /// Prepended to every stream key.
    pub stream_prefix: String,
    pub consumer_group: String,
    /// Unique per process within the group.
    pub consumer_name: String,
    /// Max entries per `XREADGROUP`.
    pub read_count: usize,
    /// How long `XREADGROUP` blocks; also bounds shutdown latency.
    pub block: Duration,
    /// How often unacknowledged entries are replayed after a failure, and how
    /// often stale entries of other consumers are swept.
    pub pending_retry_interval: Duration,
    /// Approximate cap on stream length, if any.
    pub max_len: Option<usize>,
    /// Idle time after which another consumer's pending entries are claimed.
    /// `None` disables claiming.
    pub claim_min_idle: Option<Duration>,
}

impl Default for RedisStreamConfig {
    fn default() -> Self {
        Self {
            stream_prefix: "journey-sync:".to_string(),
            consumer_group: "journey-sync".to_string(),
            consumer_name: "consumer-1".to_string(),
            read_count: 50,
            block: Duration::from_secs(2),
            pending_retry_interval: Duration::from_secs(5),
            max_len: Some(100_000),
            claim_min_idle: Some(Duration::from_secs(60)),
        }
    }
}

impl RedisStreamConfig {
    /// Stream key for an event type.
    pub fn stream_key(&self, event_type: &str) -> String {
        format!("{}{}", self.stream_prefix, event_type)
    }

    /// Event type for a stream key, if it carries this prefix.
    pub fn event_type_of<'a>(&self, stream_key: &'a str) -> Option<&'a str> {
        stream_key.strip_prefix(self.stream_prefix.as_str())
    }
}

/// What one read did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ConsumeReport {
    read: usize,
    acked: usize,
    failed: usize,
}

impl ConsumeReport {
    fn absorb(&mut self, other: ConsumeReport) {
        self.read += other.read;
        self.acked += other.acked;
        self.failed += other.failed;
    }
}

/// Parsed `XAUTOCLAIM` reply.
#[derive(Debug, Clone, Default)]
struct AutoClaimed {
    /// Where the next sweep step starts; `0-0` once the list is exhausted.
    next_start: String,
    entries: Vec<StreamId>,
}

impl AutoClaimed {
    /// Accepts both the two-element (6.2) and three-element (7.x) replies.
    /// Entries deleted from the stream come back without fields and are skipped.
    fn from_reply(reply: &Value) -> Result<Self, DomainError> {
        let Value::Bulk(items) = reply else {
            return Err(malformed_reply("not an array"));
        };
        let (Some(cursor), Some(Value::Bulk(rows))) = (items.first(), items.get(1)) else {
            return Err(malformed_reply("missing cursor or entries"));
        };

        let next_start =
            String::from_redis_value(cursor).map_err(|e| broker_error("XAUTOCLAIM cursor", e))?;
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            if matches!(row, Value::Nil) {
                continue;
            }
            let (id, fields): (String, Option<HashMap<String, Value>>) =
                FromRedisValue::from_redis_value(row)
                    .map_err(|e| broker_error("XAUTOCLAIM entry", e))?;
            if let Some(map) = fields {
                entries.push(StreamId { id, map });
            }
        }
        Ok(Self {
            next_start,
            entries,
        })
    }

    /// True once the sweep has wrapped around the pending list.
    fn sweep_finished(&self) -> bool {
        self.next_start == CLAIM_SWEEP_START
    }
}

/// True when the claim sweep should run on this iteration.
fn claim_due(last_claim: Option<Instant>, interval: Duration, now: Instant) -> bool {
    last_claim.map_or(true, |at| now.saturating_duration_since(at) >= interval)
}

type HandlerMap = HashMap<String, Vec<Arc<dyn EventHandler>>>;

/// Event bus backed by Redis Streams.
pub struct RedisStreamBus {
    client: redis::Client,
    conn: MultiplexedConnection,
    config: RedisStreamConfig,
    handlers: RwLock<HandlerMap>,
}

impl RedisStreamBus {
    /// Connect the publishing side. Consumers open their own connection in
    /// [`run_consumer`](Self::run_consumer) because `XREADGROUP BLOCK` holds it.
    pub async fn connect(
        client: redis::Client,
        config: RedisStreamConfig,
    ) -> Result<Self, DomainError> {
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| broker_error("connect", e))?;
        Ok(Self {
            client,
            conn,
            config,
            handlers: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &RedisStreamConfig {
        &self.config
    }

    /// Consume subscribed streams until shutdown.
    ///
    /// Read errors are logged and retried after `pending_retry_interval`.
    ///
    /// # Errors
    ///
    /// Only if the dedicated connection or the consumer groups cannot be set up.
    pub async fn run_consumer(&self, shutdown: watch::Receiver<bool>) -> Result<(), DomainError> {
        let streams = self.subscribed_streams();
        if streams.is_empty() {
            warn!(group = %self.config.consumer_group, "No subscriptions, consumer not started");
            return Ok(());
        }

        let mut conn = self
            .client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| broker_error("connect consumer", e))?;
        for stream in &streams {
            self.ensure_group(&mut conn, stream).await?;
        }
        info!(
            group = %self.config.consumer_group,
            consumer = %self.config.consumer_name,
            streams = streams.len(),
            "Stream consumer started"
        );

        // Entries delivered to this consumer before a restart come first.
        let mut replay_pending = true;
        let mut last_replay: Option<Instant> = None;
        let mut last_claim: Option<Instant> = None;
        let mut claim_cursors: HashMap<String, String> = HashMap::new();

        loop {
            if *shutdown.borrow() {
                info!(consumer = %self.config.consumer_name, "Stream consumer stopped");
                return Ok(());
            }

            if let Some(min_idle) = self.config.claim_min_idle {
                if claim_due(last_claim, self.config.pending_retry_interval, Instant::now()) {
                    last_claim = Some(Instant::now());
                    match self.claim_stale(&mut conn, &streams, min_idle, &mut claim_cursors).await {
                        Ok(report) => {
                            if report.failed > 0 {
                                replay_pending = true;
                            }
                            if report.read > 0 {
                                info!(
                                    consumer = %self.config.consumer_name,
                                    claimed = report.read,
                                    acked = report.acked,
                                    failed = report.failed,
                                    "Claimed stale pending entries"
                                );
                            }
                        }
                        Err(e) => {
                            warn!(consumer = %self.config.consumer_name, error = %e, "Pending claim failed");
                        }
                    }
                }
            }

            let replay_now = replay_pending
                && last_replay.map_or(true, |at| at.elapsed() >= self.config.pending_retry_interval);
            let start_id = if replay_now { "0" } else { ">" };

            match self.consume(&mut conn, &streams, start_id).await {
                Ok(report) => {
                    if replay_now {
                        replay_pending = report.failed > 0;
                        last_replay = Some(Instant::now());
                    } else if report.failed > 0 {
                        replay_pending = true;
                    }
                    if report.read > 0 {
                        debug!(
                            consumer = %self.config.consumer_name,
                            read = report.read,
                            acked = report.acked,
                            failed = report.failed,
                            replay = replay_now,
                            "Stream batch consumed"
                        );
                    }
                }
                Err(e) => {
                    warn!(consumer = %self.config.consumer_name, error = %e, "Stream read failed");
                    tokio::time::sleep(self.config.pending_retry_interval).await;
                }
            }
        }
    }

    fn subscribed_streams(&self) -> Vec<String> {
        let mut streams: Vec<String> = self
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .map(|event_type| self.config.stream_key(event_type))
            .collect();
        streams.sort();
        streams
    }

    fn handlers_for(&self, event_type: &str) -> Vec<Arc<dyn EventHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(event_type)
            .cloned()
            .unwrap_or_default()
    }

    async fn ensure_group(
        &self,
        conn: &mut MultiplexedConnection,
        stream: &str,
    ) -> Result<(), DomainError> {
        let created: Result<(), redis::RedisError> = conn
            .xgroup_create_mkstream(stream, &self.config.consumer_group, "0")
            .await;
        match created {
            Ok(()) => Ok(()),
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(broker_error("create consumer group", e)),
        }
    }

    async fn consume(
        &self,
        conn: &mut MultiplexedConnection,
        streams: &[String],
        start_id: &str,
    ) -> Result<ConsumeReport, DomainError> {
        let mut options = StreamReadOptions::default()
            .group(&self.config.consumer_group, &self.config.consumer_name)
            .count(self.config.read_count);
        if start_id == ">" {
            options = options.block(self.config.block.as_millis() as usize);
        }
        let ids = vec![start_id; streams.len()];

        let reply: Option<StreamReadReply> = conn
            .xread_options(streams, &ids, &options)
            .await
            .map_err(|e: redis::RedisError| broker_error("XREADGROUP", e))?;

        let mut report = ConsumeReport::default();
        let Some(reply) = reply else {
            return Ok(report);
        };

        for stream in reply.keys {
            report.absorb(self.settle(conn, &stream.key, &stream.ids).await?);
        }
        Ok(report)
    }

    /// One `XAUTOCLAIM` step per stream, moving entries idle for at least
    /// `min_idle` to this consumer and dispatching them.
    ///
    /// Each stream keeps its own cursor so a long pending list is swept a
    /// batch at a time across iterations.
    async fn claim_stale(
        &self,
        conn: &mut MultiplexedConnection,
        streams: &[String],
        min_idle: Duration,
        cursors: &mut HashMap<String, String>,
    ) -> Result<ConsumeReport, DomainError> {
        let min_idle_ms = u64::try_from(min_idle.as_millis()).unwrap_or(u64::MAX);
        let mut report = ConsumeReport::default();

        for stream in streams {
            let start = cursors
                .get(stream)
                .map(String::as_str)
                .unwrap_or(CLAIM_SWEEP_START);
            let reply: Value = redis::cmd("XAUTOCLAIM")
                .arg(stream)
                .arg(&self.config.consumer_group)
                .arg(&self.config.consumer_name)
                .arg(min_idle_ms)
                .arg(start)
                .arg("COUNT")
                .arg(self.config.read_count)
                .query_async(conn)
                .await
                .map_err(|e| broker_error("XAUTOCLAIM", e))?;

            let claimed = AutoClaimed::from_reply(&reply)?;
            if claimed.sweep_finished() {
                cursors.remove(stream);
            } else {
                cursors.insert(stream.clone(), claimed.next_start.clone());
            }
            report.absorb(self.settle(conn, stream, &claimed.entries).await?);
        }
        Ok(report)
    }

    /// Dispatches entries of one stream and acks the ones that are done.
    async fn settle(
        &self,
        conn: &mut MultiplexedConnection,
        stream_key: &str,
        entries: &[StreamId],
    ) -> Result<ConsumeReport, DomainError> {
        let mut report = ConsumeReport::default();
        for entry in entries {
            report.read += 1;
            if self.dispatch(stream_key, entry).await {
                let _: i64 = conn
                    .xack(stream_key, &self.config.consumer_group, &[&entry.id])
                    .await
                    .map_err(|e: redis::RedisError| broker_error("XACK", e))?;
                report.acked += 1;
            } else {
                report.failed += 1;
            }
        }
        Ok(report)
    }

    /// Runs every handler for the entry. True if the entry should be acked.
    ///
    /// Only transient handler failures keep the entry pending.
    async fn dispatch(&self, stream_key: &str, entry: &StreamId) -> bool {
        let envelope = match decode_entry(entry) {
            Ok(envelope) => envelope,
            Err(e) => {
                // Retrying cannot fix a malformed entry.
                error!(stream = %stream_key, entry_id = %entry.id, error = %e, "Dropping undecodable stream entry");
                return true;
            }
        };

        let event_type = self
            .config
            .event_type_of(stream_key)
            .unwrap_or(envelope.event_type.as_str())
            .to_string();

        let mut all_ok = true;
        for handler in self.handlers_for(&event_type) {
            match handler.handle(envelope.clone()).await {
                Ok(()) => {}
                Err(e) if e.is_transient() => {
                    warn!(
                        event_id = %envelope.event_id,
                        handler = handler.name(),
                        error = %e,
                        "Handler failed, entry left pending"
                    );
                    all_ok = false;
                }
                Err(e) => {
                    error!(
                        event_id = %envelope.event_id,
                        handler = handler.name(),
                        error = %e,
                        "Handler rejected event, not retrying"
                    );
                }
            }
        }
        all_ok
    }
}

#[async_trait]
impl EventPublisher for RedisStreamBus {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        let key = self.config.stream_key(&event.event_type);
        let body = serde_json::to_string(&event).map_err(|e| {
            DomainError::new(
                ErrorCode::InternalError,
                format!("Failed to serialize envelope: {}", e),
            )
        })?;
        let fields = [(ENVELOPE_FIELD, body.as_str())];

        let mut conn = self.conn.clone();
        let entry_id: String = match self.config.max_len {
            Some(max_len) => conn
                .xadd_maxlen(&key, StreamMaxlen::Approx(max_len), "*", &fields)
                .await
                .map_err(|e: redis::RedisError| broker_error("XADD", e))?,
            None => conn
                .xadd(&key, "*", &fields)
                .await
                .map_err(|e: redis::RedisError| broker_error("XADD", e))?,
        };

        debug!(event_id = %event.event_id, stream = %key, entry_id = %entry_id, "Envelope appended");
        Ok(())
    }
}

impl EventSubscriber for RedisStreamBus {
    fn subscribe(&self, event_type: &str, handler: Arc<dyn EventHandler>) {
        self.handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(event_type.to_string())
            .or_default()
            .push(handler);
    }
}

fn decode_entry(entry: &StreamId) -> Result<EventEnvelope, DomainError> {
    let body: String = entry.get(ENVELOPE_FIELD).ok_or_else(|| {
        DomainError::new(
            ErrorCode::MalformedEvent,
            format!("Stream entry {} has no {} field", entry.id, ENVELOPE_FIELD),
        )
    })?;
    serde_json::from_str(&body).map_err(|e| {
        DomainError::new(
            ErrorCode::MalformedEvent,
            format!("Stream entry {} is not an envelope: {}", entry.id, e),
        )
    })
}

fn malformed_reply(reason: &str) -> DomainError {
    DomainError::new(
        ErrorCode::BrokerError,
        format!("Unexpected XAUTOCLAIM reply: {}", reason),
    )
}

fn broker_error(context: &str, err: redis::RedisError) -> DomainError {
    DomainError::new(ErrorCode::BrokerError, format!("{}: {}", context, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{EventId, Timestamp};
    use serde_json::json;

    fn entry_with(fields: &[(&str, &str)]) -> StreamId {
        StreamId {
            id: "1700000000000-0".to_string(),
            map: fields
                .iter()
                .map(|(k, v)| (k.to_string(), redis::Value::Data(v.as_bytes().to_vec())))
                .collect(),
        }
    }

    #[test]
    fn stream_keys_round_trip_through_prefix() {
        let config = RedisStreamConfig::default();
        let key = config.stream_key("journey.created.v1");
        assert_eq!(key, "journey-sync:journey.created.v1");
        assert_eq!(config.event_type_of(&key), Some("journey.created.v1"));
        assert_eq!(config.event_type_of("other:journey.created.v1"), None);
    }

    fn envelope_of(event_type: &str) -> EventEnvelope {
        EventEnvelope::new(
            EventId::new(),
            event_type,
            "j-1",
            "Journey",
            Timestamp::now(),
            json!({"journeyId": "j-1"}),
        )
    }

    #[test]
    fn decodes_envelope_field() {
        let envelope = envelope_of("journey.created.v1");
        let body = serde_json::to_string(&envelope).unwrap();

        let decoded = decode_entry(&entry_with(&[(ENVELOPE_FIELD, &body)])).unwrap();
        assert_eq!(decoded.event_id, envelope.event_id);
    }

    #[test]
    fn entry_without_envelope_is_malformed() {
        let err = decode_entry(&entry_with(&[("other", "x")])).unwrap_err();
        assert_eq!(err.code, ErrorCode::MalformedEvent);
    }

    fn claimed_row(id: &str, body: &str) -> Value {
        Value::Bulk(vec![
            Value::Data(id.as_bytes().to_vec()),
            Value::Bulk(vec![
                Value::Data(ENVELOPE_FIELD.as_bytes().to_vec()),
                Value::Data(body.as_bytes().to_vec()),
            ]),
        ])
    }

    #[test]
    fn autoclaim_reply_yields_entries_and_cursor() {
        let body = serde_json::to_string(&envelope_of("journey.updated.v1")).unwrap();
        let reply = Value::Bulk(vec![
            Value::Data(b"1700000000005-0".to_vec()),
            Value::Bulk(vec![
                claimed_row("1700000000001-0", &body),
                claimed_row("1700000000002-0", &body),
            ]),
            Value::Bulk(vec![]),
        ]);

        let claimed = AutoClaimed::from_reply(&reply).unwrap();
        assert_eq!(claimed.next_start, "1700000000005-0");
        assert!(!claimed.sweep_finished());
        let ids: Vec<&str> = claimed.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["1700000000001-0", "1700000000002-0"]);
        assert!(decode_entry(&claimed.entries[0]).is_ok());
    }

    #[test]
    fn autoclaim_reply_skips_deleted_entries() {
        let body = serde_json::to_string(&envelope_of("journey.deleted.v1")).unwrap();
        let reply = Value::Bulk(vec![
            Value::Data(CLAIM_SWEEP_START.as_bytes().to_vec()),
            Value::Bulk(vec![
                Value::Nil,
                Value::Bulk(vec![Value::Data(b"1700000000003-0".to_vec()), Value::Nil]),
                claimed_row("1700000000004-0", &body),
            ]),
        ]);

        let claimed = AutoClaimed::from_reply(&reply).unwrap();
        assert!(claimed.sweep_finished());
        assert_eq!(claimed.entries.len(), 1);
        assert_eq!(claimed.entries[0].id, "1700000000004-0");
    }

    #[test]
    fn autoclaim_reply_of_wrong_shape_is_a_broker_error() {
        let err = AutoClaimed::from_reply(&Value::Okay).unwrap_err();
        assert_eq!(err.code, ErrorCode::BrokerError);

        let err = AutoClaimed::from_reply(&Value::Bulk(vec![Value::Data(b"0-0".to_vec())]))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BrokerError);
    }

    #[test]
    fn claim_sweep_runs_first_then_once_per_interval() {
        let interval = Duration::from_secs(5);
        let now = Instant::now();

        assert!(claim_due(None, interval, now));
        assert!(!claim_due(Some(now), interval, now + Duration::from_secs(4)));
        assert!(claim_due(Some(now), interval, now + interval));
        assert!(!claim_due(Some(now + interval), interval, now));
    }

    #[tokio::test]
    #[ignore] // Needs a running server: REDIS_URL=redis://127.0.0.1/ cargo test -- --ignored
    async fn publish_appends_to_the_event_type_stream() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".into());
        let client = redis::Client::open(url).unwrap();
        let config = RedisStreamConfig {
            stream_prefix: format!("journey-sync-test-{}:", EventId::new()),
            ..RedisStreamConfig::default()
        };
        let bus = RedisStreamBus::connect(client.clone(), config.clone()).await.unwrap();

        bus.publish(envelope_of("journey.created.v1")).await.unwrap();

        let mut conn = client.get_multiplexed_tokio_connection().await.unwrap();
        let key = config.stream_key("journey.created.v1");
        let len: usize = conn.xlen(&key).await.unwrap();
        assert_eq!(len, 1);
        let _: () = conn.del(&key).await.unwrap();
    }

    struct Counting(std::sync::atomic::AtomicUsize);

    #[async_trait]
    impl EventHandler for Counting {
        async fn handle(&self, _event: EventEnvelope) -> Result<(), DomainError> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test]
    #[ignore] // Needs a running server: REDIS_URL=redis://127.0.0.1/ cargo test -- --ignored
    async fn entries_of_a_vanished_consumer_are_claimed_and_acked() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".into());
        let client = redis::Client::open(url).unwrap();
        let config = RedisStreamConfig {
            stream_prefix: format!("journey-sync-test-{}:", EventId::new()),
            consumer_name: "survivor".to_string(),
            ..RedisStreamConfig::default()
        };
        let bus = RedisStreamBus::connect(client.clone(), config.clone()).await.unwrap();
        let handler = Arc::new(Counting(Default::default()));
        bus.subscribe("journey.created.v1", handler.clone());

        let mut conn = client.get_multiplexed_tokio_connection().await.unwrap();
        let key = config.stream_key("journey.created.v1");
        bus.ensure_group(&mut conn, &key).await.unwrap();
        bus.publish(envelope_of("journey.created.v1")).await.unwrap();

        // Delivered to a consumer that never acks.
        let options = StreamReadOptions::default()
            .group(&config.consumer_group, "vanished")
            .count(10);
        let _: StreamReadReply = conn.xread_options(&[&key], &[">"], &options).await.unwrap();

        let mut cursors = HashMap::new();
        let report = bus
            .claim_stale(&mut conn, &[key.clone()], Duration::ZERO, &mut cursors)
            .await
            .unwrap();

        assert_eq!(report.read, 1);
        assert_eq!(report.acked, 1);
        assert_eq!(handler.0.load(std::sync::atomic::Ordering::SeqCst), 1);
        let pending: redis::streams::StreamPendingReply =
            conn.xpending(&key, &config.consumer_group).await.unwrap();
        assert_eq!(pending.count(), 0);
        let _: () = conn.del(&key).await.unwrap();
    }
}
