//! journey-sync entry point.
//!
//! Runs one outbox relay per outbox table and the Redis Streams consumer
//! until Ctrl-C.

use std::error::Error;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};

use journey_sync::adapters::events::{IdempotentHandler, OutboxRelay};
use journey_sync::adapters::notification::{RegistryPushNotifier, TracingFallbackNotifier};
use journey_sync::adapters::postgres::{
    connect_pool, OutboxTable, PostgresDailyRewardRepository, PostgresMonthlyDistanceRepository,
    PostgresOutboxStore, PostgresProcessedEventStore, PostgresRelationshipRepository, MIGRATOR,
};
use journey_sync::adapters::redis::{RedisConnectionRegistry, RedisServerMessenger, RedisStreamBus};
use journey_sync::application::{
    DailyGoalWatcher, MonthlyDistanceProjector, NotificationFanout, RelationshipIntegrationMapper,
};
use journey_sync::config::AppConfig;
use journey_sync::domain::foundation::Timestamp;
use journey_sync::domain::integration::event_types;
use journey_sync::ports::{EventSubscriber, ProcessedEventStore};
use journey_sync::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::load_validated()?;
    telemetry::init(&config.telemetry)?;

    tracing::info!(
        consumer_group = %config.redis.consumer_group,
        consumer = %config.redis.consumer_name,
        "Starting journey-sync"
    );

    // Database
    let pool = connect_pool(&config.database).await?;
    if config.database.run_migrations {
        MIGRATOR.run(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    // Broker
    let client = redis::Client::open(config.redis.url.as_str())?;
    let bus = Arc::new(RedisStreamBus::connect(client.clone(), config.redis.stream_config()).await?);
    let registry_conn = client.get_multiplexed_tokio_connection().await?;
    let registry_prefix = format!("{}conn:", config.redis.stream_prefix);

    // Consumers
    let processed_events = Arc::new(PostgresProcessedEventStore::new(pool.clone()));

    let projector = Arc::new(MonthlyDistanceProjector::new(Arc::new(
        PostgresMonthlyDistanceRepository::new(pool.clone()),
    )));
    bus.subscribe_all(
        &[
            event_types::JOURNEY_CREATED,
            event_types::JOURNEY_UPDATED,
            event_types::JOURNEY_DELETED,
        ],
        projector,
    );

    let watcher = Arc::new(DailyGoalWatcher::new(
        Arc::new(PostgresDailyRewardRepository::new(pool.clone())),
        config.reward.daily_goal()?,
    ));
    bus.subscribe(event_types::JOURNEY_CREATED, watcher);

    let push = RegistryPushNotifier::new(
        Arc::new(RedisConnectionRegistry::new(
            registry_conn.clone(),
            registry_prefix.clone(),
            config.redis.connection_ttl(),
        )),
        Arc::new(RedisServerMessenger::new(registry_conn, registry_prefix)),
    );
    let fanout = IdempotentHandler::new(
        NotificationFanout::new(Arc::new(push), Arc::new(TracingFallbackNotifier::new())),
        processed_events.clone(),
    );
    bus.subscribe_all(
        &[event_types::JOURNEY_UPDATED, event_types::JOURNEY_DELETED],
        Arc::new(fanout),
    );

    // Background tasks
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = JoinSet::new();

    let mapper = Arc::new(RelationshipIntegrationMapper::new(Arc::new(
        PostgresRelationshipRepository::new(pool.clone()),
    )));
    for table in [OutboxTable::Journey, OutboxTable::User, OutboxTable::Reward] {
        let relay = OutboxRelay::with_config(
            table.table_name(),
            Arc::new(PostgresOutboxStore::new(pool.clone(), table)),
            mapper.clone(),
            bus.clone(),
            config.relay.relay_config(),
        );
        let shutdown = shutdown_rx.clone();
        tasks.spawn(async move {
            if let Err(e) = relay.run(shutdown).await {
                tracing::error!(relay = relay.name(), error = %e, "Outbox relay stopped");
            }
        });
    }

    let consumer = bus.clone();
    let shutdown = shutdown_rx.clone();
    tasks.spawn(async move {
        if let Err(e) = consumer.run_consumer(shutdown).await {
            tracing::error!(error = %e, "Stream consumer stopped");
        }
    });

    let retention_hours = config.relay.retention_hours as i64;
    let mut prune = time::interval(config.relay.relay_config().cleanup_interval);
    prune.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut shutdown = shutdown_rx;
    tasks.spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.changed() => return,
                _ = prune.tick() => {
                    let cutoff = Timestamp::now().minus_hours(retention_hours);
                    match processed_events.delete_before(cutoff).await {
                        Ok(0) => {}
                        Ok(deleted) => tracing::debug!(deleted, "Pruned processed event records"),
                        Err(e) => tracing::warn!(error = %e, "Failed to prune processed event records"),
                    }
                }
            }
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutdown requested"),
        _ = tasks.join_next() => tracing::warn!("A background task exited, shutting down"),
    }

    shutdown_tx.send(true).ok();
    while tasks.join_next().await.is_some() {}
    pool.close().await;

    tracing::info!("journey-sync stopped");
    Ok(())
}
