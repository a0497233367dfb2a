//! Property tests for the monthly distance read model.
//!
//! Random create/update/delete sequences flow through the outbox relay and
//! the projector. Afterwards every month's total must equal the sum of the
//! live journeys that start in it, no matter how often envelopes repeat.

use std::sync::Arc;

use proptest::prelude::*;

use journey_sync::adapters::memory::{
    InMemoryJourneyRepository, InMemoryMonthlyDistanceRepository, InMemoryOutbox,
    InMemoryRelationshipRepository,
};
use journey_sync::adapters::{InMemoryEventBus, OutboxRelay};
use journey_sync::application::{
    CreateJourneyCommand, CreateJourneyHandler, DeleteJourneyCommand, DeleteJourneyHandler,
    MonthlyDistanceProjector, RelationshipIntegrationMapper, UpdateJourneyCommand,
    UpdateJourneyHandler,
};
use journey_sync::domain::foundation::{DistanceKm, JourneyId, MonthPeriod, Timestamp, UserId};
use journey_sync::domain::integration::event_types;
use journey_sync::domain::journey::{JourneyDetails, Location, TransportType};
use journey_sync::ports::{EventPublisher, EventSubscriber, MonthlyDistanceRepository};

const SLOTS: usize = 3;
const MONTHS: [u32; 3] = [1, 2, 3];

#[derive(Debug, Clone)]
enum Op {
    Create { slot: usize, month: u32, hundredths: i64 },
    Update { slot: usize, month: u32, hundredths: i64 },
    Delete { slot: usize },
    Redeliver,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let month = prop::sample::select(MONTHS.to_vec());
    prop_oneof![
        3 => (0..SLOTS, month.clone(), 1i64..=5000)
            .prop_map(|(slot, month, hundredths)| Op::Create { slot, month, hundredths }),
        3 => (0..SLOTS, month, 1i64..=5000)
            .prop_map(|(slot, month, hundredths)| Op::Update { slot, month, hundredths }),
        1 => (0..SLOTS).prop_map(|slot| Op::Delete { slot }),
        1 => Just(Op::Redeliver),
    ]
}

fn details(month: u32, hundredths: i64) -> JourneyDetails {
    let start = Timestamp::parse_rfc3339(&format!("2024-{:02}-10T08:00:00Z", month)).unwrap();
    JourneyDetails {
        start_location: Location::new("Depot").unwrap(),
        start_time: start,
        arrival_location: Location::new("Harbour").unwrap(),
        arrival_time: start.plus_secs(900),
        transport_type: TransportType::Bus,
        distance_km: DistanceKm::from_hundredths(hundredths).unwrap(),
    }
}

async fn run_sequence(ops: Vec<Op>) {
    let owner = UserId::new("commuter").unwrap();
    let outbox = Arc::new(InMemoryOutbox::new());
    let journeys = Arc::new(InMemoryJourneyRepository::new(outbox.clone()));
    let monthly = Arc::new(InMemoryMonthlyDistanceRepository::new());
    let bus = Arc::new(InMemoryEventBus::new());
    bus.subscribe_all(
        &[
            event_types::JOURNEY_CREATED,
            event_types::JOURNEY_UPDATED,
            event_types::JOURNEY_DELETED,
        ],
        Arc::new(MonthlyDistanceProjector::new(monthly.clone())),
    );
    let relay = OutboxRelay::new(
        "journey_outbox",
        outbox,
        Arc::new(RelationshipIntegrationMapper::new(Arc::new(
            InMemoryRelationshipRepository::new(),
        ))),
        bus.clone(),
    );

    let create = CreateJourneyHandler::new(journeys.clone());
    let update = UpdateJourneyHandler::new(journeys.clone());
    let delete = DeleteJourneyHandler::new(journeys);

    // slot -> (journey, month, hundredths)
    let mut live: [Option<(JourneyId, u32, i64)>; SLOTS] = [None; SLOTS];

    for op in ops {
        match op {
            Op::Create { slot, month, hundredths } if live[slot].is_none() => {
                let result = create
                    .handle(CreateJourneyCommand {
                        user_id: owner.clone(),
                        details: details(month, hundredths),
                    })
                    .await
                    .unwrap();
                live[slot] = Some((result.journey.id(), month, hundredths));
            }
            Op::Update { slot, month, hundredths } => {
                if let Some((id, _, _)) = live[slot] {
                    update
                        .handle(UpdateJourneyCommand {
                            journey_id: id,
                            acting_user: owner.clone(),
                            details: details(month, hundredths),
                        })
                        .await
                        .unwrap();
                    live[slot] = Some((id, month, hundredths));
                }
            }
            Op::Delete { slot } => {
                if let Some((id, _, _)) = live[slot].take() {
                    delete
                        .handle(DeleteJourneyCommand {
                            journey_id: id,
                            acting_user: owner.clone(),
                        })
                        .await
                        .unwrap();
                }
            }
            Op::Redeliver => {
                for envelope in bus.published_events() {
                    bus.publish(envelope).await.unwrap();
                }
            }
            Op::Create { .. } => {}
        }
        relay.poll_once().await.unwrap();
    }

    for month in MONTHS {
        let expected: i64 = live
            .iter()
            .flatten()
            .filter(|(_, m, _)| *m == month)
            .map(|(_, _, h)| h)
            .sum();
        let actual = monthly
            .find(&owner, MonthPeriod::new(2024, month).unwrap())
            .await
            .unwrap()
            .map(|row| row.total.hundredths())
            .unwrap_or(0);
        assert_eq!(actual, expected, "month {}", month);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn monthly_totals_match_live_journeys(ops in prop::collection::vec(op_strategy(), 1..24)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(run_sequence(ops));
    }
}
