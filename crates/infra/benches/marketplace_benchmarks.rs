use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::Utc;
use std::sync::Arc;

use tradebinder_catalog::{CardId, Grade};
use tradebinder_collection::{
    AddEntry, CollectionCommand, CollectionEntry, CollectionEvent, EntryAdded, EntryId,
    RestoreUnits, UnitsRestored,
};
use tradebinder_core::{AggregateId, ExpectedVersion, UserId};
use tradebinder_events::{EventEnvelope, InMemoryEventBus};
use tradebinder_infra::command_dispatcher::CommandDispatcher;
use tradebinder_infra::event_store::{EventStore, InMemoryEventStore, UncommittedEvent};
use tradebinder_infra::projections::collection_entries::CollectionEntriesProjection;
use tradebinder_infra::projections::CollectionEntryReadModel;
use tradebinder_infra::read_model::InMemoryKeyedStore;

fn setup_dispatcher() -> CommandDispatcher<
    InMemoryEventStore,
    Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>,
> {
    let store = InMemoryEventStore::new();
    let bus: Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>> =
        Arc::new(InMemoryEventBus::new());
    CommandDispatcher::new(store, bus)
}

fn add_entry_cmd(entry_id: EntryId, owner: UserId, quantity: i64) -> CollectionCommand {
    CollectionCommand::AddEntry(AddEntry {
        entry_id,
        owner,
        card_id: CardId::new("base1-4").unwrap(),
        grade: Grade::new(9).unwrap(),
        quantity,
        notes: String::new(),
        occurred_at: Utc::now(),
    })
}

fn bench_command_execution_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("command_execution_latency");
    group.sample_size(1000);

    // First command on a fresh stream (no history to replay).
    group.bench_function("add_entry_fresh", |b| {
        let dispatcher = setup_dispatcher();
        let owner = UserId::new();
        b.iter(|| {
            let aggregate_id = AggregateId::new();
            dispatcher
                .dispatch::<CollectionEntry>(
                    aggregate_id,
                    "collection.entry",
                    add_entry_cmd(EntryId::new(aggregate_id), owner, black_box(3)),
                    |id| CollectionEntry::empty(EntryId::new(id)),
                )
                .unwrap();
        });
    });

    // Subsequent command: the stream grows by one event per iteration, so
    // this also measures rehydration cost on an ever-longer history.
    group.bench_function("restore_units_with_history", |b| {
        let dispatcher = setup_dispatcher();
        let owner = UserId::new();
        let aggregate_id = AggregateId::new();
        let entry_id = EntryId::new(aggregate_id);
        dispatcher
            .dispatch::<CollectionEntry>(
                aggregate_id,
                "collection.entry",
                add_entry_cmd(entry_id, owner, 1),
                |id| CollectionEntry::empty(EntryId::new(id)),
            )
            .unwrap();

        b.iter(|| {
            dispatcher
                .dispatch::<CollectionEntry>(
                    aggregate_id,
                    "collection.entry",
                    CollectionCommand::RestoreUnits(RestoreUnits {
                        entry_id,
                        quantity: black_box(1),
                        occurred_at: Utc::now(),
                    }),
                    |id| CollectionEntry::empty(EntryId::new(id)),
                )
                .unwrap();
        });
    });

    group.finish();
}

fn bench_event_append_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_append_throughput");

    for batch_size in [1usize, 10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::new("batch_append", batch_size),
            batch_size,
            |b, &size| {
                let store = InMemoryEventStore::new();
                let aggregate_id = AggregateId::new();
                let entry_id = EntryId::new(aggregate_id);

                b.iter(|| {
                    let events: Vec<UncommittedEvent> = (0..size)
                        .map(|i| {
                            let event = CollectionEvent::UnitsRestored(UnitsRestored {
                                entry_id,
                                quantity: (i + 1) as i64,
                                occurred_at: Utc::now(),
                            });
                            UncommittedEvent::from_typed(
                                aggregate_id,
                                "collection.entry",
                                uuid::Uuid::now_v7(),
                                &event,
                            )
                            .unwrap()
                        })
                        .collect();

                    black_box(store.append(events, ExpectedVersion::Any).unwrap());
                });
            },
        );
    }

    group.finish();
}

fn bench_projection_rebuild_speed(c: &mut Criterion) {
    let mut group = c.benchmark_group("projection_rebuild_speed");

    for event_count in [10u64, 100, 1000, 10000].iter() {
        group.bench_with_input(
            BenchmarkId::new("rebuild_from_events", event_count),
            event_count,
            |b, &count| {
                let store = InMemoryEventStore::new();
                let owner = UserId::new();
                let aggregate_id = AggregateId::new();
                let entry_id = EntryId::new(aggregate_id);

                let mut all_envelopes = Vec::new();
                let create = CollectionEvent::EntryAdded(EntryAdded {
                    entry_id,
                    owner,
                    card_id: CardId::new("base1-4").unwrap(),
                    grade: Grade::new(9).unwrap(),
                    quantity: 1,
                    notes: String::new(),
                    occurred_at: Utc::now(),
                });
                let uncommitted = UncommittedEvent::from_typed(
                    aggregate_id,
                    "collection.entry",
                    uuid::Uuid::now_v7(),
                    &create,
                )
                .unwrap();
                let stored = store.append(vec![uncommitted], ExpectedVersion::Any).unwrap();
                all_envelopes.push(stored[0].to_envelope());

                for i in 0..(count - 1) {
                    let event = CollectionEvent::UnitsRestored(UnitsRestored {
                        entry_id,
                        quantity: 1,
                        occurred_at: Utc::now(),
                    });
                    let uncommitted = UncommittedEvent::from_typed(
                        aggregate_id,
                        "collection.entry",
                        uuid::Uuid::now_v7(),
                        &event,
                    )
                    .unwrap();
                    let stored = store
                        .append(vec![uncommitted], ExpectedVersion::Exact(i + 1))
                        .unwrap();
                    all_envelopes.push(stored[0].to_envelope());
                }

                b.iter(|| {
                    // Fresh projection per iteration; cursors start at zero.
                    let rows: Arc<InMemoryKeyedStore<EntryId, CollectionEntryReadModel>> =
                        Arc::new(InMemoryKeyedStore::new());
                    let projection = CollectionEntriesProjection::new(rows);
                    for envelope in black_box(&all_envelopes) {
                        projection.apply_envelope(envelope).unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_command_execution_latency,
    bench_event_append_throughput,
    bench_projection_rebuild_speed
);
criterion_main!(benches);
