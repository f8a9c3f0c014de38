use std::collections::HashMap;
use std::{convert::Infallible, sync::Arc, sync::RwLock, time::Duration};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

use tradebinder_catalog::{normalize_card, CardId, CardSummary};
use tradebinder_events::{EventBus, EventEnvelope, InMemoryEventBus};
use tradebinder_infra::{
    event_store::{EventFilter, EventQuery, EventQueryResult, EventStoreError, InMemoryEventStore, Pagination, StoredEvent},
    marketplace::Marketplace,
};

/// Realtime message broadcasted via SSE.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RealtimeMessage {
    pub topic: String,
    pub payload: serde_json::Value,
}

type InMemoryMarketplace =
    Marketplace<Arc<InMemoryEventStore>, Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>>;

/// Wired application services shared by all handlers.
///
/// The marketplace service applies committed events to its read models
/// inline; the bus subscriber here only fans committed events out to SSE
/// clients.
pub struct AppServices {
    pub marketplace: InMemoryMarketplace,
    event_store: Arc<InMemoryEventStore>,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
    // Catalog summaries keyed by card, built from client-supplied records.
    card_summaries: RwLock<HashMap<CardId, CardSummary>>,
}

pub fn build_services() -> AppServices {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>> =
        Arc::new(InMemoryEventBus::new());

    // Realtime channel (SSE): lossy broadcast, fanned out per client.
    let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);

    // Background subscriber: bus -> SSE notifications.
    {
        let sub = bus.subscribe();
        let realtime_tx = realtime_tx.clone();
        tokio::task::spawn_blocking(move || loop {
            match sub.recv() {
                Ok(env) => {
                    let aggregate_type = env.aggregate_type().to_string();
                    let _ = realtime_tx.send(RealtimeMessage {
                        topic: format!("{aggregate_type}.updated"),
                        payload: serde_json::json!({
                            "aggregate_type": aggregate_type,
                            "aggregate_id": env.aggregate_id().to_string(),
                            "sequence_number": env.sequence_number(),
                        }),
                    });
                }
                Err(_) => break,
            }
        });
    }

    let marketplace = Marketplace::new(Arc::clone(&store), bus);

    AppServices {
        marketplace,
        event_store: store,
        realtime_tx,
        card_summaries: RwLock::new(HashMap::new()),
    }
}

impl AppServices {
    /// Normalize a client-supplied catalog record and keep the summary so
    /// collection and listing reads can render the card.
    pub fn remember_card(&self, card_id: &CardId, raw: &serde_json::Value) {
        let summary = normalize_card(card_id, raw);
        if let Ok(mut cache) = self.card_summaries.write() {
            cache.insert(card_id.clone(), summary);
        }
    }

    /// Display summary for a card, if anyone has described it yet.
    pub fn card_summary(&self, card_id: &CardId) -> Option<CardSummary> {
        self.card_summaries
            .read()
            .ok()
            .and_then(|cache| cache.get(card_id).cloned())
    }

    /// Query the event ledger with filters and pagination (admin surface).
    pub fn query_events(
        &self,
        filter: &EventFilter,
        pagination: Pagination,
    ) -> Result<EventQueryResult, EventStoreError> {
        self.event_store.query_events(filter, pagination)
    }

    /// Look up a single ledger event by its id.
    pub fn get_event_by_id(&self, event_id: uuid::Uuid) -> Result<Option<StoredEvent>, EventStoreError> {
        self.event_store.get_event_by_id(event_id)
    }
}

/// Build an SSE stream of marketplace updates (used by `/stream`).
pub fn marketplace_sse_stream(
    services: Arc<AppServices>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(m) => {
            let data = serde_json::to_string(&m.payload).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(m.topic).data(data)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
