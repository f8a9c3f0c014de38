//! Event query interface for ledger inspection.
//!
//! Admin oversight needs a read-only, filtered, paginated view over the
//! stored event stream. Queries never mutate and never participate in the
//! command pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tradebinder_core::AggregateId;

use crate::event_store::{EventStoreError, InMemoryEventStore, StoredEvent};

/// Pagination parameters for event queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of events to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(50).min(1000),
            offset: offset.unwrap_or(0),
        }
    }
}

/// Filter criteria for event queries. All fields are conjunctive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    pub aggregate_id: Option<AggregateId>,
    /// e.g. "listings.listing"
    pub aggregate_type: Option<String>,
    /// e.g. "listings.listing.sold"
    pub event_type: Option<String>,
    pub occurred_after: Option<DateTime<Utc>>,
    pub occurred_before: Option<DateTime<Utc>>,
}

/// Paginated event query result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventQueryResult {
    pub events: Vec<StoredEvent>,
    /// Total number of events matching the filter (across all pages).
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

/// Read-only query interface for event inspection.
pub trait EventQuery: Send + Sync {
    /// Query events with optional filters and pagination.
    ///
    /// Events are ordered by `occurred_at` descending, then sequence number
    /// ascending for identical timestamps.
    fn query_events(
        &self,
        filter: &EventFilter,
        pagination: Pagination,
    ) -> Result<EventQueryResult, EventStoreError>;

    /// Get a single event by its id.
    fn get_event_by_id(&self, event_id: uuid::Uuid)
    -> Result<Option<StoredEvent>, EventStoreError>;
}

fn matches(filter: &EventFilter, event: &StoredEvent) -> bool {
    if let Some(aggregate_id) = filter.aggregate_id {
        if event.aggregate_id != aggregate_id {
            return false;
        }
    }
    if let Some(aggregate_type) = &filter.aggregate_type {
        if &event.aggregate_type != aggregate_type {
            return false;
        }
    }
    if let Some(event_type) = &filter.event_type {
        if &event.event_type != event_type {
            return false;
        }
    }
    if let Some(after) = filter.occurred_after {
        if event.occurred_at <= after {
            return false;
        }
    }
    if let Some(before) = filter.occurred_before {
        if event.occurred_at >= before {
            return false;
        }
    }
    true
}

impl EventQuery for InMemoryEventStore {
    fn query_events(
        &self,
        filter: &EventFilter,
        pagination: Pagination,
    ) -> Result<EventQueryResult, EventStoreError> {
        let mut matched: Vec<StoredEvent> = self
            .all_events()
            .into_iter()
            .filter(|e| matches(filter, e))
            .collect();

        matched.sort_by(|a, b| {
            b.occurred_at
                .cmp(&a.occurred_at)
                .then(a.sequence_number.cmp(&b.sequence_number))
        });

        let total = matched.len() as u64;
        let start = (pagination.offset as usize).min(matched.len());
        let end = (start + pagination.limit as usize).min(matched.len());
        let events = matched[start..end].to_vec();
        let has_more = (end as u64) < total;

        Ok(EventQueryResult {
            events,
            total,
            pagination,
            has_more,
        })
    }

    fn get_event_by_id(
        &self,
        event_id: uuid::Uuid,
    ) -> Result<Option<StoredEvent>, EventStoreError> {
        Ok(self.all_events().into_iter().find(|e| e.event_id == event_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::{EventStore, UncommittedEvent};
    use serde_json::json;
    use tradebinder_core::ExpectedVersion;
    use uuid::Uuid;

    fn seed(store: &InMemoryEventStore, aggregate_type: &str, event_type: &str) -> AggregateId {
        let id = AggregateId::new();
        store
            .append(
                vec![UncommittedEvent {
                    event_id: Uuid::now_v7(),
                    aggregate_id: id,
                    aggregate_type: aggregate_type.to_string(),
                    event_type: event_type.to_string(),
                    event_version: 1,
                    occurred_at: Utc::now(),
                    payload: json!({}),
                }],
                ExpectedVersion::Any,
            )
            .unwrap();
        id
    }

    #[test]
    fn filters_by_aggregate_and_event_type() {
        let store = InMemoryEventStore::new();
        seed(&store, "listings.listing", "listings.listing.opened");
        seed(&store, "listings.listing", "listings.listing.sold");
        seed(&store, "sales.sale", "sales.sale.purchase_recorded");

        let by_aggregate = store
            .query_events(
                &EventFilter {
                    aggregate_type: Some("listings.listing".to_string()),
                    ..Default::default()
                },
                Pagination::default(),
            )
            .unwrap();
        assert_eq!(by_aggregate.total, 2);

        let by_event = store
            .query_events(
                &EventFilter {
                    event_type: Some("listings.listing.sold".to_string()),
                    ..Default::default()
                },
                Pagination::default(),
            )
            .unwrap();
        assert_eq!(by_event.total, 1);
    }

    #[test]
    fn paginates_and_reports_has_more() {
        let store = InMemoryEventStore::new();
        for _ in 0..5 {
            seed(&store, "sales.sale", "sales.sale.purchase_recorded");
        }

        let page = store
            .query_events(
                &EventFilter::default(),
                Pagination {
                    limit: 2,
                    offset: 0,
                },
            )
            .unwrap();
        assert_eq!(page.events.len(), 2);
        assert_eq!(page.total, 5);
        assert!(page.has_more);

        let last = store
            .query_events(
                &EventFilter::default(),
                Pagination {
                    limit: 2,
                    offset: 4,
                },
            )
            .unwrap();
        assert_eq!(last.events.len(), 1);
        assert!(!last.has_more);
    }

    #[test]
    fn finds_event_by_id() {
        let store = InMemoryEventStore::new();
        seed(&store, "sales.sale", "sales.sale.purchase_recorded");
        let all = store
            .query_events(&EventFilter::default(), Pagination::default())
            .unwrap();
        let id = all.events[0].event_id;
        assert!(store.get_event_by_id(id).unwrap().is_some());
        assert!(store.get_event_by_id(Uuid::now_v7()).unwrap().is_none());
    }
}
