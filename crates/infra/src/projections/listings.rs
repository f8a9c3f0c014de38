use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;

use tradebinder_catalog::{CardId, Grade};
use tradebinder_core::{AggregateId, UserId};
use tradebinder_events::EventEnvelope;
use tradebinder_listings::{ListingEvent, ListingId, ListingStatus};

use crate::projections::ProjectionError;
use crate::read_model::KeyedStore;

pub const AGGREGATE_TYPE: &str = "listings.listing";

/// Flat row for one listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingReadModel {
    pub listing_id: ListingId,
    pub seller: UserId,
    pub card_id: CardId,
    pub grade: Grade,
    pub quantity: i64,
    pub price_cents: u64,
    pub notes: String,
    pub status: ListingStatus,
}

/// Read model over listings. Withdrawn and sold rows are kept (status
/// flips) so sellers can see their history; the browse query filters to
/// Active.
pub struct ListingsProjection<S>
where
    S: KeyedStore<ListingId, ListingReadModel>,
{
    store: S,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> ListingsProjection<S>
where
    S: KeyedStore<ListingId, ListingReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, listing_id: &ListingId) -> Option<ListingReadModel> {
        self.store.get(listing_id)
    }

    pub fn list_active(&self) -> Vec<ListingReadModel> {
        let mut rows: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|row| row.status == ListingStatus::Active)
            .collect();
        rows.sort_by(|a, b| a.card_id.as_str().cmp(b.card_id.as_str()));
        rows
    }

    pub fn list_for_seller(&self, seller: UserId) -> Vec<ListingReadModel> {
        self.store
            .list()
            .into_iter()
            .filter(|row| row.seller == seller)
            .collect()
    }

    fn cursor(&self, aggregate_id: AggregateId) -> u64 {
        match self.cursors.read() {
            Ok(cursors) => *cursors.get(&aggregate_id).unwrap_or(&0),
            Err(_) => 0,
        }
    }

    fn update_cursor(&self, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert(aggregate_id, seq);
        }
    }

    /// Apply one committed event. Already-seen sequence numbers are no-ops.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        let last = self.cursor(aggregate_id);
        if seq <= last {
            return Ok(());
        }
        if seq != last + 1 && last != 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let ev: ListingEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match ev {
            ListingEvent::Opened(e) => {
                self.store.upsert(
                    e.listing_id,
                    ListingReadModel {
                        listing_id: e.listing_id,
                        seller: e.seller,
                        card_id: e.card_id,
                        grade: e.grade,
                        quantity: e.quantity,
                        price_cents: e.price_cents,
                        notes: e.notes,
                        status: ListingStatus::Active,
                    },
                );
            }
            ListingEvent::PriceUpdated(e) => {
                if let Some(mut row) = self.store.get(&e.listing_id) {
                    row.price_cents = e.price_cents;
                    self.store.upsert(e.listing_id, row);
                }
            }
            ListingEvent::Withdrawn(e) => {
                if let Some(mut row) = self.store.get(&e.listing_id) {
                    row.status = ListingStatus::Withdrawn;
                    self.store.upsert(e.listing_id, row);
                }
            }
            ListingEvent::Sold(e) => {
                if let Some(mut row) = self.store.get(&e.listing_id) {
                    row.status = ListingStatus::Sold;
                    self.store.upsert(e.listing_id, row);
                }
            }
        }

        self.update_cursor(aggregate_id, seq);
        Ok(())
    }
}
