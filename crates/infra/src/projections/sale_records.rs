use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use tradebinder_core::{AggregateId, UserId};
use tradebinder_events::EventEnvelope;
use tradebinder_listings::ListingId;
use tradebinder_sales::{Rating, SaleEvent, SaleId, SaleState};

use crate::projections::ProjectionError;
use crate::read_model::KeyedStore;

pub const AGGREGATE_TYPE: &str = "sales.sale";

/// Flat row for one sale record. Never removed; this is the ledger view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleRecordReadModel {
    pub sale_id: SaleId,
    pub listing_id: ListingId,
    pub buyer: UserId,
    pub seller: UserId,
    pub quantity: i64,
    pub price_total_cents: u64,
    pub purchased_at: DateTime<Utc>,
    pub state: SaleState,
    pub state_changed_at: DateTime<Utc>,
    pub rating: Option<Rating>,
}

/// Read model over sale records.
pub struct SaleRecordsProjection<S>
where
    S: KeyedStore<SaleId, SaleRecordReadModel>,
{
    store: S,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> SaleRecordsProjection<S>
where
    S: KeyedStore<SaleId, SaleRecordReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, sale_id: &SaleId) -> Option<SaleRecordReadModel> {
        self.store.get(sale_id)
    }

    /// Every sale record, newest first (the admin ledger view).
    pub fn list_all(&self) -> Vec<SaleRecordReadModel> {
        let mut rows = self.store.list();
        rows.sort_by(|a, b| b.purchased_at.cmp(&a.purchased_at));
        rows
    }

    /// Sales where the user is a party, newest first.
    pub fn list_for_user(&self, user: UserId) -> Vec<SaleRecordReadModel> {
        let mut rows: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|row| row.buyer == user || row.seller == user)
            .collect();
        rows.sort_by(|a, b| b.purchased_at.cmp(&a.purchased_at));
        rows
    }

    /// Average rating score received by a seller, if any ratings exist.
    pub fn seller_rating(&self, seller: UserId) -> Option<f64> {
        let scores: Vec<u8> = self
            .store
            .list()
            .into_iter()
            .filter(|row| row.seller == seller)
            .filter_map(|row| row.rating.map(|r| r.score))
            .collect();
        if scores.is_empty() {
            return None;
        }
        Some(scores.iter().map(|s| *s as f64).sum::<f64>() / scores.len() as f64)
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

        let ev: SaleEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match ev {
            SaleEvent::PurchaseRecorded(e) => {
                self.store.upsert(
                    e.sale_id,
                    SaleRecordReadModel {
                        sale_id: e.sale_id,
                        listing_id: e.listing_id,
                        buyer: e.buyer,
                        seller: e.seller,
                        quantity: e.quantity,
                        price_total_cents: e.price_total_cents,
                        purchased_at: e.occurred_at,
                        state: SaleState::initial(),
                        state_changed_at: e.occurred_at,
                        rating: None,
                    },
                );
            }
            SaleEvent::StateChanged(e) => {
                if let Some(mut row) = self.store.get(&e.sale_id) {
                    row.state = e.to;
                    row.state_changed_at = e.occurred_at;
                    self.store.upsert(e.sale_id, row);
                }
            }
            SaleEvent::RatingSubmitted(e) => {
                if let Some(mut row) = self.store.get(&e.sale_id) {
                    row.rating = Some(e.rating);
                    self.store.upsert(e.sale_id, row);
                }
            }
        }

        self.update_cursor(aggregate_id, seq);
        Ok(())
    }
}
