use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;

use tradebinder_catalog::{CardId, Grade};
use tradebinder_collection::{CollectionEvent, EntryId};
use tradebinder_core::{AggregateId, UserId};
use tradebinder_events::EventEnvelope;

use crate::projections::ProjectionError;
use crate::read_model::KeyedStore;

pub const AGGREGATE_TYPE: &str = "collection.entry";

/// Flat row for one collection entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionEntryReadModel {
    pub entry_id: EntryId,
    pub owner: UserId,
    pub card_id: CardId,
    pub grade: Grade,
    pub quantity: i64,
    pub notes: String,
}

/// Read model over collection entries.
///
/// Besides the per-entry rows it maintains the `(owner, card, grade)` index
/// that gives entries their logical identity: listing creation and
/// withdrawal resolve the seller's matching entry through it. Depleted
/// entries are dropped from both row store and index.
pub struct CollectionEntriesProjection<S>
where
    S: KeyedStore<EntryId, CollectionEntryReadModel>,
{
    store: S,
    index: RwLock<HashMap<(UserId, CardId, Grade), EntryId>>,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> CollectionEntriesProjection<S>
where
    S: KeyedStore<EntryId, CollectionEntryReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            index: RwLock::new(HashMap::new()),
            cursors: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, entry_id: &EntryId) -> Option<CollectionEntryReadModel> {
        self.store.get(entry_id)
    }

    /// Resolve the owner's entry for one card at one grade.
    pub fn find_entry(
        &self,
        owner: UserId,
        card_id: &CardId,
        grade: Grade,
    ) -> Option<CollectionEntryReadModel> {
        let entry_id = {
            let index = self.index.read().ok()?;
            *index.get(&(owner, card_id.clone(), grade))?
        };
        self.store.get(&entry_id)
    }

    pub fn list_for_owner(&self, owner: UserId) -> Vec<CollectionEntryReadModel> {
        let mut rows: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|row| row.owner == owner)
            .collect();
        rows.sort_by(|a, b| {
            a.card_id
                .as_str()
                .cmp(b.card_id.as_str())
                .then(a.grade.cmp(&b.grade))
        });
        rows
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

    fn index_insert(&self, owner: UserId, card_id: CardId, grade: Grade, entry_id: EntryId) {
        if let Ok(mut index) = self.index.write() {
            index.insert((owner, card_id, grade), entry_id);
        }
    }

    fn index_remove(&self, owner: UserId, card_id: &CardId, grade: Grade) {
        if let Ok(mut index) = self.index.write() {
            index.remove(&(owner, card_id.clone(), grade));
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

        let ev: CollectionEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match ev {
            CollectionEvent::EntryAdded(e) => {
                self.index_insert(e.owner, e.card_id.clone(), e.grade, e.entry_id);
                self.store.upsert(
                    e.entry_id,
                    CollectionEntryReadModel {
                        entry_id: e.entry_id,
                        owner: e.owner,
                        card_id: e.card_id,
                        grade: e.grade,
                        quantity: e.quantity,
                        notes: e.notes,
                    },
                );
            }
            CollectionEvent::EntryUpdated(e) => {
                if let Some(mut row) = self.store.get(&e.entry_id) {
                    if let Some(grade) = e.grade {
                        if grade != row.grade {
                            // Grade is part of the logical identity; re-key.
                            self.index_remove(row.owner, &row.card_id, row.grade);
                            self.index_insert(row.owner, row.card_id.clone(), grade, e.entry_id);
                            row.grade = grade;
                        }
                    }
                    if let Some(quantity) = e.quantity {
                        row.quantity = quantity;
                    }
                    if let Some(notes) = e.notes {
                        row.notes = notes;
                    }
                    self.store.upsert(e.entry_id, row);
                }
            }
            CollectionEvent::UnitsReserved(e) => {
                if let Some(mut row) = self.store.get(&e.entry_id) {
                    row.quantity -= e.quantity;
                    self.store.upsert(e.entry_id, row);
                }
            }
            CollectionEvent::UnitsRestored(e) => {
                if let Some(mut row) = self.store.get(&e.entry_id) {
                    row.quantity += e.quantity;
                    self.store.upsert(e.entry_id, row);
                }
            }
            CollectionEvent::EntryDepleted(e) => {
                if let Some(row) = self.store.get(&e.entry_id) {
                    self.index_remove(row.owner, &row.card_id, row.grade);
                    self.store.remove(&e.entry_id);
                }
            }
        }

        self.update_cursor(aggregate_id, seq);
        Ok(())
    }
}
