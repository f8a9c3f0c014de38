use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;

use tradebinder_auth::{AccountEvent, AccountStatus};
use tradebinder_core::{AggregateId, UserId};
use tradebinder_events::EventEnvelope;

use crate::projections::ProjectionError;
use crate::read_model::KeyedStore;

pub const AGGREGATE_TYPE: &str = "auth.account";

/// Flat row for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountReadModel {
    pub user_id: UserId,
    pub display_name: String,
    pub status: AccountStatus,
    pub suspension_reason: Option<String>,
}

/// Read model over marketplace accounts.
pub struct AccountsProjection<S>
where
    S: KeyedStore<UserId, AccountReadModel>,
{
    store: S,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> AccountsProjection<S>
where
    S: KeyedStore<UserId, AccountReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, user_id: &UserId) -> Option<AccountReadModel> {
        self.store.get(user_id)
    }

    pub fn list(&self) -> Vec<AccountReadModel> {
        let mut rows = self.store.list();
        rows.sort_by(|a, b| a.display_name.cmp(&b.display_name));
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

        let ev: AccountEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match ev {
            AccountEvent::Registered(e) => {
                self.store.upsert(
                    e.account_id,
                    AccountReadModel {
                        user_id: e.account_id,
                        display_name: e.display_name,
                        status: AccountStatus::Active,
                        suspension_reason: None,
                    },
                );
            }
            AccountEvent::Suspended(e) => {
                if let Some(mut row) = self.store.get(&e.account_id) {
                    row.status = AccountStatus::Suspended;
                    row.suspension_reason = Some(e.reason);
                    self.store.upsert(e.account_id, row);
                }
            }
            AccountEvent::Reinstated(e) => {
                if let Some(mut row) = self.store.get(&e.account_id) {
                    row.status = AccountStatus::Active;
                    row.suspension_reason = None;
                    self.store.upsert(e.account_id, row);
                }
            }
        }

        self.update_cursor(aggregate_id, seq);
        Ok(())
    }
}
