//! Marketplace application service.
//!
//! Single synchronous entry point for every operation the HTTP layer
//! exposes. Cross-aggregate operations (listing creation, withdrawal,
//! purchase) are composed here: validate everything up front, dispatch the
//! constituent commands, and compensate if a later step fails so the caller
//! observes all-or-nothing behavior.
//!
//! Committed events are applied to the projections inline, which gives
//! read-your-writes on the service's own read models. The same events also
//! go out on the bus; projection cursors make double application a no-op.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde_json::Value as JsonValue;
use thiserror::Error;

use tradebinder_auth::{
    Account, AccountCommand, RegisterAccount, ReinstateAccount, Role, SuspendAccount,
};
use tradebinder_catalog::{CardId, Grade};
use tradebinder_collection::{
    AddEntry, CollectionCommand, CollectionEntry, EntryId, ReserveUnits, RestoreUnits, UpdateEntry,
};
use tradebinder_core::{AggregateId, DomainError, UserId};
use tradebinder_events::{EventBus, EventEnvelope};
use tradebinder_listings::{
    Listing, ListingCommand, ListingEvent, ListingId, ListingStatus, MarkSold, OpenListing,
    UpdatePrice, WithdrawListing,
};
use tradebinder_sales::{
    RecordPurchase, RequestTransition, SaleCommand, SaleId, SaleRecord, SaleState, SubmitRating,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, StoredEvent};
use crate::projections::{
    AccountReadModel, AccountsProjection, CollectionEntriesProjection, CollectionEntryReadModel,
    ListingReadModel, ListingsProjection, ProjectionError, SaleRecordReadModel,
    SaleRecordsProjection, accounts, collection_entries, listings, sale_records,
};
use crate::read_model::InMemoryKeyedStore;

#[derive(Debug, Error)]
pub enum MarketplaceError {
    /// Deterministic domain rejection; maps onto the HTTP error taxonomy.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Infrastructure failure (store, bus, projection).
    #[error("infrastructure failure: {0}")]
    Infra(String),
}

type EntryRows = Arc<InMemoryKeyedStore<EntryId, CollectionEntryReadModel>>;
type ListingRows = Arc<InMemoryKeyedStore<ListingId, ListingReadModel>>;
type SaleRows = Arc<InMemoryKeyedStore<SaleId, SaleRecordReadModel>>;
type AccountRows = Arc<InMemoryKeyedStore<UserId, AccountReadModel>>;

/// The marketplace service: accounts, collections, listings, sales.
pub struct Marketplace<S, B> {
    dispatcher: CommandDispatcher<S, B>,
    // Serializes read-model application so cursor checks and the apply they
    // guard happen as one step even when callers race.
    projection_gate: Mutex<()>,
    collection: CollectionEntriesProjection<EntryRows>,
    listings: ListingsProjection<ListingRows>,
    sales: SaleRecordsProjection<SaleRows>,
    accounts: AccountsProjection<AccountRows>,
}

impl<S, B> Marketplace<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(store: S, bus: B) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(store, bus),
            projection_gate: Mutex::new(()),
            collection: CollectionEntriesProjection::new(Arc::new(InMemoryKeyedStore::new())),
            listings: ListingsProjection::new(Arc::new(InMemoryKeyedStore::new())),
            sales: SaleRecordsProjection::new(Arc::new(InMemoryKeyedStore::new())),
            accounts: AccountsProjection::new(Arc::new(InMemoryKeyedStore::new())),
        }
    }

    fn project(&self, committed: &[StoredEvent]) -> Result<(), MarketplaceError> {
        let _gate = self.lock_projections()?;
        for stored in committed {
            match self.apply_to_read_models(&stored.to_envelope()) {
                Ok(()) => {}
                // A concurrent writer committed ahead of us and we never saw
                // its events; fold in the whole stream. The cursors skip
                // whatever was already applied.
                Err(ProjectionError::NonMonotonicSequence { .. }) => {
                    self.replay(stored.aggregate_id)?;
                }
                Err(e) => return Err(MarketplaceError::Infra(e.to_string())),
            }
        }
        Ok(())
    }

    fn lock_projections(&self) -> Result<MutexGuard<'_, ()>, MarketplaceError> {
        self.projection_gate
            .lock()
            .map_err(|_| MarketplaceError::Infra("projection gate poisoned".into()))
    }

    fn apply_to_read_models(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        self.collection.apply_envelope(envelope)?;
        self.listings.apply_envelope(envelope)?;
        self.sales.apply_envelope(envelope)?;
        self.accounts.apply_envelope(envelope)?;
        Ok(())
    }

    /// Replay the aggregate's full stream into the read models. Callers must
    /// hold the projection gate.
    fn replay(&self, aggregate_id: AggregateId) -> Result<(), MarketplaceError> {
        let stream = self
            .dispatcher
            .stream(aggregate_id)
            .map_err(dispatch_to_domain)?;
        for stored in &stream {
            self.apply_to_read_models(&stored.to_envelope())
                .map_err(|e| MarketplaceError::Infra(e.to_string()))?;
        }
        Ok(())
    }

    /// Suspended accounts can browse but cannot transact. Users without a
    /// registered account are treated as active.
    fn ensure_not_suspended(&self, user: UserId) -> Result<(), MarketplaceError> {
        match self.accounts.get(&user) {
            Some(row) if row.status == tradebinder_auth::AccountStatus::Suspended => {
                Err(DomainError::Unauthorized.into())
            }
            _ => Ok(()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Accounts
    // ─────────────────────────────────────────────────────────────────────

    pub fn register_account(
        &self,
        user_id: UserId,
        display_name: &str,
        roles: Vec<Role>,
    ) -> Result<AccountReadModel, MarketplaceError> {
        let committed = self
            .dispatcher
            .dispatch::<Account>(
                user_id.into(),
                accounts::AGGREGATE_TYPE,
                AccountCommand::Register(RegisterAccount {
                    account_id: user_id,
                    display_name: display_name.to_string(),
                    roles,
                    occurred_at: Utc::now(),
                }),
                |id| Account::empty(id.into()),
            )
            .map_err(dispatch_to_domain)?;
        self.project(&committed)?;

        tracing::info!(%user_id, "account registered");
        self.accounts
            .get(&user_id)
            .ok_or_else(|| MarketplaceError::Infra("account row missing after write".into()))
    }

    pub fn suspend_account(
        &self,
        user_id: UserId,
        reason: &str,
    ) -> Result<AccountReadModel, MarketplaceError> {
        let committed = self
            .dispatcher
            .dispatch::<Account>(
                user_id.into(),
                accounts::AGGREGATE_TYPE,
                AccountCommand::Suspend(SuspendAccount {
                    account_id: user_id,
                    reason: reason.to_string(),
                    occurred_at: Utc::now(),
                }),
                |id| Account::empty(id.into()),
            )
            .map_err(dispatch_to_domain)?;
        self.project(&committed)?;

        tracing::info!(%user_id, reason, "account suspended");
        self.accounts
            .get(&user_id)
            .ok_or_else(|| MarketplaceError::Infra("account row missing after write".into()))
    }

    pub fn reinstate_account(&self, user_id: UserId) -> Result<AccountReadModel, MarketplaceError> {
        let committed = self
            .dispatcher
            .dispatch::<Account>(
                user_id.into(),
                accounts::AGGREGATE_TYPE,
                AccountCommand::Reinstate(ReinstateAccount {
                    account_id: user_id,
                    occurred_at: Utc::now(),
                }),
                |id| Account::empty(id.into()),
            )
            .map_err(dispatch_to_domain)?;
        self.project(&committed)?;

        tracing::info!(%user_id, "account reinstated");
        self.accounts
            .get(&user_id)
            .ok_or_else(|| MarketplaceError::Infra("account row missing after write".into()))
    }

    pub fn get_account(&self, user_id: UserId) -> Option<AccountReadModel> {
        self.accounts.get(&user_id)
    }

    pub fn list_accounts(&self) -> Vec<AccountReadModel> {
        self.accounts.list()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Collection
    // ─────────────────────────────────────────────────────────────────────

    /// Add cards to the owner's collection. If an entry for
    /// `(owner, card, grade)` already exists, the quantities merge.
    pub fn add_entry(
        &self,
        owner: UserId,
        card_id: CardId,
        grade: Grade,
        quantity: i64,
        notes: String,
    ) -> Result<CollectionEntryReadModel, MarketplaceError> {
        let entry_id = match self.collection.find_entry(owner, &card_id, grade) {
            Some(existing) => {
                let committed = self
                    .dispatch_collection(
                        existing.entry_id,
                        CollectionCommand::RestoreUnits(RestoreUnits {
                            entry_id: existing.entry_id,
                            quantity,
                            occurred_at: Utc::now(),
                        }),
                    )
                    .map_err(dispatch_to_domain)?;
                self.project(&committed)?;
                existing.entry_id
            }
            None => {
                let entry_id = EntryId::new(AggregateId::new());
                let committed = self
                    .dispatch_collection(
                        entry_id,
                        CollectionCommand::AddEntry(AddEntry {
                            entry_id,
                            owner,
                            card_id,
                            grade,
                            quantity,
                            notes,
                            occurred_at: Utc::now(),
                        }),
                    )
                    .map_err(dispatch_to_domain)?;
                self.project(&committed)?;
                entry_id
            }
        };

        self.collection
            .get(&entry_id)
            .ok_or_else(|| MarketplaceError::Infra("entry row missing after write".into()))
    }

    /// Edit quantity/grade/notes. Editing quantity to zero deletes the
    /// entry, in which case `None` is returned.
    pub fn update_entry(
        &self,
        owner: UserId,
        entry_id: EntryId,
        quantity: Option<i64>,
        grade: Option<Grade>,
        notes: Option<String>,
    ) -> Result<Option<CollectionEntryReadModel>, MarketplaceError> {
        let row = self
            .collection
            .get(&entry_id)
            .ok_or(DomainError::NotFound)?;
        if row.owner != owner {
            // Do not leak other users' entry ids.
            return Err(DomainError::NotFound.into());
        }

        let committed = self
            .dispatch_collection(
                entry_id,
                CollectionCommand::UpdateEntry(UpdateEntry {
                    entry_id,
                    quantity,
                    grade,
                    notes,
                    occurred_at: Utc::now(),
                }),
            )
            .map_err(dispatch_to_domain)?;
        self.project(&committed)?;

        Ok(self.collection.get(&entry_id))
    }

    pub fn get_entry(
        &self,
        owner: UserId,
        entry_id: EntryId,
    ) -> Result<CollectionEntryReadModel, MarketplaceError> {
        match self.collection.get(&entry_id) {
            Some(row) if row.owner == owner => Ok(row),
            _ => Err(DomainError::NotFound.into()),
        }
    }

    pub fn list_collection(&self, owner: UserId) -> Vec<CollectionEntryReadModel> {
        self.collection.list_for_owner(owner)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Listings
    // ─────────────────────────────────────────────────────────────────────

    /// Open a listing backed by the seller's collection: units move out of
    /// the matching entry into the listing atomically (from the caller's
    /// point of view).
    pub fn create_listing(
        &self,
        seller: UserId,
        card_id: CardId,
        grade: Grade,
        quantity: i64,
        price_cents: u64,
        notes: String,
    ) -> Result<ListingReadModel, MarketplaceError> {
        self.ensure_not_suspended(seller)?;

        // Validate the listing before touching inventory so a rejection
        // cannot leave units reserved.
        if quantity < 1 {
            return Err(DomainError::validation("quantity must be at least 1").into());
        }
        if price_cents == 0 {
            return Err(DomainError::InvalidPrice.into());
        }

        let entry = self
            .collection
            .find_entry(seller, &card_id, grade)
            .ok_or(DomainError::InsufficientInventory {
                requested: quantity,
                available: 0,
            })?;

        let reserved = self
            .dispatch_collection(
                entry.entry_id,
                CollectionCommand::ReserveUnits(ReserveUnits {
                    entry_id: entry.entry_id,
                    quantity,
                    occurred_at: Utc::now(),
                }),
            )
            .map_err(dispatch_to_domain)?;
        self.project(&reserved)?;

        let listing_id = ListingId::new(AggregateId::new());
        let opened = self.dispatch_listing(
            listing_id,
            ListingCommand::Open(OpenListing {
                listing_id,
                seller,
                card_id,
                grade,
                quantity,
                price_cents,
                notes,
                occurred_at: Utc::now(),
            }),
        );

        let opened = match opened {
            Ok(committed) => committed,
            Err(err) => {
                // Hand the reserved units back before surfacing the error.
                let compensation = self.dispatch_collection(
                    entry.entry_id,
                    CollectionCommand::RestoreUnits(RestoreUnits {
                        entry_id: entry.entry_id,
                        quantity,
                        occurred_at: Utc::now(),
                    }),
                );
                match compensation {
                    Ok(committed) => self.project(&committed)?,
                    Err(comp_err) => {
                        tracing::error!(%listing_id, error = %comp_err, "inventory compensation failed");
                    }
                }
                return Err(dispatch_to_domain(err));
            }
        };
        self.project(&opened)?;

        tracing::info!(%listing_id, %seller, quantity, price_cents, "listing opened");
        self.listings
            .get(&listing_id)
            .ok_or_else(|| MarketplaceError::Infra("listing row missing after write".into()))
    }

    pub fn update_price(
        &self,
        seller: UserId,
        listing_id: ListingId,
        price_cents: u64,
    ) -> Result<ListingReadModel, MarketplaceError> {
        let row = self.listings.get(&listing_id).ok_or(DomainError::NotFound)?;
        if row.seller != seller {
            return Err(DomainError::Unauthorized.into());
        }

        let committed = self
            .dispatch_listing(
                listing_id,
                ListingCommand::UpdatePrice(UpdatePrice {
                    listing_id,
                    price_cents,
                    occurred_at: Utc::now(),
                }),
            )
            .map_err(dispatch_to_domain)?;
        self.project(&committed)?;

        self.listings
            .get(&listing_id)
            .ok_or_else(|| MarketplaceError::Infra("listing row missing after write".into()))
    }

    /// Withdraw an active listing and restore its units to the seller's
    /// collection (re-creating the entry if it was depleted meanwhile).
    pub fn withdraw_listing(
        &self,
        seller: UserId,
        listing_id: ListingId,
    ) -> Result<ListingReadModel, MarketplaceError> {
        let row = self.listings.get(&listing_id).ok_or(DomainError::NotFound)?;
        if row.seller != seller {
            return Err(DomainError::Unauthorized.into());
        }

        let committed = self.dispatch_listing_contended(
            listing_id,
            || {
                ListingCommand::Withdraw(WithdrawListing {
                    listing_id,
                    occurred_at: Utc::now(),
                })
            },
            DomainError::ListingNotActive,
        )?;
        self.project(&committed)?;

        // Restore the units carried by the withdrawal event.
        for stored in &committed {
            let ev: ListingEvent = serde_json::from_value(stored.payload.clone())
                .map_err(|e| MarketplaceError::Infra(e.to_string()))?;
            if let ListingEvent::Withdrawn(w) = ev {
                self.restore_units(w.seller, w.card_id, w.grade, w.quantity)?;
            }
        }

        tracing::info!(%listing_id, %seller, "listing withdrawn");
        self.listings
            .get(&listing_id)
            .ok_or_else(|| MarketplaceError::Infra("listing row missing after write".into()))
    }

    /// Find-or-create the owner's entry for `(card, grade)` and add units.
    fn restore_units(
        &self,
        owner: UserId,
        card_id: CardId,
        grade: Grade,
        quantity: i64,
    ) -> Result<(), MarketplaceError> {
        let committed = match self.collection.find_entry(owner, &card_id, grade) {
            Some(entry) => self
                .dispatch_collection(
                    entry.entry_id,
                    CollectionCommand::RestoreUnits(RestoreUnits {
                        entry_id: entry.entry_id,
                        quantity,
                        occurred_at: Utc::now(),
                    }),
                )
                .map_err(dispatch_to_domain)?,
            None => {
                // Entry vanished (depleted); a fresh aggregate takes over
                // the logical identity.
                let entry_id = EntryId::new(AggregateId::new());
                self.dispatch_collection(
                    entry_id,
                    CollectionCommand::AddEntry(AddEntry {
                        entry_id,
                        owner,
                        card_id,
                        grade,
                        quantity,
                        notes: String::new(),
                        occurred_at: Utc::now(),
                    }),
                )
                .map_err(dispatch_to_domain)?
            }
        };
        self.project(&committed)
    }

    pub fn get_listing(&self, listing_id: ListingId) -> Option<ListingReadModel> {
        self.listings.get(&listing_id)
    }

    pub fn browse_listings(&self) -> Vec<ListingReadModel> {
        self.listings.list_active()
    }

    pub fn list_seller_listings(&self, seller: UserId) -> Vec<ListingReadModel> {
        self.listings.list_for_seller(seller)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Sales
    // ─────────────────────────────────────────────────────────────────────

    /// Buy a listing. Exactly one of two concurrent purchases wins; the
    /// loser retries against the committed sale and gets
    /// `ListingUnavailable`, indistinguishable from arriving after it. A
    /// purchase that merely lost the race to a price edit retries and
    /// completes at the edited price.
    pub fn purchase(
        &self,
        buyer: UserId,
        listing_id: ListingId,
    ) -> Result<SaleRecordReadModel, MarketplaceError> {
        self.ensure_not_suspended(buyer)?;

        let committed = self.dispatch_listing_contended(
            listing_id,
            || {
                ListingCommand::MarkSold(MarkSold {
                    listing_id,
                    buyer,
                    occurred_at: Utc::now(),
                })
            },
            DomainError::ListingUnavailable,
        )?;
        self.project(&committed)?;

        // The Sold event carries everything the sale record needs.
        let mut sale_row = None;
        for stored in &committed {
            let ev: ListingEvent = serde_json::from_value(stored.payload.clone())
                .map_err(|e| MarketplaceError::Infra(e.to_string()))?;
            if let ListingEvent::Sold(sold) = ev {
                let sale_id = SaleId::new(AggregateId::new());
                let recorded = self
                    .dispatch_sale(
                        sale_id,
                        SaleCommand::RecordPurchase(RecordPurchase {
                            sale_id,
                            listing_id: sold.listing_id,
                            buyer: sold.buyer,
                            seller: sold.seller,
                            quantity: sold.quantity,
                            price_cents: sold.price_cents,
                            occurred_at: sold.occurred_at,
                        }),
                    )
                    .map_err(dispatch_to_domain)?;
                self.project(&recorded)?;
                sale_row = self.sales.get(&sale_id);
                tracing::info!(%listing_id, %sale_id, %buyer, "purchase completed");
            }
        }

        sale_row.ok_or_else(|| MarketplaceError::Infra("sale row missing after purchase".into()))
    }

    /// Admin-driven fulfilment transition. A same-state request is accepted
    /// without recording anything.
    pub fn request_transition(
        &self,
        sale_id: SaleId,
        target: SaleState,
    ) -> Result<SaleRecordReadModel, MarketplaceError> {
        let committed = self
            .dispatch_sale(
                sale_id,
                SaleCommand::RequestTransition(RequestTransition {
                    sale_id,
                    target,
                    occurred_at: Utc::now(),
                }),
            )
            .map_err(dispatch_to_domain)?;
        self.project(&committed)?;

        self.sales
            .get(&sale_id)
            .ok_or_else(|| DomainError::NotFound.into())
    }

    pub fn submit_rating(
        &self,
        rater: UserId,
        sale_id: SaleId,
        score: u8,
        comment: Option<String>,
    ) -> Result<SaleRecordReadModel, MarketplaceError> {
        self.ensure_not_suspended(rater)?;

        let committed = self
            .dispatch_sale(
                sale_id,
                SaleCommand::SubmitRating(SubmitRating {
                    sale_id,
                    rater,
                    score,
                    comment,
                    occurred_at: Utc::now(),
                }),
            )
            .map_err(dispatch_to_domain)?;
        self.project(&committed)?;

        self.sales
            .get(&sale_id)
            .ok_or_else(|| DomainError::NotFound.into())
    }

    pub fn get_sale(&self, sale_id: SaleId) -> Option<SaleRecordReadModel> {
        self.sales.get(&sale_id)
    }

    pub fn list_sales_for(&self, user: UserId) -> Vec<SaleRecordReadModel> {
        self.sales.list_for_user(user)
    }

    /// Full sale ledger, newest first (admin oversight).
    pub fn list_all_sales(&self) -> Vec<SaleRecordReadModel> {
        self.sales.list_all()
    }

    pub fn seller_rating(&self, seller: UserId) -> Option<f64> {
        self.sales.seller_rating(seller)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Dispatch helpers
    // ─────────────────────────────────────────────────────────────────────

    fn dispatch_collection(
        &self,
        entry_id: EntryId,
        command: CollectionCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher.dispatch::<CollectionEntry>(
            entry_id.0,
            collection_entries::AGGREGATE_TYPE,
            command,
            |id| CollectionEntry::empty(EntryId::new(id)),
        )
    }

    fn dispatch_listing(
        &self,
        listing_id: ListingId,
        command: ListingCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher.dispatch::<Listing>(
            listing_id.0,
            listings::AGGREGATE_TYPE,
            command,
            |id| Listing::empty(ListingId::new(id)),
        )
    }

    /// Dispatch a listing command, retrying when the append loses the
    /// optimistic-concurrency race.
    ///
    /// Losing the compare-and-set says nothing about the listing itself:
    /// the winning write may have been a plain price edit. Each retry
    /// reloads the stream, so the aggregate decides against the winner's
    /// state and deterministic rejections (sold, withdrawn) surface as the
    /// right domain error. `gone` is the verdict when the listing turns out
    /// to be inactive after the retries are spent.
    fn dispatch_listing_contended(
        &self,
        listing_id: ListingId,
        make_command: impl Fn() -> ListingCommand,
        gone: DomainError,
    ) -> Result<Vec<StoredEvent>, MarketplaceError> {
        const MAX_ATTEMPTS: u32 = 3;

        let mut last_conflict = String::new();
        for _ in 0..MAX_ATTEMPTS {
            match self.dispatch_listing(listing_id, make_command()) {
                Ok(committed) => return Ok(committed),
                Err(DispatchError::Concurrency(msg)) => last_conflict = msg,
                Err(other) => return Err(dispatch_to_domain(other)),
            }
        }

        // Persistently contended. Catch the read model up before deciding
        // what to tell the caller.
        {
            let _gate = self.lock_projections()?;
            self.replay(listing_id.0)?;
        }
        match self.listings.get(&listing_id) {
            Some(row) if row.status == ListingStatus::Active => {
                Err(DomainError::conflict(last_conflict).into())
            }
            _ => Err(gone.into()),
        }
    }

    fn dispatch_sale(
        &self,
        sale_id: SaleId,
        command: SaleCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher
            .dispatch::<SaleRecord>(sale_id.0, sale_records::AGGREGATE_TYPE, command, |id| {
                SaleRecord::empty(SaleId::new(id))
            })
    }
}

fn dispatch_to_domain(err: DispatchError) -> MarketplaceError {
    match err {
        DispatchError::Domain(domain) => MarketplaceError::Domain(domain),
        DispatchError::Concurrency(msg) => MarketplaceError::Domain(DomainError::conflict(msg)),
        other => MarketplaceError::Infra(other.to_string()),
    }
}
