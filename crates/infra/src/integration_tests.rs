//! End-to-end tests driving the marketplace service through the full
//! dispatch pipeline (in-memory store + bus + inline projections).

use std::sync::{Arc, Mutex};
use std::thread;

use chrono::Utc;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use tradebinder_auth::Role;
use tradebinder_catalog::{CardId, Grade};
use tradebinder_core::{AggregateId, DomainError, ExpectedVersion, UserId};
use tradebinder_events::{EventEnvelope, InMemoryEventBus};
use tradebinder_listings::{ListingEvent, ListingId, ListingStatus, PriceUpdated};
use tradebinder_sales::SaleState;

use crate::event_store::{
    EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent,
};
use crate::marketplace::{Marketplace, MarketplaceError};

type TestMarketplace =
    Marketplace<Arc<InMemoryEventStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

fn marketplace() -> TestMarketplace {
    Marketplace::new(
        Arc::new(InMemoryEventStore::new()),
        Arc::new(InMemoryEventBus::new()),
    )
}

fn card(raw: &str) -> CardId {
    CardId::new(raw).unwrap()
}

fn grade(value: u8) -> Grade {
    Grade::new(value).unwrap()
}

fn domain_err(err: MarketplaceError) -> DomainError {
    match err {
        MarketplaceError::Domain(e) => e,
        MarketplaceError::Infra(msg) => panic!("expected domain error, got infra: {msg}"),
    }
}

/// Seed a seller with an entry and an active listing; returns
/// `(seller, listing_id)`.
fn seeded_listing(m: &TestMarketplace, quantity: i64, price_cents: u64) -> (UserId, crate::projections::ListingReadModel) {
    let seller = UserId::new();
    m.add_entry(seller, card("base1-4"), grade(9), quantity, String::new())
        .unwrap();
    let listing = m
        .create_listing(seller, card("base1-4"), grade(9), quantity, price_cents, String::new())
        .unwrap();
    (seller, listing)
}

// ─────────────────────────────────────────────────────────────────────────
// Collection
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn add_entry_merges_same_card_and_grade() {
    let m = marketplace();
    let owner = UserId::new();

    let first = m
        .add_entry(owner, card("base1-4"), grade(9), 2, "binder A".into())
        .unwrap();
    let second = m
        .add_entry(owner, card("base1-4"), grade(9), 3, String::new())
        .unwrap();

    assert_eq!(first.entry_id, second.entry_id);
    assert_eq!(second.quantity, 5);
    assert_eq!(m.list_collection(owner).len(), 1);
}

#[test]
fn different_grades_are_distinct_entries() {
    let m = marketplace();
    let owner = UserId::new();

    m.add_entry(owner, card("base1-4"), grade(9), 1, String::new())
        .unwrap();
    m.add_entry(owner, card("base1-4"), grade(7), 1, String::new())
        .unwrap();

    assert_eq!(m.list_collection(owner).len(), 2);
}

#[test]
fn update_entry_to_zero_deletes_it() {
    let m = marketplace();
    let owner = UserId::new();
    let entry = m
        .add_entry(owner, card("base1-4"), grade(9), 2, String::new())
        .unwrap();

    let row = m
        .update_entry(owner, entry.entry_id, Some(0), None, None)
        .unwrap();
    assert!(row.is_none());
    assert!(m.list_collection(owner).is_empty());
    assert_eq!(
        domain_err(m.get_entry(owner, entry.entry_id).unwrap_err()),
        DomainError::NotFound
    );
}

#[test]
fn grade_edit_rekeys_the_entry() {
    let m = marketplace();
    let owner = UserId::new();
    let entry = m
        .add_entry(owner, card("base1-4"), grade(6), 4, String::new())
        .unwrap();

    m.update_entry(owner, entry.entry_id, None, Some(grade(8)), None)
        .unwrap();

    // Adding at the new grade merges with the regraded entry.
    let merged = m
        .add_entry(owner, card("base1-4"), grade(8), 1, String::new())
        .unwrap();
    assert_eq!(merged.entry_id, entry.entry_id);
    assert_eq!(merged.quantity, 5);

    // The old grade slot is free again.
    let fresh = m
        .add_entry(owner, card("base1-4"), grade(6), 1, String::new())
        .unwrap();
    assert_ne!(fresh.entry_id, entry.entry_id);
}

#[test]
fn update_someone_elses_entry_is_not_found() {
    let m = marketplace();
    let owner = UserId::new();
    let entry = m
        .add_entry(owner, card("base1-4"), grade(9), 1, String::new())
        .unwrap();

    let err = m
        .update_entry(UserId::new(), entry.entry_id, Some(5), None, None)
        .unwrap_err();
    assert_eq!(domain_err(err), DomainError::NotFound);
}

// ─────────────────────────────────────────────────────────────────────────
// Listings
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn create_listing_moves_units_out_of_collection() {
    let m = marketplace();
    let seller = UserId::new();
    m.add_entry(seller, card("base1-4"), grade(9), 5, String::new())
        .unwrap();

    let listing = m
        .create_listing(seller, card("base1-4"), grade(9), 3, 500, String::new())
        .unwrap();
    assert_eq!(listing.quantity, 3);
    assert_eq!(listing.price_cents, 500);

    let remaining = m.list_collection(seller);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].quantity, 2);
}

#[test]
fn single_card_listing_and_purchase_walkthrough() {
    let m = marketplace();
    let seller = UserId::new();
    let buyer = UserId::new();
    m.add_entry(seller, card("swsh1-1"), grade(7), 3, String::new())
        .unwrap();

    let listing = m
        .create_listing(seller, card("swsh1-1"), grade(7), 1, 500, String::new())
        .unwrap();
    assert_eq!(m.list_collection(seller)[0].quantity, 2);
    assert_eq!(listing.status.to_string(), "Active");

    let sale = m.purchase(buyer, listing.listing_id).unwrap();
    assert_eq!(sale.state, SaleState::AwaitingReceipt);
    assert_eq!(sale.price_total_cents, 500);
    assert_eq!(
        m.get_listing(listing.listing_id).unwrap().status.to_string(),
        "Sold"
    );
}

#[test]
fn listing_entire_entry_deletes_it() {
    let m = marketplace();
    let seller = UserId::new();
    m.add_entry(seller, card("base1-4"), grade(9), 3, String::new())
        .unwrap();

    m.create_listing(seller, card("base1-4"), grade(9), 3, 500, String::new())
        .unwrap();

    assert!(m.list_collection(seller).is_empty());
}

#[test]
fn create_listing_rejects_insufficient_inventory() {
    let m = marketplace();
    let seller = UserId::new();
    m.add_entry(seller, card("base1-4"), grade(9), 2, String::new())
        .unwrap();

    let err = m
        .create_listing(seller, card("base1-4"), grade(9), 5, 500, String::new())
        .unwrap_err();
    assert_eq!(
        domain_err(err),
        DomainError::InsufficientInventory {
            requested: 5,
            available: 2
        }
    );

    // Nothing was reserved.
    assert_eq!(m.list_collection(seller)[0].quantity, 2);
}

#[test]
fn create_listing_without_matching_entry_reports_zero_available() {
    let m = marketplace();
    let seller = UserId::new();

    let err = m
        .create_listing(seller, card("base1-4"), grade(9), 1, 500, String::new())
        .unwrap_err();
    assert_eq!(
        domain_err(err),
        DomainError::InsufficientInventory {
            requested: 1,
            available: 0
        }
    );
}

#[test]
fn create_listing_rejects_zero_price_before_reserving() {
    let m = marketplace();
    let seller = UserId::new();
    m.add_entry(seller, card("base1-4"), grade(9), 2, String::new())
        .unwrap();

    let err = m
        .create_listing(seller, card("base1-4"), grade(9), 1, 0, String::new())
        .unwrap_err();
    assert_eq!(domain_err(err), DomainError::InvalidPrice);
    assert_eq!(m.list_collection(seller)[0].quantity, 2);
}

#[test]
fn withdraw_restores_units() {
    let m = marketplace();
    let seller = UserId::new();
    m.add_entry(seller, card("base1-4"), grade(9), 5, String::new())
        .unwrap();
    let listing = m
        .create_listing(seller, card("base1-4"), grade(9), 3, 500, String::new())
        .unwrap();

    let withdrawn = m.withdraw_listing(seller, listing.listing_id).unwrap();
    assert_eq!(
        withdrawn.status,
        tradebinder_listings::ListingStatus::Withdrawn
    );

    assert_eq!(m.list_collection(seller)[0].quantity, 5);
    assert!(m.browse_listings().is_empty());
}

#[test]
fn withdraw_recreates_depleted_entry() {
    let m = marketplace();
    let seller = UserId::new();
    m.add_entry(seller, card("base1-4"), grade(9), 3, String::new())
        .unwrap();
    let listing = m
        .create_listing(seller, card("base1-4"), grade(9), 3, 500, String::new())
        .unwrap();
    assert!(m.list_collection(seller).is_empty());

    m.withdraw_listing(seller, listing.listing_id).unwrap();

    let restored = m.list_collection(seller);
    assert_eq!(restored.len(), 1);
    assert_eq!(restored[0].quantity, 3);
}

#[test]
fn withdraw_by_non_owner_is_unauthorized() {
    let m = marketplace();
    let (_, listing) = seeded_listing(&m, 1, 500);

    let err = m
        .withdraw_listing(UserId::new(), listing.listing_id)
        .unwrap_err();
    assert_eq!(domain_err(err), DomainError::Unauthorized);
}

#[test]
fn price_edit_after_withdrawal_is_rejected() {
    let m = marketplace();
    let (seller, listing) = seeded_listing(&m, 1, 500);
    m.withdraw_listing(seller, listing.listing_id).unwrap();

    let err = m
        .update_price(seller, listing.listing_id, 600)
        .unwrap_err();
    assert_eq!(domain_err(err), DomainError::ListingNotActive);
}

// ─────────────────────────────────────────────────────────────────────────
// Purchases and sale records
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn purchase_creates_sale_record_awaiting_receipt() {
    let m = marketplace();
    let (seller, listing) = seeded_listing(&m, 2, 500);
    let buyer = UserId::new();

    let sale = m.purchase(buyer, listing.listing_id).unwrap();
    assert_eq!(sale.buyer, buyer);
    assert_eq!(sale.seller, seller);
    assert_eq!(sale.quantity, 2);
    assert_eq!(sale.price_total_cents, 1000);
    assert_eq!(sale.state, SaleState::AwaitingReceipt);
    assert!(sale.rating.is_none());

    // The listing is gone from browse but its record remains.
    assert!(m.browse_listings().is_empty());
    assert_eq!(
        m.get_listing(listing.listing_id).unwrap().status,
        tradebinder_listings::ListingStatus::Sold
    );
}

#[test]
fn sale_price_snapshot_survives_later_price_edit_attempts() {
    let m = marketplace();
    let (seller, listing) = seeded_listing(&m, 1, 500);
    let sale = m.purchase(UserId::new(), listing.listing_id).unwrap();
    assert_eq!(sale.price_total_cents, 500);

    let err = m
        .update_price(seller, listing.listing_id, 900)
        .unwrap_err();
    assert_eq!(domain_err(err), DomainError::ListingNotActive);
    assert_eq!(
        m.get_sale(sale.sale_id).unwrap().price_total_cents,
        500
    );
}

#[test]
fn second_purchase_sees_listing_unavailable() {
    let m = marketplace();
    let (_, listing) = seeded_listing(&m, 1, 500);
    m.purchase(UserId::new(), listing.listing_id).unwrap();

    let err = m.purchase(UserId::new(), listing.listing_id).unwrap_err();
    assert_eq!(domain_err(err), DomainError::ListingUnavailable);
}

#[test]
fn purchasing_withdrawn_listing_is_unavailable() {
    let m = marketplace();
    let (seller, listing) = seeded_listing(&m, 1, 500);
    m.withdraw_listing(seller, listing.listing_id).unwrap();

    let err = m.purchase(UserId::new(), listing.listing_id).unwrap_err();
    assert_eq!(domain_err(err), DomainError::ListingUnavailable);
}

#[test]
fn seller_cannot_buy_own_listing() {
    let m = marketplace();
    let (seller, listing) = seeded_listing(&m, 1, 500);

    let err = m.purchase(seller, listing.listing_id).unwrap_err();
    assert!(matches!(domain_err(err), DomainError::Validation(_)));
}

#[test]
fn concurrent_purchases_have_exactly_one_winner() {
    let m = Arc::new(marketplace());
    let (_, listing) = seeded_listing(&m, 1, 500);
    let listing_id = listing.listing_id;

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let m = Arc::clone(&m);
            thread::spawn(move || m.purchase(UserId::new(), listing_id))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1, "exactly one concurrent purchase must win");

    let loser = results.into_iter().find(|r| r.is_err()).unwrap();
    assert_eq!(
        domain_err(loser.unwrap_err()),
        DomainError::ListingUnavailable
    );
}

/// Store that slips a committed event into a listing's stream right before
/// another writer's append, making that writer lose the optimistic
/// concurrency check exactly once.
struct ContendedStore {
    inner: InMemoryEventStore,
    ambush: Mutex<Option<UncommittedEvent>>,
}

impl ContendedStore {
    fn new() -> Self {
        Self {
            inner: InMemoryEventStore::new(),
            ambush: Mutex::new(None),
        }
    }

    fn arm(&self, event: UncommittedEvent) {
        *self.ambush.lock().unwrap() = Some(event);
    }
}

impl EventStore for ContendedStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let ambush = {
            let mut slot = self.ambush.lock().unwrap();
            match (slot.as_ref(), events.first()) {
                (Some(armed), Some(incoming)) if armed.aggregate_id == incoming.aggregate_id => {
                    slot.take()
                }
                _ => None,
            }
        };
        if let Some(event) = ambush {
            self.inner.append(vec![event], ExpectedVersion::Any)?;
        }
        self.inner.append(events, expected_version)
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.inner.load_stream(aggregate_id)
    }
}

type ContendedMarketplace =
    Marketplace<Arc<ContendedStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

fn contended_marketplace() -> (Arc<ContendedStore>, ContendedMarketplace) {
    let store = Arc::new(ContendedStore::new());
    let m = Marketplace::new(Arc::clone(&store), Arc::new(InMemoryEventBus::new()));
    (store, m)
}

fn price_edit_event(listing_id: ListingId, price_cents: u64) -> UncommittedEvent {
    let event = ListingEvent::PriceUpdated(PriceUpdated {
        listing_id,
        price_cents,
        occurred_at: Utc::now(),
    });
    UncommittedEvent::from_typed(
        listing_id.0,
        crate::projections::listings::AGGREGATE_TYPE,
        Uuid::now_v7(),
        &event,
    )
    .unwrap()
}

#[test]
fn purchase_that_loses_the_race_to_a_price_edit_still_completes() {
    let (store, m) = contended_marketplace();
    let seller = UserId::new();
    m.add_entry(seller, card("base1-4"), grade(9), 1, String::new())
        .unwrap();
    let listing = m
        .create_listing(seller, card("base1-4"), grade(9), 1, 500, String::new())
        .unwrap();

    // A price edit lands between the purchase's stream read and its append.
    store.arm(price_edit_event(listing.listing_id, 700));

    let sale = m.purchase(UserId::new(), listing.listing_id).unwrap();

    // The winning write was not a sale or withdrawal, so the purchase goes
    // through on retry, at the edited price.
    assert_eq!(sale.state, SaleState::AwaitingReceipt);
    assert_eq!(sale.price_total_cents, 700);
    assert_eq!(
        m.get_listing(listing.listing_id).unwrap().status,
        ListingStatus::Sold
    );
}

#[test]
fn withdrawal_that_loses_the_race_to_a_price_edit_still_completes() {
    let (store, m) = contended_marketplace();
    let seller = UserId::new();
    m.add_entry(seller, card("base1-4"), grade(9), 2, String::new())
        .unwrap();
    let listing = m
        .create_listing(seller, card("base1-4"), grade(9), 2, 500, String::new())
        .unwrap();

    store.arm(price_edit_event(listing.listing_id, 900));

    let withdrawn = m.withdraw_listing(seller, listing.listing_id).unwrap();
    assert_eq!(withdrawn.status, ListingStatus::Withdrawn);

    let restored = m.list_collection(seller);
    assert_eq!(restored.len(), 1);
    assert_eq!(restored[0].quantity, 2);
}

// ─────────────────────────────────────────────────────────────────────────
// Fulfilment state machine
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn transition_walk_awaiting_to_shipped() {
    let m = marketplace();
    let (_, listing) = seeded_listing(&m, 1, 500);
    let sale = m.purchase(UserId::new(), listing.listing_id).unwrap();

    let sale = m
        .request_transition(sale.sale_id, SaleState::Received)
        .unwrap();
    assert_eq!(sale.state, SaleState::Received);

    let sale = m
        .request_transition(sale.sale_id, SaleState::Shipped)
        .unwrap();
    assert_eq!(sale.state, SaleState::Shipped);
}

#[test]
fn same_state_transition_is_a_no_op() {
    let m = marketplace();
    let (_, listing) = seeded_listing(&m, 1, 500);
    let sale = m.purchase(UserId::new(), listing.listing_id).unwrap();
    let before = m.get_sale(sale.sale_id).unwrap();

    let after = m
        .request_transition(sale.sale_id, SaleState::AwaitingReceipt)
        .unwrap();
    assert_eq!(after, before);
}

#[test]
fn skipping_received_is_rejected() {
    let m = marketplace();
    let (_, listing) = seeded_listing(&m, 1, 500);
    let sale = m.purchase(UserId::new(), listing.listing_id).unwrap();

    let err = m
        .request_transition(sale.sale_id, SaleState::Shipped)
        .unwrap_err();
    assert!(matches!(
        domain_err(err),
        DomainError::IllegalStateTransition { .. }
    ));
}

#[test]
fn cancelled_is_terminal() {
    let m = marketplace();
    let (_, listing) = seeded_listing(&m, 1, 500);
    let sale = m.purchase(UserId::new(), listing.listing_id).unwrap();

    m.request_transition(sale.sale_id, SaleState::Cancelled)
        .unwrap();

    let err = m
        .request_transition(sale.sale_id, SaleState::Received)
        .unwrap_err();
    assert!(matches!(
        domain_err(err),
        DomainError::IllegalStateTransition { .. }
    ));
}

#[test]
fn concurrent_transitions_on_one_sale_are_serialized() {
    let m = Arc::new(marketplace());
    let (_, listing) = seeded_listing(&m, 1, 500);
    let sale = m.purchase(UserId::new(), listing.listing_id).unwrap();
    m.request_transition(sale.sale_id, SaleState::Received)
        .unwrap();

    let sale_id = sale.sale_id;
    let ship = {
        let m = Arc::clone(&m);
        thread::spawn(move || m.request_transition(sale_id, SaleState::Shipped))
    };
    let cancel = {
        let m = Arc::clone(&m);
        thread::spawn(move || m.request_transition(sale_id, SaleState::Cancelled))
    };
    let ship = ship.join().unwrap();
    let cancel = cancel.join().unwrap();

    // Appends to one record serialize: whichever write commits first is
    // either followed cleanly or rejects the other whole.
    let final_state = m.get_sale(sale_id).unwrap().state;
    match (&ship, &cancel) {
        // Shipped then Cancelled is a legal walk; the reverse is not, so
        // two successes always end Cancelled.
        (Ok(_), Ok(_)) => assert_eq!(final_state, SaleState::Cancelled),
        (Ok(_), Err(_)) => assert_eq!(final_state, SaleState::Shipped),
        (Err(_), Ok(_)) => assert_eq!(final_state, SaleState::Cancelled),
        (Err(_), Err(_)) => panic!("one of the two writers must commit"),
    }

    for rejected in [ship, cancel].into_iter().filter_map(Result::err) {
        match domain_err(rejected) {
            DomainError::Conflict(_) | DomainError::IllegalStateTransition { .. } => {}
            other => panic!("unexpected rejection: {other:?}"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Ratings
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn rating_blocked_until_received() {
    let m = marketplace();
    let (_, listing) = seeded_listing(&m, 1, 500);
    let buyer = UserId::new();
    let sale = m.purchase(buyer, listing.listing_id).unwrap();

    let err = m
        .submit_rating(buyer, sale.sale_id, 8, None)
        .unwrap_err();
    assert_eq!(domain_err(err), DomainError::RatingNotAllowed);
}

#[test]
fn rating_allowed_in_received_and_shipped() {
    let m = marketplace();

    for walk_to_shipped in [false, true] {
        let (_, listing) = seeded_listing(&m, 1, 500);
        let buyer = UserId::new();
        let sale = m.purchase(buyer, listing.listing_id).unwrap();
        m.request_transition(sale.sale_id, SaleState::Received)
            .unwrap();
        if walk_to_shipped {
            m.request_transition(sale.sale_id, SaleState::Shipped)
                .unwrap();
        }

        let rated = m
            .submit_rating(buyer, sale.sale_id, 9, Some("fast shipping".into()))
            .unwrap();
        let rating = rated.rating.unwrap();
        assert_eq!(rating.score, 9);
        assert_eq!(rating.rater, buyer);
    }
}

#[test]
fn rating_blocked_after_cancellation() {
    let m = marketplace();
    let (_, listing) = seeded_listing(&m, 1, 500);
    let buyer = UserId::new();
    let sale = m.purchase(buyer, listing.listing_id).unwrap();
    m.request_transition(sale.sale_id, SaleState::Cancelled)
        .unwrap();

    let err = m
        .submit_rating(buyer, sale.sale_id, 5, None)
        .unwrap_err();
    assert_eq!(domain_err(err), DomainError::RatingNotAllowed);
}

#[test]
fn only_the_buyer_may_rate() {
    let m = marketplace();
    let (seller, listing) = seeded_listing(&m, 1, 500);
    let buyer = UserId::new();
    let sale = m.purchase(buyer, listing.listing_id).unwrap();
    m.request_transition(sale.sale_id, SaleState::Received)
        .unwrap();

    let err = m.submit_rating(seller, sale.sale_id, 10, None).unwrap_err();
    assert_eq!(domain_err(err), DomainError::NotBuyer);
}

#[test]
fn score_above_ten_is_invalid() {
    let m = marketplace();
    let (_, listing) = seeded_listing(&m, 1, 500);
    let buyer = UserId::new();
    let sale = m.purchase(buyer, listing.listing_id).unwrap();
    m.request_transition(sale.sale_id, SaleState::Received)
        .unwrap();

    let err = m.submit_rating(buyer, sale.sale_id, 11, None).unwrap_err();
    assert_eq!(domain_err(err), DomainError::InvalidScore);
}

#[test]
fn second_rating_is_rejected() {
    let m = marketplace();
    let (_, listing) = seeded_listing(&m, 1, 500);
    let buyer = UserId::new();
    let sale = m.purchase(buyer, listing.listing_id).unwrap();
    m.request_transition(sale.sale_id, SaleState::Received)
        .unwrap();
    m.submit_rating(buyer, sale.sale_id, 9, None).unwrap();

    let err = m.submit_rating(buyer, sale.sale_id, 2, None).unwrap_err();
    assert_eq!(domain_err(err), DomainError::RatingNotAllowed);
}

#[test]
fn seller_rating_averages_scores() {
    let m = marketplace();
    let seller = UserId::new();
    m.add_entry(seller, card("base1-4"), grade(9), 2, String::new())
        .unwrap();

    for score in [6u8, 10] {
        let listing = m
            .create_listing(seller, card("base1-4"), grade(9), 1, 500, String::new())
            .unwrap();
        let buyer = UserId::new();
        let sale = m.purchase(buyer, listing.listing_id).unwrap();
        m.request_transition(sale.sale_id, SaleState::Received)
            .unwrap();
        m.submit_rating(buyer, sale.sale_id, score, None).unwrap();
    }

    assert_eq!(m.seller_rating(seller), Some(8.0));
}

// ─────────────────────────────────────────────────────────────────────────
// Accounts and suspension
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn suspended_seller_cannot_list() {
    let m = marketplace();
    let seller = UserId::new();
    m.register_account(seller, "Mallory", vec![Role::trader()])
        .unwrap();
    m.add_entry(seller, card("base1-4"), grade(9), 1, String::new())
        .unwrap();
    m.suspend_account(seller, "chargeback abuse").unwrap();

    let err = m
        .create_listing(seller, card("base1-4"), grade(9), 1, 500, String::new())
        .unwrap_err();
    assert_eq!(domain_err(err), DomainError::Unauthorized);
}

#[test]
fn suspended_buyer_cannot_purchase_until_reinstated() {
    let m = marketplace();
    let (_, listing) = seeded_listing(&m, 1, 500);
    let buyer = UserId::new();
    m.register_account(buyer, "Bob", vec![Role::trader()])
        .unwrap();
    m.suspend_account(buyer, "payment fraud").unwrap();

    let err = m.purchase(buyer, listing.listing_id).unwrap_err();
    assert_eq!(domain_err(err), DomainError::Unauthorized);

    m.reinstate_account(buyer).unwrap();
    let sale = m.purchase(buyer, listing.listing_id).unwrap();
    assert_eq!(sale.buyer, buyer);
}

#[test]
fn double_suspension_is_rejected() {
    let m = marketplace();
    let user = UserId::new();
    m.register_account(user, "Alice", vec![Role::trader()])
        .unwrap();
    m.suspend_account(user, "spam").unwrap();

    let err = m.suspend_account(user, "again").unwrap_err();
    assert!(matches!(
        domain_err(err),
        DomainError::InvariantViolation(_)
    ));
}

#[test]
fn sales_history_lists_both_parties_newest_first() {
    let m = marketplace();
    let (seller, listing) = seeded_listing(&m, 1, 500);
    let buyer = UserId::new();
    let sale = m.purchase(buyer, listing.listing_id).unwrap();

    let for_buyer = m.list_sales_for(buyer);
    let for_seller = m.list_sales_for(seller);
    assert_eq!(for_buyer.len(), 1);
    assert_eq!(for_seller.len(), 1);
    assert_eq!(for_buyer[0].sale_id, sale.sale_id);
    assert!(m.list_sales_for(UserId::new()).is_empty());
}
