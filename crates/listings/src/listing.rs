use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tradebinder_catalog::{CardId, Grade};
use tradebinder_core::{Aggregate, AggregateId, AggregateRoot, DomainError, UserId};
use tradebinder_events::Event;

/// Listing identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(pub AggregateId);

impl ListingId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ListingId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Listing lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    /// Open for purchase; price edits and withdrawal allowed.
    #[default]
    Active,
    /// Withdrawn by the seller. Terminal.
    Withdrawn,
    /// Bought. Terminal.
    Sold,
}

impl core::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ListingStatus::Active => write!(f, "Active"),
            ListingStatus::Withdrawn => write!(f, "Withdrawn"),
            ListingStatus::Sold => write!(f, "Sold"),
        }
    }
}

/// Aggregate root: Listing.
///
/// Quantity and card identity are fixed at creation; only the price may
/// change, and only while the listing is Active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    id: ListingId,
    seller: Option<UserId>,
    card_id: Option<CardId>,
    grade: Option<Grade>,
    quantity: i64,
    price_cents: u64,
    notes: String,
    status: ListingStatus,
    version: u64,
    created: bool,
}

impl Listing {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ListingId) -> Self {
        Self {
            id,
            seller: None,
            card_id: None,
            grade: None,
            quantity: 0,
            price_cents: 0,
            notes: String::new(),
            status: ListingStatus::Active,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ListingId {
        self.id
    }

    pub fn seller(&self) -> Option<UserId> {
        self.seller
    }

    pub fn card_id(&self) -> Option<&CardId> {
        self.card_id.as_ref()
    }

    pub fn grade(&self) -> Option<Grade> {
        self.grade
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn price_cents(&self) -> u64 {
        self.price_cents
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn status(&self) -> ListingStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.created && self.status == ListingStatus::Active
    }

    /// Total price of the whole listing in cents.
    pub fn price_total_cents(&self) -> u64 {
        self.price_cents.saturating_mul(self.quantity.max(0) as u64)
    }
}

impl AggregateRoot for Listing {
    type Id = ListingId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenListing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenListing {
    pub listing_id: ListingId,
    pub seller: UserId,
    pub card_id: CardId,
    pub grade: Grade,
    pub quantity: i64,
    pub price_cents: u64,
    pub notes: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdatePrice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePrice {
    pub listing_id: ListingId,
    pub price_cents: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: WithdrawListing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawListing {
    pub listing_id: ListingId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkSold (purchase path only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkSold {
    pub listing_id: ListingId,
    pub buyer: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingCommand {
    Open(OpenListing),
    UpdatePrice(UpdatePrice),
    Withdraw(WithdrawListing),
    MarkSold(MarkSold),
}

/// Event: ListingOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingOpened {
    pub listing_id: ListingId,
    pub seller: UserId,
    pub card_id: CardId,
    pub grade: Grade,
    pub quantity: i64,
    pub price_cents: u64,
    pub notes: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PriceUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdated {
    pub listing_id: ListingId,
    pub price_cents: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ListingWithdrawn. Carries the inventory payload so the restore
/// side effect can be driven from the event alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingWithdrawn {
    pub listing_id: ListingId,
    pub seller: UserId,
    pub card_id: CardId,
    pub grade: Grade,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ListingSold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingSold {
    pub listing_id: ListingId,
    pub seller: UserId,
    pub buyer: UserId,
    pub quantity: i64,
    pub price_cents: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingEvent {
    Opened(ListingOpened),
    PriceUpdated(PriceUpdated),
    Withdrawn(ListingWithdrawn),
    Sold(ListingSold),
}

impl Event for ListingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ListingEvent::Opened(_) => "listings.listing.opened",
            ListingEvent::PriceUpdated(_) => "listings.listing.price_updated",
            ListingEvent::Withdrawn(_) => "listings.listing.withdrawn",
            ListingEvent::Sold(_) => "listings.listing.sold",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ListingEvent::Opened(e) => e.occurred_at,
            ListingEvent::PriceUpdated(e) => e.occurred_at,
            ListingEvent::Withdrawn(e) => e.occurred_at,
            ListingEvent::Sold(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Listing {
    type Command = ListingCommand;
    type Event = ListingEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ListingEvent::Opened(e) => {
                self.id = e.listing_id;
                self.seller = Some(e.seller);
                self.card_id = Some(e.card_id.clone());
                self.grade = Some(e.grade);
                self.quantity = e.quantity;
                self.price_cents = e.price_cents;
                self.notes = e.notes.clone();
                self.status = ListingStatus::Active;
                self.created = true;
            }
            ListingEvent::PriceUpdated(e) => {
                self.price_cents = e.price_cents;
            }
            ListingEvent::Withdrawn(_) => {
                self.status = ListingStatus::Withdrawn;
            }
            ListingEvent::Sold(_) => {
                self.status = ListingStatus::Sold;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ListingCommand::Open(cmd) => self.handle_open(cmd),
            ListingCommand::UpdatePrice(cmd) => self.handle_update_price(cmd),
            ListingCommand::Withdraw(cmd) => self.handle_withdraw(cmd),
            ListingCommand::MarkSold(cmd) => self.handle_mark_sold(cmd),
        }
    }
}

impl Listing {
    fn handle_open(&self, cmd: &OpenListing) -> Result<Vec<ListingEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("listing already exists"));
        }
        if cmd.quantity < 1 {
            return Err(DomainError::validation("quantity must be at least 1"));
        }
        if cmd.price_cents == 0 {
            return Err(DomainError::InvalidPrice);
        }

        Ok(vec![ListingEvent::Opened(ListingOpened {
            listing_id: cmd.listing_id,
            seller: cmd.seller,
            card_id: cmd.card_id.clone(),
            grade: cmd.grade,
            quantity: cmd.quantity,
            price_cents: cmd.price_cents,
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_price(&self, cmd: &UpdatePrice) -> Result<Vec<ListingEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }
        if self.status != ListingStatus::Active {
            return Err(DomainError::ListingNotActive);
        }
        if cmd.price_cents == 0 {
            return Err(DomainError::InvalidPrice);
        }

        Ok(vec![ListingEvent::PriceUpdated(PriceUpdated {
            listing_id: cmd.listing_id,
            price_cents: cmd.price_cents,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_withdraw(&self, cmd: &WithdrawListing) -> Result<Vec<ListingEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }
        if self.status != ListingStatus::Active {
            return Err(DomainError::ListingNotActive);
        }

        // created implies all of these are populated
        let (seller, card_id, grade) = match (self.seller, &self.card_id, self.grade) {
            (Some(s), Some(c), Some(g)) => (s, c.clone(), g),
            _ => return Err(DomainError::invariant("listing state incomplete")),
        };

        Ok(vec![ListingEvent::Withdrawn(ListingWithdrawn {
            listing_id: cmd.listing_id,
            seller,
            card_id,
            grade,
            quantity: self.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_sold(&self, cmd: &MarkSold) -> Result<Vec<ListingEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }
        if self.status != ListingStatus::Active {
            return Err(DomainError::ListingUnavailable);
        }
        let Some(seller) = self.seller else {
            return Err(DomainError::invariant("listing state incomplete"));
        };
        if cmd.buyer == seller {
            return Err(DomainError::validation("seller cannot buy their own listing"));
        }

        Ok(vec![ListingEvent::Sold(ListingSold {
            listing_id: cmd.listing_id,
            seller,
            buyer: cmd.buyer,
            quantity: self.quantity,
            price_cents: self.price_cents,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn open_listing(price_cents: u64, quantity: i64) -> Listing {
        let listing_id = ListingId::new(AggregateId::new());
        let mut listing = Listing::empty(listing_id);
        let cmd = ListingCommand::Open(OpenListing {
            listing_id,
            seller: UserId::new(),
            card_id: CardId::new("base1-4").unwrap(),
            grade: Grade::new(8).unwrap(),
            quantity,
            price_cents,
            notes: String::new(),
            occurred_at: now(),
        });
        for event in listing.handle(&cmd).unwrap() {
            listing.apply(&event);
        }
        listing
    }

    fn apply_all(listing: &mut Listing, events: Vec<ListingEvent>) {
        for event in events {
            listing.apply(&event);
        }
    }

    #[test]
    fn open_listing_success() {
        let listing = open_listing(500, 3);
        assert!(listing.is_active());
        assert_eq!(listing.price_cents(), 500);
        assert_eq!(listing.price_total_cents(), 1500);
    }

    #[test]
    fn open_rejects_zero_price() {
        let listing_id = ListingId::new(AggregateId::new());
        let listing = Listing::empty(listing_id);
        let cmd = ListingCommand::Open(OpenListing {
            listing_id,
            seller: UserId::new(),
            card_id: CardId::new("base1-4").unwrap(),
            grade: Grade::new(8).unwrap(),
            quantity: 1,
            price_cents: 0,
            notes: String::new(),
            occurred_at: now(),
        });
        assert_eq!(listing.handle(&cmd).unwrap_err(), DomainError::InvalidPrice);
    }

    #[test]
    fn update_price_while_active() {
        let mut listing = open_listing(500, 1);
        let cmd = ListingCommand::UpdatePrice(UpdatePrice {
            listing_id: listing.id_typed(),
            price_cents: 750,
            occurred_at: now(),
        });
        let events = listing.handle(&cmd).unwrap();
        apply_all(&mut listing, events);
        assert_eq!(listing.price_cents(), 750);
    }

    #[test]
    fn update_price_to_zero_rejected() {
        let listing = open_listing(500, 1);
        let cmd = ListingCommand::UpdatePrice(UpdatePrice {
            listing_id: listing.id_typed(),
            price_cents: 0,
            occurred_at: now(),
        });
        assert_eq!(listing.handle(&cmd).unwrap_err(), DomainError::InvalidPrice);
    }

    #[test]
    fn withdraw_carries_restore_payload() {
        let mut listing = open_listing(500, 4);
        let seller = listing.seller().unwrap();
        let cmd = ListingCommand::Withdraw(WithdrawListing {
            listing_id: listing.id_typed(),
            occurred_at: now(),
        });
        let events = listing.handle(&cmd).unwrap();
        let ListingEvent::Withdrawn(e) = &events[0] else {
            panic!("expected Withdrawn event");
        };
        assert_eq!(e.seller, seller);
        assert_eq!(e.quantity, 4);
        apply_all(&mut listing, events);
        assert_eq!(listing.status(), ListingStatus::Withdrawn);
    }

    #[test]
    fn withdrawn_listing_rejects_price_edit_and_withdrawal() {
        let mut listing = open_listing(500, 1);
        let withdraw = ListingCommand::Withdraw(WithdrawListing {
            listing_id: listing.id_typed(),
            occurred_at: now(),
        });
        let events = listing.handle(&withdraw).unwrap();
        apply_all(&mut listing, events);

        let edit = ListingCommand::UpdatePrice(UpdatePrice {
            listing_id: listing.id_typed(),
            price_cents: 600,
            occurred_at: now(),
        });
        assert_eq!(
            listing.handle(&edit).unwrap_err(),
            DomainError::ListingNotActive
        );
        assert_eq!(
            listing.handle(&withdraw).unwrap_err(),
            DomainError::ListingNotActive
        );
    }

    #[test]
    fn mark_sold_snapshots_price_and_parties() {
        let mut listing = open_listing(500, 2);
        let seller = listing.seller().unwrap();
        let buyer = UserId::new();
        let cmd = ListingCommand::MarkSold(MarkSold {
            listing_id: listing.id_typed(),
            buyer,
            occurred_at: now(),
        });
        let events = listing.handle(&cmd).unwrap();
        let ListingEvent::Sold(e) = &events[0] else {
            panic!("expected Sold event");
        };
        assert_eq!(e.seller, seller);
        assert_eq!(e.buyer, buyer);
        assert_eq!(e.price_cents, 500);
        assert_eq!(e.quantity, 2);
        apply_all(&mut listing, events);
        assert_eq!(listing.status(), ListingStatus::Sold);
    }

    #[test]
    fn sold_listing_is_unavailable_for_second_purchase() {
        let mut listing = open_listing(500, 1);
        let first = ListingCommand::MarkSold(MarkSold {
            listing_id: listing.id_typed(),
            buyer: UserId::new(),
            occurred_at: now(),
        });
        let events = listing.handle(&first).unwrap();
        apply_all(&mut listing, events);

        let second = ListingCommand::MarkSold(MarkSold {
            listing_id: listing.id_typed(),
            buyer: UserId::new(),
            occurred_at: now(),
        });
        assert_eq!(
            listing.handle(&second).unwrap_err(),
            DomainError::ListingUnavailable
        );
    }

    #[test]
    fn withdrawn_listing_is_unavailable_to_buy() {
        let mut listing = open_listing(500, 1);
        let withdraw = ListingCommand::Withdraw(WithdrawListing {
            listing_id: listing.id_typed(),
            occurred_at: now(),
        });
        let events = listing.handle(&withdraw).unwrap();
        apply_all(&mut listing, events);

        let buy = ListingCommand::MarkSold(MarkSold {
            listing_id: listing.id_typed(),
            buyer: UserId::new(),
            occurred_at: now(),
        });
        assert_eq!(
            listing.handle(&buy).unwrap_err(),
            DomainError::ListingUnavailable
        );
    }

    #[test]
    fn seller_cannot_buy_own_listing() {
        let listing = open_listing(500, 1);
        let cmd = ListingCommand::MarkSold(MarkSold {
            listing_id: listing.id_typed(),
            buyer: listing.seller().unwrap(),
            occurred_at: now(),
        });
        assert!(listing.handle(&cmd).is_err());
    }
}
