use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tradebinder_core::{Aggregate, AggregateId, AggregateRoot, DomainError, UserId};
use tradebinder_events::Event;
use tradebinder_listings::ListingId;

use crate::state::{SaleState, transition};

/// Sale record identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaleId(pub AggregateId);

impl SaleId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SaleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// A buyer's rating of the seller for one sale. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub rater: UserId,
    pub rated: UserId,
    pub score: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Highest score a buyer can give.
pub const MAX_SCORE: u8 = 10;

/// Aggregate root: SaleRecord.
///
/// Created exactly once per purchased listing; never deleted. State changes
/// go through [`crate::state::transition`] and every applied change stamps
/// `state_changed_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleRecord {
    id: SaleId,
    listing_id: Option<ListingId>,
    buyer: Option<UserId>,
    seller: Option<UserId>,
    quantity: i64,
    price_total_cents: u64,
    purchased_at: Option<DateTime<Utc>>,
    state: SaleState,
    state_changed_at: Option<DateTime<Utc>>,
    rating: Option<Rating>,
    version: u64,
    created: bool,
}

impl SaleRecord {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: SaleId) -> Self {
        Self {
            id,
            listing_id: None,
            buyer: None,
            seller: None,
            quantity: 0,
            price_total_cents: 0,
            purchased_at: None,
            state: SaleState::initial(),
            state_changed_at: None,
            rating: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SaleId {
        self.id
    }

    pub fn listing_id(&self) -> Option<ListingId> {
        self.listing_id
    }

    pub fn buyer(&self) -> Option<UserId> {
        self.buyer
    }

    pub fn seller(&self) -> Option<UserId> {
        self.seller
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn price_total_cents(&self) -> u64 {
        self.price_total_cents
    }

    pub fn purchased_at(&self) -> Option<DateTime<Utc>> {
        self.purchased_at
    }

    pub fn state(&self) -> SaleState {
        self.state
    }

    pub fn state_changed_at(&self) -> Option<DateTime<Utc>> {
        self.state_changed_at
    }

    pub fn rating(&self) -> Option<&Rating> {
        self.rating.as_ref()
    }

    /// Rating eligibility gate: one rating per sale, and only once the
    /// order has progressed to Received or Shipped.
    pub fn can_rate(&self) -> bool {
        self.created
            && self.rating.is_none()
            && matches!(self.state, SaleState::Received | SaleState::Shipped)
    }
}

impl AggregateRoot for SaleRecord {
    type Id = SaleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordPurchase. `price_cents` is the per-unit listing price at
/// purchase time; the event snapshots the computed total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPurchase {
    pub sale_id: SaleId,
    pub listing_id: ListingId,
    pub buyer: UserId,
    pub seller: UserId,
    pub quantity: i64,
    pub price_cents: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RequestTransition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTransition {
    pub sale_id: SaleId,
    pub target: SaleState,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitRating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRating {
    pub sale_id: SaleId,
    pub rater: UserId,
    pub score: u8,
    pub comment: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleCommand {
    RecordPurchase(RecordPurchase),
    RequestTransition(RequestTransition),
    SubmitRating(SubmitRating),
}

/// Event: PurchaseRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRecorded {
    pub sale_id: SaleId,
    pub listing_id: ListingId,
    pub buyer: UserId,
    pub seller: UserId,
    pub quantity: i64,
    pub price_total_cents: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StateChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChanged {
    pub sale_id: SaleId,
    pub from: SaleState,
    pub to: SaleState,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RatingSubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingSubmitted {
    pub sale_id: SaleId,
    pub rating: Rating,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleEvent {
    PurchaseRecorded(PurchaseRecorded),
    StateChanged(StateChanged),
    RatingSubmitted(RatingSubmitted),
}

impl Event for SaleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SaleEvent::PurchaseRecorded(_) => "sales.sale.purchase_recorded",
            SaleEvent::StateChanged(_) => "sales.sale.state_changed",
            SaleEvent::RatingSubmitted(_) => "sales.sale.rating_submitted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SaleEvent::PurchaseRecorded(e) => e.occurred_at,
            SaleEvent::StateChanged(e) => e.occurred_at,
            SaleEvent::RatingSubmitted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for SaleRecord {
    type Command = SaleCommand;
    type Event = SaleEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SaleEvent::PurchaseRecorded(e) => {
                self.id = e.sale_id;
                self.listing_id = Some(e.listing_id);
                self.buyer = Some(e.buyer);
                self.seller = Some(e.seller);
                self.quantity = e.quantity;
                self.price_total_cents = e.price_total_cents;
                self.purchased_at = Some(e.occurred_at);
                self.state = SaleState::initial();
                self.state_changed_at = Some(e.occurred_at);
                self.created = true;
            }
            SaleEvent::StateChanged(e) => {
                self.state = e.to;
                // Audit timestamp: stamped on every applied transition.
                self.state_changed_at = Some(e.occurred_at);
            }
            SaleEvent::RatingSubmitted(e) => {
                self.rating = Some(e.rating.clone());
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SaleCommand::RecordPurchase(cmd) => self.handle_record_purchase(cmd),
            SaleCommand::RequestTransition(cmd) => self.handle_request_transition(cmd),
            SaleCommand::SubmitRating(cmd) => self.handle_submit_rating(cmd),
        }
    }
}

impl SaleRecord {
    fn handle_record_purchase(
        &self,
        cmd: &RecordPurchase,
    ) -> Result<Vec<SaleEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("sale record already exists"));
        }
        if cmd.quantity < 1 {
            return Err(DomainError::validation("quantity must be at least 1"));
        }
        if cmd.buyer == cmd.seller {
            return Err(DomainError::validation("buyer and seller cannot match"));
        }

        let price_total_cents = cmd.price_cents.saturating_mul(cmd.quantity as u64);

        Ok(vec![SaleEvent::PurchaseRecorded(PurchaseRecorded {
            sale_id: cmd.sale_id,
            listing_id: cmd.listing_id,
            buyer: cmd.buyer,
            seller: cmd.seller,
            quantity: cmd.quantity,
            price_total_cents,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_request_transition(
        &self,
        cmd: &RequestTransition,
    ) -> Result<Vec<SaleEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }

        match transition(self.state, cmd.target)? {
            // Same-state request: accepted, nothing recorded.
            None => Ok(vec![]),
            Some(to) => Ok(vec![SaleEvent::StateChanged(StateChanged {
                sale_id: cmd.sale_id,
                from: self.state,
                to,
                occurred_at: cmd.occurred_at,
            })]),
        }
    }

    fn handle_submit_rating(&self, cmd: &SubmitRating) -> Result<Vec<SaleEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }
        if Some(cmd.rater) != self.buyer {
            return Err(DomainError::NotBuyer);
        }
        if cmd.score > MAX_SCORE {
            return Err(DomainError::InvalidScore);
        }
        if !self.can_rate() {
            return Err(DomainError::RatingNotAllowed);
        }

        // created implies seller is set
        let rated = self.seller.ok_or_else(|| {
            DomainError::invariant("sale record has no seller")
        })?;

        Ok(vec![SaleEvent::RatingSubmitted(RatingSubmitted {
            sale_id: cmd.sale_id,
            rating: Rating {
                rater: cmd.rater,
                rated,
                score: cmd.score,
                comment: cmd.comment.clone(),
                created_at: cmd.occurred_at,
            },
            occurred_at: cmd.occurred_at,
        })])
    }
}
