//! Request DTOs and read-model → JSON mapping helpers.

use serde::Deserialize;
use serde_json::{json, Value};

use tradebinder_catalog::CardSummary;
use tradebinder_infra::event_store::StoredEvent;
use tradebinder_infra::projections::{
    AccountReadModel, CollectionEntryReadModel, ListingReadModel, SaleRecordReadModel,
};

// ─────────────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AddEntryRequest {
    pub card_id: String,
    pub grade: u8,
    pub quantity: i64,
    #[serde(default)]
    pub notes: String,
    /// Raw catalog record for the card, in whatever shape the client's
    /// catalog source uses. Normalized once and attached to reads.
    #[serde(default)]
    pub card: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEntryRequest {
    pub quantity: Option<i64>,
    pub grade: Option<u8>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateListingRequest {
    pub card_id: String,
    pub grade: u8,
    pub quantity: i64,
    pub price_cents: u64,
    #[serde(default)]
    pub notes: String,
    /// Raw catalog record for the card (see [`AddEntryRequest::card`]).
    #[serde(default)]
    pub card: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePriceRequest {
    pub price_cents: u64,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub listing_id: String,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    /// Target state code (1=awaiting_receipt, 2=received, 3=shipped, 4=cancelled).
    pub state: u8,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRatingRequest {
    pub score: u8,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterAccountRequest {
    pub user_id: String,
    pub display_name: String,
    pub roles: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct SuspendAccountRequest {
    pub reason: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────
// Responses
// ─────────────────────────────────────────────────────────────────────────

pub fn entry_to_json(rm: CollectionEntryReadModel, card: Option<CardSummary>) -> Value {
    json!({
        "entry_id": rm.entry_id.to_string(),
        "owner": rm.owner.to_string(),
        "card_id": rm.card_id.as_str(),
        "card": card,
        "grade": rm.grade.value(),
        "quantity": rm.quantity,
        "notes": rm.notes,
    })
}

pub fn listing_to_json(rm: ListingReadModel, card: Option<CardSummary>) -> Value {
    json!({
        "listing_id": rm.listing_id.to_string(),
        "seller": rm.seller.to_string(),
        "card_id": rm.card_id.as_str(),
        "card": card,
        "grade": rm.grade.value(),
        "quantity": rm.quantity,
        "price_cents": rm.price_cents,
        "notes": rm.notes,
        "status": rm.status.to_string().to_lowercase(),
    })
}

pub fn sale_to_json(rm: SaleRecordReadModel) -> Value {
    json!({
        "sale_id": rm.sale_id.to_string(),
        "listing_id": rm.listing_id.to_string(),
        "buyer": rm.buyer.to_string(),
        "seller": rm.seller.to_string(),
        "quantity": rm.quantity,
        "price_total_cents": rm.price_total_cents,
        "purchased_at": rm.purchased_at.to_rfc3339(),
        "state": rm.state.name(),
        "state_code": rm.state.code(),
        "state_changed_at": rm.state_changed_at.to_rfc3339(),
        "rating": rm.rating.map(|r| json!({
            "rater": r.rater.to_string(),
            "rated": r.rated.to_string(),
            "score": r.score,
            "comment": r.comment,
            "created_at": r.created_at.to_rfc3339(),
        })),
    })
}

pub fn account_to_json(rm: AccountReadModel) -> Value {
    json!({
        "user_id": rm.user_id.to_string(),
        "display_name": rm.display_name,
        "status": rm.status.to_string().to_lowercase(),
        "suspension_reason": rm.suspension_reason,
    })
}

pub fn event_to_json(event: &StoredEvent) -> Value {
    json!({
        "event_id": event.event_id.to_string(),
        "aggregate_id": event.aggregate_id.to_string(),
        "aggregate_type": event.aggregate_type,
        "sequence_number": event.sequence_number,
        "event_type": event.event_type,
        "event_version": event.event_version,
        "occurred_at": event.occurred_at.to_rfc3339(),
        "payload": event.payload,
    })
}
