//! `tradebinder-sales` — sale records and the fulfilment state machine.
//!
//! A sale record is created exactly once per purchased listing and is never
//! deleted; it is the marketplace's ledger of who bought what from whom.
//! All state changes go through the transition table in [`state`], and
//! seller ratings are gated on fulfilment progress.

pub mod record;
pub mod state;

pub use record::{
    PurchaseRecorded, Rating, RatingSubmitted, RecordPurchase, RequestTransition, SaleCommand,
    SaleEvent, SaleId, SaleRecord, StateChanged, SubmitRating,
};
pub use state::SaleState;
