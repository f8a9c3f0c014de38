//! Fulfilment state machine.
//!
//! This module is the single authority on which state changes a sale record
//! may make. Everything else (aggregate, service, HTTP layer) asks here.
//!
//! States carry stable numeric codes on the wire:
//! AwaitingReceipt=1, Received=2, Shipped=3, Cancelled=4.

use serde::{Deserialize, Serialize};

use tradebinder_core::DomainError;

/// Fulfilment state of a sale.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum SaleState {
    /// Payment captured, seller has not yet acknowledged the order.
    AwaitingReceipt = 1,
    /// Seller acknowledged receipt of the order.
    Received = 2,
    /// Seller shipped the cards.
    Shipped = 3,
    /// Sale cancelled. Terminal.
    Cancelled = 4,
}

impl SaleState {
    /// State assigned to a freshly recorded purchase.
    pub fn initial() -> Self {
        SaleState::AwaitingReceipt
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            SaleState::AwaitingReceipt => "AwaitingReceipt",
            SaleState::Received => "Received",
            SaleState::Shipped => "Shipped",
            SaleState::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == SaleState::Cancelled
    }

    /// Whether `self -> target` is a legal edge (same-state excluded; that
    /// is handled as an idempotent no-op by [`transition`]).
    pub fn can_transition_to(self, target: SaleState) -> bool {
        use SaleState::*;
        matches!(
            (self, target),
            (AwaitingReceipt, Received)
                | (AwaitingReceipt, Cancelled)
                | (Received, Shipped)
                | (Received, Cancelled)
                | (Shipped, Cancelled)
        )
    }
}

/// Decide a requested transition.
///
/// Returns `Ok(Some(target))` for a legal move, `Ok(None)` for a same-state
/// request (idempotent, nothing to record), and `IllegalStateTransition`
/// naming the rejected edge otherwise. Skipping straight from
/// AwaitingReceipt to Shipped and any move out of Cancelled both land in the
/// error arm.
pub fn transition(from: SaleState, to: SaleState) -> Result<Option<SaleState>, DomainError> {
    if from == to {
        return Ok(None);
    }
    if from.can_transition_to(to) {
        return Ok(Some(to));
    }
    Err(DomainError::IllegalStateTransition {
        from: from.name(),
        to: to.name(),
    })
}

impl From<SaleState> for u8 {
    fn from(value: SaleState) -> Self {
        value.code()
    }
}

impl TryFrom<u8> for SaleState {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SaleState::AwaitingReceipt),
            2 => Ok(SaleState::Received),
            3 => Ok(SaleState::Shipped),
            4 => Ok(SaleState::Cancelled),
            other => Err(DomainError::validation(format!(
                "unknown sale state code {other}"
            ))),
        }
    }
}

impl core::fmt::Display for SaleState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
