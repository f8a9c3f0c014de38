//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// The marketplace rejections (`InsufficientInventory` through `NotBuyer`)
/// are caller-visible, non-retryable validation/conflict errors: every one
/// leaves state unchanged. Generic variants cover deterministic failures at
/// the boundaries (id parsing, claim validation, stale-version conflicts).
/// Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Seller's collection does not hold enough units for the request.
    #[error("insufficient inventory: requested {requested}, available {available}")]
    InsufficientInventory { requested: i64, available: i64 },

    /// Listing price must be strictly positive.
    #[error("price must be positive")]
    InvalidPrice,

    /// Price edits and withdrawal apply only to active listings.
    #[error("listing is not active")]
    ListingNotActive,

    /// Purchase target is already sold or withdrawn.
    #[error("listing is unavailable")]
    ListingUnavailable,

    /// Requested sale-state edge is not in the transition table.
    #[error("illegal state transition: {from} -> {to}")]
    IllegalStateTransition {
        from: &'static str,
        to: &'static str,
    },

    /// Sale is not eligible for rating (wrong state or already rated).
    #[error("rating not allowed for this sale")]
    RatingNotAllowed,

    /// Rating score must lie in 0..=10.
    #[error("score must be between 0 and 10")]
    InvalidScore,

    /// Only the buyer may rate the seller.
    #[error("only the buyer may rate the seller")]
    NotBuyer,

    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Authorization failure at the domain boundary.
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn insufficient_inventory(requested: i64, available: i64) -> Self {
        Self::InsufficientInventory {
            requested,
            available,
        }
    }

    /// True for the marketplace rejections the HTTP layer reports as
    /// conflicts/denials rather than generic validation failures.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InsufficientInventory { .. }
                | Self::InvalidPrice
                | Self::ListingNotActive
                | Self::ListingUnavailable
                | Self::IllegalStateTransition { .. }
                | Self::RatingNotAllowed
                | Self::InvalidScore
                | Self::NotBuyer
        )
    }
}
