//! Projection implementations (read model builders).
//!
//! Projections consume domain events and build query-optimized read models.
//! All projections are:
//! - **Rebuildable**: reconstructed from the event stream at any time
//! - **Idempotent**: per-stream cursors make reapplication a no-op, so
//!   feeding them inline after dispatch *and* from the bus is safe

use thiserror::Error;

pub mod accounts;
pub mod collection_entries;
pub mod listings;
pub mod sale_records;

pub use accounts::{AccountReadModel, AccountsProjection};
pub use collection_entries::{CollectionEntriesProjection, CollectionEntryReadModel};
pub use listings::{ListingReadModel, ListingsProjection};
pub use sale_records::{SaleRecordReadModel, SaleRecordsProjection};

/// Projection application error.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}
