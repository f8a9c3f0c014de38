//! Card catalog boundary: card identity types and payload normalization.
//!
//! The external card catalog is an opaque read-only lookup service. This
//! crate owns the identifiers the marketplace shares with it (`CardId`,
//! `Grade`) and the single normalization boundary that folds the catalog's
//! heterogeneous payload shapes into one display schema. Nothing here
//! participates in the sale lifecycle.

pub mod card;
pub mod normalize;

pub use card::{CardId, Grade};
pub use normalize::{CardSummary, normalize_card};
