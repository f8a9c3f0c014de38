//! `tradebinder-infra` — event persistence, dispatch, projections, and the
//! marketplace application service.
//!
//! Layering:
//! - `event_store` persists append-only aggregate streams.
//! - `command_dispatcher` runs the load → rehydrate → handle → append →
//!   publish pipeline for a single aggregate.
//! - `projections` fold committed events into query-optimized read models.
//! - `marketplace` composes all of the above into the operations the HTTP
//!   layer exposes, including the cross-aggregate ones (listing creation,
//!   withdrawal, purchase).

pub mod command_dispatcher;
pub mod event_store;
pub mod marketplace;
pub mod projections;
pub mod read_model;

#[cfg(test)]
mod integration_tests;

pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use event_store::{
    EventFilter, EventQuery, EventQueryResult, EventStore, EventStoreError, InMemoryEventStore,
    Pagination, StoredEvent, UncommittedEvent,
};
pub use marketplace::{Marketplace, MarketplaceError};
pub use read_model::{InMemoryKeyedStore, KeyedStore};
