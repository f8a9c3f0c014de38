//! Disposable read-model storage.
//!
//! Read models are rebuildable caches over the event stream; losing one
//! costs a replay, nothing more.

pub mod keyed_store;

pub use keyed_store::{InMemoryKeyedStore, KeyedStore};
