//! `tradebinder-events` — domain event plumbing.
//!
//! Events are facts: immutable, versioned, append-only. This crate holds the
//! transport-agnostic pieces (the `Event` trait, envelopes, and the pub/sub
//! bus abstraction); persistence lives in `tradebinder-infra`.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::InMemoryEventBus;
