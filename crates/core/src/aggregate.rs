//! Aggregate root trait for event-sourced domain models.

use crate::error::{DomainError, DomainResult};

/// Aggregate root marker + minimal interface.
///
/// Intentionally small so domain modules can decide how they model state
/// transitions without bringing in any infrastructure concerns.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Stream revision: increments by one per applied event.
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for an aggregate.
///
/// `Exact` is the compare-and-set discipline of the marketplace: a writer
/// that loaded a stale stream fails its append and observes no partial
/// application.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// No expectation; the append always wins.
    Any,
    /// The stream must still be at this revision.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

/// Aggregate execution semantics (pure, deterministic).
///
/// Deciding and evolving are split: `handle` looks at current state and a
/// command and returns the events that should happen; `apply` folds one
/// event into state. Neither does IO. An accepted no-op (e.g. a same-state
/// sale transition) is `handle` returning an empty event vector.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    /// Fold a single event into state, bumping `version()` by one.
    fn apply(&mut self, event: &Self::Event);

    /// Decide which events a command produces. Must not mutate state.
    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;
}
