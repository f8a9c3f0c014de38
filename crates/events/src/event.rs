use chrono::{DateTime, Utc};

/// Contract every marketplace event satisfies.
///
/// An event is a fact: it happened, it does not change, and new facts are
/// only ever appended after it. The schema version exists so a payload can
/// evolve without rewriting history.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable dotted type name, e.g. `"listings.listing.sold"`.
    fn event_type(&self) -> &'static str;

    /// Payload schema version (starts at 1).
    fn version(&self) -> u32;

    /// Business time: when the thing happened, not when it was stored.
    fn occurred_at(&self) -> DateTime<Utc>;
}
