//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values;
/// identity does not matter. `Grade(7)` equals `Grade(7)` wherever it
/// appears, while two listings with the same fields are still two listings.
///
/// To "modify" a value object, build a new one. The bounds keep value
/// objects cheap to copy, comparable, and debuggable.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
