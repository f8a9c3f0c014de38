//! `tradebinder-collection` — personal card collections (event-sourced).
//!
//! A collection entry records how many copies of one card, at one grade, a
//! user owns. Entries are decremented when units are reserved for a listing
//! and incremented when a withdrawn listing hands them back. An entry whose
//! quantity reaches zero is depleted and disappears from read models.

pub mod entry;

pub use entry::{
    AddEntry, CollectionCommand, CollectionEntry, CollectionEvent, EntryAdded, EntryDepleted,
    EntryId, EntryUpdated, ReserveUnits, RestoreUnits, UnitsReserved, UnitsRestored, UpdateEntry,
};
