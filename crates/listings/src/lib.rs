//! `tradebinder-listings` — sale listings (event-sourced).
//!
//! A listing offers a fixed quantity of one card at one grade for a price.
//! It is Active from creation until it is withdrawn by the seller or sold to
//! a buyer; both end states are terminal and immutable.

pub mod listing;

pub use listing::{
    Listing, ListingCommand, ListingEvent, ListingId, ListingOpened, ListingSold, ListingStatus,
    ListingWithdrawn, MarkSold, OpenListing, PriceUpdated, UpdatePrice, WithdrawListing,
};
