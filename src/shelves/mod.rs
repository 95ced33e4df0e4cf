//! Personal shelves and the reading records on them.
//!
//! Every read or write first checks that the shelf (or the shelf an item sits
//! on) belongs to the caller; anything else is reported as not found. Item
//! updates are sparse: see [`ShelfItemPatch`].

mod handler;
mod lib;
mod routes;

pub use lib::*;
pub use routes::routes;
