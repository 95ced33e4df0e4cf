//! The shared book catalog.
//!
//! Books are read by everyone; only the admin adds new entries. Every book
//! returned carries its authors, fetched with one batched query per page (see
//! [`authors_for`]).

mod handler;
mod lib;
mod routes;

pub use lib::*;
pub use routes::routes;
