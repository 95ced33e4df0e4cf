//! Admin management of database triggers.

mod handler;
mod lib;
mod routes;

pub use lib::*;
pub use routes::routes;
