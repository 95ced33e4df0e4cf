//! Accounts: self-service registration and admin user management.
//!
//! Deleting a user removes everything they own (shelves and shelf items) in a
//! single transaction. The admin listing never includes the admin account.

mod handler;
mod lib;
mod routes;

pub use lib::*;
pub use routes::routes;
