//! Sessions and credentials.
//!
//! `POST /login` checks an email/password pair and hands back a signed session
//! token, both in the body and as the `session` cookie. Handlers that need a
//! caller take an [`AuthUser`] (or [`AdminUser`]) argument; the extractor reads
//! the token from `Authorization: Bearer` or the cookie.

mod extract;
mod handler;
mod password;
mod routes;
mod session;

pub use extract::{AdminUser, AuthUser};
pub use password::{hash_password, verify_password};
pub use routes::routes;
pub use session::{Claims, SESSION_COOKIE, Sessions};
