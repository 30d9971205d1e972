//! Session credentials.
//!
//! The backend issues a bearer token on login. It lives only in memory, in a
//! [`TokenHolder`] shared by the gateway (which presents it) and the session
//! reconciler (which stores and clears it).

mod token;

pub use token::{AuthCredential, TokenHolder};
