//! HTTPS front-end listeners.
//!
//! The TLS listener serves the user-supplied handler with certificates from
//! an ACME certificate manager; the plaintext listener redirects everything
//! to HTTPS. Both run concurrently and either one failing ends the server.

mod redirect;
mod server;
mod shutdown;

pub use server::{Server, ServerError};
