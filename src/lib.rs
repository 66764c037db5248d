//! httpsd: a minimal HTTPS front-end.
//!
//! Terminates TLS with automatically provisioned ACME certificates, redirects
//! plaintext HTTP to HTTPS, dispatches every request to a single user-supplied
//! handler, and appends one structured access-log line per request.
//!
//! ```no_run
//! use axum::{routing::get, Router};
//! use httpsd::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), httpsd::ServerError> {
//!     let app = Router::new().route("/", get(|| async { "hello" }));
//!     let server = Server::from_config_file("httpsd.toml")?;
//!     server.serve(app).await
//! }
//! ```

pub mod access;
pub mod config;
pub mod http;
pub mod logging;
pub mod middleware;

pub use config::ServerConfig;
pub use http::{Server, ServerError};
