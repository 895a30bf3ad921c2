//! HTTP front end for passbridge.
//!
//! The server answers two kinds of request, both from the live snapshot in a
//! [`SnapshotRegistry`](passbridge_core::SnapshotRegistry):
//!
//! - `POST /secrets/` returns the encrypted catalog of every secret
//! - `POST /secret/` returns one armored secret, addressed by group and
//!   account name
//!
//! Nothing is encrypted or read from disk per request. The router only looks
//! bodies up in the snapshot that was current when the request arrived.
//!
//! # Example
//!
//! ```ignore
//! use passbridge_server::{HttpServer, SecretRouter, ServerConfig};
//!
//! let router = SecretRouter::new(reloader.registry().clone());
//! let server = HttpServer::start(router, ServerConfig::default()).await?;
//! println!("Listening on {}", server.url());
//! ```
//!
//! # Security
//!
//! The server binds to localhost by default and performs no authentication.

mod error;
mod request;
mod router;
mod server;

pub use error::{RequestError, ValidationError};
pub use request::{SecretRequest, Username, format_number};
pub use router::{MAX_BODY_BYTES, SecretRouter};
pub use server::{DEFAULT_ADDR, HttpServer, ServerConfig};
