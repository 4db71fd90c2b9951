//! cinder-server: the network-facing server.
//!
//! Wires the pieces together: a TCP accept loop spawning one task per
//! connection, the command dispatcher over the shared store and pub/sub
//! manager, and append-only-log replay before the listener starts
//! accepting. The server is exposed as a library so integration tests
//! can run it in-process against an ephemeral port.

pub mod config;
mod connection;
pub mod dispatch;
pub mod pubsub;
mod server;

pub use config::ServerConfig;
pub use server::{run, ServerError};
