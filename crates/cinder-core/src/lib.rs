//! cinder-core: the in-memory store.
//!
//! A [`Store`] owns the two keyspaces this server exposes, a flat
//! string map and a map of hashes, each behind its own reader/writer
//! lock. The store is injected into the dispatch layer rather than
//! living in globals, so tests can spin up isolated instances.

mod store;

pub use store::Store;
