//! cinder-persistence: the append-only file (AOF).
//!
//! Every accepted write command is appended to a single log file as its
//! full wire-encoded request array. The RESP format carries its own
//! framing, so the file needs no header, checksums, or record
//! envelope. At startup the log is replayed
//! from the beginning through the same dispatch logic used for live
//! traffic, which rebuilds the in-memory state deterministically.

mod aof;

pub use aof::{replay, spawn_sync_task, Aof, AofError};
