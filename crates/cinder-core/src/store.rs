//! The store: two independently locked keyspaces.
//!
//! Reads take the shared lock for the duration of the lookup only;
//! writes take the exclusive lock for the duration of the mutation
//! only. No lock is ever held across handler boundaries or I/O, and
//! the flat and hash keyspaces are separate lock domains, so
//! operations on one never block the other.
//!
//! `std::sync::RwLock` rather than an async lock: every critical
//! section is a single map operation with no await point inside.

use std::collections::HashMap;
use std::sync::RwLock;

use bytes::Bytes;

/// The in-memory store shared by all connections.
#[derive(Debug, Default)]
pub struct Store {
    /// Flat keyspace: key → payload.
    strings: RwLock<HashMap<String, Bytes>>,
    /// Hash keyspace: hash name → field → payload.
    hashes: RwLock<HashMap<String, HashMap<String, Bytes>>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the payload stored at `key`, or `None` if absent.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let strings = self.strings.read().unwrap_or_else(|e| e.into_inner());
        strings.get(key).cloned()
    }

    /// Stores `value` at `key`, unconditionally overwriting.
    pub fn set(&self, key: String, value: Bytes) {
        let mut strings = self.strings.write().unwrap_or_else(|e| e.into_inner());
        strings.insert(key, value);
    }

    /// Returns the payload at `hash`/`field`, or `None` if either the
    /// hash or the field is absent.
    pub fn hget(&self, hash: &str, field: &str) -> Option<Bytes> {
        let hashes = self.hashes.read().unwrap_or_else(|e| e.into_inner());
        hashes.get(hash).and_then(|h| h.get(field)).cloned()
    }

    /// Stores `value` at `hash`/`field`, creating the hash on demand.
    ///
    /// The existence check and creation happen inside one exclusive
    /// critical section, so concurrent first-writers to the same hash
    /// observe exactly one inner map.
    pub fn hset(&self, hash: String, field: String, value: Bytes) {
        let mut hashes = self.hashes.write().unwrap_or_else(|e| e.into_inner());
        hashes.entry(hash).or_default().insert(field, value);
    }

    /// Snapshot of every field/value pair in `hash`, in map order.
    /// Returns an empty vec when the hash doesn't exist; callers
    /// can't distinguish an absent hash from an empty one.
    pub fn hgetall(&self, hash: &str) -> Vec<(String, Bytes)> {
        let hashes = self.hashes.read().unwrap_or_else(|e| e.into_inner());
        match hashes.get(hash) {
            Some(h) => h.iter().map(|(f, v)| (f.clone(), v.clone())).collect(),
            None => Vec::new(),
        }
    }

    /// Number of keys in the flat keyspace. Used for startup logging.
    pub fn key_count(&self) -> usize {
        self.strings.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Number of hashes in the hash keyspace. Used for startup logging.
    pub fn hash_count(&self) -> usize {
        self.hashes.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}
