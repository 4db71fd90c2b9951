//! Command dispatch: typed commands in, reply frames out.
//!
//! The dispatcher owns the shared pieces a request needs: the store,
//! the pub/sub registry, and (optionally) the append-only log. Write
//! commands are persisted *before* they are applied: a crash after the
//! append but before the apply is recovered by replay, and an append
//! failure means the mutation is reported as an error and never
//! applied.
//!
//! SUBSCRIBE is the one command not handled here; it streams to the
//! connection's writer and is intercepted by the connection layer.

use std::sync::Arc;

use bytes::Bytes;
use cinder_core::Store;
use cinder_persistence::Aof;
use cinder_protocol::{Command, Frame};

use crate::pubsub::PubSub;

/// Routes parsed commands to the store or the broadcaster and builds
/// the reply frame. Shared across connection tasks via `Arc`.
pub struct Dispatcher {
    store: Arc<Store>,
    pubsub: Arc<PubSub>,
    aof: Option<Arc<Aof>>,
}

impl Dispatcher {
    pub fn new(store: Arc<Store>, pubsub: Arc<PubSub>, aof: Option<Arc<Aof>>) -> Self {
        Self { store, pubsub, aof }
    }

    pub fn pubsub(&self) -> &Arc<PubSub> {
        &self.pubsub
    }

    /// Executes one request/response command and returns the reply.
    ///
    /// `request` is the original wire frame, persisted verbatim for
    /// write commands.
    pub fn execute(&self, cmd: Command, request: &Frame) -> Frame {
        if cmd.is_write() {
            if let Some(aof) = &self.aof {
                if let Err(e) = aof.append(request) {
                    tracing::error!(command = cmd.name(), error = %e, "aof append failed");
                    return Frame::error(format!("ERR failed to persist command: {e}"));
                }
            }
        }

        match cmd {
            Command::Ping(None) => Frame::Simple("PONG".into()),
            Command::Ping(Some(msg)) => Frame::Bulk(msg),
            Command::CommandInfo => Frame::Simple(String::new()),
            Command::Get { key } => match self.store.get(&key) {
                Some(value) => Frame::Bulk(value),
                None => Frame::Null,
            },
            Command::Set { key, value } => {
                self.store.set(key, value);
                Frame::Simple("OK".into())
            }
            Command::HGet { hash, field } => match self.store.hget(&hash, &field) {
                Some(value) => Frame::Bulk(value),
                None => Frame::Null,
            },
            Command::HSet { hash, field, value } => {
                self.store.hset(hash, field, value);
                Frame::Simple("OK".into())
            }
            Command::HGetAll { hash } => {
                let pairs = self.store.hgetall(&hash);
                let mut items = Vec::with_capacity(pairs.len() * 2);
                for (field, value) in pairs {
                    items.push(Frame::Bulk(Bytes::from(field.into_bytes())));
                    items.push(Frame::Bulk(value));
                }
                Frame::Array(items)
            }
            Command::Publish { topic, payload } => {
                let reached = self.pubsub.publish(&topic, payload);
                Frame::Integer(reached as i64)
            }
            Command::PubSub => Frame::Simple("OK".into()),
            Command::Subscribe { .. } => {
                Frame::error("ERR SUBSCRIBE is only valid as a streaming command")
            }
            Command::Unknown(name) => Frame::error(format!("ERR unknown command '{name}'")),
        }
    }

    /// Applies one replayed log entry to the store.
    ///
    /// Only write commands take effect; anything else in the log is
    /// skipped with a warning (the log should contain nothing else).
    /// Never re-appends. Returns whether the entry was applied.
    pub fn replay_frame(&self, frame: &Frame) -> bool {
        match Command::from_frame(frame) {
            Ok(Command::Set { key, value }) => {
                self.store.set(key, value);
                true
            }
            Ok(Command::HSet { hash, field, value }) => {
                self.store.hset(hash, field, value);
                true
            }
            Ok(cmd) => {
                tracing::warn!(command = cmd.name(), "skipping non-write entry in aof");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "skipping undecodable command in aof");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use cinder_persistence::replay;

    use super::*;

    fn request(parts: &[&str]) -> Frame {
        Frame::Array(
            parts
                .iter()
                .map(|p| Frame::Bulk(Bytes::copy_from_slice(p.as_bytes())))
                .collect(),
        )
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Arc::new(Store::new()), Arc::new(PubSub::new()), None)
    }

    fn exec(d: &Dispatcher, parts: &[&str]) -> Frame {
        let frame = request(parts);
        let cmd = Command::from_frame(&frame).unwrap();
        d.execute(cmd, &frame)
    }

    #[test]
    fn set_get_round_trip() {
        let d = dispatcher();
        assert_eq!(exec(&d, &["SET", "k", "v"]), Frame::Simple("OK".into()));
        assert_eq!(exec(&d, &["GET", "k"]), Frame::Bulk(Bytes::from_static(b"v")));
    }

    #[test]
    fn get_missing_is_null() {
        let d = dispatcher();
        assert_eq!(exec(&d, &["GET", "missing"]), Frame::Null);
    }

    #[test]
    fn hash_round_trip() {
        let d = dispatcher();
        assert_eq!(
            exec(&d, &["HSET", "h", "f", "v"]),
            Frame::Simple("OK".into())
        );
        assert_eq!(
            exec(&d, &["HGET", "h", "f"]),
            Frame::Bulk(Bytes::from_static(b"v"))
        );
        assert_eq!(exec(&d, &["HGET", "h", "nope"]), Frame::Null);
        assert_eq!(exec(&d, &["HGET", "other", "f"]), Frame::Null);
    }

    #[test]
    fn hgetall_alternates_fields_and_values() {
        let d = dispatcher();
        exec(&d, &["HSET", "h", "a", "1"]);
        exec(&d, &["HSET", "h", "b", "2"]);

        let reply = exec(&d, &["HGETALL", "h"]);
        let items = match reply {
            Frame::Array(items) => items,
            other => panic!("expected array, got {other:?}"),
        };
        assert_eq!(items.len(), 4);

        let mut pairs: Vec<(Bytes, Bytes)> = items
            .chunks(2)
            .map(|pair| match (&pair[0], &pair[1]) {
                (Frame::Bulk(f), Frame::Bulk(v)) => (f.clone(), v.clone()),
                other => panic!("expected bulk pair, got {other:?}"),
            })
            .collect();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                (Bytes::from_static(b"a"), Bytes::from_static(b"1")),
                (Bytes::from_static(b"b"), Bytes::from_static(b"2")),
            ]
        );
    }

    #[test]
    fn hgetall_missing_hash_is_empty_array() {
        let d = dispatcher();
        assert_eq!(exec(&d, &["HGETALL", "nope"]), Frame::Array(vec![]));
    }

    #[test]
    fn ping_and_command() {
        let d = dispatcher();
        assert_eq!(exec(&d, &["PING"]), Frame::Simple("PONG".into()));
        assert_eq!(
            exec(&d, &["PING", "hello"]),
            Frame::Bulk(Bytes::from_static(b"hello"))
        );
        assert_eq!(exec(&d, &["COMMAND"]), Frame::Simple(String::new()));
        assert_eq!(exec(&d, &["PUBSUB"]), Frame::Simple("OK".into()));
    }

    #[test]
    fn unknown_command_gets_distinct_error() {
        let d = dispatcher();
        assert_eq!(
            exec(&d, &["NOSUCH"]),
            Frame::Error("ERR unknown command 'NOSUCH'".into())
        );
    }

    #[test]
    fn publish_with_no_subscribers_is_zero() {
        let d = dispatcher();
        assert_eq!(exec(&d, &["PUBLISH", "t", "m"]), Frame::Integer(0));
    }

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let d = dispatcher();
        let mut rx = d.pubsub().subscribe("t");
        assert_eq!(exec(&d, &["PUBLISH", "t", "m"]), Frame::Integer(1));
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"m"));
    }

    #[test]
    fn writes_are_persisted_before_apply() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.aof");
        let aof = Arc::new(Aof::open(&path).unwrap());
        let d = Dispatcher::new(Arc::new(Store::new()), Arc::new(PubSub::new()), Some(aof));

        exec(&d, &["SET", "x", "1"]);
        exec(&d, &["GET", "x"]);
        exec(&d, &["HSET", "h", "f", "2"]);
        exec(&d, &["PUBLISH", "t", "m"]);
        exec(&d, &["PING"]);

        // only the two writes are in the log, in order
        let mut logged = Vec::new();
        replay(&path, |f| logged.push(f)).unwrap();
        assert_eq!(
            logged,
            vec![request(&["SET", "x", "1"]), request(&["HSET", "h", "f", "2"])]
        );
    }

    #[test]
    fn replay_rebuilds_state_and_skips_reads() {
        let d = dispatcher();
        assert!(d.replay_frame(&request(&["SET", "x", "1"])));
        assert!(d.replay_frame(&request(&["HSET", "h", "f", "2"])));
        // a read in the log has no effect
        assert!(!d.replay_frame(&request(&["GET", "x"])));

        assert_eq!(exec(&d, &["GET", "x"]), Frame::Bulk(Bytes::from_static(b"1")));
        assert_eq!(
            exec(&d, &["HGET", "h", "f"]),
            Frame::Bulk(Bytes::from_static(b"2"))
        );
    }

    #[test]
    fn replay_is_idempotent() {
        let entries = vec![
            request(&["SET", "x", "1"]),
            request(&["HSET", "h", "f", "2"]),
            request(&["SET", "x", "3"]),
        ];

        let once = dispatcher();
        for e in &entries {
            once.replay_frame(e);
        }
        let twice = dispatcher();
        for e in entries.iter().chain(entries.iter()) {
            twice.replay_frame(e);
        }

        assert_eq!(exec(&once, &["GET", "x"]), exec(&twice, &["GET", "x"]));
        assert_eq!(
            exec(&once, &["HGET", "h", "f"]),
            exec(&twice, &["HGET", "h", "f"])
        );
    }
}
