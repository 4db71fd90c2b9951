//! AOF writer, replay, and the periodic sync task.
//!
//! Appends go straight to the file under a mutex, so entries land
//! strictly ordered even with concurrent appenders. Durability is two-staged: `append` leaves the bytes in
//! the OS page cache, and a background task fsyncs on a fixed interval
//! regardless of request volume, bounding crash loss to roughly one
//! interval of unflushed writes.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::BytesMut;
use cinder_protocol::{parse_frame, Frame, ProtocolError};
use tokio::task::JoinHandle;

/// Errors from append-only log operations.
#[derive(Debug, thiserror::Error)]
pub enum AofError {
    #[error("append-only log I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The log contains bytes that don't decode as a complete frame.
    /// Replay stops hard here: there is no partial-recovery policy, a
    /// corrupt log is fatal to startup.
    #[error("append-only log corrupt at byte {offset}: {source}")]
    Corrupt {
        offset: usize,
        source: ProtocolError,
    },
}

/// Handle to the append-only log file.
///
/// Shared across all connection tasks via `Arc<Aof>`; the mutex
/// serializes appends so entries land in command-acceptance order.
#[derive(Debug)]
pub struct Aof {
    file: Mutex<File>,
    path: PathBuf,
}

impl Aof {
    /// Opens (or creates) the log file for appending.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AofError> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            file: Mutex::new(file),
            path,
        })
    }

    /// Appends the wire encoding of one request frame.
    ///
    /// The write reaches the OS before this returns; an error means
    /// the mutation did not durably commit and the caller must not
    /// apply it.
    pub fn append(&self, frame: &Frame) -> Result<(), AofError> {
        let mut buf = BytesMut::new();
        frame.serialize(&mut buf);

        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.write_all(&buf)?;
        Ok(())
    }

    /// Forces buffered writes to stable storage.
    pub fn sync(&self) -> Result<(), AofError> {
        let file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.sync_data()?;
        Ok(())
    }

    /// The log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Replays the log at `path` from the start, invoking `apply` for each
/// decoded request frame. Returns the number of entries applied.
///
/// A missing file is an empty log. Trailing bytes that don't form a
/// complete frame, or any malformed frame, are a corrupt-log condition.
pub fn replay(
    path: impl AsRef<Path>,
    mut apply: impl FnMut(Frame),
) -> Result<usize, AofError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(0);
    }

    let data = std::fs::read(path)?;
    let mut offset = 0;
    let mut entries = 0;

    while offset < data.len() {
        match parse_frame(&data[offset..]) {
            Ok(Some((frame, consumed))) => {
                apply(frame);
                offset += consumed;
                entries += 1;
            }
            // a partial frame at the tail means the log was cut mid-record
            Ok(None) => {
                return Err(AofError::Corrupt {
                    offset,
                    source: ProtocolError::Incomplete,
                });
            }
            Err(source) => return Err(AofError::Corrupt { offset, source }),
        }
    }

    Ok(entries)
}

/// Spawns the background task that fsyncs the log on a fixed interval.
///
/// The task only touches the file handle's sync operation; appends
/// from connection tasks proceed concurrently.
pub fn spawn_sync_task(aof: Arc<Aof>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        // first tick fires immediately; skip it
        tick.tick().await;
        loop {
            tick.tick().await;
            if let Err(e) = aof.sync() {
                tracing::warn!(path = %aof.path().display(), error = %e, "aof sync failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn request(parts: &[&str]) -> Frame {
        Frame::Array(
            parts
                .iter()
                .map(|p| Frame::Bulk(Bytes::copy_from_slice(p.as_bytes())))
                .collect(),
        )
    }

    fn temp_dir() -> tempfile::TempDir {
        tempfile::tempdir().expect("create temp dir")
    }

    #[test]
    fn append_then_replay() {
        let dir = temp_dir();
        let path = dir.path().join("test.aof");

        let requests = vec![
            request(&["SET", "x", "1"]),
            request(&["HSET", "h", "f", "2"]),
            request(&["SET", "x", "3"]),
        ];

        {
            let aof = Aof::open(&path).unwrap();
            for req in &requests {
                aof.append(req).unwrap();
            }
            aof.sync().unwrap();
        }

        let mut got = Vec::new();
        let entries = replay(&path, |f| got.push(f)).unwrap();
        assert_eq!(entries, 3);
        assert_eq!(got, requests);
    }

    #[test]
    fn replay_missing_file_is_empty() {
        let dir = temp_dir();
        let entries = replay(dir.path().join("absent.aof"), |_| {
            panic!("apply must not be called")
        })
        .unwrap();
        assert_eq!(entries, 0);
    }

    #[test]
    fn replay_empty_file_is_empty() {
        let dir = temp_dir();
        let path = dir.path().join("empty.aof");
        let _aof = Aof::open(&path).unwrap();

        let entries = replay(&path, |_| panic!("apply must not be called")).unwrap();
        assert_eq!(entries, 0);
    }

    #[test]
    fn truncated_tail_is_corrupt() {
        let dir = temp_dir();
        let path = dir.path().join("trunc.aof");

        let aof = Aof::open(&path).unwrap();
        aof.append(&request(&["SET", "k", "v"])).unwrap();
        drop(aof);

        // chop the file mid-record
        let data = std::fs::read(&path).unwrap();
        std::fs::write(&path, &data[..data.len() - 4]).unwrap();

        let err = replay(&path, |_| {}).unwrap_err();
        assert!(matches!(
            err,
            AofError::Corrupt {
                source: ProtocolError::Incomplete,
                ..
            }
        ));
    }

    #[test]
    fn garbage_is_corrupt_with_offset() {
        let dir = temp_dir();
        let path = dir.path().join("garbage.aof");

        let aof = Aof::open(&path).unwrap();
        aof.append(&request(&["SET", "k", "v"])).unwrap();
        drop(aof);

        let good_len = std::fs::read(&path).unwrap().len();
        let mut data = std::fs::read(&path).unwrap();
        data.extend_from_slice(b"!not a frame\r\n");
        std::fs::write(&path, &data).unwrap();

        // the first record still replays; the garbage is reported at
        // its exact offset
        let mut applied = 0;
        let err = replay(&path, |_| applied += 1).unwrap_err();
        assert_eq!(applied, 1);
        match err {
            AofError::Corrupt { offset, source } => {
                assert_eq!(offset, good_len);
                assert_eq!(source, ProtocolError::InvalidPrefix(b'!'));
            }
            other => panic!("expected Corrupt, got {other:?}"),
        }
    }

    #[test]
    fn append_preserves_order() {
        let dir = temp_dir();
        let path = dir.path().join("order.aof");

        let aof = Aof::open(&path).unwrap();
        for i in 0..100 {
            aof.append(&request(&["SET", "k", &i.to_string()])).unwrap();
        }
        drop(aof);

        let mut values = Vec::new();
        replay(&path, |f| {
            if let Frame::Array(items) = f {
                if let Frame::Bulk(v) = &items[2] {
                    values.push(String::from_utf8(v.to_vec()).unwrap());
                }
            }
        })
        .unwrap();
        let expected: Vec<String> = (0..100).map(|i| i.to_string()).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn reopen_appends_after_existing_entries() {
        let dir = temp_dir();
        let path = dir.path().join("reopen.aof");

        {
            let aof = Aof::open(&path).unwrap();
            aof.append(&request(&["SET", "a", "1"])).unwrap();
        }
        {
            let aof = Aof::open(&path).unwrap();
            aof.append(&request(&["SET", "b", "2"])).unwrap();
        }

        let mut got = Vec::new();
        replay(&path, |f| got.push(f)).unwrap();
        assert_eq!(
            got,
            vec![request(&["SET", "a", "1"]), request(&["SET", "b", "2"])]
        );
    }

    #[tokio::test]
    async fn sync_task_flushes_periodically() {
        let dir = temp_dir();
        let path = dir.path().join("sync.aof");
        let aof = Arc::new(Aof::open(&path).unwrap());

        let handle = spawn_sync_task(Arc::clone(&aof), Duration::from_millis(10));
        aof.append(&request(&["SET", "k", "v"])).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        // the entry must be readable after the sync interval elapsed
        let entries = replay(&path, |_| {}).unwrap();
        assert_eq!(entries, 1);
    }
}
