//! RESP frame types.
//!
//! The [`Frame`] enum represents a single parsed RESP value. Bulk
//! strings use `Bytes` for reference-counted storage so payloads move
//! through the pipeline without copies.

use bytes::Bytes;

/// A single RESP protocol frame.
///
/// Covers the types this server speaks: simple strings, errors,
/// integers, bulk data, arrays, and null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Simple string response, e.g. `+OK\r\n`.
    /// Used for short, non-binary status replies.
    Simple(String),

    /// Error response, e.g. `-ERR unknown command\r\n`.
    Error(String),

    /// 64-bit signed integer, e.g. `:42\r\n`.
    Integer(i64),

    /// Bulk (binary-safe) string, e.g. `$5\r\nhello\r\n`.
    Bulk(Bytes),

    /// Ordered array of frames, e.g. `*2\r\n+hello\r\n+world\r\n`.
    /// May be empty; an empty array is distinct from null.
    Array(Vec<Frame>),

    /// Null value. Has exactly one wire encoding: the null bulk
    /// string `$-1\r\n`.
    Null,
}

impl Frame {
    /// Returns `true` if this frame is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Frame::Null)
    }

    /// Builds an error frame from a displayable message.
    pub fn error(msg: impl Into<String>) -> Frame {
        Frame::Error(msg.into())
    }
}
