//! Protocol error types for RESP parsing and command decoding.

use thiserror::Error;

/// Errors that can occur when parsing the RESP wire format or decoding
/// a request frame into a command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The input buffer doesn't contain a complete frame yet.
    /// The caller should read more data and try again.
    #[error("incomplete frame: need more data")]
    Incomplete,

    /// The first byte of a frame didn't match any known RESP type prefix.
    #[error("invalid type prefix: {0:#04x}")]
    InvalidPrefix(u8),

    /// Failed to parse an integer value from a length or `:` line.
    #[error("invalid integer encoding")]
    InvalidInteger,

    /// A bulk string declared an invalid length. The only legal negative
    /// length is -1, which encodes null.
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// An array declared a negative element count.
    #[error("invalid array length: {0}")]
    InvalidArrayLength(i64),

    /// A bulk string declared a length above the protocol limit.
    #[error("bulk string of {0} bytes exceeds maximum")]
    BulkTooLarge(usize),

    /// Arrays nested deeper than the protocol limit.
    #[error("nesting exceeds maximum depth of {0}")]
    NestingTooDeep(usize),

    /// An array declared more elements than the protocol limit.
    #[error("array of {0} elements exceeds maximum")]
    TooManyElements(usize),

    /// A request frame had the wrong shape: not an array, an empty
    /// array, or an argument that isn't a bulk/simple string.
    #[error("{0}")]
    InvalidCommandFrame(String),

    /// A command was called with the wrong number of arguments.
    /// Carries the command name for the client-facing reply.
    #[error("wrong number of arguments for '{0}' command")]
    WrongArity(String),
}
