//! Command parsing from RESP frames.
//!
//! Converts a parsed request [`Frame`] (expected to be an array) into a
//! typed [`Command`]. Name, arity, argument typing, and durability
//! classification all live here, so the dispatch layer never touches
//! raw frames: a command that parses is a command with the right shape.

use bytes::Bytes;

use crate::error::ProtocolError;
use crate::types::Frame;

/// A parsed client command, ready for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// PING [message]. Returns PONG or echoes the message.
    Ping(Option<Bytes>),

    /// COMMAND [...]. Accepted for client-handshake compatibility;
    /// replies with an empty string and ignores any subcommands.
    CommandInfo,

    /// GET <key>. Returns the value or null.
    Get { key: String },

    /// SET <key> <value>. Unconditional overwrite, returns OK.
    Set { key: String, value: Bytes },

    /// HGET <hash> <field>. Returns the field value or null.
    HGet { hash: String, field: String },

    /// HSET <hash> <field> <value>. Creates the hash on demand.
    HSet {
        hash: String,
        field: String,
        value: Bytes,
    },

    /// HGETALL <hash>. Returns alternating field/value pairs, empty
    /// array when the hash doesn't exist.
    HGetAll { hash: String },

    /// PUBLISH <topic> <message>. Returns the number of subscribers
    /// the message reached.
    Publish { topic: String, payload: Bytes },

    /// SUBSCRIBE <topic>. Switches the connection into a streaming
    /// subscriber; handled by the connection layer, not the dispatcher.
    Subscribe { topic: String },

    /// PUBSUB. Introspection placeholder, replies OK.
    PubSub,

    /// A command we don't recognize. Carries the name the client sent
    /// for the error reply.
    Unknown(String),
}

impl Command {
    /// Parses a request [`Frame`] into a [`Command`].
    ///
    /// Expects an array frame where the first element is the command
    /// name (as a bulk or simple string) and the rest are arguments.
    /// The name is matched case-insensitively.
    pub fn from_frame(frame: &Frame) -> Result<Command, ProtocolError> {
        let frames = match frame {
            Frame::Array(frames) => frames,
            _ => {
                return Err(ProtocolError::InvalidCommandFrame(
                    "expected array frame".into(),
                ));
            }
        };

        if frames.is_empty() {
            return Err(ProtocolError::InvalidCommandFrame(
                "empty command array".into(),
            ));
        }

        let name = extract_string(&frames[0])?;
        let args = &frames[1..];

        match name.to_ascii_uppercase().as_str() {
            "PING" => parse_ping(args),
            "COMMAND" => Ok(Command::CommandInfo),
            "GET" => parse_get(args),
            "SET" => parse_set(args),
            "HGET" => parse_hget(args),
            "HSET" => parse_hset(args),
            "HGETALL" => parse_hgetall(args),
            "PUBLISH" => parse_publish(args),
            "SUBSCRIBE" => parse_subscribe(args),
            "PUBSUB" => Ok(Command::PubSub),
            _ => Ok(Command::Unknown(name)),
        }
    }

    /// The canonical (uppercase) command name, for logging and error
    /// replies. Unknown commands report the name the client sent.
    pub fn name(&self) -> &str {
        match self {
            Command::Ping(_) => "PING",
            Command::CommandInfo => "COMMAND",
            Command::Get { .. } => "GET",
            Command::Set { .. } => "SET",
            Command::HGet { .. } => "HGET",
            Command::HSet { .. } => "HSET",
            Command::HGetAll { .. } => "HGETALL",
            Command::Publish { .. } => "PUBLISH",
            Command::Subscribe { .. } => "SUBSCRIBE",
            Command::PubSub => "PUBSUB",
            Command::Unknown(name) => name,
        }
    }

    /// Whether this command mutates the store and must be recorded in
    /// the append-only log before it is applied. Reads, pub/sub, and
    /// administrative commands are never logged.
    pub fn is_write(&self) -> bool {
        matches!(self, Command::Set { .. } | Command::HSet { .. })
    }
}

/// Extracts a UTF-8 string from a Bulk or Simple frame.
fn extract_string(frame: &Frame) -> Result<String, ProtocolError> {
    match frame {
        Frame::Bulk(data) => String::from_utf8(data.to_vec())
            .map_err(|_| ProtocolError::InvalidCommandFrame("argument is not valid utf-8".into())),
        Frame::Simple(s) => Ok(s.clone()),
        other => Err(ProtocolError::InvalidCommandFrame(format!(
            "expected a string argument, got {}",
            frame_kind(other)
        ))),
    }
}

/// Extracts raw bytes from a Bulk or Simple frame.
fn extract_bytes(frame: &Frame) -> Result<Bytes, ProtocolError> {
    match frame {
        Frame::Bulk(data) => Ok(data.clone()),
        Frame::Simple(s) => Ok(Bytes::from(s.clone().into_bytes())),
        other => Err(ProtocolError::InvalidCommandFrame(format!(
            "expected a string argument, got {}",
            frame_kind(other)
        ))),
    }
}

fn frame_kind(frame: &Frame) -> &'static str {
    match frame {
        Frame::Simple(_) => "simple string",
        Frame::Error(_) => "error",
        Frame::Integer(_) => "integer",
        Frame::Bulk(_) => "bulk string",
        Frame::Array(_) => "array",
        Frame::Null => "null",
    }
}

fn parse_ping(args: &[Frame]) -> Result<Command, ProtocolError> {
    match args.len() {
        0 => Ok(Command::Ping(None)),
        1 => Ok(Command::Ping(Some(extract_bytes(&args[0])?))),
        _ => Err(ProtocolError::WrongArity("ping".into())),
    }
}

fn parse_get(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 1 {
        return Err(ProtocolError::WrongArity("get".into()));
    }
    let key = extract_string(&args[0])?;
    Ok(Command::Get { key })
}

fn parse_set(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 2 {
        return Err(ProtocolError::WrongArity("set".into()));
    }
    let key = extract_string(&args[0])?;
    let value = extract_bytes(&args[1])?;
    Ok(Command::Set { key, value })
}

fn parse_hget(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 2 {
        return Err(ProtocolError::WrongArity("hget".into()));
    }
    let hash = extract_string(&args[0])?;
    let field = extract_string(&args[1])?;
    Ok(Command::HGet { hash, field })
}

fn parse_hset(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 3 {
        return Err(ProtocolError::WrongArity("hset".into()));
    }
    let hash = extract_string(&args[0])?;
    let field = extract_string(&args[1])?;
    let value = extract_bytes(&args[2])?;
    Ok(Command::HSet { hash, field, value })
}

fn parse_hgetall(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 1 {
        return Err(ProtocolError::WrongArity("hgetall".into()));
    }
    let hash = extract_string(&args[0])?;
    Ok(Command::HGetAll { hash })
}

fn parse_publish(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 2 {
        return Err(ProtocolError::WrongArity("publish".into()));
    }
    let topic = extract_string(&args[0])?;
    let payload = extract_bytes(&args[1])?;
    Ok(Command::Publish { topic, payload })
}

fn parse_subscribe(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 1 {
        return Err(ProtocolError::WrongArity("subscribe".into()));
    }
    let topic = extract_string(&args[0])?;
    Ok(Command::Subscribe { topic })
}
