//! Single-pass incremental RESP parser.
//!
//! Operates on buffered byte slices. The caller is responsible for
//! reading data from the network into a buffer; this parser is purely
//! synchronous. A `Cursor<&[u8]>` tracks the position through the
//! input without consuming it, so the caller can retry the same buffer
//! once more data arrives: an incomplete frame surfaces as `Ok(None)`,
//! not an error.

use std::io::Cursor;

use bytes::Bytes;

use crate::error::ProtocolError;
use crate::types::Frame;

/// Maximum nesting depth for arrays. Prevents stack overflow from
/// malicious or malformed deeply-nested frames.
const MAX_NESTING_DEPTH: usize = 64;

/// Maximum number of elements in an array. Prevents memory
/// amplification where tiny elements declare huge counts.
const MAX_ARRAY_ELEMENTS: usize = 1_048_576;

/// Maximum length of a bulk string in bytes (512 MB, matching Redis).
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Cap for Vec::with_capacity in array parsing. Limits the upfront
/// allocation for large declared counts; the Vec grows as elements
/// actually parse.
const PREALLOC_CAP: usize = 1024;

/// Parses one complete RESP frame from the front of `buf`.
///
/// Returns `Ok(Some((frame, consumed)))` if a complete frame was parsed,
/// `Ok(None)` if the buffer doesn't contain enough data yet,
/// or `Err(...)` if the data is malformed.
pub fn parse_frame(buf: &[u8]) -> Result<Option<(Frame, usize)>, ProtocolError> {
    if buf.is_empty() {
        return Ok(None);
    }

    let mut cursor = Cursor::new(buf);

    match decode(&mut cursor, 0) {
        Ok(frame) => {
            let consumed = cursor.position() as usize;
            Ok(Some((frame, consumed)))
        }
        Err(ProtocolError::Incomplete) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Decodes a frame at the cursor position, recursing for array
/// elements. Returns `Incomplete` when the buffer runs out mid-frame.
fn decode(cursor: &mut Cursor<&[u8]>, depth: usize) -> Result<Frame, ProtocolError> {
    let prefix = next_byte(cursor)?;

    match prefix {
        b'+' => {
            let line = read_line(cursor)?;
            Ok(Frame::Simple(line_to_string(line, "simple string")?))
        }
        b'-' => {
            let line = read_line(cursor)?;
            Ok(Frame::Error(line_to_string(line, "error string")?))
        }
        b':' => Ok(Frame::Integer(read_integer_line(cursor)?)),
        b'$' => {
            let len = read_integer_line(cursor)?;
            if len == -1 {
                // null bulk string: `$-1\r\n`, no body
                return Ok(Frame::Null);
            }
            if len < 0 {
                return Err(ProtocolError::InvalidBulkLength(len));
            }
            if len > MAX_BULK_LEN {
                return Err(ProtocolError::BulkTooLarge(len as usize));
            }
            let len = len as usize;

            // need `len` bytes of body plus the trailing \r\n
            if remaining(cursor) < len + 2 {
                return Err(ProtocolError::Incomplete);
            }

            let start = cursor.position() as usize;
            let body = &cursor.get_ref()[start..start + len];
            if cursor.get_ref()[start + len] != b'\r' || cursor.get_ref()[start + len + 1] != b'\n'
            {
                return Err(ProtocolError::InvalidBulkLength(len as i64));
            }
            let data = Bytes::copy_from_slice(body);
            cursor.set_position((start + len + 2) as u64);
            Ok(Frame::Bulk(data))
        }
        b'*' => {
            let next_depth = depth + 1;
            if next_depth > MAX_NESTING_DEPTH {
                return Err(ProtocolError::NestingTooDeep(MAX_NESTING_DEPTH));
            }

            let count = read_integer_line(cursor)?;
            if count < 0 {
                return Err(ProtocolError::InvalidArrayLength(count));
            }
            if count as usize > MAX_ARRAY_ELEMENTS {
                return Err(ProtocolError::TooManyElements(count as usize));
            }

            let count = count as usize;
            let mut items = Vec::with_capacity(count.min(PREALLOC_CAP));
            for _ in 0..count {
                items.push(decode(cursor, next_depth)?);
            }
            Ok(Frame::Array(items))
        }
        other => Err(ProtocolError::InvalidPrefix(other)),
    }
}

fn line_to_string(line: &[u8], what: &str) -> Result<String, ProtocolError> {
    std::str::from_utf8(line)
        .map(str::to_owned)
        .map_err(|_| ProtocolError::InvalidCommandFrame(format!("invalid utf-8 in {what}")))
}

// ---------------------------------------------------------------------------
// low-level cursor helpers
// ---------------------------------------------------------------------------

fn next_byte(cursor: &mut Cursor<&[u8]>) -> Result<u8, ProtocolError> {
    let pos = cursor.position() as usize;
    if pos >= cursor.get_ref().len() {
        return Err(ProtocolError::Incomplete);
    }
    cursor.set_position((pos + 1) as u64);
    Ok(cursor.get_ref()[pos])
}

/// Returns the bytes up to (but not including) the next `\r\n` and
/// advances the cursor past the terminator. A bare `\r` with no `\n`
/// is not a terminator.
fn read_line<'a>(cursor: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], ProtocolError> {
    let buf = *cursor.get_ref();
    let start = cursor.position() as usize;

    // memchr scans for \r, then we verify \n follows
    let mut pos = start;
    while let Some(offset) = memchr::memchr(b'\r', &buf[pos..]) {
        let cr = pos + offset;
        if cr + 1 < buf.len() && buf[cr + 1] == b'\n' {
            cursor.set_position((cr + 2) as u64);
            return Ok(&buf[start..cr]);
        }
        pos = cr + 1;
    }

    Err(ProtocolError::Incomplete)
}

fn read_integer_line(cursor: &mut Cursor<&[u8]>) -> Result<i64, ProtocolError> {
    let line = read_line(cursor)?;
    parse_i64(line)
}

fn remaining(cursor: &Cursor<&[u8]>) -> usize {
    cursor
        .get_ref()
        .len()
        .saturating_sub(cursor.position() as usize)
}

/// Parses an i64 directly from a byte slice without allocating.
///
/// Negative numbers accumulate in the negative direction so that
/// `i64::MIN` is representable without overflow.
fn parse_i64(buf: &[u8]) -> Result<i64, ProtocolError> {
    let (negative, digits) = match buf.first() {
        Some(b'-') => (true, &buf[1..]),
        Some(_) => (false, buf),
        None => return Err(ProtocolError::InvalidInteger),
    };

    if digits.is_empty() {
        return Err(ProtocolError::InvalidInteger);
    }

    let mut n: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(ProtocolError::InvalidInteger);
        }
        let digit = (b - b'0') as i64;
        n = n
            .checked_mul(10)
            .and_then(|n| {
                if negative {
                    n.checked_sub(digit)
                } else {
                    n.checked_add(digit)
                }
            })
            .ok_or(ProtocolError::InvalidInteger)?;
    }
    Ok(n)
}
