//! # RESP2 Request Parsing
//!
//! Purpose: Incrementally decode client command arrays from a growing
//! socket buffer.
//!
//! ## Design Principles
//! 1. **Incremental**: Return `Ok(None)` until a full frame is buffered; never
//!    consume a partial frame.
//! 2. **Binary-Safe**: Bulk strings are length-delimited raw bytes.
//! 3. **Fail Fast**: Framing violations end the connection.

use bytes::{Buf, BytesMut};

/// Upper bound for a single bulk argument (matches Redis `proto-max-bulk-len`).
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Upper bound for arguments pre-allocated per command.
const MAX_PREALLOC_ARGS: usize = 1024;

/// Errors raised while decoding a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RespError {
    /// Frame does not follow RESP2 array-of-bulk-strings framing.
    Protocol,
}

/// Parser for RESP2 command arrays.
#[derive(Debug, Default)]
pub struct RespParser;

impl RespParser {
    pub fn new() -> Self {
        RespParser
    }

    /// Decodes one command from the front of `buf`.
    ///
    /// On success the frame bytes are consumed; on `Ok(None)` the buffer is
    /// left untouched so more data can be appended.
    pub fn parse(&mut self, buf: &mut BytesMut) -> Result<Option<Vec<Vec<u8>>>, RespError> {
        let (count, mut pos) = match read_header(buf, 0, b'*')? {
            Some(header) => header,
            None => return Ok(None),
        };
        if count < 0 {
            return Err(RespError::Protocol);
        }

        let count = count as usize;
        let mut args = Vec::with_capacity(count.min(MAX_PREALLOC_ARGS));
        for _ in 0..count {
            let (len, next) = match read_header(buf, pos, b'$')? {
                Some(header) => header,
                None => return Ok(None),
            };
            if !(0..=MAX_BULK_LEN).contains(&len) {
                return Err(RespError::Protocol);
            }

            let len = len as usize;
            let end = next + len;
            if buf.len() < end + 2 {
                return Ok(None);
            }
            if &buf[end..end + 2] != b"\r\n" {
                return Err(RespError::Protocol);
            }
            args.push(buf[next..end].to_vec());
            pos = end + 2;
        }

        buf.advance(pos);
        Ok(Some(args))
    }
}

/// Reads a `<prefix><integer>\r\n` line starting at `pos`.
///
/// Returns the integer and the offset just past the line.
fn read_header(buf: &[u8], pos: usize, prefix: u8) -> Result<Option<(i64, usize)>, RespError> {
    if pos >= buf.len() {
        return Ok(None);
    }
    if buf[pos] != prefix {
        return Err(RespError::Protocol);
    }
    let line_end = match buf[pos..].windows(2).position(|pair| pair == b"\r\n") {
        Some(offset) => pos + offset,
        None => return Ok(None),
    };
    let value = parse_i64(&buf[pos + 1..line_end])?;
    Ok(Some((value, line_end + 2)))
}

fn parse_i64(data: &[u8]) -> Result<i64, RespError> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or(RespError::Protocol)
}
